//! Line codec behaviour through `FramedRead`.

use agent_bridge::stream::codec::{Frame, LineCodec, MAX_LINE_BYTES};
use bytes::BytesMut;
use futures_util::StreamExt;
use tokio_util::codec::{Decoder, FramedRead};

fn line(text: &str) -> Option<Frame> {
    Some(Frame::Line(text.to_owned()))
}

#[test]
fn default_limit_is_one_mebibyte() {
    assert_eq!(MAX_LINE_BYTES, 1024 * 1024);
}

#[test]
fn decodes_complete_lines_only() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("first\nsec");

    assert_eq!(codec.decode(&mut buf).expect("decode"), line("first"));
    assert_eq!(codec.decode(&mut buf).expect("decode"), None);

    buf.extend_from_slice(b"ond\n");
    assert_eq!(codec.decode(&mut buf).expect("decode"), line("second"));
}

#[test]
fn strips_carriage_return() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("line\r\n");
    assert_eq!(codec.decode(&mut buf).expect("decode"), line("line"));
}

#[test]
fn final_line_without_newline_is_emitted_at_eof() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("tail");
    assert_eq!(codec.decode_eof(&mut buf).expect("decode"), line("tail"));
}

/// An over-long line yields one `Oversized` frame and reading resumes at the
/// next newline.
#[tokio::test]
async fn over_long_line_is_reported_and_skipped() {
    let input = format!("before\n{}\nafter\n", "x".repeat(64));
    let framed = FramedRead::new(input.as_bytes(), LineCodec::with_max_length(16));

    let frames: Vec<Frame> = framed
        .map(|item| item.expect("no io error"))
        .collect()
        .await;

    assert_eq!(
        frames,
        vec![
            Frame::Line("before".into()),
            Frame::Oversized,
            Frame::Line("after".into()),
        ]
    );
}

/// A non-UTF-8 line is handed back as raw bytes and reading continues.
#[tokio::test]
async fn non_utf8_line_is_reported_and_skipped() {
    let input: &[u8] = b"before\n\xff\xfe junk\r\nafter\n";
    let framed = FramedRead::new(input, LineCodec::new());

    let frames: Vec<Frame> = framed
        .map(|item| item.expect("no io error"))
        .collect()
        .await;

    assert_eq!(
        frames,
        vec![
            Frame::Line("before".into()),
            Frame::Invalid(b"\xff\xfe junk".to_vec()),
            Frame::Line("after".into()),
        ]
    );
}
