//! Agent output stream handling.
//!
//! - `codec`: [`AnyDelimiterCodec`](tokio_util::codec::AnyDelimiterCodec)-based line framing
//!   with a per-line size limit.
//! - `parser`: classification of agent output lines into
//!   [`StreamEvent`](crate::models::event::StreamEvent)s.
//! - `sse`: frame splitting for Server-Sent Events responses.

pub mod codec;
pub mod parser;
pub mod sse;
