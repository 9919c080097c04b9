#![forbid(unsafe_code)]

pub mod bridge;
pub mod config;
pub mod descriptor;
pub mod errors;
pub mod models;
pub mod responder;
pub mod server;
pub mod stream;
pub mod util;

pub use config::BridgeConfig;
pub use errors::{AppError, Result};
