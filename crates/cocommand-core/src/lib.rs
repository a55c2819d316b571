pub mod composer;
pub mod config;
pub mod draft;
pub mod error;
pub mod history;
pub mod runtime_event;
pub mod session;
pub mod turn;

// Re-export common error type
pub use error::{ClientError, ErrorCode, Result};
