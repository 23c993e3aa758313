pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use client::{ChatClient, CompletionSender};
pub use error::LlmError;
pub use transport::{RetryPolicy, RetryingTransport};
