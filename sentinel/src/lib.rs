// Library interface for sentinel modules
// This allows tests and the binary to import modules

pub mod artifact;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod sources;
pub mod subscriptions;

pub use error::{Result, SentinelError};
