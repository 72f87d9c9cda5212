//! Cooperative run cancellation.
//!
//! Cancellation is honoured between stages only. A stage that is already
//! running finishes (or hits its timeout) before the orchestrator looks at
//! the token again.

mod token;

pub use token::CancellationToken;
