//! External tool invocation.
//!
//! This module provides:
//! - [`ToolCommand`], a command template with `{placeholder}` arguments
//! - [`run_tool`], the subprocess runner with output capture and timeout
//! - Ready-made command templates for the supported tools

mod command;
pub mod presets;
mod runner;

pub use command::ToolCommand;
pub use runner::{run_tool, ToolInvocation, ToolOutput, MAX_OUTPUT_BYTES};
