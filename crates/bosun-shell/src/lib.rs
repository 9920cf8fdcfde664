//! Bosun Shell
//!
//! Runs a program (or a script through the platform shell) to completion and
//! captures its exit code and output. Cancelling the token kills the child.

mod command;
mod error;

pub use command::{ShellCommand, ShellOutput};
pub use error::ShellError;
