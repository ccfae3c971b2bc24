/// Shell integration module
///
/// Handles detection of the interpreter that runs command lines.

pub mod shell_detector;

pub use shell_detector::{Shell, ShellDetector};
