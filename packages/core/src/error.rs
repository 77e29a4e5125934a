//! Unified error types for the nextboot-core library.
//!
//! Uses SNAFU for context-rich error handling. Only a few operations
//! propagate errors at all: probing (`is_usable`) and the mutating
//! entry points normalize everything into a boolean, so the variants
//! here mostly surface from `boot_options`.

use snafu::Snafu;
use std::path::PathBuf;

use crate::bootloader::BootLoaderKind;

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all core library operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The backend's binary or configuration artifact is absent.
    #[snafu(display("{kind} is not usable on this system"))]
    NotUsable { kind: BootLoaderKind },

    /// Failed to spawn an external command at all.
    #[snafu(display("failed to launch command '{command}'"))]
    CommandLaunch {
        command: String,
        source: std::io::Error,
    },

    /// Command executed but returned a non-zero exit code, in a context
    /// where the caller cannot continue without its output.
    #[snafu(display("command '{command}' exited with code {code}: {stderr}"))]
    CommandExit {
        command: String,
        code: i32,
        stderr: String,
    },

    /// Command did not exit within the allowed time.
    #[snafu(display("command '{command}' timed out after {seconds}s"))]
    CommandTimeout { command: String, seconds: u64 },

    /// Source text was readable but yielded no usable boot entries.
    #[snafu(display("failed to parse boot entries: {message}"))]
    Parse { message: String },

    /// Boot loader configuration file could not be read.
    #[snafu(display("failed to read boot configuration at {}", path.display()))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// User cancelled the privilege-escalation prompt.
    #[snafu(display("authentication cancelled by user"))]
    AuthenticationCancelled,
}
