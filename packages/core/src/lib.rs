//! nextboot-core: a boot-loader abstraction for choosing the next boot
//! target on Linux.
//!
//! One interface over three mutually exclusive backends: UEFI
//! boot-manager entries (`efibootmgr`), GRUB menu entries, and
//! systemd-boot loader entries (`bootctl`). Each backend probes its own
//! usability, scrapes its tool/config output into a normalized option
//! list with a resolved default, and performs the privileged one-shot
//! "set next boot" operation.
//!
//! # Modules
//!
//! - [`bootloader`]: the backend contract, kind enum and selector
//! - [`efi`]: UEFI boot manager backend
//! - [`grub`]: GRUB backend, including the quick-reboot helper script
//! - [`systemd_boot`]: systemd-boot backend
//! - [`options`]: normalized boot option model
//! - [`executor`]: async command execution with privilege escalation
//! - [`error`]: error types
//!
//! # Example
//!
//! ```no_run
//! use nextboot_core::{BootLoader, ExecutionContext, Selector};
//!
//! # async fn demo() -> nextboot_core::Result<()> {
//! let selector = Selector::new(ExecutionContext::with_pkexec());
//! if let Some(backend) = selector.usable_backend().await {
//!     let set = backend.boot_options().await?;
//!     if let Some(id) = set.resolved_default() {
//!         // Reboots into `id` on the next boot only.
//!         backend.set_boot_option(id).await;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod bootloader;
pub mod efi;
pub mod error;
pub mod executor;
pub mod grub;
pub mod options;
pub mod systemd_boot;

// Re-export commonly used types
pub use bootloader::{BootLoader, BootLoaderKind, BootLoaderToggles, Selector};
pub use error::{Error, Result};
pub use executor::{CommandResult, ExecutionContext, PrivilegeEscalation};
pub use options::{BootOption, BootOptionSet};
