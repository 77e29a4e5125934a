//! Boot loader selection and the common backend contract.
//!
//! Backends are probed in a fixed priority order — UEFI boot manager,
//! then GRUB, then systemd-boot — each gated by an externally-owned
//! enable toggle. The first usable one wins; everything downstream works
//! against the [`BootLoader`] trait object, never against the kind tag.

use std::fmt;

use async_trait::async_trait;

use crate::efi::EfiLoader;
use crate::error::Result;
use crate::executor::ExecutionContext;
use crate::grub::GrubLoader;
use crate::options::BootOptionSet;
use crate::systemd_boot::SystemdBootLoader;

/// Which boot-management backend is in charge of the next boot.
///
/// Recomputed on demand by the [`Selector`]; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootLoaderKind {
    Efi,
    Grub,
    SystemdBoot,
    Unknown,
}

impl fmt::Display for BootLoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootLoaderKind::Efi => "EFI Boot Manager",
            BootLoaderKind::Grub => "Grub",
            BootLoaderKind::SystemdBoot => "Systemd Boot",
            BootLoaderKind::Unknown => "Unknown Boot Loader",
        };
        f.write_str(name)
    }
}

/// Common contract implemented by every backend.
#[async_trait]
pub trait BootLoader: Send + Sync {
    fn kind(&self) -> BootLoaderKind;

    /// Whether this backend can be used on the current system: its
    /// binary or config artifact is present and minimally queryable.
    /// Probing failures of any sort collapse to `false`.
    async fn is_usable(&self) -> bool;

    /// Enumerates the currently configured boot entries.
    ///
    /// Propagates failure instead of returning an empty set, so the
    /// caller can offer remediation (see [`GrubLoader::set_readable`])
    /// rather than silently showing nothing.
    async fn boot_options(&self) -> Result<BootOptionSet>;

    /// Marks `id` as the target of the next boot.
    ///
    /// `true` only when the underlying privileged command exits zero;
    /// a bad id, a denied prompt, and a missing binary all come back as
    /// `false`.
    async fn set_boot_option(&self, id: &str) -> bool;

    /// Static capability flag for the quick-reboot helper script.
    /// Only GRUB supports it; this is not a runtime probe.
    fn can_quick_reboot(&self) -> bool {
        false
    }

    /// Whether the quick-reboot helper is currently installed.
    async fn quick_reboot_enabled(&self) -> bool {
        false
    }

    /// Installs the quick-reboot helper. Idempotent: already installed
    /// counts as success.
    async fn enable_quick_reboot(&self) -> bool {
        false
    }

    /// Removes the quick-reboot helper. Idempotent: already absent
    /// counts as success.
    async fn disable_quick_reboot(&self) -> bool {
        false
    }
}

/// Per-backend enable switches, read by the [`Selector`] but owned and
/// persisted by the caller (the CLI maps them to flags; a settings
/// store would be another owner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootLoaderToggles {
    pub use_efibootmgr: bool,
    pub use_grub: bool,
    pub use_systemd_boot: bool,
}

impl Default for BootLoaderToggles {
    fn default() -> Self {
        Self {
            use_efibootmgr: true,
            use_grub: true,
            use_systemd_boot: true,
        }
    }
}

/// Probes the backends and hands out the winning one.
#[derive(Debug, Clone)]
pub struct Selector {
    ctx: ExecutionContext,
    toggles: BootLoaderToggles,
}

impl Selector {
    /// Creates a selector with all backends enabled.
    pub fn new(ctx: ExecutionContext) -> Self {
        Self::with_toggles(ctx, BootLoaderToggles::default())
    }

    /// Creates a selector honoring the caller's enable toggles.
    pub fn with_toggles(ctx: ExecutionContext, toggles: BootLoaderToggles) -> Self {
        Self { ctx, toggles }
    }

    /// Kind of the first backend, in priority order, that is both
    /// enabled and usable; [`BootLoaderKind::Unknown`] when none is.
    pub async fn usable_kind(&self) -> BootLoaderKind {
        if self.toggles.use_efibootmgr && EfiLoader::new(self.ctx.clone()).is_usable().await {
            return BootLoaderKind::Efi;
        }
        if self.toggles.use_grub && GrubLoader::new(self.ctx.clone()).is_usable().await {
            return BootLoaderKind::Grub;
        }
        if self.toggles.use_systemd_boot
            && SystemdBootLoader::new(self.ctx.clone()).is_usable().await
        {
            return BootLoaderKind::SystemdBoot;
        }
        BootLoaderKind::Unknown
    }

    /// Instantiates the backend for `kind`; `None` for `Unknown`.
    pub fn backend(&self, kind: BootLoaderKind) -> Option<Box<dyn BootLoader>> {
        match kind {
            BootLoaderKind::Efi => Some(Box::new(EfiLoader::new(self.ctx.clone()))),
            BootLoaderKind::Grub => Some(Box::new(GrubLoader::new(self.ctx.clone()))),
            BootLoaderKind::SystemdBoot => {
                Some(Box::new(SystemdBootLoader::new(self.ctx.clone())))
            }
            BootLoaderKind::Unknown => None,
        }
    }

    /// Probes and instantiates in one step.
    pub async fn usable_backend(&self) -> Option<Box<dyn BootLoader>> {
        self.backend(self.usable_kind().await)
    }
}
