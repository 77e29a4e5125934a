//! GRUB backend.
//!
//! Parses the static `grub.cfg` for menu entries, sets the one-shot
//! target via `grub-reboot`, and manages the optional quick-reboot
//! helper script in `/etc/grub.d/`. GRUB addresses entries by title,
//! so the title doubles as the id everywhere in this module.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use snafu::{ResultExt, ensure};
use tokio::fs;
use tracing::{debug, warn};

use crate::bootloader::{BootLoader, BootLoaderKind};
use crate::error::{ConfigReadSnafu, Error, ParseSnafu, Result};
use crate::executor::ExecutionContext;
use crate::options::{BootOption, BootOptionSet};

/// Conventional install locations of the main GRUB config, probed in
/// order.
pub const GRUB_CONFIG_PATHS: &[&str] = &["/boot/grub/grub.cfg", "/boot/grub2/grub.cfg"];

/// Drop-in location of the installed quick-reboot helper script.
pub const QUICK_REBOOT_SCRIPT: &str = "/etc/grub.d/42_custom_reboot";

/// Default install location of the bundled helper script template
/// (shipped in `assets/42_custom_reboot`).
pub const QUICK_REBOOT_TEMPLATE: &str = "/usr/share/nextboot/42_custom_reboot";

pub struct GrubLoader {
    ctx: ExecutionContext,
    config_paths: Vec<PathBuf>,
    script_source: PathBuf,
    script_path: PathBuf,
}

impl GrubLoader {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self {
            ctx,
            config_paths: GRUB_CONFIG_PATHS.iter().map(PathBuf::from).collect(),
            script_source: PathBuf::from(QUICK_REBOOT_TEMPLATE),
            script_path: PathBuf::from(QUICK_REBOOT_SCRIPT),
        }
    }

    /// Overrides the config candidate paths (distros occasionally
    /// relocate `grub.cfg`).
    pub fn with_config_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.config_paths = paths;
        self
    }

    /// Overrides where the helper script template is installed.
    pub fn with_script_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.script_source = source.into();
        self
    }

    /// First existing candidate config path.
    fn config_path(&self) -> Option<PathBuf> {
        self.config_paths.iter().find(|p| p.exists()).cloned()
    }

    /// Makes the discovered config world-readable.
    ///
    /// Remediation for installs where `grub.cfg` is root-only and
    /// [`BootLoader::boot_options`] keeps failing with a read error.
    pub async fn set_readable(&self) -> bool {
        let Some(config) = self.config_path() else {
            warn!("no grub config found to make readable");
            return false;
        };
        let config = config.display().to_string();
        match self
            .ctx
            .run_privileged(&["chmod", "644", config.as_str()])
            .await
        {
            Ok(result) if result.success() => {
                debug!(%config, "made grub config world-readable");
                true
            }
            Ok(result) => {
                warn!(%config, status = result.status, "chmod on grub config failed");
                false
            }
            Err(e) => {
                warn!(%config, "unable to run chmod: {e}");
                false
            }
        }
    }

    /// Runs a multi-step shell pipeline under one privileged
    /// invocation. The steps are not atomic: a failed middle step
    /// reports failure and leaves earlier mutations in place; the next
    /// enable/disable converges on the desired state.
    async fn run_shell_pipeline(&self, pipeline: &str) -> bool {
        match self.ctx.run_privileged(&["sh", "-c", pipeline]).await {
            Ok(result) if result.success() => true,
            Ok(result) => {
                warn!(
                    status = result.status,
                    stderr = %result.stderr,
                    "quick-reboot pipeline failed"
                );
                false
            }
            Err(e) => {
                warn!("unable to run quick-reboot pipeline: {e}");
                false
            }
        }
    }
}

#[async_trait]
impl BootLoader for GrubLoader {
    fn kind(&self) -> BootLoaderKind {
        BootLoaderKind::Grub
    }

    async fn is_usable(&self) -> bool {
        self.config_path().is_some()
    }

    async fn boot_options(&self) -> Result<BootOptionSet> {
        let path = self.config_path().ok_or(Error::NotUsable {
            kind: BootLoaderKind::Grub,
        })?;
        let content = fs::read_to_string(&path)
            .await
            .context(ConfigReadSnafu { path: path.clone() })?;
        parse_grub_config(&content)
    }

    async fn set_boot_option(&self, title: &str) -> bool {
        match self.ctx.run_privileged(&["grub-reboot", title]).await {
            Ok(result) if result.success() => {
                debug!(title, "set next boot entry via grub-reboot");
                true
            }
            Ok(result) => {
                warn!(
                    title,
                    status = result.status,
                    "grub-reboot refused to set next boot entry"
                );
                false
            }
            Err(e) => {
                warn!(title, "unable to run grub-reboot: {e}");
                false
            }
        }
    }

    fn can_quick_reboot(&self) -> bool {
        true
    }

    async fn quick_reboot_enabled(&self) -> bool {
        // Re-derived from disk on every probe; never cached.
        self.script_path.exists()
    }

    async fn enable_quick_reboot(&self) -> bool {
        if self.quick_reboot_enabled().await {
            return true;
        }
        let pipeline = format!(
            "cp {src} {dst} && chmod 755 {dst} && update-grub",
            src = self.script_source.display(),
            dst = self.script_path.display(),
        );
        self.run_shell_pipeline(&pipeline).await
    }

    async fn disable_quick_reboot(&self) -> bool {
        if !self.quick_reboot_enabled().await {
            return true;
        }
        let pipeline = format!("rm {} && update-grub", self.script_path.display());
        self.run_shell_pipeline(&pipeline).await
    }
}

/// Parses grub.cfg text into the normalized option set.
///
/// Scans for top-level `menuentry` lines and the `set default="…"`
/// assignment; when no default line is accepted, the first entry in
/// file order is the default.
pub fn parse_grub_config(content: &str) -> Result<BootOptionSet> {
    let mut options = Vec::new();
    let mut default = None;

    for line in content.lines() {
        if let Some(title) = parse_menuentry_line(line) {
            options.push(BootOption::new(title, title));
        } else if let Some(value) = parse_default_line(line) {
            default = Some(value.to_string());
        }
    }

    ensure!(
        !options.is_empty(),
        ParseSnafu {
            message: "no menuentry lines in grub config",
        }
    );
    Ok(BootOptionSet::new(options, default))
}

/// Captures the quoted title of a `menuentry '…'` / `menuentry "…"`
/// line. Anchored at column zero, so entries nested inside `submenu`
/// blocks are skipped like the rest of the file's structure.
fn parse_menuentry_line(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("menuentry ")?;
    let quote = rest.chars().next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let rest = &rest[1..];
    let title = &rest[..rest.find(quote)?];
    (!title.is_empty()).then_some(title)
}

/// Captures the value of a `set default="…"` line. The value is held
/// to a conservative character set; anything else (notably grub's
/// `"${saved_entry}"` indirection) is not a literal title and is
/// ignored.
fn parse_default_line(line: &str) -> Option<&str> {
    let start = line.find("set default=\"")? + "set default=\"".len();
    let rest = &line[start..];
    let value = &rest[..rest.find('"')?];
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '(' | ')' | '/'))
        .then_some(value)
}
