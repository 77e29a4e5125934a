//! systemd-boot backend, driven by `bootctl`.
//!
//! `bootctl list` only reports the entries the current boot saw; newly
//! added loader entries show up after the next reboot. Queries are
//! therefore never cached.

use std::path::PathBuf;

use async_trait::async_trait;
use snafu::ensure;
use tracing::{debug, warn};

use crate::bootloader::{BootLoader, BootLoaderKind};
use crate::error::{Error, ParseSnafu, Result};
use crate::executor::ExecutionContext;
use crate::options::{BootOption, BootOptionSet};

/// Conventional install locations of the bootctl binary, probed in
/// order.
pub const BOOTCTL_PATHS: &[&str] = &["/usr/sbin/bootctl", "/usr/bin/bootctl"];

/// Marker bootctl appends to the default entry's title.
const DEFAULT_MARKER: &str = "(default)";

pub struct SystemdBootLoader {
    ctx: ExecutionContext,
    bootctl_paths: Vec<PathBuf>,
}

impl SystemdBootLoader {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self {
            ctx,
            bootctl_paths: BOOTCTL_PATHS.iter().map(PathBuf::from).collect(),
        }
    }

    /// First existing candidate bootctl path.
    fn bootctl_path(&self) -> Option<PathBuf> {
        self.bootctl_paths.iter().find(|p| p.exists()).cloned()
    }
}

#[async_trait]
impl BootLoader for SystemdBootLoader {
    fn kind(&self) -> BootLoaderKind {
        BootLoaderKind::SystemdBoot
    }

    async fn is_usable(&self) -> bool {
        self.bootctl_path().is_some()
    }

    async fn boot_options(&self) -> Result<BootOptionSet> {
        let bootctl = self
            .bootctl_path()
            .ok_or(Error::NotUsable {
                kind: BootLoaderKind::SystemdBoot,
            })?
            .display()
            .to_string();
        let result = self
            .ctx
            .run(&[bootctl.as_str(), "list"])
            .await?
            .require_success(&bootctl)?;
        parse_bootctl_list(&result.stdout)
    }

    async fn set_boot_option(&self, id: &str) -> bool {
        let Some(bootctl) = self.bootctl_path() else {
            warn!(id, "bootctl binary not found");
            return false;
        };
        let bootctl = bootctl.display().to_string();
        match self
            .ctx
            .run_privileged(&[bootctl.as_str(), "set-oneshot", id])
            .await
        {
            Ok(result) if result.success() => {
                debug!(id, "set one-shot boot entry via bootctl");
                true
            }
            Ok(result) => {
                warn!(
                    id,
                    status = result.status,
                    "bootctl refused to set one-shot entry"
                );
                false
            }
            Err(e) => {
                warn!(id, "unable to run bootctl: {e}");
                false
            }
        }
    }
}

/// Parses `bootctl list` output into the normalized option set.
///
/// Entries are emitted as strictly paired `title:` / `id:` lines in
/// matching order; a count mismatch means the output cannot be paired
/// up and is rejected outright rather than misaligned. The entry whose
/// title carries the `(default)` marker resolves the default id.
pub fn parse_bootctl_list(stdout: &str) -> Result<BootOptionSet> {
    let mut titles: Vec<&str> = Vec::new();
    let mut ids: Vec<&str> = Vec::new();

    for line in stdout.lines() {
        let line = line.trim_start();
        if let Some(value) = line.strip_prefix("title:") {
            titles.push(value.trim());
        } else if let Some(value) = line.strip_prefix("id:") {
            ids.push(value.trim());
        }
    }

    ensure!(
        titles.len() == ids.len(),
        ParseSnafu {
            message: format!(
                "bootctl list emitted {} titles but {} ids",
                titles.len(),
                ids.len()
            ),
        }
    );
    ensure!(
        !titles.is_empty(),
        ParseSnafu {
            message: "no entries in bootctl list output",
        }
    );

    let mut options = Vec::with_capacity(titles.len());
    let mut default = None;
    for (title, id) in titles.iter().zip(&ids) {
        if title.contains(DEFAULT_MARKER) {
            default = Some((*id).to_string());
        }
        options.push(BootOption::new(*title, *id));
    }
    Ok(BootOptionSet::new(options, default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PrivilegeEscalation;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    const SAMPLE_LIST: &str = "\
Boot Loader Entries:
        title: Arch Linux
           id: arch.conf
       source: /boot/loader/entries/arch.conf
        linux: /vmlinuz-linux

        title: Windows Boot Manager (default)
           id: auto-windows
       source: /sys/firmware/efi/efivars/LoaderEntries-...

        title: Reboot Into Firmware Interface
           id: auto-reboot-to-firmware-setup
";

    fn loader_in(dir: &Path) -> SystemdBootLoader {
        SystemdBootLoader {
            ctx: ExecutionContext::new(),
            bootctl_paths: vec![dir.join("sbin-bootctl"), dir.join("bin-bootctl")],
        }
    }

    #[test]
    fn test_parse_pairs_titles_with_ids_in_order() {
        let set = parse_bootctl_list(SAMPLE_LIST).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.options()[0], BootOption::new("Arch Linux", "arch.conf"));
        assert_eq!(
            set.options()[1],
            BootOption::new("Windows Boot Manager (default)", "auto-windows")
        );
        assert_eq!(
            set.options()[2].id,
            "auto-reboot-to-firmware-setup"
        );
    }

    #[test]
    fn test_default_marker_resolves_default_id() {
        let set = parse_bootctl_list(SAMPLE_LIST).unwrap();
        assert_eq!(set.resolved_default(), Some("auto-windows"));
    }

    #[test]
    fn test_no_marker_falls_back_to_first_entry() {
        let output = "title: Arch Linux\nid: arch.conf\ntitle: Windows\nid: auto-windows\n";
        let set = parse_bootctl_list(output).unwrap();
        assert_eq!(set.resolved_default(), Some("arch.conf"));
    }

    #[test]
    fn test_mismatched_counts_are_rejected() {
        let output = "title: Arch Linux\nid: arch.conf\ntitle: Windows\n";
        assert!(matches!(
            parse_bootctl_list(output),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_no_entries_is_a_parse_error() {
        assert!(parse_bootctl_list("").is_err());
        assert!(parse_bootctl_list("Boot Loader Entries:\n").is_err());
    }

    #[tokio::test]
    async fn test_binary_discovery_honors_candidate_order() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_in(dir.path());
        assert!(!loader.is_usable().await);

        std::fs::write(dir.path().join("bin-bootctl"), "").unwrap();
        assert_eq!(
            loader.bootctl_path().unwrap(),
            dir.path().join("bin-bootctl")
        );

        std::fs::write(dir.path().join("sbin-bootctl"), "").unwrap();
        assert_eq!(
            loader.bootctl_path().unwrap(),
            dir.path().join("sbin-bootctl")
        );
        assert!(loader.is_usable().await);
    }

    /// Writes an executable stand-in for bootctl that exits with
    /// `status` no matter how it is invoked.
    fn write_fake_bootctl(path: &Path, status: i32) {
        std::fs::write(path, format!("#!/bin/sh\nexit {status}\n")).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn test_set_boot_option_nonzero_exit_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = loader_in(dir.path());
        loader.ctx = ExecutionContext::with_escalation(PrivilegeEscalation::None);
        write_fake_bootctl(&dir.path().join("sbin-bootctl"), 1);

        assert!(!loader.set_boot_option("arch.conf").await);
    }

    #[tokio::test]
    async fn test_set_boot_option_zero_exit_is_true() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = loader_in(dir.path());
        loader.ctx = ExecutionContext::with_escalation(PrivilegeEscalation::None);
        write_fake_bootctl(&dir.path().join("sbin-bootctl"), 0);

        assert!(loader.set_boot_option("arch.conf").await);
    }

    #[tokio::test]
    async fn test_boot_options_without_binary_is_not_usable() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_in(dir.path());
        assert!(matches!(
            loader.boot_options().await,
            Err(Error::NotUsable { .. })
        ));
        assert!(!loader.set_boot_option("arch.conf").await);
    }
}
