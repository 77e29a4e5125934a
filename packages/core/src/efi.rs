//! UEFI boot manager backend, driven by `efibootmgr`.
//!
//! `efibootmgr` enumerates the firmware's `Boot####` variables as plain
//! text; this module scrapes that output into the normalized option
//! model and writes the one-shot `BootNext` variable through a
//! privileged `-n` invocation.

use async_trait::async_trait;
use snafu::ensure;
use tracing::{debug, warn};

use crate::bootloader::{BootLoader, BootLoaderKind};
use crate::error::{ParseSnafu, Result};
use crate::executor::ExecutionContext;
use crate::options::{BootOption, BootOptionSet};

/// Location of the efibootmgr binary.
pub const EFIBOOTMGR_PATH: &str = "/usr/bin/efibootmgr";

/// Device-path decoration markers efibootmgr appends after an entry's
/// description. Everything from the first marker onward is stripped
/// from the title.
const DEVICE_PATH_MARKERS: &[&str] = &["HD(", "CDROM(", "PciRoot(", "VenHw(", "BBS("];

pub struct EfiLoader {
    ctx: ExecutionContext,
}

impl EfiLoader {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl BootLoader for EfiLoader {
    fn kind(&self) -> BootLoaderKind {
        BootLoaderKind::Efi
    }

    async fn is_usable(&self) -> bool {
        // A bare invocation exits non-zero on non-UEFI systems and
        // fails to spawn where the tool is not installed; both mean
        // "not usable" here.
        match self.ctx.run(&[EFIBOOTMGR_PATH]).await {
            Ok(result) => result.success(),
            Err(e) => {
                debug!("efibootmgr probe failed: {e}");
                false
            }
        }
    }

    async fn boot_options(&self) -> Result<BootOptionSet> {
        let result = self
            .ctx
            .run(&[EFIBOOTMGR_PATH])
            .await?
            .require_success(EFIBOOTMGR_PATH)?;
        parse_efibootmgr_list(&result.stdout)
    }

    async fn set_boot_option(&self, id: &str) -> bool {
        match self.ctx.run_privileged(&[EFIBOOTMGR_PATH, "-n", id]).await {
            Ok(result) if result.success() => {
                debug!(id, "set next boot entry via efibootmgr");
                true
            }
            Ok(result) => {
                warn!(
                    id,
                    status = result.status,
                    "efibootmgr refused to set next boot entry"
                );
                false
            }
            Err(e) => {
                warn!(id, "unable to run efibootmgr: {e}");
                false
            }
        }
    }
}

/// Parses `efibootmgr` output into the normalized option set.
///
/// The `BootOrder:` line supplies the priority-ordered entry numbers;
/// its first token is the default id. Each `Boot####` line (optionally
/// starred when active) contributes one entry.
pub fn parse_efibootmgr_list(stdout: &str) -> Result<BootOptionSet> {
    let mut options = Vec::new();
    let mut default = None;

    for line in stdout.lines() {
        if let Some(order) = line.strip_prefix("BootOrder:") {
            default = order
                .split(',')
                .next()
                .map(|number| number.trim().to_string());
            continue;
        }
        if let Some((number, title)) = parse_entry_line(line) {
            options.push(BootOption::new(title, number));
        }
    }

    ensure!(
        !options.is_empty(),
        ParseSnafu {
            message: "no Boot#### entries in efibootmgr output",
        }
    );
    Ok(BootOptionSet::new(options, default))
}

/// Extracts `(number, title)` from one `Boot####* Title ...` line.
///
/// Lines whose four characters after `Boot` are not hex digits
/// (`BootCurrent:`, `BootNext:`, ...) are not entries.
fn parse_entry_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("Boot")?;
    let number = rest.get(..4)?;
    if !number.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let title = rest[4..].trim_start_matches('*').trim();
    Some((number, strip_device_path(title)))
}

/// Drops the device-path decoration trailing the human-meaningful
/// title. The description and the device path are tab-separated in
/// current efibootmgr builds; older ones run them together.
fn strip_device_path(title: &str) -> &str {
    let head = title.split('\t').next().unwrap_or(title);
    let mut end = head.len();
    for marker in DEVICE_PATH_MARKERS {
        if let Some(pos) = head.find(marker) {
            end = end.min(pos);
        }
    }
    head[..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_OUTPUT: &str = "BootOrder: 0001,0000\nBoot0000* Windows\nBoot0001* Linux\n";

    const FULL_OUTPUT: &str = "\
BootCurrent: 0001
Timeout: 1 seconds
BootOrder: 0001,0000,0002
Boot0000* Windows Boot Manager\tHD(1,GPT,9a3fa4e7-0001,0x800,0x32000)/File(\\EFI\\Microsoft\\Boot\\bootmgfw.efi)
Boot0001* Fedora\tHD(1,GPT,9a3fa4e7-0001,0x800,0x32000)/File(\\EFI\\fedora\\shimx64.efi)
Boot0002* UEFI: USB Flash Drive BBS(HD,,0x0)
Boot0003  Recovery
";

    #[test]
    fn test_parse_simple_listing() {
        let set = parse_efibootmgr_list(SIMPLE_OUTPUT).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.options()[0], BootOption::new("Windows", "0000"));
        assert_eq!(set.options()[1], BootOption::new("Linux", "0001"));
        assert_eq!(set.resolved_default(), Some("0001"));
    }

    #[test]
    fn test_parse_strips_device_path_decorations() {
        let set = parse_efibootmgr_list(FULL_OUTPUT).unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(set.options()[0].title, "Windows Boot Manager");
        assert_eq!(set.options()[1].title, "Fedora");
        assert_eq!(set.options()[2].title, "UEFI: USB Flash Drive");
        assert_eq!(set.resolved_default(), Some("0001"));
    }

    #[test]
    fn test_parse_accepts_unstarred_entries() {
        let set = parse_efibootmgr_list(FULL_OUTPUT).unwrap();
        assert_eq!(set.options()[3], BootOption::new("Recovery", "0003"));
    }

    #[test]
    fn test_status_lines_are_not_entries() {
        let set = parse_efibootmgr_list(FULL_OUTPUT).unwrap();
        assert!(set.options().iter().all(|o| o.id.len() == 4));
        assert!(set.get("Curr").is_none());
    }

    #[test]
    fn test_missing_boot_order_falls_back_to_first_entry() {
        let set = parse_efibootmgr_list("Boot0000* Windows\nBoot0001* Linux\n").unwrap();
        assert_eq!(set.resolved_default(), Some("0000"));
    }

    #[test]
    fn test_no_entries_is_a_parse_error() {
        assert!(parse_efibootmgr_list("BootOrder: 0001,0000\n").is_err());
        assert!(parse_efibootmgr_list("").is_err());
    }
}
