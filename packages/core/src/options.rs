//! Normalized boot option model shared by all backends.

use serde::Serialize;

/// One selectable boot target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootOption {
    /// Human-readable menu title; not guaranteed unique, and possibly
    /// decorated by the backend (e.g. a `(default)` marker).
    pub title: String,
    /// Opaque backend-specific identifier used to set the next boot
    /// target: a 4-hex-digit entry number for the UEFI boot manager,
    /// the title itself for GRUB, a loader entry id for systemd-boot.
    pub id: String,
}

impl BootOption {
    pub fn new(title: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            id: id.into(),
        }
    }
}

/// The option list a backend enumerated, plus the default it resolved.
///
/// Built fresh on every query and never cached: boot configuration can
/// change between calls, and for systemd-boot the list reflects the
/// current boot's snapshot only. Ordering is the backend's natural
/// enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootOptionSet {
    options: Vec<BootOption>,
    default: Option<String>,
}

impl BootOptionSet {
    /// Creates a set from the entries in enumeration order and the
    /// default id the backend reported, if any.
    pub fn new(options: Vec<BootOption>, default: Option<String>) -> Self {
        Self { options, default }
    }

    /// The entries in enumeration order.
    pub fn options(&self) -> &[BootOption] {
        &self.options
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Looks an entry up by id.
    pub fn get(&self, id: &str) -> Option<&BootOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// The default entry's id: the backend-reported default when it
    /// still matches an enumerated entry, otherwise the first entry in
    /// enumeration order. `None` only for an empty set.
    pub fn resolved_default(&self) -> Option<&str> {
        if let Some(id) = &self.default
            && self.options.iter().any(|o| o.id == *id)
        {
            return Some(id);
        }
        self.options.first().map(|o| o.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<BootOption> {
        vec![
            BootOption::new("Windows", "0000"),
            BootOption::new("Linux", "0001"),
        ]
    }

    #[test]
    fn test_resolved_default_prefers_reported_id() {
        let set = BootOptionSet::new(sample(), Some("0001".into()));
        assert_eq!(set.resolved_default(), Some("0001"));
    }

    #[test]
    fn test_resolved_default_falls_back_to_first_entry() {
        let set = BootOptionSet::new(sample(), None);
        assert_eq!(set.resolved_default(), Some("0000"));
    }

    #[test]
    fn test_dangling_default_falls_back_to_first_entry() {
        let set = BootOptionSet::new(sample(), Some("9999".into()));
        assert_eq!(set.resolved_default(), Some("0000"));
    }

    #[test]
    fn test_empty_set_has_no_default() {
        let set = BootOptionSet::default();
        assert!(set.is_empty());
        assert_eq!(set.resolved_default(), None);
    }

    #[test]
    fn test_lookup_by_id() {
        let set = BootOptionSet::new(sample(), None);
        assert_eq!(set.get("0001").map(|o| o.title.as_str()), Some("Linux"));
        assert!(set.get("0002").is_none());
        assert_eq!(set.len(), 2);
    }
}
