//! Site partition resolver
//!
//! Decides whether a navigation has to leave the current surface's
//! partition. Pure: no state besides the process-per-tab policy.

use url::Url;

use super::entry::NavigationEntry;
use crate::config::NavigationConfig;
use crate::process::{Site, SiteInstanceId};

/// What the resolver needs to know about the current surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionView {
    pub partition: SiteInstanceId,
    /// Current surface has internal-UI bindings
    pub privileged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SitePartitionResolver {
    process_per_tab: bool,
}

impl SitePartitionResolver {
    pub fn new(config: &NavigationConfig) -> Self {
        Self {
            process_per_tab: config.process_per_tab,
        }
    }

    pub fn process_per_tab(&self) -> bool {
        self.process_per_tab
    }

    /// Whether the current bindings do not fit the destination
    pub fn privilege_mismatch(&self, current: &PartitionView, dest: &NavigationEntry) -> bool {
        current.privileged != dest.required_privilege_tier().is_privileged()
    }

    /// Whether navigating from `current_url` in `current` to `dest` needs a
    /// different partition
    pub fn requires_swap(
        &self,
        current: &PartitionView,
        current_url: Option<&Url>,
        dest: &NavigationEntry,
    ) -> bool {
        if self.privilege_mismatch(current, dest) {
            return true;
        }
        if self.process_per_tab {
            return false;
        }
        let Some(current_url) = current_url else {
            return false;
        };
        if is_about_blank(dest.url()) {
            return false;
        }
        match (Site::for_url(current_url), Site::for_url(dest.url())) {
            (Some(current_site), Some(dest_site)) => current_site != dest_site,
            _ => true,
        }
    }
}

fn is_about_blank(url: &Url) -> bool {
    url.scheme() == "about" && url.path() == "blank"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::entry::{EntryId, Transition};
    use crate::process::PrivilegeTier;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn entry(s: &str) -> NavigationEntry {
        let config = NavigationConfig::default();
        let u = url(s);
        let tier = PrivilegeTier::for_url(&u, &config);
        NavigationEntry::new(EntryId::new(1), u, Transition::Typed, tier)
    }

    fn view(privileged: bool) -> PartitionView {
        PartitionView {
            partition: SiteInstanceId::new(1),
            privileged,
        }
    }

    fn resolver() -> SitePartitionResolver {
        SitePartitionResolver::new(&NavigationConfig::default())
    }

    #[test]
    fn test_same_site_stays() {
        let current = url("http://www.google.com");
        let target = entry("http://news.google.com/a");
        assert!(!resolver().requires_swap(&view(false), Some(&current), &target));
    }

    #[test]
    fn test_cross_site_swaps() {
        let current = url("http://www.google.com");
        let target = entry("http://www.yahoo.com");
        assert!(resolver().requires_swap(&view(false), Some(&current), &target));
    }

    #[test]
    fn test_scheme_change_swaps() {
        let current = url("http://www.google.com");
        let target = entry("https://www.google.com");
        assert!(resolver().requires_swap(&view(false), Some(&current), &target));
    }

    #[test]
    fn test_unused_surface_stays() {
        assert!(!resolver().requires_swap(&view(false), None, &entry("http://www.yahoo.com")));
    }

    #[test]
    fn test_about_blank_stays() {
        let current = url("http://www.google.com");
        assert!(!resolver().requires_swap(&view(false), Some(&current), &entry("about:blank")));
    }

    #[test]
    fn test_uncomputable_site_swaps() {
        let current = url("http://www.google.com");
        let target = entry("data:text/html,hi");
        assert!(resolver().requires_swap(&view(false), Some(&current), &target));
    }

    #[test]
    fn test_process_per_tab() {
        let config = NavigationConfig::default().with_process_per_tab(true);
        let resolver = SitePartitionResolver::new(&config);
        let current = url("http://www.google.com");
        let target = entry("http://www.yahoo.com");
        assert!(!resolver.requires_swap(&view(false), Some(&current), &target));
    }

    #[test]
    fn test_privilege_mismatch_wins_over_process_per_tab() {
        let config = NavigationConfig::default().with_process_per_tab(true);
        let resolver = SitePartitionResolver::new(&config);
        let current = url("chrome://newtab");

        // Same scheme, but the destination is not internal UI
        let target = entry("chrome://about/memory");
        assert!(resolver.requires_swap(&view(true), Some(&current), &target));
        assert!(resolver.requires_swap(&view(false), None, &entry("chrome://newtab")));
    }
}
