//! Sites, site instances and privilege tiers
//!
//! A *site* is the scheme plus registrable domain of a URL. A site instance
//! is the partition a render surface lives in; once a site has been recorded
//! for an instance it never changes.

use std::fmt;

use url::{Host, Url};

use super::manager::ProcessId;
use crate::config::NavigationConfig;

/// Second-level labels that sit under two-letter country TLDs
const SECOND_LEVEL_LABELS: &[&str] = &["co", "com", "org", "net", "gov", "ac", "edu"];

/// Identifier of a site instance (partition)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiteInstanceId(u32);

impl SiteInstanceId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SiteInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site-instance#{}", self.0)
    }
}

/// Identifier of a browsing instance: a group of related site instances
/// that can script each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BrowsingInstanceId(u32);

impl BrowsingInstanceId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Effective site of a URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Site {
    scheme: String,
    domain: String,
}

impl Site {
    /// Compute the site of a URL, or `None` for URLs without a host
    pub fn for_url(url: &Url) -> Option<Site> {
        if url.cannot_be_a_base() {
            return None;
        }

        let domain = match url.host()? {
            Host::Domain(domain) => registrable_domain(domain)?,
            Host::Ipv4(addr) => addr.to_string(),
            Host::Ipv6(addr) => format!("[{}]", addr),
        };

        Some(Site {
            scheme: url.scheme().to_ascii_lowercase(),
            domain,
        })
    }

    /// Whether two URLs belong to the same site. URLs without a site never
    /// match anything.
    pub fn same_site(a: &Url, b: &Url) -> bool {
        match (Site::for_url(a), Site::for_url(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.domain)
    }
}

fn registrable_domain(host: &str) -> Option<String> {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let n = labels.len();
    if n == 0 {
        return None;
    }
    if n <= 2 {
        return Some(labels.join("."));
    }

    let tld = labels[n - 1];
    let second = labels[n - 2];
    let keep = if tld.len() == 2 && SECOND_LEVEL_LABELS.contains(&second) {
        3
    } else {
        2
    };
    Some(labels[n - keep..].join("."))
}

/// Privilege level a page needs from its render surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrivilegeTier {
    /// Ordinary web content
    #[default]
    Web,
    /// Internal UI pages that need privileged bindings
    InternalUi,
}

impl PrivilegeTier {
    /// Tier required by a URL under the given configuration
    pub fn for_url(url: &Url, config: &NavigationConfig) -> Self {
        if !url.scheme().eq_ignore_ascii_case(&config.internal_ui_scheme) {
            return PrivilegeTier::Web;
        }
        let listed = url.host_str().is_some_and(|host| {
            config
                .internal_ui_hosts
                .iter()
                .any(|h| h.eq_ignore_ascii_case(host))
        });
        if listed {
            PrivilegeTier::InternalUi
        } else {
            PrivilegeTier::Web
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, PrivilegeTier::InternalUi)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrivilegeTier::Web => "web",
            PrivilegeTier::InternalUi => "internal-ui",
        }
    }
}

/// A partition of render surfaces
#[derive(Debug, Clone)]
pub struct SiteInstance {
    pub id: SiteInstanceId,
    pub browsing_instance: BrowsingInstanceId,
    site_url: Option<Url>,
    pub process: Option<ProcessId>,
    /// Surfaces and committed history entries holding this instance
    pub refs: usize,
}

impl SiteInstance {
    pub fn new(id: SiteInstanceId, browsing_instance: BrowsingInstanceId) -> Self {
        Self {
            id,
            browsing_instance,
            site_url: None,
            process: None,
            refs: 0,
        }
    }

    /// Whether a site has been recorded
    pub fn has_site(&self) -> bool {
        self.site_url.is_some()
    }

    /// URL the site was recorded from
    pub fn site_url(&self) -> Option<&Url> {
        self.site_url.as_ref()
    }

    /// Effective site, if recorded and computable
    pub fn site(&self) -> Option<Site> {
        self.site_url.as_ref().and_then(Site::for_url)
    }

    /// Record the site. Only the first call has any effect.
    pub fn set_site(&mut self, url: &Url) -> bool {
        if self.site_url.is_some() {
            return false;
        }
        self.site_url = Some(url.clone());
        true
    }
}
