//! Session history entries

use std::fmt;

use url::Url;

use crate::process::{PrivilegeTier, SiteInstanceId};

/// Unique id of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}

/// How a navigation was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Link,
    Typed,
    AutoBookmark,
    AutoSubframe,
    ManualSubframe,
    Generated,
    Reload,
    ClientRedirect,
    ForwardBack,
}

impl Transition {
    /// Sub-frame transitions never create history entries
    pub fn is_main_frame(&self) -> bool {
        !matches!(self, Transition::AutoSubframe | Transition::ManualSubframe)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Link => "link",
            Transition::Typed => "typed",
            Transition::AutoBookmark => "auto_bookmark",
            Transition::AutoSubframe => "auto_subframe",
            Transition::ManualSubframe => "manual_subframe",
            Transition::Generated => "generated",
            Transition::Reload => "reload",
            Transition::ClientRedirect => "client_redirect",
            Transition::ForwardBack => "forward_back",
        }
    }
}

/// Kind of page an entry shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageType {
    #[default]
    Normal,
    Interstitial,
}

/// One session history entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEntry {
    id: EntryId,
    url: Url,
    title: String,
    transition: Transition,
    page_type: PageType,
    page_id: Option<i32>,
    privilege_tier: PrivilegeTier,
    assigned_partition: Option<SiteInstanceId>,
}

impl NavigationEntry {
    pub fn new(
        id: EntryId,
        url: Url,
        transition: Transition,
        privilege_tier: PrivilegeTier,
    ) -> Self {
        Self {
            id,
            url,
            title: String::new(),
            transition,
            page_type: PageType::Normal,
            page_id: None,
            privilege_tier,
            assigned_partition: None,
        }
    }

    /// Mark the entry as an interstitial page
    pub fn with_page_type(mut self, page_type: PageType) -> Self {
        self.page_type = page_type;
        self
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    pub fn set_transition(&mut self, transition: Transition) {
        self.transition = transition;
    }

    pub fn page_type(&self) -> PageType {
        self.page_type
    }

    pub fn page_id(&self) -> Option<i32> {
        self.page_id
    }

    pub fn set_page_id(&mut self, page_id: Option<i32>) {
        self.page_id = page_id;
    }

    pub fn required_privilege_tier(&self) -> PrivilegeTier {
        self.privilege_tier
    }

    pub fn set_required_privilege_tier(&mut self, tier: PrivilegeTier) {
        self.privilege_tier = tier;
    }

    /// Partition the entry was first committed in
    pub fn assigned_partition(&self) -> Option<SiteInstanceId> {
        self.assigned_partition
    }

    /// Record the partition. Write-once: later calls are ignored.
    pub fn assign_partition(&mut self, partition: SiteInstanceId) -> bool {
        if self.assigned_partition.is_some() {
            return false;
        }
        self.assigned_partition = Some(partition);
        true
    }
}
