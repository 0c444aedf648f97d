//! Session history of a tab
//!
//! Holds committed entries, at most one pending entry and at most one
//! transient (interstitial) entry. Indices handed out by `entry_at`,
//! `entry_count` and `go_to_index` include the transient entry, which sits
//! right after the last committed entry.

use std::sync::Arc;

use log::{debug, warn};
use url::Url;

use super::entry::{EntryId, NavigationEntry, PageType, Transition};
use crate::config::NavigationConfig;
use crate::process::{PrivilegeTier, SiteInstanceId};
use crate::utils::error::{NavError, Result};

/// What a surface reported when it committed a load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitParams {
    pub url: Url,
    pub page_id: Option<i32>,
    pub transition: Transition,
}

impl CommitParams {
    pub fn new(url: Url, page_id: Option<i32>, transition: Transition) -> Self {
        Self {
            url,
            page_id,
            transition,
        }
    }

    /// Main-frame link commit
    pub fn main_frame(url: Url, page_id: i32) -> Self {
        Self::new(url, Some(page_id), Transition::Link)
    }

    /// Sub-frame commit
    pub fn subframe(url: Url) -> Self {
        Self::new(url, None, Transition::AutoSubframe)
    }
}

/// How a commit changed the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    /// A new entry was appended
    NewPage,
    /// An existing entry became the last committed one
    ExistingPage,
    /// Sub-frame load inside the last committed entry
    Subframe,
    /// Nothing to attach the commit to
    Ignored,
}

/// Result of [`NavigationController::commit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitDetails {
    pub kind: CommitKind,
    pub entry: Option<EntryId>,
    /// Entries dropped from the front of the history
    pub pruned: usize,
}

#[derive(Debug, Clone)]
enum PendingEntry {
    New(NavigationEntry),
    History(usize),
}

/// Session history controller
#[derive(Debug)]
pub struct NavigationController {
    config: Arc<NavigationConfig>,
    entries: Vec<NavigationEntry>,
    last_committed: Option<usize>,
    pending: Option<PendingEntry>,
    transient: Option<NavigationEntry>,
    next_entry_id: u64,
}

impl NavigationController {
    pub fn new(config: Arc<NavigationConfig>) -> Self {
        Self {
            config,
            entries: Vec::new(),
            last_committed: None,
            pending: None,
            transient: None,
            next_entry_id: 1,
        }
    }

    /// Start a navigation to a new URL. Any transient or pending entry is
    /// discarded first.
    pub fn load_url(&mut self, url: Url, transition: Transition) -> Result<EntryId> {
        let length = url.as_str().len();
        if length > self.config.max_url_chars {
            warn!("Refusing to load URL of {} characters", length);
            return Err(NavError::UrlTooLong {
                length,
                limit: self.config.max_url_chars,
            });
        }

        self.discard_non_committed_entries();
        let tier = PrivilegeTier::for_url(&url, &self.config);
        let entry = NavigationEntry::new(self.allocate_id(), url, transition, tier);
        let id = entry.id();
        debug!("Pending {} -> {}", id, entry.url());
        self.pending = Some(PendingEntry::New(entry));
        Ok(id)
    }

    /// Make the entry at `index` pending. Returns `None` when `index` is the
    /// transient entry, which is already showing.
    pub fn go_to_index(&mut self, index: usize) -> Result<Option<EntryId>> {
        if index >= self.entry_count() {
            return Err(NavError::NoSuchEntry(index as isize));
        }

        let mut target = index;
        if let Some(transient) = self.transient_index() {
            if index == transient {
                return Ok(None);
            }
            if index > transient {
                target -= 1;
            }
        }

        self.discard_non_committed_entries();
        self.pending = Some(PendingEntry::History(target));
        Ok(Some(self.entries[target].id()))
    }

    /// Navigate one entry back. With a transient entry showing this only
    /// removes it and reloads the last committed entry.
    pub fn go_back(&mut self) -> Result<Option<EntryId>> {
        match self.current_index() {
            Some(current) if current > 0 => self.go_to_index(current - 1),
            _ => Err(NavError::NoSuchEntry(-1)),
        }
    }

    /// Navigate one entry forward
    pub fn go_forward(&mut self) -> Result<Option<EntryId>> {
        match self.current_index() {
            Some(current) if current + 1 < self.entry_count() => self.go_to_index(current + 1),
            _ => Err(NavError::NoSuchEntry(1)),
        }
    }

    /// Make the last committed entry pending again
    pub fn reload(&mut self) -> Result<EntryId> {
        let index = self.last_committed.ok_or(NavError::NoSuchEntry(0))?;
        self.discard_non_committed_entries();
        self.pending = Some(PendingEntry::History(index));
        Ok(self.entries[index].id())
    }

    pub fn can_go_back(&self) -> bool {
        self.entry_count() > 1 && self.current_index().is_some_and(|i| i > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        self.current_index()
            .is_some_and(|i| i + 1 < self.entry_count())
    }

    /// Insert a transient entry after the last committed one, replacing any
    /// previous transient entry
    pub fn add_transient_entry(&mut self, url: Url) -> EntryId {
        let entry =
            NavigationEntry::new(self.allocate_id(), url, Transition::Link, PrivilegeTier::Web)
                .with_page_type(PageType::Interstitial);
        let id = entry.id();
        self.transient = Some(entry);
        id
    }

    pub fn transient_entry(&self) -> Option<&NavigationEntry> {
        self.transient.as_ref()
    }

    /// Position of the transient entry, if any
    pub fn transient_index(&self) -> Option<usize> {
        self.transient
            .as_ref()
            .map(|_| self.last_committed.map_or(0, |i| i + 1))
    }

    pub fn discard_transient_entry(&mut self) -> bool {
        self.transient.take().is_some()
    }

    /// Drop the pending and transient entries
    pub fn discard_non_committed_entries(&mut self) {
        self.pending = None;
        self.transient = None;
    }

    pub fn pending_entry(&self) -> Option<&NavigationEntry> {
        match self.pending.as_ref()? {
            PendingEntry::New(entry) => Some(entry),
            PendingEntry::History(index) => self.entries.get(*index),
        }
    }

    /// Index of the pending entry when it is a history navigation
    pub fn pending_entry_index(&self) -> Option<usize> {
        match self.pending {
            Some(PendingEntry::History(index)) => Some(index),
            _ => None,
        }
    }

    pub fn last_committed_entry(&self) -> Option<&NavigationEntry> {
        self.last_committed.and_then(|i| self.entries.get(i))
    }

    pub fn last_committed_entry_mut(&mut self) -> Option<&mut NavigationEntry> {
        self.last_committed.and_then(|i| self.entries.get_mut(i))
    }

    pub fn last_committed_index(&self) -> Option<usize> {
        self.last_committed
    }

    /// Transient, then pending, then last committed entry
    pub fn active_entry(&self) -> Option<&NavigationEntry> {
        self.transient
            .as_ref()
            .or_else(|| self.pending_entry())
            .or_else(|| self.last_committed_entry())
    }

    pub fn active_entry_mut(&mut self) -> Option<&mut NavigationEntry> {
        if let Some(transient) = self.transient.as_mut() {
            return Some(transient);
        }
        match self.pending.as_mut() {
            Some(PendingEntry::New(entry)) => Some(entry),
            Some(PendingEntry::History(index)) => self.entries.get_mut(*index),
            None => self.last_committed.and_then(|i| self.entries.get_mut(i)),
        }
    }

    /// Entry shown in the location bar. Pending history navigations are not
    /// visible until they commit.
    pub fn visible_entry(&self) -> Option<&NavigationEntry> {
        if let Some(transient) = self.transient.as_ref() {
            return Some(transient);
        }
        match self.pending.as_ref() {
            Some(PendingEntry::New(entry)) => Some(entry),
            _ => self.last_committed_entry(),
        }
    }

    /// Entry at `index`, counting the transient entry
    pub fn entry_at(&self, index: usize) -> Option<&NavigationEntry> {
        match self.transient_index() {
            Some(t) if index == t => self.transient.as_ref(),
            Some(t) if index > t => self.entries.get(index - 1),
            _ => self.entries.get(index),
        }
    }

    /// Number of entries, counting the transient entry
    pub fn entry_count(&self) -> usize {
        self.entries.len() + usize::from(self.transient.is_some())
    }

    /// Committed entries
    pub fn entries(&self) -> impl Iterator<Item = &NavigationEntry> {
        self.entries.iter()
    }

    /// Partitions referenced by committed entries
    pub fn referenced_partitions(&self) -> impl Iterator<Item = SiteInstanceId> + '_ {
        self.entries.iter().filter_map(|e| e.assigned_partition())
    }

    /// Record a commit reported by the surface in `partition`
    pub fn commit(&mut self, params: &CommitParams, partition: SiteInstanceId) -> CommitDetails {
        if !params.transition.is_main_frame() {
            let entry = self.last_committed_entry().map(|e| e.id());
            let kind = if entry.is_some() {
                CommitKind::Subframe
            } else {
                CommitKind::Ignored
            };
            return CommitDetails {
                kind,
                entry,
                pruned: 0,
            };
        }

        self.transient = None;
        let pending = self.pending.take();

        if let Some(index) = self.find_existing(params, partition, pending.as_ref()) {
            let entry = &mut self.entries[index];
            entry.assign_partition(partition);
            if entry.page_id().is_none() {
                entry.set_page_id(params.page_id);
            }
            self.last_committed = Some(index);
            debug!("Committed existing {} at index {}", entry.id(), index);
            return CommitDetails {
                kind: CommitKind::ExistingPage,
                entry: Some(entry.id()),
                pruned: 0,
            };
        }

        let mut entry = match pending {
            Some(PendingEntry::New(entry)) if entry.url() == &params.url => entry,
            _ => {
                let tier = PrivilegeTier::for_url(&params.url, &self.config);
                NavigationEntry::new(
                    self.allocate_id(),
                    params.url.clone(),
                    params.transition,
                    tier,
                )
            }
        };
        entry.set_page_id(params.page_id);
        entry.assign_partition(partition);
        let id = entry.id();

        match self.last_committed {
            Some(index) => self.entries.truncate(index + 1),
            None => self.entries.clear(),
        }
        self.entries.push(entry);

        let max = self.config.max_history_entries.max(1);
        let pruned = self.entries.len().saturating_sub(max);
        if pruned > 0 {
            debug!("Pruning {} history entries", pruned);
            self.entries.drain(..pruned);
        }
        self.last_committed = Some(self.entries.len() - 1);

        CommitDetails {
            kind: CommitKind::NewPage,
            entry: Some(id),
            pruned,
        }
    }

    fn find_existing(
        &self,
        params: &CommitParams,
        partition: SiteInstanceId,
        pending: Option<&PendingEntry>,
    ) -> Option<usize> {
        let by_page_id = params.page_id.and_then(|page_id| {
            self.entries.iter().position(|e| {
                e.page_id() == Some(page_id) && e.assigned_partition() == Some(partition)
            })
        });
        by_page_id.or_else(|| match pending {
            Some(PendingEntry::History(index))
                if self.entries.get(*index).is_some_and(|e| e.url() == &params.url) =>
            {
                Some(*index)
            }
            _ => None,
        })
    }

    /// Index the user is at: transient, then pending history, then last
    /// committed
    fn current_index(&self) -> Option<usize> {
        self.transient_index()
            .or(self.pending_entry_index())
            .or(self.last_committed)
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = EntryId::new(self.next_entry_id);
        self.next_entry_id += 1;
        id
    }
}
