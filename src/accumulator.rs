//! Paginated folder-listing accumulator
//!
//! A folder listing arrives in pages linked by continuation cursors. The
//! [`Accumulator`] merges them into one [`FolderView`] per navigation event:
//!
//! ```text
//!  Idle ──begin(F)──▶ Fetching ──page, no cursor──▶ Done
//!                       │  ▲
//!                       │  └─ page with fresh cursor (request next)
//!                       └──── error ──▶ Errored
//! ```
//!
//! Each `begin` hands out a [`FetchTicket`]. Results are applied with the
//! ticket they were requested under; a ticket from an older navigation event
//! is stale and its result is dropped without touching state. Pages are
//! requested strictly one at a time by [`accumulate`], so arrival order is
//! request order.

use std::collections::HashSet;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::portal::{Access, Entry, ListingPage, ListingRequest, PathSegment, PortalBackend, PortalError};

/// Default maximum number of pages merged into one view
pub const DEFAULT_MAX_PAGES: usize = 1000;
/// Default maximum number of entries merged into one view
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

/// Bounds on a single accumulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulatorLimits {
    pub max_pages: usize,
    pub max_entries: usize,
}

impl Default for AccumulatorLimits {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Merged listing of one folder
#[derive(Debug, Clone, PartialEq)]
pub struct FolderView {
    pub id: String,
    pub name: String,
    /// Every entry of every merged page, in arrival order
    pub entries: Vec<Entry>,
    /// Breadcrumb from root to this folder
    pub path: Vec<PathSegment>,
    pub share_label: Option<String>,
    pub share_logo: Option<String>,
    /// Accumulation stopped at a limit before the listing was exhausted
    pub truncated: bool,
}

impl FolderView {
    /// Build the view for the folder that was requested
    ///
    /// The backend may answer an alias such as `root` with the folder's real
    /// id; the view and its last breadcrumb keep the requested id so they
    /// always match the active folder.
    fn from_first_page(folder_id: &str, page: ListingPage) -> Self {
        let mut path = page.path;
        match path.last_mut() {
            Some(last) if last.id == folder_id => {}
            Some(last) if last.id == page.id => last.id = folder_id.to_string(),
            // The backend sometimes omits the breadcrumb for share roots
            _ => path.push(PathSegment::new(folder_id.to_string(), page.name.clone())),
        }
        Self {
            id: folder_id.to_string(),
            name: page.name,
            entries: page.files,
            path,
            share_label: page.share_label,
            share_logo: page.share_logo,
            truncated: false,
        }
    }

    /// Breadcrumb element of the parent folder, if any
    pub fn parent(&self) -> Option<&PathSegment> {
        match self.path.len() {
            0 | 1 => None,
            n => self.path.get(n - 2),
        }
    }
}

/// Why a load stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The first page failed; nothing to show
    Blocking(PortalError),
    /// A later page failed; merged entries stay visible
    Partial(PortalError),
}

impl LoadError {
    pub fn error(&self) -> &PortalError {
        match self {
            LoadError::Blocking(e) | LoadError::Partial(e) => e,
        }
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, LoadError::Blocking(_))
    }
}

/// Accumulator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Fetching { folder_id: String, pages: usize },
    Done,
    Errored(LoadError),
}

/// Proof that a request belongs to a particular navigation event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    folder_id: String,
    generation: u64,
}

impl FetchTicket {
    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What the driver should do after a result was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Request the next page with this cursor
    Continue(String),
    /// Listing complete (or stopped by cycle guard / limits)
    Done,
    /// Accumulation ended with an error
    Failed(LoadError),
    /// The ticket was superseded; nothing was applied
    Stale,
}

/// Pagination state machine
#[derive(Debug)]
pub struct Accumulator {
    limits: AccumulatorLimits,
    generation: u64,
    active: Option<String>,
    state: LoadState,
    view: Option<FolderView>,
    seen_cursors: HashSet<String>,
    pages: usize,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new(AccumulatorLimits::default())
    }
}

impl Accumulator {
    pub fn new(limits: AccumulatorLimits) -> Self {
        Self {
            limits,
            generation: 0,
            active: None,
            state: LoadState::Idle,
            view: None,
            seen_cursors: HashSet::new(),
            pages: 0,
        }
    }

    /// Start a navigation event for `folder_id`
    ///
    /// Invalidates every ticket handed out before and discards the current view.
    pub fn begin(&mut self, folder_id: &str) -> FetchTicket {
        self.generation += 1;
        self.active = Some(folder_id.to_string());
        self.state = LoadState::Fetching {
            folder_id: folder_id.to_string(),
            pages: 0,
        };
        self.view = None;
        self.seen_cursors.clear();
        self.pages = 0;
        debug!("Accumulation #{} started for {}", self.generation, folder_id);
        FetchTicket {
            folder_id: folder_id.to_string(),
            generation: self.generation,
        }
    }

    /// Whether results for `ticket` may still be merged
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
            && self.active.as_deref() == Some(ticket.folder_id.as_str())
            && matches!(self.state, LoadState::Fetching { .. })
    }

    /// Apply one request's result
    pub fn apply(&mut self, ticket: &FetchTicket, result: Result<ListingPage, PortalError>) -> Step {
        if !self.is_current(ticket) {
            debug!(
                "Dropping stale result for {} (#{}, current #{})",
                ticket.folder_id, ticket.generation, self.generation
            );
            return Step::Stale;
        }

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                let failure = if self.pages == 0 {
                    self.view = None;
                    LoadError::Blocking(e)
                } else {
                    LoadError::Partial(e)
                };
                warn!(
                    "Listing {} failed after {} page(s): {}",
                    ticket.folder_id,
                    self.pages,
                    failure.error()
                );
                self.state = LoadState::Errored(failure.clone());
                return Step::Failed(failure);
            }
        };

        self.pages += 1;
        let cursor = page.continuation().map(str::to_string);
        match self.view.as_mut() {
            Some(view) => view.entries.extend(page.files),
            None => self.view = Some(FolderView::from_first_page(&ticket.folder_id, page)),
        }

        let Some(cursor) = cursor else {
            return self.finish(false);
        };

        if !self.seen_cursors.insert(cursor.clone()) {
            warn!(
                "Listing {} repeated cursor {:?}; stopping accumulation",
                ticket.folder_id, cursor
            );
            return self.finish(false);
        }

        let entries = self.view.as_ref().map_or(0, |v| v.entries.len());
        if self.pages >= self.limits.max_pages || entries >= self.limits.max_entries {
            warn!(
                "Listing {} hit limits ({} pages, {} entries); truncating",
                ticket.folder_id, self.pages, entries
            );
            return self.finish(true);
        }

        self.state = LoadState::Fetching {
            folder_id: ticket.folder_id.clone(),
            pages: self.pages,
        };
        Step::Continue(cursor)
    }

    fn finish(&mut self, truncated: bool) -> Step {
        if let Some(view) = self.view.as_mut() {
            view.truncated = truncated;
        }
        self.state = LoadState::Done;
        Step::Done
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn view(&self) -> Option<&FolderView> {
        self.view.as_ref()
    }

    /// Folder of the latest navigation event
    pub fn active_folder(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    pub fn limits(&self) -> AccumulatorLimits {
        self.limits
    }
}

/// How a driven accumulation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulationOutcome {
    Complete { pages: usize, entries: usize, truncated: bool },
    Failed(LoadError),
    /// A newer navigation event took over
    Superseded,
}

/// Drive `ticket` to completion: one outstanding request at a time
///
/// The lock is only held while applying a result, never across a request.
pub async fn accumulate<B>(
    backend: &B,
    accumulator: &Mutex<Accumulator>,
    ticket: &FetchTicket,
    access: &Access,
) -> AccumulationOutcome
where
    B: PortalBackend + ?Sized,
{
    let mut cursor: Option<String> = None;

    loop {
        let request = ListingRequest {
            folder_id: ticket.folder_id.clone(),
            access: access.clone(),
            page_token: cursor.take(),
        };
        let result = backend.list_folder(&request).await;

        let mut guard = accumulator.lock().await;
        match guard.apply(ticket, result) {
            Step::Continue(next) => cursor = Some(next),
            Step::Done => {
                let (entries, truncated) = guard
                    .view()
                    .map_or((0, false), |v| (v.entries.len(), v.truncated));
                info!(
                    "Listed {}: {} entries in {} page(s)",
                    ticket.folder_id,
                    entries,
                    guard.pages_fetched()
                );
                return AccumulationOutcome::Complete {
                    pages: guard.pages_fetched(),
                    entries,
                    truncated,
                };
            }
            Step::Failed(failure) => return AccumulationOutcome::Failed(failure),
            Step::Stale => return AccumulationOutcome::Superseded,
        }
    }
}
