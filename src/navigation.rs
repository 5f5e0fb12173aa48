//! Folder navigation
//!
//! `NavigationState` tracks which folder is active. `FolderBrowser` couples it
//! with the [`Accumulator`]: every change of the active folder synchronously
//! starts a new accumulation, which invalidates whatever was still in flight
//! for the previous folder.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::accumulator::{
    accumulate, AccumulationOutcome, Accumulator, AccumulatorLimits, FetchTicket, FolderView,
    LoadError, LoadState,
};
use crate::notifications::SharedNotifications;
use crate::portal::{Access, PortalBackend};

/// Active folder, seeded to the configured root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    root: String,
    active: String,
}

impl NavigationState {
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            active: root.clone(),
            root,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    fn set_active(&mut self, folder_id: &str) {
        if self.active != folder_id {
            debug!("Navigation: {} -> {}", self.active, folder_id);
        }
        self.active = folder_id.to_string();
    }
}

/// Point-in-time copy of what a view would render
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserSnapshot {
    pub active_folder: String,
    pub state: LoadState,
    pub view: Option<FolderView>,
}

/// Folder browser bound to one kind of access (admin token or share link)
pub struct FolderBrowser<B: PortalBackend + ?Sized> {
    backend: Arc<B>,
    access: Access,
    navigation: Mutex<NavigationState>,
    accumulator: Mutex<Accumulator>,
    notifications: Option<SharedNotifications>,
}

impl<B: PortalBackend + ?Sized> FolderBrowser<B> {
    pub fn new(backend: Arc<B>, access: Access, root: impl Into<String>, limits: AccumulatorLimits) -> Self {
        Self {
            backend,
            access,
            navigation: Mutex::new(NavigationState::new(root)),
            accumulator: Mutex::new(Accumulator::new(limits)),
            notifications: None,
        }
    }

    /// Report non-blocking load problems as toasts
    pub fn with_notifications(mut self, center: SharedNotifications) -> Self {
        self.notifications = Some(center);
        self
    }

    pub fn access(&self) -> &Access {
        &self.access
    }

    /// Make `folder_id` active and start a fresh accumulation for it
    pub async fn navigate_to(&self, folder_id: &str) -> FetchTicket {
        let mut navigation = self.navigation.lock().await;
        let mut accumulator = self.accumulator.lock().await;
        navigation.set_active(folder_id);
        accumulator.begin(folder_id)
    }

    /// Move to the parent of the current folder
    ///
    /// No-op (returns `None`) at the root of the breadcrumb or while no view
    /// is available.
    pub async fn navigate_up(&self) -> Option<FetchTicket> {
        let mut navigation = self.navigation.lock().await;
        let mut accumulator = self.accumulator.lock().await;
        let parent = accumulator.view()?.parent()?.id.clone();
        navigation.set_active(&parent);
        Some(accumulator.begin(&parent))
    }

    /// Navigate back to the configured root
    pub async fn reset_home(&self) -> FetchTicket {
        let root = self.navigation.lock().await.root().to_string();
        self.navigate_to(&root).await
    }

    /// Re-list the active folder
    pub async fn refresh(&self) -> FetchTicket {
        let active = self.navigation.lock().await.active().to_string();
        self.navigate_to(&active).await
    }

    /// Fetch every page for `ticket`, merging as they arrive
    pub async fn load(&self, ticket: &FetchTicket) -> AccumulationOutcome {
        let outcome = accumulate(self.backend.as_ref(), &self.accumulator, ticket, &self.access).await;

        match &outcome {
            AccumulationOutcome::Failed(LoadError::Partial(e)) => {
                self.notify_error(format!("Some files could not be loaded: {}", e));
            }
            AccumulationOutcome::Complete { entries, truncated: true, .. } => {
                self.notify_info(format!("Showing the first {} items of this folder", entries));
            }
            AccumulationOutcome::Superseded => {
                info!("Listing of {} superseded by newer navigation", ticket.folder_id());
            }
            _ => {}
        }
        outcome
    }

    /// `navigate_to` followed by `load`
    pub async fn open(&self, folder_id: &str) -> AccumulationOutcome {
        let ticket = self.navigate_to(folder_id).await;
        self.load(&ticket).await
    }

    /// `navigate_up` followed by `load`
    pub async fn open_parent(&self) -> Option<AccumulationOutcome> {
        let ticket = self.navigate_up().await?;
        Some(self.load(&ticket).await)
    }

    pub async fn active_folder(&self) -> String {
        self.navigation.lock().await.active().to_string()
    }

    pub async fn snapshot(&self) -> BrowserSnapshot {
        let navigation = self.navigation.lock().await;
        let accumulator = self.accumulator.lock().await;
        BrowserSnapshot {
            active_folder: navigation.active().to_string(),
            state: accumulator.state().clone(),
            view: accumulator.view().cloned(),
        }
    }

    fn notify_error(&self, message: String) {
        if let Some(center) = &self.notifications {
            if let Ok(mut center) = center.lock() {
                center.error(message);
            }
        }
    }

    fn notify_info(&self, message: String) {
        if let Some(center) = &self.notifications {
            if let Ok(mut center) = center.lock() {
                center.info(message);
            }
        }
    }
}
