// DriveShare Notifications
// Toast queue with per-message expiry and a single-flight download tracker

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default lifetime of a toast
pub const DEFAULT_TOAST_TTL: Duration = Duration::from_secs(3);

pub type ToastId = String;

/// Notification center shared between the browser, downloads and the CLI
pub type SharedNotifications = Arc<Mutex<NotificationCenter>>;

/// Download tracker shared between a transfer and whoever renders it
pub type SharedDownloads = Arc<Mutex<DownloadTracker>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

/// A queued message with its scheduled expiry
#[derive(Debug, Clone)]
pub struct Toast {
    pub id: ToastId,
    pub kind: ToastKind,
    pub message: String,
    pub expires_at: Instant,
}

/// FIFO of toasts, each removed once its expiry passes
#[derive(Debug)]
pub struct NotificationCenter {
    ttl: Duration,
    queue: VecDeque<Toast>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_TTL)
    }
}

impl NotificationCenter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            queue: VecDeque::new(),
        }
    }

    pub fn shared(ttl: Duration) -> SharedNotifications {
        Arc::new(Mutex::new(Self::new(ttl)))
    }

    pub fn push(&mut self, kind: ToastKind, message: impl Into<String>) -> ToastId {
        self.push_at(kind, message, Instant::now())
    }

    pub fn push_at(&mut self, kind: ToastKind, message: impl Into<String>, now: Instant) -> ToastId {
        let id = uuid::Uuid::new_v4().to_string();
        let message = message.into();
        debug!("Toast {:?}: {}", kind, message);
        self.queue.push_back(Toast {
            id: id.clone(),
            kind,
            message,
            expires_at: now + self.ttl,
        });
        id
    }

    pub fn success(&mut self, message: impl Into<String>) -> ToastId {
        self.push(ToastKind::Success, message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> ToastId {
        self.push(ToastKind::Error, message)
    }

    pub fn info(&mut self, message: impl Into<String>) -> ToastId {
        self.push(ToastKind::Info, message)
    }

    /// Remove a toast before it expires
    pub fn dismiss(&mut self, id: &str) -> bool {
        let before = self.queue.len();
        self.queue.retain(|t| t.id != id);
        self.queue.len() != before
    }

    /// Remove and return every toast whose expiry is at or before `now`
    pub fn prune(&mut self, now: Instant) -> Vec<Toast> {
        let (expired, live): (Vec<Toast>, Vec<Toast>) =
            self.queue.drain(..).partition(|t| t.expires_at <= now);
        self.queue = live.into();
        expired
    }

    pub fn visible(&self) -> impl Iterator<Item = &Toast> {
        self.queue.iter()
    }

    /// Earliest pending expiry, for scheduling the next prune
    pub fn next_expiry(&self) -> Option<Instant> {
        self.queue.iter().map(|t| t.expires_at).min()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Periodically drop expired toasts from a shared center
pub async fn run_expiry(center: SharedNotifications, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        if let Ok(mut guard) = center.lock() {
            guard.prune(Instant::now());
        }
    }
}

/// Progress of the download in flight
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub name: String,
    pub transferred: u64,
    pub total: u64,
}

impl DownloadProgress {
    /// Percentage in 0..=100; unknown totals report 0
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.transferred as f64 / self.total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Tracks at most one download at a time
#[derive(Debug, Default)]
pub struct DownloadTracker {
    active: Option<DownloadProgress>,
}

impl DownloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedDownloads {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Begin tracking; refused while another download is active
    pub fn start(&mut self, name: impl Into<String>, total: u64) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(DownloadProgress {
            name: name.into(),
            transferred: 0,
            total,
        });
        true
    }

    pub fn update(&mut self, transferred: u64, total: u64) {
        if let Some(progress) = self.active.as_mut() {
            progress.transferred = transferred;
            if total > 0 {
                progress.total = total;
            }
        }
    }

    pub fn progress(&self) -> Option<&DownloadProgress> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn finish(&mut self, center: &mut NotificationCenter) {
        if let Some(progress) = self.active.take() {
            center.success(format!("Download complete: {}", progress.name));
        }
    }

    pub fn fail(&mut self, center: &mut NotificationCenter, reason: &str) {
        if let Some(progress) = self.active.take() {
            center.error(format!("Download failed: {} ({})", progress.name, reason));
        }
    }
}
