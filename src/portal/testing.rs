//! In-memory backend for unit tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Notify};

use super::{ListingPage, ListingRequest, NewShare, PortalBackend, PortalError, ShareLink, ShareUpdate};

type PageKey = (String, Option<String>);

/// Backend answering from scripted pages
///
/// Pages are keyed by `(folder id, cursor)`. A folder can be gated so its
/// listing calls park until the test releases them.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    pages: Mutex<HashMap<PageKey, Result<ListingPage, PortalError>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    requests: Mutex<Vec<ListingRequest>>,
    shares: Mutex<Vec<ShareLink>>,
    otp: Mutex<Option<(String, String)>>,
    otp_requests: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, folder: &str, cursor: Option<&str>, page: ListingPage) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert((folder.to_string(), cursor.map(str::to_string)), Ok(page));
        self
    }

    pub fn failure(self, folder: &str, cursor: Option<&str>, error: PortalError) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert((folder.to_string(), cursor.map(str::to_string)), Err(error));
        self
    }

    /// Park every listing call for `folder` until the returned handle is notified
    pub fn gate(&self, folder: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(folder.to_string(), notify.clone());
        notify
    }

    pub fn with_otp(self, email: &str, code: &str) -> Self {
        *self.otp.lock().unwrap() = Some((email.to_string(), code.to_string()));
        self
    }

    pub fn with_shares(self, shares: Vec<ShareLink>) -> Self {
        *self.shares.lock().unwrap() = shares;
        self
    }

    pub fn requests(&self) -> Vec<ListingRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn otp_requests(&self) -> Vec<String> {
        self.otp_requests.lock().unwrap().clone()
    }

    pub fn shares(&self) -> Vec<ShareLink> {
        self.shares.lock().unwrap().clone()
    }
}

/// Build a page for `folder` with `count` files named `<prefix>-<n>`
pub(crate) fn page_of(folder: &str, prefix: &str, count: usize, cursor: Option<&str>) -> ListingPage {
    ListingPage {
        id: folder.to_string(),
        name: folder.to_string(),
        files: (1..=count)
            .map(|n| super::Entry::file(format!("{}-{}", prefix, n), format!("{}-{}", prefix, n), "text/plain", 10))
            .collect(),
        path: vec![super::PathSegment::new(folder, folder)],
        next_page_token: cursor.map(str::to_string),
        share_label: None,
        share_logo: None,
    }
}

/// Serve exactly one HTTP request with a JSON `body`, handing back the request body
pub(crate) async fn serve_once(body: &'static str) -> (String, oneshot::Receiver<String>) {
    serve_once_with("200 OK", "application/json", body.as_bytes()).await
}

/// Serve exactly one HTTP request with the given status line and body
pub(crate) async fn serve_once_with(
    status: &'static str,
    content_type: &'static str,
    body: &'static [u8],
) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/exec", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(split) = text.find("\r\n\r\n") {
                let headers = text[..split].to_ascii_lowercase();
                let length = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= split + 4 + length {
                    let _ = tx.send(text[split + 4..split + 4 + length].to_string());
                    break;
                }
            }
        }
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            content_type,
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(body).await.unwrap();
        socket.shutdown().await.ok();
    });

    (url, rx)
}

#[async_trait]
impl PortalBackend for ScriptedBackend {
    async fn list_folder(&self, request: &ListingRequest) -> Result<ListingPage, PortalError> {
        self.requests.lock().unwrap().push(request.clone());

        let gate = self.gates.lock().unwrap().get(&request.folder_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let key = (request.folder_id.clone(), request.page_token.clone());
        self.pages
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or(Err(PortalError::Backend(format!("no page for {:?}", key))))
    }

    async fn send_otp(&self, email: &str) -> Result<(), PortalError> {
        self.otp_requests.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<String, PortalError> {
        match self.otp.lock().unwrap().as_ref() {
            Some((e, code)) if e == email && code == otp => Ok(format!("token-for-{}", email)),
            _ => Err(PortalError::Backend("Invalid OTP".to_string())),
        }
    }

    async fn list_shares(&self, _token: &str) -> Result<Vec<ShareLink>, PortalError> {
        Ok(self.shares())
    }

    async fn create_share(&self, _token: &str, share: &NewShare) -> Result<ShareLink, PortalError> {
        let mut shares = self.shares.lock().unwrap();
        let id = share
            .custom_path
            .clone()
            .unwrap_or_else(|| format!("s{}", shares.len() + 1));
        if shares.iter().any(|s| s.id == id) {
            return Err(PortalError::Backend("Custom path already in use".to_string()));
        }
        let link = ShareLink {
            id,
            folder_id: share.folder_id.clone(),
            label: share.label.clone(),
            logo_url: share.logo_url.clone(),
            created: "2024-05-01T10:00:00.000Z".to_string(),
            clicks: 0,
        };
        shares.push(link.clone());
        Ok(link)
    }

    async fn update_share(&self, _token: &str, update: &ShareUpdate) -> Result<ShareLink, PortalError> {
        let mut shares = self.shares.lock().unwrap();
        let share = shares
            .iter_mut()
            .find(|s| s.id == update.share_id)
            .ok_or_else(|| PortalError::Backend("Share not found".to_string()))?;
        if let Some(ref label) = update.label {
            share.label = label.clone();
        }
        if let Some(ref logo) = update.logo_url {
            share.logo_url = Some(logo.clone());
        }
        Ok(share.clone())
    }

    async fn delete_share(&self, _token: &str, share_id: &str) -> Result<(), PortalError> {
        let mut shares = self.shares.lock().unwrap();
        let before = shares.len();
        shares.retain(|s| s.id != share_id);
        if shares.len() == before {
            return Err(PortalError::Backend("Share not found".to_string()));
        }
        Ok(())
    }
}
