//! Shared types for the portal backend
//!
//! Wire shapes exchanged with the script endpoint (listing pages, entries,
//! share records, the `{success, data, error}` envelope) and the error type
//! every backend call resolves to.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Content type the storage provider uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// One file or folder inside a listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Identifier, unique within its folder
    pub id: String,
    /// Display name
    pub name: String,
    /// Content-type classifier
    #[serde(default)]
    pub mime_type: String,
    /// Primary reference URL (preview/open)
    #[serde(default)]
    pub url: String,
    /// Direct download URL
    #[serde(default)]
    pub download_url: String,
    /// Size in bytes (meaningless for folders)
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: u64,
    /// Display timestamp as sent by the backend
    #[serde(default)]
    pub last_updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Container (folder) vs leaf (file)
    #[serde(default)]
    pub is_folder: bool,
}

impl Entry {
    /// Create a folder entry
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            url: String::new(),
            download_url: String::new(),
            size: 0,
            last_updated: String::new(),
            thumbnail_url: None,
            is_folder: true,
        }
    }

    /// Create a file entry
    pub fn file(
        id: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: mime_type.into(),
            url: String::new(),
            download_url: String::new(),
            size,
            last_updated: String::new(),
            thumbnail_url: None,
            is_folder: false,
        }
    }

    /// Whether this entry can be navigated into
    pub fn is_container(&self) -> bool {
        self.is_folder || self.mime_type == FOLDER_MIME_TYPE
    }
}

/// The script host serializes sizes as numbers, numeric strings or null
fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// One breadcrumb element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    pub id: String,
    pub name: String,
}

impl PathSegment {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// A single `getFiles` response page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    /// Folder identifier the page belongs to
    pub id: String,
    /// Folder display name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub files: Vec<Entry>,
    /// Breadcrumb from root to this folder
    #[serde(default)]
    pub path: Vec<PathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    /// Branding attached to the share link, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_logo: Option<String>,
}

impl ListingPage {
    /// Continuation cursor; an empty string counts as absent
    pub fn continuation(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Persisted share record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLink {
    pub id: String,
    pub folder_id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// Creation timestamp (ISO 8601)
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub clicks: u64,
}

/// Input for `createShare`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewShare {
    pub folder_id: String,
    pub label: String,
    /// Vanity share identifier; the backend picks one when absent
    pub custom_path: Option<String>,
    pub logo_url: Option<String>,
}

/// Input for `updateShare`; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShareUpdate {
    pub share_id: String,
    pub label: Option<String>,
    pub logo_url: Option<String>,
}

/// How a listing request is authorized
#[derive(Debug, Clone)]
pub enum Access {
    /// Administrator session, bearer token from OTP login
    Admin { token: SecretString },
    /// Public recipient, authorized by the share identifier alone
    Share { share_id: String },
}

impl Access {
    pub fn admin(token: SecretString) -> Self {
        Access::Admin { token }
    }

    pub fn share(share_id: impl Into<String>) -> Self {
        Access::Share { share_id: share_id.into() }
    }

    pub(crate) fn token(&self) -> Option<&str> {
        match self {
            Access::Admin { token } => Some(token.expose_secret()),
            Access::Share { .. } => None,
        }
    }

    pub(crate) fn share_id(&self) -> Option<&str> {
        match self {
            Access::Admin { .. } => None,
            Access::Share { share_id } => Some(share_id),
        }
    }
}

/// Parameters of one `getFiles` call
#[derive(Debug, Clone)]
pub struct ListingRequest {
    pub folder_id: String,
    pub access: Access,
    /// Continuation cursor from the previous page
    pub page_token: Option<String>,
}

/// `{success, data, error}` envelope every script action answers with
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

/// Portal error type
///
/// Transport and parse failures carry no detail on purpose: the script host
/// answers with HTML error pages whose text is useless to a recipient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortalError {
    #[error("Connection failed")]
    ConnectionFailed,

    #[error("Invalid response")]
    InvalidResponse,

    /// `success:false` from the backend, e.g. an expired share link
    #[error("{0}")]
    Backend(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl PortalError {
    /// Transport or parse failure, as opposed to an answer from the backend
    pub fn is_transport(&self) -> bool {
        matches!(self, PortalError::ConnectionFailed | PortalError::InvalidResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_size_accepts_number_string_and_null() {
        let json = r#"[
            {"id":"a","name":"a.pdf","size":2048},
            {"id":"b","name":"b.pdf","size":"4096"},
            {"id":"c","name":"c","size":null,"isFolder":true},
            {"id":"d","name":"d.bin","size":12.0}
        ]"#;
        let entries: Vec<Entry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries[0].size, 2048);
        assert_eq!(entries[1].size, 4096);
        assert_eq!(entries[2].size, 0);
        assert!(entries[2].is_folder);
        assert_eq!(entries[3].size, 12);
    }

    #[test]
    fn test_listing_page_wire_shape() {
        let json = r#"{
            "id":"f1","name":"Reports",
            "files":[{"id":"x","name":"q1.xlsx","mimeType":"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                      "url":"https://u","downloadUrl":"https://d","size":10,"lastUpdated":"2024-01-02",
                      "thumbnailUrl":"https://t","isFolder":false}],
            "path":[{"id":"root","name":"Home"},{"id":"f1","name":"Reports"}],
            "nextPageToken":"abc","shareLabel":"Acme"
        }"#;
        let page: ListingPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.files.len(), 1);
        assert_eq!(page.files[0].download_url, "https://d");
        assert_eq!(page.files[0].thumbnail_url.as_deref(), Some("https://t"));
        assert_eq!(page.path.last().unwrap().id, "f1");
        assert_eq!(page.continuation(), Some("abc"));
        assert_eq!(page.share_label.as_deref(), Some("Acme"));
        assert!(page.share_logo.is_none());
    }

    #[test]
    fn test_empty_cursor_is_absent() {
        let page: ListingPage =
            serde_json::from_str(r#"{"id":"f","files":[],"path":[],"nextPageToken":""}"#).unwrap();
        assert_eq!(page.continuation(), None);
    }

    #[test]
    fn test_entry_container_detection() {
        let mut entry = Entry::file("1", "dir", FOLDER_MIME_TYPE, 0);
        assert!(entry.is_container());
        entry.mime_type = "text/plain".to_string();
        assert!(!entry.is_container());
        assert!(Entry::folder("2", "x").is_container());
    }

    #[test]
    fn test_access_debug_redacts_token() {
        let access = Access::admin(SecretString::from("tok-123".to_string()));
        assert!(!format!("{:?}", access).contains("tok-123"));
        assert_eq!(access.token(), Some("tok-123"));
        assert_eq!(access.share_id(), None);
    }
}
