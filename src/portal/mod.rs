//! Portal Backend Module
//!
//! Every piece of business logic (OTP issuance, share persistence, folder
//! listing against the storage provider) lives behind a remote script
//! endpoint. This module is the single seam to it: the `PortalBackend` trait
//! exposes one method per backend action, and `ScriptBackend` implements it
//! over one HTTP call per invocation.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              PortalBackend Trait             │
//! │ getFiles, sendOtp, verifyOtp, share CRUD     │
//! └──────────────────────────────────────────────┘
//!                       │
//!            ┌──────────┴──────────┐
//!            ▼                     ▼
//!     ┌──────────────┐     ┌───────────────┐
//!     │ ScriptBackend│     │ test backends │
//!     └──────────────┘     └───────────────┘
//! ```

pub mod types;
pub mod script;

#[cfg(test)]
pub(crate) mod testing;

pub use types::*;
pub use script::ScriptBackend;

use async_trait::async_trait;

/// Request/response contract with the remote backend
///
/// Implementations perform exactly one request per call. They never retry,
/// never follow continuation cursors and never cache.
#[async_trait]
pub trait PortalBackend: Send + Sync {
    /// Fetch one page of a folder listing (`getFiles`)
    async fn list_folder(&self, request: &ListingRequest) -> Result<ListingPage, PortalError>;

    /// Ask the backend to email a one-time passcode (`sendOtp`)
    async fn send_otp(&self, email: &str) -> Result<(), PortalError>;

    /// Exchange email + passcode for a session token (`verifyOtp`)
    async fn verify_otp(&self, email: &str, otp: &str) -> Result<String, PortalError>;

    /// List the administrator's share links (`getShares`)
    async fn list_shares(&self, token: &str) -> Result<Vec<ShareLink>, PortalError>;

    /// Create a share link bound to a folder (`createShare`)
    async fn create_share(&self, token: &str, share: &NewShare) -> Result<ShareLink, PortalError>;

    /// Change label or logo of an existing share (`updateShare`)
    async fn update_share(&self, token: &str, update: &ShareUpdate) -> Result<ShareLink, PortalError>;

    /// Delete a share link; recipients lose access (`deleteShare`)
    async fn delete_share(&self, token: &str, share_id: &str) -> Result<(), PortalError>;
}
