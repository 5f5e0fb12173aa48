//! Script endpoint backend
//!
//! Implements `PortalBackend` against the deployed script web app. Every
//! action is one `POST` whose body is a JSON payload `{action, ...}`; the
//! answer is the `{success, data, error}` envelope.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    ApiEnvelope, ListingPage, ListingRequest, NewShare, PortalBackend, PortalError, ShareLink,
    ShareUpdate,
};

/// The script host rejects CORS preflights, so payloads travel as plain text
const PAYLOAD_CONTENT_TYPE: &str = "text/plain;charset=utf-8";

const LIST_ADMIN_FALLBACK: &str = "Failed to load folder contents. Please check your permissions.";
const LIST_SHARE_FALLBACK: &str = "This link may have expired or is invalid.";
const SEND_OTP_FALLBACK: &str = "Error sending OTP";
const VERIFY_OTP_FALLBACK: &str = "Invalid OTP";
const SHARES_FALLBACK: &str = "Failed to load shares";
const CREATE_SHARE_FALLBACK: &str = "Failed to create share. Check Folder ID.";
const UPDATE_SHARE_FALLBACK: &str = "Failed to update share";
const DELETE_SHARE_FALLBACK: &str = "Failed to delete share";

/// `verifyOtp` data payload
#[derive(serde::Deserialize)]
struct VerifiedLogin {
    token: String,
}

/// Remote script backend
pub struct ScriptBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl ScriptBackend {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one payload and unwrap the envelope
    async fn call(&self, payload: Value, fallback: &str) -> Result<Option<Value>, PortalError> {
        let action = payload["action"].as_str().unwrap_or("unknown").to_string();
        debug!("Portal call: {}", action);

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, PAYLOAD_CONTENT_TYPE)
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| {
                warn!("Portal {} request failed: {}", action, e);
                PortalError::ConnectionFailed
            })?;

        let body = response.text().await.map_err(|e| {
            warn!("Portal {} response could not be read: {}", action, e);
            PortalError::ConnectionFailed
        })?;

        parse_envelope(&body, fallback)
    }
}

/// Decode the `{success, data, error}` envelope
///
/// Returns the raw `data` on success. An unparseable body becomes
/// `InvalidResponse`; `success:false` becomes `Backend` with the server
/// message, or `fallback` when the server sent none.
pub(crate) fn parse_envelope(body: &str, fallback: &str) -> Result<Option<Value>, PortalError> {
    let envelope: ApiEnvelope<Value> = serde_json::from_str(body).map_err(|e| {
        debug!("Unparseable portal response ({}): {:.120}", e, body);
        PortalError::InvalidResponse
    })?;

    if !envelope.success {
        let message = envelope
            .error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());
        return Err(PortalError::Backend(message));
    }

    Ok(envelope.data)
}

/// Deserialize a mandatory `data` payload
fn require_data<T: DeserializeOwned>(data: Option<Value>) -> Result<T, PortalError> {
    let value = data.ok_or(PortalError::InvalidResponse)?;
    serde_json::from_value(value).map_err(|e| {
        debug!("Portal data has unexpected shape: {}", e);
        PortalError::InvalidResponse
    })
}

/// Build the `getFiles` payload; absent optionals are omitted, `token` is null
pub(crate) fn listing_payload(request: &ListingRequest) -> Value {
    let mut payload = json!({
        "action": "getFiles",
        "folderId": request.folder_id,
        "token": request.access.token(),
    });
    if let Some(share_id) = request.access.share_id() {
        payload["shareId"] = json!(share_id);
    }
    if let Some(cursor) = request.page_token.as_deref() {
        payload["pageToken"] = json!(cursor);
    }
    payload
}

fn create_share_payload(token: &str, share: &NewShare) -> Value {
    let mut payload = json!({
        "action": "createShare",
        "token": token,
        "folderId": share.folder_id,
        "label": share.label,
    });
    if let Some(ref custom_path) = share.custom_path {
        payload["customPath"] = json!(custom_path);
    }
    if let Some(ref logo_url) = share.logo_url {
        payload["logoUrl"] = json!(logo_url);
    }
    payload
}

fn update_share_payload(token: &str, update: &ShareUpdate) -> Value {
    let mut payload = json!({
        "action": "updateShare",
        "token": token,
        "shareId": update.share_id,
    });
    if let Some(ref label) = update.label {
        payload["label"] = json!(label);
    }
    if let Some(ref logo_url) = update.logo_url {
        payload["logoUrl"] = json!(logo_url);
    }
    payload
}

#[async_trait]
impl PortalBackend for ScriptBackend {
    async fn list_folder(&self, request: &ListingRequest) -> Result<ListingPage, PortalError> {
        let fallback = if request.access.share_id().is_some() {
            LIST_SHARE_FALLBACK
        } else {
            LIST_ADMIN_FALLBACK
        };
        let data = self.call(listing_payload(request), fallback).await?;
        require_data(data)
    }

    async fn send_otp(&self, email: &str) -> Result<(), PortalError> {
        self.call(json!({ "action": "sendOtp", "email": email }), SEND_OTP_FALLBACK)
            .await?;
        Ok(())
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<String, PortalError> {
        let data = self
            .call(
                json!({ "action": "verifyOtp", "email": email, "otp": otp }),
                VERIFY_OTP_FALLBACK,
            )
            .await?;
        let login: VerifiedLogin = require_data(data)?;
        Ok(login.token)
    }

    async fn list_shares(&self, token: &str) -> Result<Vec<ShareLink>, PortalError> {
        let data = self
            .call(json!({ "action": "getShares", "token": token }), SHARES_FALLBACK)
            .await?;
        // An admin without shares may get `data: null`
        match data {
            None | Some(Value::Null) => Ok(Vec::new()),
            other => require_data(other),
        }
    }

    async fn create_share(&self, token: &str, share: &NewShare) -> Result<ShareLink, PortalError> {
        let data = self
            .call(create_share_payload(token, share), CREATE_SHARE_FALLBACK)
            .await?;
        require_data(data)
    }

    async fn update_share(&self, token: &str, update: &ShareUpdate) -> Result<ShareLink, PortalError> {
        let data = self
            .call(update_share_payload(token, update), UPDATE_SHARE_FALLBACK)
            .await?;
        require_data(data)
    }

    async fn delete_share(&self, token: &str, share_id: &str) -> Result<(), PortalError> {
        self.call(
            json!({ "action": "deleteShare", "token": token, "shareId": share_id }),
            DELETE_SHARE_FALLBACK,
        )
        .await?;
        Ok(())
    }
}
