// DriveShare Share Management
// Admin operations on share links and link/ID helpers

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::portal::{NewShare, PortalBackend, PortalError, ShareLink, ShareUpdate};

fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Pull a folder ID out of a raw ID or a storage folder URL
///
/// Accepts `.../folders/<id>` and `...?id=<id>` forms.
pub fn extract_folder_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(url) = url::Url::parse(input) {
        if let Some(mut segments) = url.path_segments() {
            if segments.any(|s| s == "folders") {
                if let Some(id) = segments.next().filter(|id| is_slug(id)) {
                    return Some(id.to_string());
                }
            }
        }
        return url
            .query_pairs()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.into_owned())
            .filter(|id| is_slug(id));
    }
    is_slug(input).then(|| input.to_string())
}

/// Public link for a share: `<base>?share=<id>`
pub fn share_url(base: &str, share_id: &str) -> Result<String, url::ParseError> {
    let mut url = url::Url::parse(base)?;
    url.set_fragment(None);
    url.set_query(None);
    url.query_pairs_mut().append_pair("share", share_id);
    Ok(url.to_string())
}

/// Validate and normalize a new share before it is sent
pub fn prepare_new_share(share: &NewShare) -> Result<NewShare, PortalError> {
    let label = share.label.trim();
    if label.is_empty() {
        return Err(PortalError::InvalidInput("Label is required".to_string()));
    }
    let folder_id = extract_folder_id(&share.folder_id)
        .ok_or_else(|| PortalError::InvalidInput("A valid folder ID is required".to_string()))?;
    let custom_path = match share.custom_path.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(path) if is_slug(path) => Some(path.to_string()),
        Some(_) => {
            return Err(PortalError::InvalidInput(
                "Custom path may only contain letters, digits, '-' and '_'".to_string(),
            ))
        }
    };
    let logo_url = share
        .logo_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(NewShare {
        folder_id,
        label: label.to_string(),
        custom_path,
        logo_url,
    })
}

/// Share operations bound to an admin session token
pub struct ShareManager<B: PortalBackend + ?Sized> {
    backend: Arc<B>,
    token: SecretString,
}

impl<B: PortalBackend + ?Sized> ShareManager<B> {
    pub fn new(backend: Arc<B>, token: SecretString) -> Self {
        Self { backend, token }
    }

    pub async fn list(&self) -> Result<Vec<ShareLink>, PortalError> {
        self.backend.list_shares(self.token.expose_secret()).await
    }

    pub async fn create(&self, share: &NewShare) -> Result<ShareLink, PortalError> {
        let share = prepare_new_share(share)?;
        let link = self.backend.create_share(self.token.expose_secret(), &share).await?;
        info!("Created share {} for folder {}", link.id, link.folder_id);
        Ok(link)
    }

    pub async fn update(&self, update: &ShareUpdate) -> Result<ShareLink, PortalError> {
        if update.share_id.trim().is_empty() {
            return Err(PortalError::InvalidInput("Share ID is required".to_string()));
        }
        if update.label.as_deref().is_some_and(|l| l.trim().is_empty()) {
            return Err(PortalError::InvalidInput("Label cannot be empty".to_string()));
        }
        self.backend.update_share(self.token.expose_secret(), update).await
    }

    pub async fn delete(&self, share_id: &str) -> Result<(), PortalError> {
        self.backend.delete_share(self.token.expose_secret(), share_id).await?;
        info!("Deleted share {}", share_id);
        Ok(())
    }
}
