// DriveShare Application Context
// Signed-in session and theme preference, persisted as JSON

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Failed to write context: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize context: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Administrator session obtained through the one-time-code flow
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub email: String,
    pub token: SecretString,
}

impl AuthSession {
    pub fn new(email: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            token: SecretString::from(token.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggle(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Dark => write!(f, "dark"),
            Theme::Light => write!(f, "light"),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSession {
    email: String,
    token: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedContext {
    #[serde(default)]
    session: Option<PersistedSession>,
    #[serde(default)]
    theme: Theme,
}

/// Application-wide state shared by every screen
#[derive(Debug)]
pub struct AppContext {
    path: PathBuf,
    session: Option<AuthSession>,
    theme: Theme,
}

impl AppContext {
    /// Default location: `<config dir>/driveshare/context.json`
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));
        config_dir.join("driveshare").join("context.json")
    }

    /// Load persisted state; unreadable or corrupt files fall back to defaults
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let persisted = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<PersistedContext>(&content).unwrap_or_else(|e| {
                warn!("Failed to parse context {:?}: {}", path, e);
                PersistedContext::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PersistedContext::default(),
            Err(e) => {
                warn!("Failed to read context {:?}: {}", path, e);
                PersistedContext::default()
            }
        };

        Self {
            path,
            session: persisted
                .session
                .filter(|s| !s.token.is_empty())
                .map(|s| AuthSession::new(s.email, s.token)),
            theme: persisted.theme,
        }
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn login(&mut self, session: AuthSession) -> Result<(), ContextError> {
        info!("Signed in as {}", session.email);
        self.session = Some(session);
        self.save()
    }

    pub fn logout(&mut self) -> Result<(), ContextError> {
        if let Some(session) = self.session.take() {
            info!("Signed out {}", session.email);
        }
        self.save()
    }

    pub fn toggle_theme(&mut self) -> Result<Theme, ContextError> {
        self.theme = self.theme.toggle();
        self.save()?;
        Ok(self.theme)
    }

    fn save(&self) -> Result<(), ContextError> {
        let persisted = PersistedContext {
            session: self.session.as_ref().map(|s| PersistedSession {
                email: s.email.clone(),
                token: s.token.expose_secret().to_string(),
            }),
            theme: self.theme,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&persisted)?)?;
        Ok(())
    }
}
