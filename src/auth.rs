// DriveShare Admin Sign-in
// Email + one-time code flow against the portal backend

use std::sync::{Arc, LazyLock};

use regex::Regex;
use thiserror::Error;
use tracing::info;

use crate::context::AuthSession;
use crate::notifications::SharedNotifications;
use crate::portal::{PortalBackend, PortalError};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Please enter the verification code")]
    EmptyCode,
    #[error("No verification code has been requested")]
    NoPendingCode,
    #[error(transparent)]
    Portal(#[from] PortalError),
}

/// Where the sign-in flow currently is
#[derive(Debug, Clone)]
pub enum LoginStep {
    Email,
    Code { email: String },
    Authenticated(AuthSession),
}

pub struct LoginFlow<B: PortalBackend + ?Sized> {
    backend: Arc<B>,
    step: LoginStep,
    notifications: Option<SharedNotifications>,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

impl<B: PortalBackend + ?Sized> LoginFlow<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            step: LoginStep::Email,
            notifications: None,
        }
    }

    /// Resume at the code step for a code that was already sent to `email`
    pub fn awaiting_code(backend: Arc<B>, email: &str) -> Result<Self, AuthError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        Ok(Self {
            backend,
            step: LoginStep::Code {
                email: email.to_string(),
            },
            notifications: None,
        })
    }

    pub fn with_notifications(mut self, center: SharedNotifications) -> Self {
        self.notifications = Some(center);
        self
    }

    pub fn step(&self) -> &LoginStep {
        &self.step
    }

    /// Send a one-time code to `email` and move to the code step
    pub async fn request_code(&mut self, email: &str) -> Result<(), AuthError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if let Err(e) = self.backend.send_otp(email).await {
            self.toast_error(&e);
            return Err(e.into());
        }
        info!("Verification code requested for {}", email);
        self.toast_success("Verification code sent to email");
        self.step = LoginStep::Code {
            email: email.to_string(),
        };
        Ok(())
    }

    /// Exchange the code for a session token
    pub async fn verify(&mut self, code: &str) -> Result<AuthSession, AuthError> {
        let email = match &self.step {
            LoginStep::Code { email } => email.clone(),
            _ => return Err(AuthError::NoPendingCode),
        };
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::EmptyCode);
        }
        let token = match self.backend.verify_otp(&email, code).await {
            Ok(token) => token,
            Err(e) => {
                self.toast_error(&e);
                return Err(e.into());
            }
        };
        let session = AuthSession::new(email, token);
        self.toast_success("Login Successful");
        self.step = LoginStep::Authenticated(session.clone());
        Ok(session)
    }

    /// Go back to entering an address
    pub fn change_email(&mut self) {
        self.step = LoginStep::Email;
    }

    fn toast_success(&self, message: &str) {
        if let Some(Ok(mut center)) = self.notifications.as_ref().map(|c| c.lock()) {
            center.success(message);
        }
    }

    fn toast_error(&self, error: &PortalError) {
        if let Some(Ok(mut center)) = self.notifications.as_ref().map(|c| c.lock()) {
            center.error(error.to_string());
        }
    }
}
