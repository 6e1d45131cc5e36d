use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::info;

use crate::config::ClientConfig;

/// Sign-in capability consumed by the controllers.
///
/// The login flow itself lives outside this crate; `login` only starts it.
pub trait AuthService: Send + Sync {
    fn is_authenticated(&self) -> bool;
    fn login(&self);
    fn logout(&self);
}

/// Auth state derived from the configured session cookie.
pub struct SessionAuth {
    authenticated: AtomicBool,
    login_url: String,
    login_requests: AtomicUsize,
}

impl SessionAuth {
    pub fn new(authenticated: bool, login_url: impl Into<String>) -> Self {
        Self {
            authenticated: AtomicBool::new(authenticated),
            login_url: login_url.into(),
            login_requests: AtomicUsize::new(0),
        }
    }

    /// Authenticated when a session cookie is configured.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.session_cookie.is_some(), config.endpoint("auth/login"))
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// How many times a sign-in was requested.
    pub fn login_requests(&self) -> usize {
        self.login_requests.load(Ordering::Relaxed)
    }
}

impl AuthService for SessionAuth {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Relaxed)
    }

    fn login(&self) {
        self.login_requests.fetch_add(1, Ordering::Relaxed);
        self.authenticated.store(false, Ordering::Relaxed);
        info!(login_url = %self.login_url, "Sign-in required");
    }

    fn logout(&self) {
        self.authenticated.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_uses_cookie_presence() {
        let anonymous = SessionAuth::from_config(&ClientConfig::default());
        assert!(!anonymous.is_authenticated());

        let config = ClientConfig {
            session_cookie: Some("session=1".into()),
            ..Default::default()
        };
        let signed_in = SessionAuth::from_config(&config);
        assert!(signed_in.is_authenticated());
        assert_eq!(signed_in.login_url(), "http://localhost:8001/api/v1/auth/login");
    }

    #[test]
    fn test_login_request_clears_session() {
        let auth = SessionAuth::new(true, "http://x/login");
        auth.login();
        assert!(!auth.is_authenticated());
        assert_eq!(auth.login_requests(), 1);
    }
}
