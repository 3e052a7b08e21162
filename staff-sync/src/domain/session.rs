use std::sync::{Mutex, PoisonError};

/// Opaque bearer token issued by the login endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Holder of the current session credential, injected wherever requests are authorized.
pub trait SessionGuard: Send + Sync {
    fn get(&self) -> Option<Credential>;
    fn set(&self, credential: Credential);
    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct InMemorySession {
    credential: Mutex<Option<Credential>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
        }
    }
}

impl SessionGuard for InMemorySession {
    fn get(&self) -> Option<Credential> {
        self.credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, credential: Credential) {
        *self
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    fn clear(&self) {
        let previous = self
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            tracing::info!("Session cleared");
        }
    }
}
