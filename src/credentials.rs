//! Bearer-token lookup injected into sessions and probes.

use std::sync::{Arc, RwLock};

use crate::options::SecretString;

/// Supplies the bearer token attached to streaming requests.
///
/// Sessions that require authentication are refused when this returns `None`.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<SecretString>;
}

/// A fixed token, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(Option<SecretString>);

impl StaticCredentials {
    pub fn new(token: impl Into<SecretString>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> Option<SecretString> {
        self.0.clone()
    }
}

/// A token that can be replaced after login or refresh.
#[derive(Debug, Clone, Default)]
pub struct SharedCredentials {
    token: Arc<RwLock<Option<SecretString>>>,
}

impl SharedCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: Option<SecretString>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }
}

impl CredentialProvider for SharedCredentials {
    fn bearer_token(&self) -> Option<SecretString> {
        self.token.read().ok().and_then(|slot| slot.clone())
    }
}

impl<T: CredentialProvider + ?Sized> CredentialProvider for Arc<T> {
    fn bearer_token(&self) -> Option<SecretString> {
        (**self).bearer_token()
    }
}
