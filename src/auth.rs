//! Credential lookup for the one-time auth envelope.
//!
//! On every transition into the open state the connection manager asks the
//! configured [`CredentialProvider`] for a credential. If one is available,
//! exactly one `auth` envelope carrying it is sent before the outbound queue
//! is flushed; if not, the step is skipped silently — no retry, no error.
//! Authentication failures surface as a subsequent inbound rejection from
//! the server, which this client routes like any other notification.

/// Source of the session credential.
///
/// Implemented for closures, so a provider can be as simple as:
///
/// ```
/// use candor_session_client::auth::CredentialProvider;
///
/// let provider = || Some("token-from-somewhere".to_string());
/// assert_eq!(provider.credential().as_deref(), Some("token-from-somewhere"));
/// ```
pub trait CredentialProvider: Send + Sync + 'static {
    /// Return the credential to authenticate with, or `None` if no
    /// credential is currently available.
    fn credential(&self) -> Option<String>;
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<String> + Send + Sync + 'static,
{
    fn credential(&self) -> Option<String> {
        self()
    }
}

/// A provider that always returns the same credential.
///
/// Useful when the token was acquired up front and does not rotate for the
/// lifetime of the client.
#[derive(Clone)]
pub struct StaticCredential(String);

impl StaticCredential {
    /// Wrap an already-issued credential.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl CredentialProvider for StaticCredential {
    fn credential(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

impl std::fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the token itself.
        f.debug_struct("StaticCredential").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn static_credential_returns_token() {
        let provider = StaticCredential::new("tok_abc");
        assert_eq!(provider.credential().as_deref(), Some("tok_abc"));
    }

    #[test]
    fn closure_provider_can_return_none() {
        let provider = || None;
        assert!(CredentialProvider::credential(&provider).is_none());
    }

    #[test]
    fn debug_does_not_leak_token() {
        let provider = StaticCredential::new("sekrit");
        let printed = format!("{provider:?}");
        assert!(!printed.contains("sekrit"));
    }
}
