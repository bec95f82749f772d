//! Bearer credential management
//!
//! The engine only consumes a valid token; login state is owned by an
//! external session provider exposed here as a `TokenSource`. The
//! `TokenManager` caches the current token and refreshes it through the
//! source before use whenever its remaining lifetime drops under a
//! safety margin, so pushes never go out with a token about to expire.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::errors::{RemoteError, Result};

/// An access token with an optional expiry
#[derive(Debug, Clone)]
pub struct BearerToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl BearerToken {
    /// Whether the token stays valid for at least `margin` more seconds
    pub fn valid_for(&self, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > Utc::now() + margin,
            None => true,
        }
    }
}

/// External session provider supplying fresh access tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn refresh(&self) -> Result<BearerToken>;
}

/// Non-expiring credential, for service tokens and tests
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn refresh(&self) -> Result<BearerToken> {
        Ok(BearerToken {
            token: self.0.clone(),
            expires_at: None,
        })
    }
}

/// Caches the current bearer token and refreshes it proactively
pub struct TokenManager {
    source: Arc<dyn TokenSource>,
    current: RwLock<Option<BearerToken>>,
    margin: Duration,
}

impl TokenManager {
    /// Default safety margin before expiry (60 seconds)
    pub const DEFAULT_MARGIN_SECS: i64 = 60;

    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self::with_margin(source, Duration::seconds(Self::DEFAULT_MARGIN_SECS))
    }

    pub fn with_margin(source: Arc<dyn TokenSource>, margin: Duration) -> Self {
        Self {
            source,
            current: RwLock::new(None),
            margin,
        }
    }

    /// Return a token valid beyond the safety margin, refreshing if
    /// needed. A failed refresh falls back to the stale token when one
    /// exists; the server will reject it if it is fully expired.
    pub async fn bearer(&self) -> Result<String> {
        if let Some(token) = self.current.read().await.as_ref() {
            if token.valid_for(self.margin) {
                return Ok(token.token.clone());
            }
        }

        match self.source.refresh().await {
            Ok(fresh) => {
                debug!("Refreshed access token");
                let value = fresh.token.clone();
                *self.current.write().await = Some(fresh);
                Ok(value)
            }
            Err(e) => {
                let stale = self.current.read().await.as_ref().map(|t| t.token.clone());
                match stale {
                    Some(token) => {
                        warn!("Token refresh failed, using stale token: {}", e);
                        Ok(token)
                    }
                    None => Err(RemoteError::Auth(format!("no usable token: {e}"))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        lifetime: Duration,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn refresh(&self) -> Result<BearerToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(BearerToken {
                token: format!("token-{n}"),
                expires_at: Some(Utc::now() + self.lifetime),
            })
        }
    }

    struct FailingSource;

    #[async_trait]
    impl TokenSource for FailingSource {
        async fn refresh(&self) -> Result<BearerToken> {
            Err(RemoteError::Auth("session expired".to_string()))
        }
    }

    #[tokio::test]
    async fn test_reuses_fresh_token() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            lifetime: Duration::hours(1),
        });
        let manager = TokenManager::new(source.clone());

        assert_eq!(manager.bearer().await.unwrap(), "token-1");
        assert_eq!(manager.bearer().await.unwrap(), "token-1");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refreshes_when_inside_margin() {
        // Tokens live 10s, margin is 60s, so every call refreshes
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            lifetime: Duration::seconds(10),
        });
        let manager = TokenManager::new(source.clone());

        assert_eq!(manager.bearer().await.unwrap(), "token-1");
        assert_eq!(manager.bearer().await.unwrap(), "token-2");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_without_token_errors() {
        let manager = TokenManager::new(Arc::new(FailingSource));
        assert!(matches!(
            manager.bearer().await,
            Err(RemoteError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_static_token_never_refreshes() {
        let manager = TokenManager::new(Arc::new(StaticToken("svc".to_string())));
        assert_eq!(manager.bearer().await.unwrap(), "svc");
        assert_eq!(manager.bearer().await.unwrap(), "svc");
    }
}
