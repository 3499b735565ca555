use async_trait::async_trait;

use crate::TransportError;

/// Credential minted by the external auth endpoint. Opaque: the transport
/// checks it, nothing else inspects it.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token: String,
}

/// External endpoint that authorizes channel access. Implementations own
/// the negotiation; callers hand the provider to the connection
/// constructor and never touch credentials again.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn request_token(&self) -> Result<AuthToken, TransportError>;
}

/// Fixed-token provider for in-process and test setups.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn request_token(&self) -> Result<AuthToken, TransportError> {
        Ok(AuthToken {
            token: self.token.clone(),
        })
    }
}
