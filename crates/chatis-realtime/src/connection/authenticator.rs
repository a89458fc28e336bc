//! Identity verification for incoming connections.

use std::sync::Arc;

use tracing::debug;

use chatis_auth::jwt::JwtDecoder;
use chatis_core::error::AppError;
use chatis_core::types::UserId;
use chatis_database::store::UserStore;
use chatis_entity::user::UserProfile;

/// A verified user identity, the routing key for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    /// Stable user ID.
    pub user_id: UserId,
    /// Name shown to peers.
    pub display_name: String,
    /// Avatar locator, if the user has one.
    pub avatar: Option<String>,
}

impl AuthenticatedIdentity {
    /// The profile peers see for this identity.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.user_id,
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Validates bearer credentials and resolves them to a stored user.
#[derive(Clone)]
pub struct IdentityVerifier {
    decoder: Arc<JwtDecoder>,
    users: Arc<dyn UserStore>,
}

impl std::fmt::Debug for IdentityVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityVerifier").finish()
    }
}

impl IdentityVerifier {
    /// Creates a verifier over the given decoder and identity store.
    pub fn new(decoder: Arc<JwtDecoder>, users: Arc<dyn UserStore>) -> Self {
        Self { decoder, users }
    }

    /// Verify `token` and look up its subject.
    ///
    /// Fails with an authentication error when the token is missing, invalid,
    /// expired, or names a user that no longer exists. Store failures are
    /// returned unchanged.
    pub async fn verify(&self, token: Option<&str>) -> Result<AuthenticatedIdentity, AppError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::authentication("Authentication error: No token provided"))?;

        let claims = self.decoder.decode(token).map_err(|e| {
            debug!(reason = %e.message, "Rejected bearer token");
            AppError::authentication("Authentication error: Invalid token")
        })?;

        let user = self
            .users
            .find_by_id(claims.user_id())
            .await?
            .ok_or_else(|| AppError::authentication("Authentication error: User not found"))?;

        Ok(AuthenticatedIdentity {
            user_id: user.id,
            display_name: user.display_name().to_string(),
            avatar: user.avatar,
        })
    }
}

#[cfg(test)]
mod tests {
    use chatis_auth::jwt::JwtEncoder;
    use chatis_core::config::AuthConfig;
    use chatis_core::error::ErrorKind;
    use chatis_database::memory::MemoryUserStore;

    use super::*;

    fn setup() -> (IdentityVerifier, JwtEncoder, Arc<MemoryUserStore>) {
        let config = AuthConfig {
            jwt_secret: "verifier-test".to_string(),
            ..AuthConfig::default()
        };
        let users = Arc::new(MemoryUserStore::new());
        let verifier = IdentityVerifier::new(Arc::new(JwtDecoder::new(&config)), users.clone());
        (verifier, JwtEncoder::new(&config), users)
    }

    #[tokio::test]
    async fn test_valid_token_resolves_identity() {
        let (verifier, encoder, users) = setup();
        let alice = users.create("alice");
        let token = encoder.issue(alice.id, "alice").unwrap();

        let identity = verifier.verify(Some(&token)).await.unwrap();
        assert_eq!(identity.user_id, alice.id);
        assert_eq!(identity.display_name, "alice");
        assert_eq!(identity.profile(), alice.profile());
    }

    #[tokio::test]
    async fn test_missing_token() {
        let (verifier, _, _) = setup();
        for token in [None, Some(""), Some("   ")] {
            let err = verifier.verify(token).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::Authentication);
            assert_eq!(err.message, "Authentication error: No token provided");
        }
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let (verifier, _, _) = setup();
        let err = verifier.verify(Some("garbage")).await.unwrap_err();
        assert_eq!(err.message, "Authentication error: Invalid token");
    }

    #[tokio::test]
    async fn test_deleted_user() {
        let (verifier, encoder, users) = setup();
        let ghost = users.create("ghost");
        let token = encoder.issue(ghost.id, "ghost").unwrap();
        users.remove(ghost.id);

        let err = verifier.verify(Some(&token)).await.unwrap_err();
        assert_eq!(err.message, "Authentication error: User not found");
    }
}
