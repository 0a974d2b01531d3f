//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the Authorization header
//! 2. Hash it and verify it exists in the database
//! 3. Inject authentication context into the request
//! 4. Reject unauthorized requests with HTTP 401

use crate::{
    db::DbPool,
    error::AppError,
    models::api_key::{ApiKey, UserRole},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Authentication context attached to authenticated requests.
///
/// Handlers extract it with `Extension<AuthContext>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated API key
    pub api_key_id: Uuid,

    /// User the key belongs to; owner id for events, bookings and requests
    pub user_id: Uuid,

    pub role: UserRole,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Organizers manage their own events; admins manage all of them.
    pub fn can_manage(&self, organizer_id: Uuid) -> bool {
        self.is_admin() || (self.role == UserRole::Organizer && self.user_id == organizer_id)
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if !self.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(())
    }

    pub fn require_organizer(&self) -> Result<(), AppError> {
        match self.role {
            UserRole::Organizer | UserRole::Admin => Ok(()),
            UserRole::User => Err(AppError::Forbidden),
        }
    }

    pub fn require_manager_of(&self, organizer_id: Uuid) -> Result<(), AppError> {
        if !self.can_manage(organizer_id) {
            return Err(AppError::Forbidden);
        }
        Ok(())
    }
}

/// SHA-256 hex digest of a raw API key, as stored in `api_keys.key_hash`.
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pull the key out of `Authorization: Bearer <key>`.
fn bearer_token(header: Option<&str>) -> Result<&str, AppError> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(AppError::InvalidApiKey)
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hash the `<key>` using SHA-256
/// 3. Query database for matching hash where `is_active = true`
/// 4. If found: inject `AuthContext` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());
    let key_hash = hash_api_key(bearer_token(header)?);

    let api_key_record = sqlx::query_as::<_, ApiKey>(
        "SELECT id, key_hash, user_id, role, created_at, is_active
         FROM api_keys
         WHERE key_hash = $1 AND is_active = true",
    )
    .bind(&key_hash)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    request.extensions_mut().insert(AuthContext {
        api_key_id: api_key_record.id,
        user_id: api_key_record.user_id,
        role: api_key_record.role,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: UserRole, user_id: Uuid) -> AuthContext {
        AuthContext {
            api_key_id: Uuid::new_v4(),
            user_id,
            role,
        }
    }

    #[test]
    fn hashes_are_hex_sha256() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token(Some("Bearer key123")).unwrap(), "key123");
        assert!(bearer_token(Some("key123")).is_err());
        assert!(bearer_token(Some("Bearer ")).is_err());
        assert!(bearer_token(None).is_err());
    }

    #[test]
    fn organizers_manage_only_their_events() {
        let me = Uuid::new_v4();
        let organizer = ctx(UserRole::Organizer, me);
        assert!(organizer.can_manage(me));
        assert!(!organizer.can_manage(Uuid::new_v4()));

        let admin = ctx(UserRole::Admin, Uuid::new_v4());
        assert!(admin.can_manage(me));

        // a plain user never manages, even with a matching id
        let user = ctx(UserRole::User, me);
        assert!(!user.can_manage(me));
        assert!(user.require_organizer().is_err());
    }
}
