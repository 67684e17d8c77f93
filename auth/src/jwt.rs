//! JWT issuance and verification for `/auth/login` and the bearer-token
//! extractor in `extractor.rs`.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use ticketq_core::{Role, TicketingError, UserId};

/// Token claims. `sub` is the user id; `role` gates the admin-only routes
/// without a database round trip on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub role: Role,
    pub exp: i64,
}

/// Issues a signed token valid for `ttl`.
///
/// # Errors
///
/// Returns `Internal` if the signing step fails.
pub fn issue(secret: &str, user_id: UserId, role: Role, ttl: Duration) -> Result<String, TicketingError> {
    let claims = Claims {
        sub: user_id,
        role,
        exp: (Utc::now() + ttl).timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| TicketingError::Internal(format!("token signing failed: {e}")))
}

/// Verifies and decodes a bearer token.
///
/// # Errors
///
/// Returns `Unauthenticated` if the token is malformed, expired, or signed
/// with a different secret.
pub fn verify(secret: &str, token: &str) -> Result<Claims, TicketingError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| TicketingError::Unauthenticated(format!("invalid token: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_claims() {
        let user_id = UserId::new();
        let token = issue("s3cr3t", user_id, Role::Customer, Duration::minutes(5)).unwrap();
        let claims = verify("s3cr3t", &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Customer);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = issue("s3cr3t", UserId::new(), Role::Customer, Duration::minutes(5)).unwrap();
        assert!(verify("other-secret", &token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let token = issue("s3cr3t", UserId::new(), Role::Customer, Duration::seconds(-1)).unwrap();
        assert!(verify("s3cr3t", &token).is_err());
    }
}
