//! # Ticketing Queue Auth
//!
//! Credential storage and bearer-token issuance/verification — the ambient
//! plumbing the concurrency core never touches but the HTTP boundary
//! requires.

pub mod extractor;
pub mod jwt;
pub mod password;

pub use extractor::{AuthRejection, AuthUser, JwtSecret, RequireAdmin};
pub use password::{hash_password, verify_password};
