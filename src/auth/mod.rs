//! Credentials and identity: token claims, the token issuer, password
//! hashing and the per-request authenticated context.

pub mod claims;
pub mod context;
pub mod password;
pub mod token;

pub use claims::{AccessClaims, RefreshClaims};
pub use context::AuthContext;
pub use password::{hash_password, verify_password, verify_password_or_dummy, PasswordError};
pub use token::{TokenError, TokenIssuer, TokenPair};
