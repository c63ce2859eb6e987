// ============================
// backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod context;
pub mod password;
pub mod token;

pub use context::AuthContext;
pub use password::CredentialHasher;
pub use token::{Claims, TokenError, TokenKind, TokenService};
