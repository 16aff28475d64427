//! OAuth 2 domain records.

pub mod types;

#[cfg(test)]
pub mod time_tests;

pub use types::{IssuedCredential, OAuthClient, Token, TokenGrant};
