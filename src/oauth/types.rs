//! OAuth 2 client and token records.
//!
//! A [`Token`] carries exactly one grant: either an authorization code, or an
//! access token with an optional refresh token. The storage layer flattens the
//! grant into separately indexed key fields and rebuilds it from the payload.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OAuth client registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClient {
    /// Unique client identifier
    pub id: String,
    /// Client secret
    pub secret: String,
    /// Redirect domain registered for the client
    pub domain: String,
    /// Owning user, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Client metadata
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl OAuthClient {
    pub fn new(
        id: impl Into<String>,
        secret: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            domain: domain.into(),
            user_id: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// A credential value together with its issue time and lifetime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCredential {
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub expires_in: Duration,
}

impl IssuedCredential {
    pub fn new(value: impl Into<String>, created_at: DateTime<Utc>, expires_in: Duration) -> Self {
        Self {
            value: value.into(),
            created_at,
            expires_in,
        }
    }

    /// Expiration instant, or `None` when the lifetime overflows the calendar.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let lifetime = TimeDelta::from_std(self.expires_in).ok()?;
        self.created_at.checked_add_signed(lifetime)
    }
}

/// The grant a token record was issued for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "grant", rename_all = "snake_case")]
pub enum TokenGrant {
    /// Authorization code awaiting exchange
    Code {
        code: IssuedCredential,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code_challenge: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code_challenge_method: Option<String>,
    },
    /// Access token, optionally paired with a refresh token
    Tokens {
        access: IssuedCredential,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        refresh: Option<IssuedCredential>,
    },
}

/// OAuth token record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub grant: TokenGrant,
}

impl Token {
    /// Record for an issued authorization code
    pub fn code_grant(
        client_id: impl Into<String>,
        code: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_in: Duration,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            user_id: None,
            redirect_uri: None,
            scope: None,
            grant: TokenGrant::Code {
                code: IssuedCredential::new(code, created_at, expires_in),
                code_challenge: None,
                code_challenge_method: None,
            },
        }
    }

    /// Record for an issued access token
    pub fn token_grant(
        client_id: impl Into<String>,
        access: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_in: Duration,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            user_id: None,
            redirect_uri: None,
            scope: None,
            grant: TokenGrant::Tokens {
                access: IssuedCredential::new(access, created_at, expires_in),
                refresh: None,
            },
        }
    }

    /// Attach a refresh token. Has no effect on code grants.
    pub fn with_refresh(
        mut self,
        refresh: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_in: Duration,
    ) -> Self {
        if let TokenGrant::Tokens { refresh: slot, .. } = &mut self.grant {
            *slot = Some(IssuedCredential::new(refresh, created_at, expires_in));
        }
        self
    }

    /// Attach a PKCE challenge. Has no effect on token grants.
    pub fn with_code_challenge(
        mut self,
        challenge: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        if let TokenGrant::Code {
            code_challenge,
            code_challenge_method,
            ..
        } = &mut self.grant
        {
            *code_challenge = Some(challenge.into());
            *code_challenge_method = Some(method.into());
        }
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn code(&self) -> Option<&str> {
        match &self.grant {
            TokenGrant::Code { code, .. } => Some(code.value.as_str()),
            TokenGrant::Tokens { .. } => None,
        }
    }

    pub fn access(&self) -> Option<&str> {
        match &self.grant {
            TokenGrant::Tokens { access, .. } => Some(access.value.as_str()),
            TokenGrant::Code { .. } => None,
        }
    }

    pub fn refresh(&self) -> Option<&str> {
        match &self.grant {
            TokenGrant::Tokens {
                refresh: Some(refresh),
                ..
            } => Some(refresh.value.as_str()),
            _ => None,
        }
    }

    /// The credential whose lifetime bounds the whole record: the code for
    /// code grants, otherwise the refresh token when present, else the access token.
    pub fn authoritative_credential(&self) -> &IssuedCredential {
        match &self.grant {
            TokenGrant::Code { code, .. } => code,
            TokenGrant::Tokens {
                refresh: Some(refresh),
                ..
            } => refresh,
            TokenGrant::Tokens { access, .. } => access,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.authoritative_credential().expires_at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_grant_accessors() {
        let now = Utc::now();
        let token = Token::code_grant("client", "abc123", now, Duration::from_secs(60))
            .with_code_challenge("challenge", "S256");

        assert_eq!(token.code(), Some("abc123"));
        assert_eq!(token.access(), None);
        assert_eq!(token.refresh(), None);
        assert_eq!(token.expires_at(), Some(now + TimeDelta::seconds(60)));
    }

    #[test]
    fn test_refresh_is_authoritative_when_present() {
        let now = Utc::now();
        let token = Token::token_grant("client", "tok1", now, Duration::from_secs(3600))
            .with_refresh("ref1", now, Duration::from_secs(86400));

        assert_eq!(token.access(), Some("tok1"));
        assert_eq!(token.refresh(), Some("ref1"));
        assert_eq!(token.authoritative_credential().value, "ref1");
        assert_eq!(token.expires_at(), Some(now + TimeDelta::days(1)));
    }

    #[test]
    fn test_with_refresh_ignored_for_code_grant() {
        let now = Utc::now();
        let token = Token::code_grant("client", "abc", now, Duration::from_secs(60)).with_refresh(
            "ref",
            now,
            Duration::from_secs(60),
        );
        assert_eq!(token.refresh(), None);
    }

    #[test]
    fn test_expires_at_overflow() {
        let credential =
            IssuedCredential::new("x", DateTime::<Utc>::MAX_UTC, Duration::from_secs(1));
        assert_eq!(credential.expires_at(), None);
    }

    #[test]
    fn test_token_json_shape() {
        let now = Utc::now();
        let token = Token::token_grant("client", "tok1", now, Duration::from_secs(60))
            .with_scope("read write");
        let json = serde_json::to_value(&token).unwrap();

        assert_eq!(json["grant"], "tokens");
        assert_eq!(json["access"]["value"], "tok1");
        assert_eq!(json["scope"], "read write");
        assert!(json.get("refresh").is_none());

        let parsed: Token = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, token);
    }
}
