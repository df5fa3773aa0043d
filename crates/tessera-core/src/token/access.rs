// Tessera
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Access token issuance and verification

use crate::error::{CoreError, CoreResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user email)
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Audience
    pub aud: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl Claims {
    pub fn new(subject: impl Into<String>, issuer: &str, audience: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: subject.into(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Valid strictly before `exp`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// Signs and verifies HS256 access tokens
pub struct AccessTokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl AccessTokenManager {
    pub fn new(secret: &str, issuer: &str, audience: &str, ttl: std::time::Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        // Expiry is checked against an explicit clock in `verify_at`
        validation.validate_exp = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            ttl: Duration::seconds(ttl.as_secs() as i64),
        }
    }

    /// Generate a random secret key
    pub fn generate_secret() -> CoreResult<String> {
        let rng = SystemRandom::new();
        let mut secret = vec![0u8; 32];
        rng.fill(&mut secret).map_err(|_| CoreError::Internal {
            message: "Failed to generate random secret".to_string(),
        })?;
        Ok(STANDARD.encode(&secret))
    }

    /// Lifetime of issued tokens in seconds
    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, subject: &str) -> CoreResult<String> {
        self.issue_at(subject, Utc::now())
    }

    pub fn issue_at(&self, subject: &str, now: DateTime<Utc>) -> CoreResult<String> {
        let claims = Claims::new(subject, &self.issuer, &self.audience, now, self.ttl);
        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key).map_err(|e| CoreError::Internal {
            message: format!("Failed to sign access token: {}", e),
        })
    }

    /// Verify a token and return its subject
    pub fn verify(&self, token: &str) -> CoreResult<String> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> CoreResult<String> {
        let claims = self.decode(token)?;

        if claims.is_expired_at(now) {
            debug!(subject = %claims.sub, exp = claims.exp, "Access token expired");
            return Err(CoreError::TokenExpired);
        }

        Ok(claims.sub)
    }

    fn decode(&self, token: &str) -> CoreResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::InvalidToken | JwtErrorKind::Base64(_) | JwtErrorKind::Json(_) | JwtErrorKind::Utf8(_) => CoreError::MalformedToken { message: e.to_string() },
                _ => CoreError::InvalidToken { message: e.to_string() },
            })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer(auth_header: &str) -> CoreResult<&str> {
    match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(CoreError::InvalidToken {
            message: "Invalid authorization header format".to_string(),
        }),
    }
}
