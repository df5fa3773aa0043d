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

//! Refresh token storage and rotation

use crate::audit::AuditLogger;
use crate::error::{CoreError, CoreResult, bounded};
use crate::token::{AccessTokenManager, TokenPair};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stored refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,

    /// Opaque value handed to the client
    pub token: String,

    pub expiration_date: DateTime<Utc>,

    /// Login key of the owner
    pub subject: String,
}

impl RefreshToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiration_date
    }
}

/// Refresh token storage trait
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn save(&self, token: RefreshToken) -> CoreResult<()>;

    async fn find_by_token(&self, token: &str) -> CoreResult<Option<RefreshToken>>;

    /// Remove this exact token; a no-op if it is already gone or was replaced
    async fn delete(&self, token: &RefreshToken) -> CoreResult<()>;

    /// Remove every token of a subject; returns how many were removed
    async fn delete_by_subject(&self, subject: &str) -> CoreResult<usize>;
}

/// In-memory refresh token store keyed by token value
#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    tokens: DashMap<String, RefreshToken>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn save(&self, token: RefreshToken) -> CoreResult<()> {
        self.tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> CoreResult<Option<RefreshToken>> {
        Ok(self.tokens.get(token).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, token: &RefreshToken) -> CoreResult<()> {
        self.tokens.remove_if(&token.token, |_, stored| stored.id == token.id);
        Ok(())
    }

    async fn delete_by_subject(&self, subject: &str) -> CoreResult<usize> {
        let before = self.tokens.len();
        self.tokens.retain(|_, stored| stored.subject != subject);
        Ok(before.saturating_sub(self.tokens.len()))
    }
}

/// Issues, validates and exchanges refresh tokens
pub struct RefreshTokenService {
    store: Arc<dyn RefreshTokenStore>,
    access_tokens: Arc<AccessTokenManager>,
    audit_logger: Arc<AuditLogger>,
    ttl: Duration,
    store_timeout: std::time::Duration,
    rng: SystemRandom,
}

impl RefreshTokenService {
    pub fn new(
        store: Arc<dyn RefreshTokenStore>,
        access_tokens: Arc<AccessTokenManager>,
        audit_logger: Arc<AuditLogger>,
        ttl: std::time::Duration,
        store_timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            access_tokens,
            audit_logger,
            ttl: Duration::seconds(ttl.as_secs() as i64),
            store_timeout,
            rng: SystemRandom::new(),
        }
    }

    pub async fn issue(&self, subject: &str) -> CoreResult<RefreshToken> {
        self.issue_at(subject, Utc::now()).await
    }

    /// Create and store a token expiring `ttl` after `now`
    pub async fn issue_at(&self, subject: &str, now: DateTime<Utc>) -> CoreResult<RefreshToken> {
        let mut bytes = [0u8; 32];
        self.rng.fill(&mut bytes).map_err(|_| CoreError::Internal {
            message: "Failed to generate refresh token".to_string(),
        })?;

        let token = RefreshToken {
            id: Uuid::new_v4(),
            token: URL_SAFE_NO_PAD.encode(bytes),
            expiration_date: now + self.ttl,
            subject: subject.to_string(),
        };

        bounded("save_refresh_token", self.store_timeout, self.store.save(token.clone())).await?;
        debug!(subject = %subject, expires = %token.expiration_date, "Issued refresh token");

        Ok(token)
    }

    pub async fn validate(&self, token: &str) -> CoreResult<bool> {
        self.validate_at(token, Utc::now()).await
    }

    /// `true` while unexpired. An expired token is deleted and reported as
    /// `false` once; after that it is unknown.
    pub async fn validate_at(&self, token: &str, now: DateTime<Utc>) -> CoreResult<bool> {
        let stored = self.find(token).await?;
        self.check(&stored, now).await
    }

    pub async fn refresh(&self, token: &str) -> CoreResult<TokenPair> {
        self.refresh_at(token, Utc::now()).await
    }

    /// Exchange a live refresh token for a new access token. The refresh
    /// token value itself is returned unchanged.
    pub async fn refresh_at(&self, token: &str, now: DateTime<Utc>) -> CoreResult<TokenPair> {
        let stored = self.find(token).await?;

        if !self.check(&stored, now).await? {
            self.audit_logger.log_token_refresh(&stored.subject, false).await;
            return Err(CoreError::RefreshTokenExpired { token: token.to_string() });
        }

        let access_token = self.access_tokens.issue_at(&stored.subject, now)?;
        info!(subject = %stored.subject, "Refreshed access token");
        self.audit_logger.log_token_refresh(&stored.subject, true).await;

        Ok(TokenPair {
            access_token,
            refresh_token: stored.token,
        })
    }

    /// Drop every refresh token of a subject
    pub async fn revoke_subject(&self, subject: &str) -> CoreResult<usize> {
        let removed = bounded("delete_refresh_tokens", self.store_timeout, self.store.delete_by_subject(subject)).await?;
        if removed > 0 {
            debug!(subject = %subject, removed, "Revoked refresh tokens");
        }
        Ok(removed)
    }

    async fn find(&self, token: &str) -> CoreResult<RefreshToken> {
        bounded("find_refresh_token", self.store_timeout, self.store.find_by_token(token))
            .await?
            .ok_or_else(|| CoreError::RefreshTokenNotFound { token: token.to_string() })
    }

    async fn check(&self, stored: &RefreshToken, now: DateTime<Utc>) -> CoreResult<bool> {
        if stored.is_expired_at(now) {
            bounded("delete_refresh_token", self.store_timeout, self.store.delete(stored)).await?;
            warn!(subject = %stored.subject, expired = %stored.expiration_date, "Refresh token expired");
            self.audit_logger.log_refresh_token_expired(&stored.subject).await;
            return Ok(false);
        }
        Ok(true)
    }
}
