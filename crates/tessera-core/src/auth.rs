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

//! Registration, login and token exchange

use crate::acl::Principal;
use crate::audit::AuditLogger;
use crate::error::{CoreError, CoreResult, bounded};
use crate::token::{AccessTokenManager, RefreshTokenService, TokenPair, extract_bearer};
use crate::user::{DEFAULT_ROLE, NewUser, User, UserStore, UserSummary};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Registration input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserStore>,
    access_tokens: Arc<AccessTokenManager>,
    refresh_tokens: Arc<RefreshTokenService>,
    audit_logger: Arc<AuditLogger>,
    store_timeout: Duration,
    rng: SystemRandom,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        access_tokens: Arc<AccessTokenManager>,
        refresh_tokens: Arc<RefreshTokenService>,
        audit_logger: Arc<AuditLogger>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            users,
            access_tokens,
            refresh_tokens,
            audit_logger,
            store_timeout,
            rng: SystemRandom::new(),
        }
    }

    /// Create an account with the default role
    pub async fn register(&self, request: RegisterRequest) -> CoreResult<UserSummary> {
        let email = request.email.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(CoreError::InvalidInput {
                message: "A valid email is required".to_string(),
            });
        }
        if request.password.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "Password must not be empty".to_string(),
            });
        }

        let password_hash = self.hash_password(&request.password)?;
        let user = bounded(
            "create_user",
            self.store_timeout,
            self.users.create_user(NewUser {
                email,
                first_name: request.first_name,
                last_name: request.last_name,
                password_hash,
                roles: vec![DEFAULT_ROLE.to_string()],
            }),
        )
        .await?;

        info!(user_id = user.id, email = %user.email, "Registered user");
        Ok(UserSummary::from(&user))
    }

    /// Verify credentials and hand out a fresh token pair
    pub async fn login(&self, email: &str, password: &str) -> CoreResult<TokenPair> {
        let email = email.trim();
        let user = bounded("get_user", self.store_timeout, self.users.get_user_by_email(email)).await?;

        let Some(user) = user.filter(|user| verify_password(password, &user.password_hash)) else {
            warn!(email = %email, "Failed login attempt");
            self.audit_logger.log_authentication_attempt(email, false).await;
            return Err(CoreError::InvalidCredentials);
        };

        let access_token = self.access_tokens.issue(&user.email)?;
        self.refresh_tokens.revoke_subject(&user.email).await?;
        let refresh_token = self.refresh_tokens.issue(&user.email).await?;

        info!(user_id = user.id, "User logged in");
        self.audit_logger.log_authentication_attempt(&user.email, true).await;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.token,
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> CoreResult<TokenPair> {
        self.refresh_tokens.refresh(refresh_token).await
    }

    /// Resolve an `Authorization` header value into the calling principal
    pub async fn authenticate(&self, auth_header: &str) -> CoreResult<Principal> {
        let token = extract_bearer(auth_header)?;
        let subject = self.access_tokens.verify(token)?;

        let user = bounded("get_user", self.store_timeout, self.users.get_user_by_email(&subject))
            .await?
            .ok_or_else(|| CoreError::InvalidToken {
                message: "Token subject no longer exists".to_string(),
            })?;

        Ok(principal_for(&user))
    }

    fn hash_password(&self, password: &str) -> CoreResult<String> {
        let mut salt = [0u8; 16];
        self.rng.fill(&mut salt).map_err(|_| CoreError::Internal {
            message: "Failed to generate password salt".to_string(),
        })?;
        let salt = SaltString::encode_b64(&salt).map_err(|e| CoreError::Internal {
            message: format!("Failed to encode password salt: {}", e),
        })?;

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CoreError::Internal {
                message: format!("Failed to hash password: {}", e),
            })
    }
}

/// Principal for a user: its email plus one authority per role
pub fn principal_for(user: &User) -> Principal {
    Principal::new(user.email.clone()).with_authorities(user.roles.iter().cloned())
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}
