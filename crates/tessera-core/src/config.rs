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

//! Settings consumed by the core services

use std::time::Duration;

/// Configuration for the permission engine and token core
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// HMAC secret for access tokens
    pub jwt_secret: String,

    /// `iss` claim written and required on access tokens
    pub jwt_issuer: String,

    /// `aud` claim written and required on access tokens
    pub jwt_audience: String,

    pub access_token_ttl: Duration,

    pub refresh_token_ttl: Duration,

    /// How long an ACL may stay cached without being rewritten
    pub acl_cache_ttl: Duration,

    /// Deadline for every storage call
    pub store_timeout: Duration,

    /// Retained audit events
    pub audit_max_events: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "default-secret-change-in-production".to_string(),
            jwt_issuer: "tessera".to_string(),
            jwt_audience: "tessera-api".to_string(),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            acl_cache_ttl: Duration::from_secs(300),
            store_timeout: Duration::from_millis(2000),
            audit_max_events: 10_000,
        }
    }
}
