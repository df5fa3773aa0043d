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

//! Configuration management for the HTTP adapter

use std::env;
use std::time::Duration;
use tessera_core::CoreConfig;

/// Configuration for the HTTP adapter
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// JWT secret key for authentication
    pub jwt_secret: String,

    pub access_token_ttl_secs: u64,

    pub refresh_token_ttl_secs: u64,

    pub acl_cache_ttl_secs: u64,

    /// Deadline for each storage call in milliseconds
    pub store_timeout_ms: u64,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            jwt_secret: "default-secret-change-in-production".to_string(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 604_800,
            acl_cache_ttl_secs: 300,
            store_timeout_ms: 2000,
            request_timeout_secs: 30,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_address: env::var("TESSERA_BIND_ADDRESS").unwrap_or(defaults.bind_address),

            jwt_secret: env::var("TESSERA_JWT_SECRET").unwrap_or(defaults.jwt_secret),

            access_token_ttl_secs: parse_var("TESSERA_ACCESS_TOKEN_TTL_SECS", defaults.access_token_ttl_secs),

            refresh_token_ttl_secs: parse_var("TESSERA_REFRESH_TOKEN_TTL_SECS", defaults.refresh_token_ttl_secs),

            acl_cache_ttl_secs: parse_var("TESSERA_ACL_CACHE_TTL_SECS", defaults.acl_cache_ttl_secs),

            store_timeout_ms: parse_var("TESSERA_STORE_TIMEOUT_MS", defaults.store_timeout_ms),

            request_timeout_secs: parse_var("TESSERA_REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),

            max_body_size: parse_var("TESSERA_MAX_BODY_SIZE", defaults.max_body_size),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Settings handed to the core
    pub fn core_config(&self) -> CoreConfig {
        CoreConfig {
            jwt_secret: self.jwt_secret.clone(),
            access_token_ttl: Duration::from_secs(self.access_token_ttl_secs),
            refresh_token_ttl: Duration::from_secs(self.refresh_token_ttl_secs),
            acl_cache_ttl: Duration::from_secs(self.acl_cache_ttl_secs),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            ..CoreConfig::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
