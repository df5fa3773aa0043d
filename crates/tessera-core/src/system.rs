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

//! Wiring of every core component over in-memory stores

use crate::acl::{AclCache, AclService, MemoryAclStore, PermissionEvaluator, RowLocks};
use crate::audit::AuditLogger;
use crate::auth::AuthService;
use crate::config::CoreConfig;
use crate::token::{AccessTokenManager, MemoryRefreshTokenStore, RefreshTokenService};
use crate::user::{MemoryUserStore, UserStore};
use crate::workspace::{MemoryWorkspaceStore, WorkspaceService};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Coordinates all components; cheap to clone
#[derive(Clone)]
pub struct TesseraSystem {
    pub acl_service: AclService,
    pub evaluator: PermissionEvaluator,
    pub auth: Arc<AuthService>,
    pub workspaces: Arc<WorkspaceService>,
    pub users: Arc<dyn UserStore>,
    pub audit_logger: Arc<AuditLogger>,
    pub acl_cache: Arc<AclCache>,
}

impl TesseraSystem {
    pub fn new(config: &CoreConfig) -> Self {
        let audit_logger = Arc::new(AuditLogger::with_max_events(config.audit_max_events));
        let acl_store = Arc::new(MemoryAclStore::new());
        let acl_cache = Arc::new(AclCache::new(config.acl_cache_ttl));
        let row_locks = Arc::new(RowLocks::new());

        let acl_service = AclService::new(acl_store.clone(), acl_cache.clone(), row_locks.clone(), audit_logger.clone(), config.store_timeout);
        let evaluator = PermissionEvaluator::new(acl_store, acl_cache.clone(), row_locks, audit_logger.clone(), config.store_timeout);

        let access_tokens = Arc::new(AccessTokenManager::new(&config.jwt_secret, &config.jwt_issuer, &config.jwt_audience, config.access_token_ttl));
        let refresh_tokens = Arc::new(RefreshTokenService::new(
            Arc::new(MemoryRefreshTokenStore::new()),
            access_tokens.clone(),
            audit_logger.clone(),
            config.refresh_token_ttl,
            config.store_timeout,
        ));

        let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        let auth = Arc::new(AuthService::new(users.clone(), access_tokens, refresh_tokens, audit_logger.clone(), config.store_timeout));
        let workspaces = Arc::new(WorkspaceService::new(
            Arc::new(MemoryWorkspaceStore::new()),
            users.clone(),
            acl_service.clone(),
            evaluator.clone(),
            config.store_timeout,
        ));

        Self {
            acl_service,
            evaluator,
            auth,
            workspaces,
            users,
            audit_logger,
            acl_cache,
        }
    }

    /// Build the system and start the ACL cache sweeper
    pub fn initialize(config: &CoreConfig) -> Self {
        let system = Self::new(config);
        // A zero interval would panic inside tokio
        let sweep_interval = config.acl_cache_ttl.max(Duration::from_secs(1));
        let _cleanup_task = AclCache::start_cleanup_task(system.acl_cache.clone(), sweep_interval);
        info!("Tessera core initialized");
        system
    }
}
