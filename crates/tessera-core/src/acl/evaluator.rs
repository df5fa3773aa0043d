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

//! Permission evaluation over ordered ACL entries
//!
//! Entries are scanned in ascending index order and the first entry that
//! applies to the caller and intersects the requested mask decides the
//! outcome through its `granting` flag. Later entries never override an
//! earlier one. With no match the parent ACL is consulted (when the ACL
//! inherits), and the final fallback is deny.

use crate::acl::{AccessControlList, AclCache, AclStore, ObjectIdentity, Principal, RowLocks};
use crate::audit::AuditLogger;
use crate::error::{CoreError, CoreResult, bounded};
use crate::permission::Permission;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Decides whether a principal holds a permission on an object
#[derive(Clone)]
pub struct PermissionEvaluator {
    store: Arc<dyn AclStore>,
    cache: Arc<AclCache>,
    locks: Arc<RowLocks>,
    audit_logger: Arc<AuditLogger>,
    store_timeout: Duration,
}

impl PermissionEvaluator {
    pub fn new(store: Arc<dyn AclStore>, cache: Arc<AclCache>, locks: Arc<RowLocks>, audit_logger: Arc<AuditLogger>, store_timeout: Duration) -> Self {
        Self {
            store,
            cache,
            locks,
            audit_logger,
            store_timeout,
        }
    }

    /// Check a permission, following the parent chain when nothing matches
    pub async fn has_permission(&self, principal: &Principal, identity: &ObjectIdentity, permission: Permission) -> CoreResult<bool> {
        let mut visited = HashSet::new();
        let mut current = Some(identity.clone());
        let mut granted = false;

        while let Some(next) = current.take() {
            if !visited.insert(next.clone()) {
                debug!(identity = %next, "ACL parent cycle detected, denying");
                break;
            }

            let Some(acl) = self.load(&next).await? else {
                debug!(identity = %next, "No ACL registered, denying");
                break;
            };

            if let Some(entry) = acl.first_match(principal, permission) {
                debug!(identity = %next, index = entry.index, granting = entry.granting, "ACL entry matched");
                granted = entry.granting;
                break;
            }

            if acl.is_entries_inheriting() {
                current = acl.parent().cloned();
            }
        }

        self.audit_logger
            .log_permission_check(principal.name(), &identity.to_string(), &permission.to_string(), granted)
            .await;

        Ok(granted)
    }

    /// Check a permission given by name, as received at an API boundary
    pub async fn has_permission_by_name(&self, principal: &Principal, identity: &ObjectIdentity, permission: &str) -> CoreResult<bool> {
        let permission = Permission::from_name(permission)?;
        self.has_permission(principal, identity, permission).await
    }

    /// Cache first, then the store under a shared row lock
    async fn load(&self, identity: &ObjectIdentity) -> CoreResult<Option<AccessControlList>> {
        if let Some(acl) = self.cache.get(identity).await {
            return Ok(Some(acl));
        }

        let _guard = self.locks.read(identity).await;
        match bounded("read_acl", self.store_timeout, self.store.read_by_id(identity)).await {
            Ok(acl) => {
                self.cache.put(acl.clone()).await;
                Ok(Some(acl))
            }
            Err(CoreError::AclNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
