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

//! ACL lifecycle and entry mutation

use crate::acl::{AccessControlList, AclCache, AclStore, ObjectIdentity, RowLocks, Sid};
use crate::audit::AuditLogger;
use crate::error::{CoreError, CoreResult, bounded};
use crate::permission::Permission;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Owns every change to ACL entries.
///
/// Each mutation is one transaction: take the identity's write lock, read the
/// stored ACL, change a private copy, persist it, replace the cached copy,
/// release. A failure at any step leaves the stored list untouched.
#[derive(Clone)]
pub struct AclService {
    store: Arc<dyn AclStore>,
    cache: Arc<AclCache>,
    locks: Arc<RowLocks>,
    audit_logger: Arc<AuditLogger>,
    store_timeout: Duration,
}

impl AclService {
    pub fn new(store: Arc<dyn AclStore>, cache: Arc<AclCache>, locks: Arc<RowLocks>, audit_logger: Arc<AuditLogger>, store_timeout: Duration) -> Self {
        Self {
            store,
            cache,
            locks,
            audit_logger,
            store_timeout,
        }
    }

    /// Create an ACL whose owner holds every permission.
    ///
    /// Owner entries occupy indices 0..5 in the order READ, CREATE, WRITE,
    /// DELETE, ADMINISTRATION.
    pub async fn create_acl_with_owner_grants(&self, identity: &ObjectIdentity, owner: &Sid) -> CoreResult<AccessControlList> {
        let _guard = self.locks.write(identity).await;

        let mut acl = bounded("create_acl", self.store_timeout, self.store.create(identity)).await?;
        acl.set_owner(owner.clone());
        for permission in Permission::OWNER_DEFAULTS {
            acl.push_ace(owner.clone(), permission, true);
        }

        if let Err(e) = bounded("update_acl", self.store_timeout, self.store.update(&acl)).await {
            // The empty row must not outlive a failed initialisation
            if let Err(rollback) = bounded("delete_acl", self.store_timeout, self.store.delete(identity)).await {
                error!(identity = %identity, error = %rollback, "Failed to remove ACL after owner grants failed; it will block re-creation");
            }
            self.cache.invalidate(identity).await;
            return Err(e);
        }
        self.cache.put(acl.clone()).await;

        info!(identity = %identity, owner = %owner, "Created ACL with owner grants");
        self.audit_logger.log_acl_created(&identity.to_string(), owner.key()).await;

        Ok(acl)
    }

    /// Current ACL for an identity
    pub async fn read_acl(&self, identity: &ObjectIdentity) -> CoreResult<AccessControlList> {
        if let Some(acl) = self.cache.get(identity).await {
            return Ok(acl);
        }

        let _guard = self.locks.read(identity).await;
        let acl = bounded("read_acl", self.store_timeout, self.store.read_by_id(identity)).await?;
        self.cache.put(acl.clone()).await;
        Ok(acl)
    }

    /// Append a granting entry for every named permission the sid has no entry for yet
    pub async fn grant<S: AsRef<str>>(&self, identity: &ObjectIdentity, sid: &Sid, permissions: &[S]) -> CoreResult<()> {
        let requested = Permission::parse_all(permissions)?;

        let appended = self
            .transaction(identity, |acl| {
                let mut appended = 0;
                for permission in &requested {
                    if !acl.holds(sid, *permission) {
                        acl.push_ace(sid.clone(), *permission, true);
                        appended += 1;
                    }
                }
                Ok(appended)
            })
            .await?;

        debug!(identity = %identity, sid = %sid, appended, "Granted permissions");
        self.audit_logger
            .log_permissions_granted(&identity.to_string(), &sid.to_string(), &describe(&requested), appended)
            .await;

        Ok(())
    }

    /// Remove every entry of the sid carrying one of the named permissions
    pub async fn revoke<S: AsRef<str>>(&self, identity: &ObjectIdentity, sid: &Sid, permissions: &[S]) -> CoreResult<()> {
        let requested = Permission::parse_all(permissions)?;

        let removed = self
            .transaction(identity, |acl| Ok(acl.retain_entries(|entry| !(&entry.sid == sid && requested.contains(&entry.permission)))))
            .await?;

        debug!(identity = %identity, sid = %sid, removed, "Revoked permissions");
        self.audit_logger
            .log_permissions_revoked(&identity.to_string(), &sid.to_string(), &describe(&requested), removed)
            .await;

        Ok(())
    }

    /// Insert one entry at a position, shifting later entries up
    pub async fn insert_ace(&self, identity: &ObjectIdentity, index: usize, sid: &Sid, permission: Permission, granting: bool) -> CoreResult<()> {
        self.transaction(identity, |acl| acl.insert_ace(index, sid.clone(), permission, granting)).await?;

        self.audit_logger
            .log_entry_inserted(&identity.to_string(), &sid.to_string(), permission.name(), index)
            .await;

        Ok(())
    }

    /// Delete the entry at a position, shifting later entries down
    pub async fn delete_ace(&self, identity: &ObjectIdentity, index: usize) -> CoreResult<()> {
        let removed = self.transaction(identity, |acl| acl.delete_ace(index)).await?;

        self.audit_logger
            .log_entry_deleted(&identity.to_string(), &removed.sid.to_string(), removed.permission.name(), index)
            .await;
        Ok(())
    }

    /// Insert several entries at the head of the list in one transaction.
    /// Each entry goes to index 0, so the last one given ends up first.
    pub async fn prepend_aces(&self, identity: &ObjectIdentity, sids: &[Sid], permission: Permission, granting: bool) -> CoreResult<()> {
        self.transaction(identity, |acl| {
            for sid in sids {
                acl.insert_ace(0, sid.clone(), permission, granting)?;
            }
            Ok(())
        })
        .await?;

        for sid in sids {
            self.audit_logger.log_entry_inserted(&identity.to_string(), &sid.to_string(), permission.name(), 0).await;
        }

        Ok(())
    }

    /// Remove all entries of a sid
    pub async fn remove_sid(&self, identity: &ObjectIdentity, sid: &Sid) -> CoreResult<()> {
        let removed = self.transaction(identity, |acl| Ok(acl.retain_entries(|entry| &entry.sid != sid))).await?;

        self.audit_logger.log_sid_removed(&identity.to_string(), &sid.to_string(), removed).await;
        Ok(())
    }

    /// Point an ACL at a parent for inherited checks
    pub async fn set_parent(&self, identity: &ObjectIdentity, parent: Option<ObjectIdentity>, entries_inheriting: bool) -> CoreResult<()> {
        self.transaction(identity, |acl| {
            acl.set_parent(parent);
            acl.set_entries_inheriting(entries_inheriting);
            Ok(())
        })
        .await
    }

    /// Remove an ACL together with its cached copy
    pub async fn delete_acl(&self, identity: &ObjectIdentity) -> CoreResult<()> {
        let result = {
            let _guard = self.locks.write(identity).await;
            let result = bounded("delete_acl", self.store_timeout, self.store.delete(identity)).await;
            self.cache.invalidate(identity).await;
            result
        };
        self.locks.release(identity);
        result?;

        self.audit_logger.log_acl_deleted(&identity.to_string()).await;
        Ok(())
    }

    async fn transaction<R, F>(&self, identity: &ObjectIdentity, mutate: F) -> CoreResult<R>
    where
        F: FnOnce(&mut AccessControlList) -> CoreResult<R>,
    {
        let _guard = self.locks.write(identity).await;

        let mut acl = match bounded("read_acl", self.store_timeout, self.store.read_by_id(identity)).await {
            Ok(acl) => acl,
            Err(CoreError::AclNotFound { identity }) => {
                return Err(CoreError::ResourceNotFound {
                    message: format!("No ACL registered for {}", identity),
                });
            }
            Err(e) => return Err(e),
        };

        let result = mutate(&mut acl)?;

        if let Err(e) = bounded("update_acl", self.store_timeout, self.store.update(&acl)).await {
            // Whether the write landed is unknown; force the next read to the store
            self.cache.invalidate(identity).await;
            return Err(e);
        }
        self.cache.put(acl).await;

        Ok(result)
    }
}

fn describe(permissions: &[Permission]) -> String {
    permissions.iter().map(|p| p.name()).collect::<Vec<_>>().join(",")
}
