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

//! ACL persistence

use crate::acl::{AccessControlList, ObjectIdentity};
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

/// ACL storage trait
#[async_trait]
pub trait AclStore: Send + Sync {
    /// Create an empty ACL; fails if one already exists for the identity
    async fn create(&self, identity: &ObjectIdentity) -> CoreResult<AccessControlList>;

    /// Load an ACL with its entries in index order
    async fn read_by_id(&self, identity: &ObjectIdentity) -> CoreResult<AccessControlList>;

    /// Replace the stored entry list in one write
    async fn update(&self, acl: &AccessControlList) -> CoreResult<()>;

    /// Remove an ACL
    async fn delete(&self, identity: &ObjectIdentity) -> CoreResult<()>;
}

/// In-memory ACL store
#[derive(Debug, Default)]
pub struct MemoryAclStore {
    acls: DashMap<ObjectIdentity, AccessControlList>,
}

impl MemoryAclStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored ACLs
    pub fn len(&self) -> usize {
        self.acls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.acls.is_empty()
    }
}

#[async_trait]
impl AclStore for MemoryAclStore {
    async fn create(&self, identity: &ObjectIdentity) -> CoreResult<AccessControlList> {
        match self.acls.entry(identity.clone()) {
            Entry::Occupied(_) => Err(CoreError::AclAlreadyExists { identity: identity.clone() }),
            Entry::Vacant(vacant) => {
                let acl = AccessControlList::new(identity.clone());
                vacant.insert(acl.clone());
                debug!(identity = %identity, "Created ACL");
                Ok(acl)
            }
        }
    }

    async fn read_by_id(&self, identity: &ObjectIdentity) -> CoreResult<AccessControlList> {
        self.acls
            .get(identity)
            .map(|acl| acl.value().clone())
            .ok_or_else(|| CoreError::AclNotFound { identity: identity.clone() })
    }

    async fn update(&self, acl: &AccessControlList) -> CoreResult<()> {
        match self.acls.get_mut(acl.identity()) {
            Some(mut stored) => {
                *stored = acl.clone();
                debug!(identity = %acl.identity(), entries = acl.len(), "Updated ACL");
                Ok(())
            }
            None => Err(CoreError::AclNotFound { identity: acl.identity().clone() }),
        }
    }

    async fn delete(&self, identity: &ObjectIdentity) -> CoreResult<()> {
        self.acls
            .remove(identity)
            .map(|_| ())
            .ok_or_else(|| CoreError::AclNotFound { identity: identity.clone() })
    }
}

/// Per-identity locks serializing ACL transactions.
///
/// Mutations hold the write half across read, update and cache replacement.
/// Cache fills hold the read half so a fill can never interleave with a write.
#[derive(Debug, Default)]
pub struct RowLocks {
    locks: DashMap<ObjectIdentity, Arc<RwLock<()>>>,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, identity: &ObjectIdentity) -> Arc<RwLock<()>> {
        self.locks.entry(identity.clone()).or_default().clone()
    }

    /// Exclusive lock for a read-modify-write transaction
    pub async fn write(&self, identity: &ObjectIdentity) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(identity).write_owned().await
    }

    /// Shared lock for readers that populate the cache
    pub async fn read(&self, identity: &ObjectIdentity) -> OwnedRwLockReadGuard<()> {
        self.lock_for(identity).read_owned().await
    }

    /// Forget the lock of an identity nobody holds or waits on.
    ///
    /// Holders and waiters keep a clone of the `Arc`, so a lock in use is
    /// never dropped from under them.
    pub fn release(&self, identity: &ObjectIdentity) {
        self.locks.remove_if(identity, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of identities with a live lock
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Memory store whose writes can be switched to fail or hang
    #[derive(Debug, Default)]
    pub(crate) struct FlakyAclStore {
        inner: MemoryAclStore,
        pub(crate) fail_updates: AtomicBool,
        pub(crate) stall_updates: AtomicBool,
        pub(crate) fail_deletes: AtomicBool,
    }

    impl FlakyAclStore {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn set(flag: &AtomicBool, on: bool) {
            flag.store(on, Ordering::SeqCst);
        }
    }

    fn rejected(operation: &str) -> CoreError {
        CoreError::Internal {
            message: format!("{} rejected by store", operation),
        }
    }

    #[async_trait]
    impl AclStore for FlakyAclStore {
        async fn create(&self, identity: &ObjectIdentity) -> CoreResult<AccessControlList> {
            self.inner.create(identity).await
        }

        async fn read_by_id(&self, identity: &ObjectIdentity) -> CoreResult<AccessControlList> {
            self.inner.read_by_id(identity).await
        }

        async fn update(&self, acl: &AccessControlList) -> CoreResult<()> {
            if self.stall_updates.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(rejected("update"));
            }
            self.inner.update(acl).await
        }

        async fn delete(&self, identity: &ObjectIdentity) -> CoreResult<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(rejected("delete"));
            }
            self.inner.delete(identity).await
        }
    }
}
