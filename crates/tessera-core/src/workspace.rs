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

//! Workspaces: the protected resources ACLs are attached to

use crate::acl::{AclService, ObjectIdentity, PermissionEvaluator, Principal, RowLocks, Sid};
use crate::error::{CoreError, CoreResult, bounded};
use crate::permission::Permission;
use crate::user::{User, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{error, info};

/// Shared workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,

    /// Login key of the creator
    pub owner: String,

    /// Ids of users added as members
    pub members: BTreeSet<u64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    pub fn identity(&self) -> ObjectIdentity {
        ObjectIdentity::workspace(self.id)
    }
}

/// Fields supplied when creating a workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update; absent fields are left as they are
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspacePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Workspace storage trait
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    async fn insert(&self, owner: &str, draft: WorkspaceDraft) -> CoreResult<Workspace>;

    async fn get(&self, id: u64) -> CoreResult<Option<Workspace>>;

    async fn list(&self) -> CoreResult<Vec<Workspace>>;

    /// Replace a stored workspace
    async fn save(&self, workspace: Workspace) -> CoreResult<()>;

    async fn remove(&self, id: u64) -> CoreResult<Option<Workspace>>;
}

/// In-memory workspace store
#[derive(Debug)]
pub struct MemoryWorkspaceStore {
    workspaces: DashMap<u64, Workspace>,
    next_id: AtomicU64,
}

impl MemoryWorkspaceStore {
    pub fn new() -> Self {
        Self {
            workspaces: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryWorkspaceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkspaceStore for MemoryWorkspaceStore {
    async fn insert(&self, owner: &str, draft: WorkspaceDraft) -> CoreResult<Workspace> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let workspace = Workspace {
            id,
            name: draft.name,
            description: draft.description,
            owner: owner.to_string(),
            members: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        self.workspaces.insert(id, workspace.clone());
        Ok(workspace)
    }

    async fn get(&self, id: u64) -> CoreResult<Option<Workspace>> {
        Ok(self.workspaces.get(&id).map(|w| w.value().clone()))
    }

    async fn list(&self) -> CoreResult<Vec<Workspace>> {
        let mut all: Vec<Workspace> = self.workspaces.iter().map(|w| w.value().clone()).collect();
        all.sort_by_key(|w| w.id);
        Ok(all)
    }

    async fn save(&self, workspace: Workspace) -> CoreResult<()> {
        match self.workspaces.get_mut(&workspace.id) {
            Some(mut stored) => {
                *stored = workspace;
                Ok(())
            }
            None => Err(workspace_not_found(workspace.id)),
        }
    }

    async fn remove(&self, id: u64) -> CoreResult<Option<Workspace>> {
        Ok(self.workspaces.remove(&id).map(|(_, w)| w))
    }
}

fn workspace_not_found(id: u64) -> CoreError {
    CoreError::ResourceNotFound {
        message: format!("Workspace with {} ID was not found", id),
    }
}

fn user_not_found(id: u64) -> CoreError {
    CoreError::ResourceNotFound {
        message: format!("User with {} ID was not found", id),
    }
}

/// Workspace lifecycle, membership and per-user permissions
pub struct WorkspaceService {
    workspaces: Arc<dyn WorkspaceStore>,
    users: Arc<dyn UserStore>,
    acl_service: AclService,
    evaluator: PermissionEvaluator,
    /// Serializes membership changes; separate from the ACL row locks
    membership_locks: RowLocks,
    store_timeout: Duration,
}

impl WorkspaceService {
    pub fn new(
        workspaces: Arc<dyn WorkspaceStore>,
        users: Arc<dyn UserStore>,
        acl_service: AclService,
        evaluator: PermissionEvaluator,
        store_timeout: Duration,
    ) -> Self {
        Self {
            workspaces,
            users,
            acl_service,
            evaluator,
            membership_locks: RowLocks::new(),
            store_timeout,
        }
    }

    /// Store a workspace and give its creator every permission on it
    pub async fn create(&self, owner: &Principal, draft: WorkspaceDraft) -> CoreResult<Workspace> {
        if draft.name.trim().is_empty() {
            return Err(CoreError::InvalidInput {
                message: "Workspace name must not be empty".to_string(),
            });
        }

        let workspace = bounded("insert_workspace", self.store_timeout, self.workspaces.insert(owner.name(), draft)).await?;

        if let Err(e) = self.acl_service.create_acl_with_owner_grants(&workspace.identity(), owner.sid()).await {
            error!(workspace_id = workspace.id, error = %e, "ACL creation failed, rolling back workspace");
            bounded("remove_workspace", self.store_timeout, self.workspaces.remove(workspace.id)).await?;
            return Err(e);
        }

        info!(workspace_id = workspace.id, owner = %owner.name(), "Created workspace");
        Ok(workspace)
    }

    pub async fn find_by_id(&self, id: u64) -> CoreResult<Workspace> {
        bounded("get_workspace", self.store_timeout, self.workspaces.get(id))
            .await?
            .ok_or_else(|| workspace_not_found(id))
    }

    /// Every workspace the principal may READ
    pub async fn list_readable(&self, principal: &Principal) -> CoreResult<Vec<Workspace>> {
        let all = bounded("list_workspaces", self.store_timeout, self.workspaces.list()).await?;

        let mut readable = Vec::with_capacity(all.len());
        for workspace in all {
            if self.evaluator.has_permission(principal, &workspace.identity(), Permission::READ).await? {
                readable.push(workspace);
            }
        }
        Ok(readable)
    }

    pub async fn update(&self, id: u64, patch: WorkspacePatch) -> CoreResult<Workspace> {
        let _guard = self.membership_locks.write(&ObjectIdentity::workspace(id)).await;
        let mut workspace = self.find_by_id(id).await?;

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(CoreError::InvalidInput {
                    message: "Workspace name must not be empty".to_string(),
                });
            }
            workspace.name = name;
        }
        if let Some(description) = patch.description {
            workspace.description = Some(description);
        }
        workspace.updated_at = Utc::now();

        bounded("save_workspace", self.store_timeout, self.workspaces.save(workspace.clone())).await?;
        Ok(workspace)
    }

    /// Remove a workspace and its ACL; returns the removed workspace.
    ///
    /// The ACL goes first. If that fails the workspace row is kept and the
    /// delete can be retried; a row without an ACL denies everyone.
    pub async fn delete(&self, id: u64) -> CoreResult<Workspace> {
        let identity = ObjectIdentity::workspace(id);
        let result = {
            let _guard = self.membership_locks.write(&identity).await;
            self.delete_locked(id, &identity).await
        };
        self.membership_locks.release(&identity);
        let workspace = result?;

        info!(workspace_id = id, "Deleted workspace");
        Ok(workspace)
    }

    async fn delete_locked(&self, id: u64, identity: &ObjectIdentity) -> CoreResult<Workspace> {
        self.find_by_id(id).await?;

        match self.acl_service.delete_acl(identity).await {
            Ok(()) | Err(CoreError::AclNotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        bounded("remove_workspace", self.store_timeout, self.workspaces.remove(id))
            .await?
            .ok_or_else(|| workspace_not_found(id))
    }

    /// Add users as members with READ access.
    ///
    /// All users must exist before anything changes. Users already in the
    /// workspace are left alone.
    pub async fn add_members(&self, id: u64, user_ids: &[u64]) -> CoreResult<Workspace> {
        let identity = ObjectIdentity::workspace(id);
        let _guard = self.membership_locks.write(&identity).await;

        let original = self.find_by_id(id).await?;

        let mut seen = HashSet::new();
        let mut newcomers: Vec<User> = Vec::new();
        for &user_id in user_ids {
            if !seen.insert(user_id) {
                continue;
            }
            let user = self.user(user_id).await?;
            if !original.members.contains(&user_id) {
                newcomers.push(user);
            }
        }
        if newcomers.is_empty() {
            return Ok(original);
        }

        let mut workspace = original.clone();
        workspace.members.extend(newcomers.iter().map(|user| user.id));
        workspace.updated_at = Utc::now();
        bounded("save_workspace", self.store_timeout, self.workspaces.save(workspace.clone())).await?;

        let sids: Vec<Sid> = newcomers.iter().map(|user| Sid::principal(user.email.clone())).collect();
        if let Err(e) = self.acl_service.prepend_aces(&identity, &sids, Permission::READ, true).await {
            error!(workspace_id = id, error = %e, "Granting member READ failed, restoring membership");
            bounded("save_workspace", self.store_timeout, self.workspaces.save(original)).await?;
            return Err(e);
        }

        info!(workspace_id = id, added = newcomers.len(), "Added workspace members");
        Ok(workspace)
    }

    /// Remove a member and every ACL entry of theirs
    pub async fn remove_member(&self, id: u64, user_id: u64) -> CoreResult<Workspace> {
        let identity = ObjectIdentity::workspace(id);
        let _guard = self.membership_locks.write(&identity).await;

        let mut workspace = self.find_by_id(id).await?;
        let user = self.user(user_id).await?;
        if !workspace.members.contains(&user_id) {
            return Err(CoreError::UserNotInWorkspace { workspace_id: id, user_id });
        }

        self.acl_service.remove_sid(&identity, &Sid::principal(user.email)).await?;

        workspace.members.remove(&user_id);
        workspace.updated_at = Utc::now();
        bounded("save_workspace", self.store_timeout, self.workspaces.save(workspace.clone())).await?;

        info!(workspace_id = id, user_id, "Removed workspace member");
        Ok(workspace)
    }

    pub async fn grant_permissions<S: AsRef<str>>(&self, id: u64, user_id: u64, permissions: &[S]) -> CoreResult<()> {
        let (workspace, user) = self.workspace_and_user(id, user_id).await?;
        self.acl_service.grant(&workspace.identity(), &Sid::principal(user.email), permissions).await
    }

    pub async fn revoke_permissions<S: AsRef<str>>(&self, id: u64, user_id: u64, permissions: &[S]) -> CoreResult<()> {
        let (workspace, user) = self.workspace_and_user(id, user_id).await?;
        self.acl_service.revoke(&workspace.identity(), &Sid::principal(user.email), permissions).await
    }

    async fn workspace_and_user(&self, id: u64, user_id: u64) -> CoreResult<(Workspace, User)> {
        let workspace = self.find_by_id(id).await?;
        let user = self.user(user_id).await?;
        Ok((workspace, user))
    }

    async fn user(&self, user_id: u64) -> CoreResult<User> {
        bounded("get_user", self.store_timeout, self.users.get_user(user_id))
            .await?
            .ok_or_else(|| user_not_found(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::store::testing::FlakyAclStore;
    use crate::acl::{AclCache, AclStore, MemoryAclStore};
    use crate::audit::AuditLogger;
    use crate::user::{MemoryUserStore, NewUser};

    struct Fixture {
        service: WorkspaceService,
        evaluator: PermissionEvaluator,
        acl_store: Arc<dyn AclStore>,
        users: Arc<MemoryUserStore>,
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(MemoryAclStore::new()))
    }

    fn fixture_with(acl_store: Arc<dyn AclStore>) -> Fixture {
        let cache = Arc::new(AclCache::new(Duration::from_secs(60)));
        let locks = Arc::new(RowLocks::new());
        let audit = Arc::new(AuditLogger::new());
        let timeout = Duration::from_secs(1);
        let acl_service = AclService::new(acl_store.clone(), cache.clone(), locks.clone(), audit.clone(), timeout);
        let evaluator = PermissionEvaluator::new(acl_store.clone(), cache, locks, audit, timeout);
        let users = Arc::new(MemoryUserStore::new());
        let service = WorkspaceService::new(Arc::new(MemoryWorkspaceStore::new()), users.clone(), acl_service, evaluator.clone(), timeout);
        Fixture {
            service,
            evaluator,
            acl_store,
            users,
        }
    }

    async fn add_user(users: &MemoryUserStore, email: &str) -> User {
        users
            .create_user(NewUser {
                email: email.to_string(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                password_hash: String::new(),
                roles: vec![],
            })
            .await
            .unwrap()
    }

    fn draft(name: &str) -> WorkspaceDraft {
        WorkspaceDraft {
            name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_create_grants_owner_everything() {
        let f = fixture();
        let owner = Principal::new("owner@example.com");
        let workspace = f.service.create(&owner, draft("Team")).await.unwrap();

        let acl = f.acl_store.read_by_id(&workspace.identity()).await.unwrap();
        assert_eq!(acl.len(), 5);
        for permission in Permission::OWNER_DEFAULTS {
            assert!(f.evaluator.has_permission(&owner, &workspace.identity(), permission).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_create_rolls_back_when_acl_exists() {
        let f = fixture();
        // Pre-existing ACL for the id the next workspace will get
        f.acl_store.create(&ObjectIdentity::workspace(1)).await.unwrap();

        let err = f.service.create(&Principal::new("owner@example.com"), draft("Team")).await.unwrap_err();
        assert!(matches!(err, CoreError::AclAlreadyExists { .. }));
        assert!(matches!(f.service.find_by_id(1).await, Err(CoreError::ResourceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_members_are_prepended_with_read() {
        let f = fixture();
        let owner = Principal::new("owner@example.com");
        let workspace = f.service.create(&owner, draft("Team")).await.unwrap();
        let a = add_user(&f.users, "a@example.com").await;
        let b = add_user(&f.users, "b@example.com").await;

        let updated = f.service.add_members(workspace.id, &[a.id, b.id, a.id]).await.unwrap();
        assert_eq!(updated.members, BTreeSet::from([a.id, b.id]));

        let acl = f.acl_store.read_by_id(&workspace.identity()).await.unwrap();
        assert_eq!(acl.len(), 7);
        assert_eq!(acl.entries()[0].sid, Sid::principal("b@example.com"));
        assert_eq!(acl.entries()[1].sid, Sid::principal("a@example.com"));
        assert_eq!(acl.entries()[2].sid, Sid::principal("owner@example.com"));
        assert!(acl.entries()[..2].iter().all(|e| e.permission == Permission::READ && e.granting));

        // Re-adding an existing member changes nothing
        f.service.add_members(workspace.id, &[a.id]).await.unwrap();
        assert_eq!(f.acl_store.read_by_id(&workspace.identity()).await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_add_unknown_user_applies_nothing() {
        let f = fixture();
        let workspace = f.service.create(&Principal::new("owner@example.com"), draft("Team")).await.unwrap();
        let a = add_user(&f.users, "a@example.com").await;

        let err = f.service.add_members(workspace.id, &[a.id, 999]).await.unwrap_err();
        assert!(matches!(err, CoreError::ResourceNotFound { .. }));
        assert!(f.service.find_by_id(workspace.id).await.unwrap().members.is_empty());
        assert_eq!(f.acl_store.read_by_id(&workspace.identity()).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_remove_member() {
        let f = fixture();
        let workspace = f.service.create(&Principal::new("owner@example.com"), draft("Team")).await.unwrap();
        let a = add_user(&f.users, "a@example.com").await;
        let outsider = add_user(&f.users, "z@example.com").await;

        f.service.add_members(workspace.id, &[a.id]).await.unwrap();
        f.service.grant_permissions(workspace.id, a.id, &["WRITE"]).await.unwrap();

        let err = f.service.remove_member(workspace.id, outsider.id).await.unwrap_err();
        assert_eq!(err, CoreError::UserNotInWorkspace { workspace_id: workspace.id, user_id: outsider.id });

        let updated = f.service.remove_member(workspace.id, a.id).await.unwrap();
        assert!(updated.members.is_empty());
        let acl = f.acl_store.read_by_id(&workspace.identity()).await.unwrap();
        assert_eq!(acl.entries_for(&Sid::principal("a@example.com")).count(), 0);
        assert_eq!(acl.len(), 5);
    }

    #[tokio::test]
    async fn test_grant_and_revoke_by_user_id() {
        let f = fixture();
        let workspace = f.service.create(&Principal::new("owner@example.com"), draft("Team")).await.unwrap();
        let a = add_user(&f.users, "a@example.com").await;
        let principal = Principal::new("a@example.com");

        f.service.grant_permissions(workspace.id, a.id, &["write", "DELETE"]).await.unwrap();
        assert!(f.evaluator.has_permission(&principal, &workspace.identity(), Permission::WRITE).await.unwrap());

        f.service.revoke_permissions(workspace.id, a.id, &["WRITE"]).await.unwrap();
        f.service.revoke_permissions(workspace.id, a.id, &["WRITE"]).await.unwrap();
        assert!(!f.evaluator.has_permission(&principal, &workspace.identity(), Permission::WRITE).await.unwrap());
        assert!(f.evaluator.has_permission(&principal, &workspace.identity(), Permission::DELETE).await.unwrap());

        assert!(matches!(f.service.grant_permissions(999, a.id, &["READ"]).await, Err(CoreError::ResourceNotFound { .. })));
        assert!(matches!(f.service.grant_permissions(workspace.id, 999, &["READ"]).await, Err(CoreError::ResourceNotFound { .. })));
        assert!(matches!(f.service.grant_permissions(workspace.id, a.id, &["FLY"]).await, Err(CoreError::UnknownPermission { .. })));
    }

    #[tokio::test]
    async fn test_list_readable_filters() {
        let f = fixture();
        let alice = Principal::new("alice@example.com");
        let bob = Principal::new("bob@example.com");
        let mine = f.service.create(&alice, draft("Alice")).await.unwrap();
        f.service.create(&bob, draft("Bob")).await.unwrap();

        let visible = f.service.list_readable(&alice).await.unwrap();
        assert_eq!(visible, vec![mine]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let f = fixture();
        let owner = Principal::new("owner@example.com");
        let workspace = f.service.create(&owner, draft("Team")).await.unwrap();

        let patched = f
            .service
            .update(
                workspace.id,
                WorkspacePatch {
                    name: Some("Renamed".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.name, "Renamed");

        f.service.delete(workspace.id).await.unwrap();
        assert!(f.service.membership_locks.is_empty());
        assert!(matches!(f.acl_store.read_by_id(&workspace.identity()).await, Err(CoreError::AclNotFound { .. })));
        assert!(!f.evaluator.has_permission(&owner, &workspace.identity(), Permission::READ).await.unwrap());
        assert!(matches!(f.service.delete(workspace.id).await, Err(CoreError::ResourceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_members_keep_request_order() {
        let f = fixture();
        let workspace = f.service.create(&Principal::new("owner@example.com"), draft("Team")).await.unwrap();
        let a = add_user(&f.users, "a@example.com").await;
        let b = add_user(&f.users, "b@example.com").await;

        f.service.add_members(workspace.id, &[b.id, a.id]).await.unwrap();

        // Each newcomer goes to the head in turn, so the last one requested leads
        let acl = f.acl_store.read_by_id(&workspace.identity()).await.unwrap();
        assert_eq!(acl.entries()[0].sid, Sid::principal("a@example.com"));
        assert_eq!(acl.entries()[1].sid, Sid::principal("b@example.com"));
    }

    #[tokio::test]
    async fn test_delete_keeps_workspace_when_acl_delete_fails() {
        let acl_store = Arc::new(FlakyAclStore::new());
        let f = fixture_with(acl_store.clone());
        let owner = Principal::new("owner@example.com");
        let workspace = f.service.create(&owner, draft("Team")).await.unwrap();

        FlakyAclStore::set(&acl_store.fail_deletes, true);
        assert!(f.service.delete(workspace.id).await.is_err());
        assert_eq!(f.service.find_by_id(workspace.id).await.unwrap(), workspace);
        assert!(f.evaluator.has_permission(&owner, &workspace.identity(), Permission::ADMINISTRATION).await.unwrap());

        FlakyAclStore::set(&acl_store.fail_deletes, false);
        f.service.delete(workspace.id).await.unwrap();
        assert!(matches!(f.service.find_by_id(workspace.id).await, Err(CoreError::ResourceNotFound { .. })));
        assert!(matches!(f.acl_store.read_by_id(&workspace.identity()).await, Err(CoreError::AclNotFound { .. })));
    }
}
