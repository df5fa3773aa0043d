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

//! Object-scoped access control lists
//!
//! This module provides:
//! - The ACL data model (identities, security identifiers, ordered entries)
//! - A storage abstraction with per-identity row locks
//! - A write-through ACL cache
//! - First-match permission evaluation
//! - The ACL service that owns every entry mutation

pub mod cache;
pub mod evaluator;
pub mod service;
pub mod store;

pub use cache::*;
pub use evaluator::*;
pub use service::*;
pub use store::*;

use crate::error::{CoreError, CoreResult};
use crate::permission::Permission;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a protected resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectIdentity {
    /// Resource type (e.g., "workspace")
    object_type: String,

    /// Identifier within the type
    id: String,
}

impl ObjectIdentity {
    pub fn new(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            id: id.into(),
        }
    }

    /// Identity of a workspace
    pub fn workspace(id: u64) -> Self {
        Self::new("workspace", id.to_string())
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.id)
    }
}

/// Security identifier an entry is granted to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sid {
    /// A single identity, keyed by its login (email)
    Principal(String),
    /// A group or role
    Authority(String),
}

impl Sid {
    pub fn principal(login: impl Into<String>) -> Self {
        Sid::Principal(login.into())
    }

    pub fn authority(name: impl Into<String>) -> Self {
        Sid::Authority(name.into())
    }

    pub fn key(&self) -> &str {
        match self {
            Sid::Principal(key) | Sid::Authority(key) => key,
        }
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sid::Principal(key) => write!(f, "principal:{}", key),
            Sid::Authority(key) => write!(f, "authority:{}", key),
        }
    }
}

/// Authenticated caller, passed explicitly into every check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    sid: Sid,
    authorities: Vec<Sid>,
}

impl Principal {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            sid: Sid::principal(login),
            authorities: Vec::new(),
        }
    }

    /// Attach group/role memberships
    pub fn with_authorities<I, S>(mut self, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorities.extend(authorities.into_iter().map(Sid::authority));
        self
    }

    pub fn sid(&self) -> &Sid {
        &self.sid
    }

    /// Login key of the principal
    pub fn name(&self) -> &str {
        self.sid.key()
    }

    pub fn authorities(&self) -> &[Sid] {
        &self.authorities
    }

    /// Whether an entry granted to `sid` applies to this caller
    pub fn matches(&self, sid: &Sid) -> bool {
        &self.sid == sid || self.authorities.contains(sid)
    }
}

/// One ordered entry of an ACL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlEntry {
    /// Position within the owning ACL
    pub index: usize,
    pub sid: Sid,
    pub permission: Permission,
    pub granting: bool,
}

/// Ordered entries protecting one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlList {
    identity: ObjectIdentity,
    entries: Vec<AccessControlEntry>,
    owner: Option<Sid>,
    parent: Option<ObjectIdentity>,
    entries_inheriting: bool,
}

impl AccessControlList {
    pub fn new(identity: ObjectIdentity) -> Self {
        Self {
            identity,
            entries: Vec::new(),
            owner: None,
            parent: None,
            entries_inheriting: true,
        }
    }

    pub fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    pub fn entries(&self) -> &[AccessControlEntry] {
        &self.entries
    }

    pub fn owner(&self) -> Option<&Sid> {
        self.owner.as_ref()
    }

    pub fn parent(&self) -> Option<&ObjectIdentity> {
        self.parent.as_ref()
    }

    pub fn is_entries_inheriting(&self) -> bool {
        self.entries_inheriting
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries granted to a sid, in order
    pub fn entries_for<'a>(&'a self, sid: &'a Sid) -> impl Iterator<Item = &'a AccessControlEntry> + 'a {
        self.entries.iter().filter(move |entry| &entry.sid == sid)
    }

    /// Whether the sid already has an entry (granting or not) for this permission
    pub fn holds(&self, sid: &Sid, permission: Permission) -> bool {
        self.entries_for(sid).any(|entry| entry.permission == permission)
    }

    /// First entry, in index order, applying to the caller and intersecting the mask
    pub fn first_match(&self, principal: &Principal, permission: Permission) -> Option<&AccessControlEntry> {
        self.entries.iter().find(|entry| principal.matches(&entry.sid) && entry.permission.intersects(permission))
    }

    pub(crate) fn set_owner(&mut self, owner: Sid) {
        self.owner = Some(owner);
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ObjectIdentity>) {
        self.parent = parent;
    }

    pub(crate) fn set_entries_inheriting(&mut self, inheriting: bool) {
        self.entries_inheriting = inheriting;
    }

    /// Insert at `index`, shifting later entries up
    pub(crate) fn insert_ace(&mut self, index: usize, sid: Sid, permission: Permission, granting: bool) -> CoreResult<()> {
        if index > self.entries.len() {
            return Err(CoreError::AceIndexOutOfBounds { index, len: self.entries.len() });
        }

        self.entries.insert(index, AccessControlEntry { index, sid, permission, granting });
        self.reindex();
        Ok(())
    }

    /// Append at the tail
    pub(crate) fn push_ace(&mut self, sid: Sid, permission: Permission, granting: bool) {
        let index = self.entries.len();
        self.entries.push(AccessControlEntry { index, sid, permission, granting });
    }

    /// Delete at `index`, shifting later entries down
    pub(crate) fn delete_ace(&mut self, index: usize) -> CoreResult<AccessControlEntry> {
        if index >= self.entries.len() {
            return Err(CoreError::AceIndexOutOfBounds { index, len: self.entries.len() });
        }

        let removed = self.entries.remove(index);
        self.reindex();
        Ok(removed)
    }

    /// Drop every entry failing the predicate; returns how many were removed
    pub(crate) fn retain_entries<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&AccessControlEntry) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|entry| keep(entry));
        self.reindex();
        before - self.entries.len()
    }

    fn reindex(&mut self) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            entry.index = index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn acl_with(n: usize) -> AccessControlList {
        let mut acl = AccessControlList::new(ObjectIdentity::workspace(1));
        for i in 0..n {
            acl.push_ace(Sid::principal(format!("user{}@example.com", i)), Permission::READ, true);
        }
        acl
    }

    fn assert_contiguous(acl: &AccessControlList) {
        for (position, entry) in acl.entries().iter().enumerate() {
            assert_eq!(entry.index, position);
        }
    }

    #[test]
    fn test_insert_shifts_later_entries_up() {
        let mut acl = acl_with(3);
        acl.insert_ace(1, Sid::principal("new@example.com"), Permission::WRITE, true).unwrap();

        assert_eq!(acl.len(), 4);
        assert_eq!(acl.entries()[1].sid, Sid::principal("new@example.com"));
        assert_eq!(acl.entries()[2].sid, Sid::principal("user1@example.com"));
        assert_contiguous(&acl);
    }

    #[test]
    fn test_insert_out_of_bounds() {
        let mut acl = acl_with(2);
        let err = acl.insert_ace(3, Sid::principal("x"), Permission::READ, true).unwrap_err();
        assert_eq!(err, CoreError::AceIndexOutOfBounds { index: 3, len: 2 });
        assert_eq!(acl.len(), 2);
    }

    #[test]
    fn test_first_match_uses_authorities() {
        let mut acl = acl_with(0);
        acl.push_ace(Sid::authority("ROLE_ADMIN"), Permission::DELETE, true);

        let admin = Principal::new("a@example.com").with_authorities(["ROLE_ADMIN"]);
        let plain = Principal::new("b@example.com");

        assert!(acl.first_match(&admin, Permission::DELETE).is_some());
        assert!(acl.first_match(&plain, Permission::DELETE).is_none());
        assert!(acl.first_match(&admin, Permission::READ).is_none());
    }

    #[test]
    fn test_holds_ignores_granting_flag() {
        let mut acl = acl_with(0);
        let sid = Sid::principal("u@example.com");
        acl.push_ace(sid.clone(), Permission::WRITE, false);

        assert!(acl.holds(&sid, Permission::WRITE));
        assert!(!acl.holds(&sid, Permission::READ));
    }

    proptest! {
        #[test]
        fn prop_delete_keeps_indices_contiguous(n in 1usize..40, k_seed in any::<usize>()) {
            let mut acl = acl_with(n);
            let k = k_seed % n;
            let before: Vec<Sid> = acl.entries().iter().map(|e| e.sid.clone()).collect();

            let removed = acl.delete_ace(k).unwrap();
            prop_assert_eq!(&removed.sid, &before[k]);
            prop_assert_eq!(acl.len(), n - 1);

            for (position, entry) in acl.entries().iter().enumerate() {
                prop_assert_eq!(entry.index, position);
            }

            let mut expected = before.clone();
            expected.remove(k);
            let after: Vec<Sid> = acl.entries().iter().map(|e| e.sid.clone()).collect();
            prop_assert_eq!(after, expected);
        }

        #[test]
        fn prop_insert_then_delete_restores_order(n in 0usize..30, i_seed in any::<usize>()) {
            let mut acl = acl_with(n);
            let original = acl.clone();
            let i = i_seed % (n + 1);

            acl.insert_ace(i, Sid::authority("ROLE_TEMP"), Permission::CREATE, false).unwrap();
            acl.delete_ace(i).unwrap();

            prop_assert_eq!(acl, original);
        }
    }
}
