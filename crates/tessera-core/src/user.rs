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

//! User directory

use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Role every registered user starts with
pub const DEFAULT_ROLE: &str = "ROLE_USER";

/// Registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,

    /// Login key, unique across users
    pub email: String,

    pub first_name: String,

    pub last_name: String,

    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub roles: Vec<String>,

    pub created_at: DateTime<Utc>,
}

/// Fields needed to store a user; the id is assigned by the store
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub roles: Vec<String>,
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: u64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            roles: user.roles.clone(),
        }
    }
}

/// User storage trait
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user; fails with `UserExists` if the email is taken
    async fn create_user(&self, user: NewUser) -> CoreResult<User>;

    async fn get_user(&self, user_id: u64) -> CoreResult<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> CoreResult<Option<User>>;
}

/// In-memory user store with an email index
#[derive(Debug)]
pub struct MemoryUserStore {
    users: DashMap<u64, User>,
    email_index: DashMap<String, u64>,
    next_id: AtomicU64,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            email_index: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, user: NewUser) -> CoreResult<User> {
        match self.email_index.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(CoreError::UserExists { email: user.email }),
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                let created = User {
                    id,
                    email: user.email,
                    first_name: user.first_name,
                    last_name: user.last_name,
                    password_hash: user.password_hash,
                    roles: user.roles,
                    created_at: Utc::now(),
                };
                self.users.insert(id, created.clone());
                vacant.insert(id);
                Ok(created)
            }
        }
    }

    async fn get_user(&self, user_id: u64) -> CoreResult<Option<User>> {
        Ok(self.users.get(&user_id).map(|user| user.value().clone()))
    }

    async fn get_user_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let Some(id) = self.email_index.get(email).map(|id| *id.value()) else {
            return Ok(None);
        };
        self.get_user(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            password_hash: "hash".to_string(),
            roles: vec![DEFAULT_ROLE.to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = MemoryUserStore::new();
        let user = store.create_user(new_user("ada@example.com")).await.unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(store.get_user(1).await.unwrap(), Some(user.clone()));
        assert_eq!(store.get_user_by_email("ada@example.com").await.unwrap(), Some(user));
        assert_eq!(store.get_user(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let store = MemoryUserStore::new();
        store.create_user(new_user("ada@example.com")).await.unwrap();

        let err = store.create_user(new_user("ada@example.com")).await.unwrap_err();
        assert_eq!(err, CoreError::UserExists { email: "ada@example.com".to_string() });
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: 1,
            email: "ada@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            roles: vec![],
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
    }
}
