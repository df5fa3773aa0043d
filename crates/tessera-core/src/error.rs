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

//! Error types shared by the permission engine and the token core

use crate::acl::ObjectIdentity;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Coarse classification used by adapters to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    Unauthorized,
    Forbidden,
    Expired,
    Timeout,
    Internal,
}

/// Errors raised by the core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("ACL already exists for {identity}")]
    AclAlreadyExists { identity: ObjectIdentity },

    #[error("ACL not found for {identity}")]
    AclNotFound { identity: ObjectIdentity },

    #[error("Resource not found: {message}")]
    ResourceNotFound { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Unknown permission: {name}")]
    UnknownPermission { name: String },

    #[error("ACE index {index} out of bounds for ACL with {len} entries")]
    AceIndexOutOfBounds { index: usize, len: usize },

    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    #[error("Malformed token: {message}")]
    MalformedToken { message: String },

    #[error("Token has expired")]
    TokenExpired,

    #[error("{token} refresh token was not found")]
    RefreshTokenNotFound { token: String },

    #[error("{token} refresh token is expired")]
    RefreshTokenExpired { token: String },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User {email} already exists")]
    UserExists { email: String },

    #[error("User {user_id} is not a member of workspace {workspace_id}")]
    UserNotInWorkspace { workspace_id: u64, user_id: u64 },

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("Storage operation '{operation}' timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CoreError {
    /// Map the error onto its taxonomy bucket
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::AclNotFound { .. } | CoreError::ResourceNotFound { .. } | CoreError::RefreshTokenNotFound { .. } => ErrorKind::NotFound,
            CoreError::AclAlreadyExists { .. } | CoreError::UserExists { .. } => ErrorKind::Conflict,
            CoreError::InvalidInput { .. }
            | CoreError::UnknownPermission { .. }
            | CoreError::AceIndexOutOfBounds { .. }
            | CoreError::MalformedToken { .. }
            | CoreError::UserNotInWorkspace { .. } => ErrorKind::InvalidInput,
            CoreError::InvalidToken { .. } | CoreError::InvalidCredentials => ErrorKind::Unauthorized,
            CoreError::AccessDenied { .. } => ErrorKind::Forbidden,
            CoreError::TokenExpired | CoreError::RefreshTokenExpired { .. } => ErrorKind::Expired,
            CoreError::Timeout { .. } => ErrorKind::Timeout,
            CoreError::Internal { .. } => ErrorKind::Internal,
        }
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Run a storage call under a deadline. Dropping the inner future on expiry
/// aborts whatever the store was doing.
pub async fn bounded<T, F>(operation: &str, timeout: Duration, fut: F) -> CoreResult<T>
where
    F: Future<Output = CoreResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::Timeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
