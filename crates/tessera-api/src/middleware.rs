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

//! Authentication and authorization gate

use crate::error::{ApiError, ApiResult};
use hyper::Request;
use tessera_core::acl::{ObjectIdentity, Principal};
use tessera_core::{CoreError, ErrorKind, Permission, TesseraSystem};
use tracing::{debug, warn};

/// Resolve the caller from the `Authorization` header
pub async fn authenticate<B>(req: &Request<B>, system: &TesseraSystem) -> ApiResult<Principal> {
    let Some(auth_header) = req.headers().get(hyper::header::AUTHORIZATION) else {
        warn!("Missing authorization header for protected path: {}", req.uri().path());
        return Err(ApiError::Unauthorized {
            message: "No authentication information found".to_string(),
        });
    };

    let auth_str = auth_header.to_str().map_err(|_| ApiError::Unauthorized {
        message: "Invalid authorization header encoding".to_string(),
    })?;

    system.auth.authenticate(auth_str).await.map_err(|e| match e.kind() {
        ErrorKind::Timeout | ErrorKind::Internal => ApiError::from(e),
        _ => {
            warn!("Token validation failed: {}", e);
            ApiError::Unauthorized {
                message: "Invalid or expired token".to_string(),
            }
        }
    })
}

/// Deny unless the principal holds `permission` on `identity`
pub async fn authorize(system: &TesseraSystem, principal: &Principal, identity: &ObjectIdentity, permission: Permission) -> ApiResult<()> {
    if system.evaluator.has_permission(principal, identity, permission).await? {
        debug!(principal = %principal.name(), identity = %identity, permission = %permission, "Access granted");
        return Ok(());
    }

    Err(ApiError::from(CoreError::AccessDenied {
        message: format!("{} permission required on {}", permission, identity),
    }))
}

/// Access to the authenticated principal stored in request extensions
pub trait PrincipalExt {
    fn principal(&self) -> ApiResult<&Principal>;
}

impl<B> PrincipalExt for Request<B> {
    fn principal(&self) -> ApiResult<&Principal> {
        self.extensions().get::<Principal>().ok_or_else(|| ApiError::Unauthorized {
            message: "No authentication information found".to_string(),
        })
    }
}
