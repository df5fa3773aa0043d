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

//! Workspace handlers
//!
//! Permission checks have already run in the router by the time these are
//! called; handlers only read the principal when they need its identity.

use crate::error::ApiResult;
use crate::handlers::{json_response, parse_body};
use crate::middleware::PrincipalExt;
use crate::models::{MessageResponse, WorkspaceDraft, WorkspacePatch};
use http_body_util::Full;
use hyper::{Request, Response, StatusCode, body::Bytes};
use tessera_core::TesseraSystem;
use tracing::info;

/// GET /workspaces
pub async fn list_workspaces(req: Request<Bytes>, system: &TesseraSystem) -> ApiResult<Response<Full<Bytes>>> {
    let principal = req.principal()?;
    let workspaces = system.workspaces.list_readable(principal).await?;
    json_response(StatusCode::OK, &workspaces)
}

/// POST /workspaces
pub async fn create_workspace(req: Request<Bytes>, system: &TesseraSystem) -> ApiResult<Response<Full<Bytes>>> {
    let principal = req.principal()?;
    let draft: WorkspaceDraft = parse_body(&req)?;

    let workspace = system.workspaces.create(principal, draft).await?;
    info!("Workspace {} created by {}", workspace.id, principal.name());

    json_response(StatusCode::CREATED, &workspace)
}

/// GET /workspaces/{id}
pub async fn get_workspace(system: &TesseraSystem, id: u64) -> ApiResult<Response<Full<Bytes>>> {
    let workspace = system.workspaces.find_by_id(id).await?;
    json_response(StatusCode::OK, &workspace)
}

/// PATCH /workspaces/{id}
pub async fn update_workspace(req: Request<Bytes>, system: &TesseraSystem, id: u64) -> ApiResult<Response<Full<Bytes>>> {
    let patch: WorkspacePatch = parse_body(&req)?;
    let workspace = system.workspaces.update(id, patch).await?;
    json_response(StatusCode::OK, &workspace)
}

/// DELETE /workspaces/{id}
pub async fn delete_workspace(system: &TesseraSystem, id: u64) -> ApiResult<Response<Full<Bytes>>> {
    let workspace = system.workspaces.delete(id).await?;
    json_response(StatusCode::OK, &workspace)
}

/// POST /workspaces/{id}/users
pub async fn add_members(req: Request<Bytes>, system: &TesseraSystem, id: u64) -> ApiResult<Response<Full<Bytes>>> {
    let user_ids: Vec<u64> = parse_body(&req)?;
    let workspace = system.workspaces.add_members(id, &user_ids).await?;
    json_response(StatusCode::OK, &workspace)
}

/// DELETE /workspaces/{id}/users/{user_id}
pub async fn remove_member(system: &TesseraSystem, id: u64, user_id: u64) -> ApiResult<Response<Full<Bytes>>> {
    let workspace = system.workspaces.remove_member(id, user_id).await?;
    json_response(StatusCode::OK, &workspace)
}

/// POST /workspaces/{id}/users/{user_id}/permissions
pub async fn grant_permissions(req: Request<Bytes>, system: &TesseraSystem, id: u64, user_id: u64) -> ApiResult<Response<Full<Bytes>>> {
    let permissions: Vec<String> = parse_body(&req)?;
    system.workspaces.grant_permissions(id, user_id, &permissions).await?;

    info!("Granted {:?} to user {} in workspace {}", permissions, user_id, id);
    json_response(StatusCode::OK, &MessageResponse::new("Permissions were successfully granted"))
}

/// DELETE /workspaces/{id}/users/{user_id}/permissions
pub async fn revoke_permissions(req: Request<Bytes>, system: &TesseraSystem, id: u64, user_id: u64) -> ApiResult<Response<Full<Bytes>>> {
    let permissions: Vec<String> = parse_body(&req)?;
    system.workspaces.revoke_permissions(id, user_id, &permissions).await?;

    info!("Revoked {:?} from user {} in workspace {}", permissions, user_id, id);
    json_response(StatusCode::OK, &MessageResponse::new("Permissions were successfully removed"))
}
