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

//! HTTP routing and the per-route authorization gate

use crate::error::{ApiError, ApiResult};
use crate::handlers::{auth, workspaces};
use crate::middleware::{authenticate, authorize};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Response};
use std::time::Duration;
use tessera_core::acl::ObjectIdentity;
use tessera_core::{Permission, TesseraSystem};
use tracing::{info, warn};

/// Every operation the adapter exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Register,
    Login,
    RefreshToken,
    ListWorkspaces,
    CreateWorkspace,
    GetWorkspace,
    UpdateWorkspace,
    DeleteWorkspace,
    AddMembers,
    RemoveMember,
    GrantPermissions,
    RevokePermissions,
}

impl Endpoint {
    /// Reachable without a bearer token
    pub fn is_public(self) -> bool {
        matches!(self, Endpoint::Register | Endpoint::Login | Endpoint::RefreshToken)
    }

    /// Permission the caller must hold on the workspace named in the path
    pub fn required_permission(self) -> Option<Permission> {
        match self {
            Endpoint::GetWorkspace => Some(Permission::READ),
            Endpoint::UpdateWorkspace => Some(Permission::WRITE),
            Endpoint::DeleteWorkspace | Endpoint::AddMembers | Endpoint::RemoveMember | Endpoint::GrantPermissions | Endpoint::RevokePermissions => {
                Some(Permission::ADMINISTRATION)
            }
            _ => None,
        }
    }
}

/// Path parameters captured by a route
#[derive(Debug, Default, Clone, Copy)]
struct PathParams {
    id: Option<u64>,
    user_id: Option<u64>,
}

impl PathParams {
    fn workspace_id(&self) -> ApiResult<u64> {
        self.id.ok_or_else(|| ApiError::RouterError("Route is missing the workspace id".to_string()))
    }

    fn user_id(&self) -> ApiResult<u64> {
        self.user_id.ok_or_else(|| ApiError::RouterError("Route is missing the user id".to_string()))
    }
}

/// HTTP router for the API
pub struct Router {
    system: TesseraSystem,
    routes: matchit::Router<Vec<(Method, Endpoint)>>,
    request_timeout: Duration,
}

impl Router {
    pub fn new(system: TesseraSystem, request_timeout: Duration) -> ApiResult<Self> {
        let mut routes = matchit::Router::new();

        routes.insert("/auth/register", vec![(Method::POST, Endpoint::Register)])?;
        routes.insert("/auth/login", vec![(Method::POST, Endpoint::Login)])?;
        routes.insert("/auth/refresh-token", vec![(Method::POST, Endpoint::RefreshToken)])?;

        for path in ["/workspaces", "/workspaces/"] {
            routes.insert(path, vec![(Method::GET, Endpoint::ListWorkspaces), (Method::POST, Endpoint::CreateWorkspace)])?;
        }
        routes.insert(
            "/workspaces/{id}",
            vec![
                (Method::GET, Endpoint::GetWorkspace),
                (Method::PATCH, Endpoint::UpdateWorkspace),
                (Method::DELETE, Endpoint::DeleteWorkspace),
            ],
        )?;
        routes.insert("/workspaces/{id}/users", vec![(Method::POST, Endpoint::AddMembers)])?;
        routes.insert("/workspaces/{id}/users/{user_id}", vec![(Method::DELETE, Endpoint::RemoveMember)])?;
        routes.insert(
            "/workspaces/{id}/users/{user_id}/permissions",
            vec![(Method::POST, Endpoint::GrantPermissions), (Method::DELETE, Endpoint::RevokePermissions)],
        )?;

        Ok(Self { system, routes, request_timeout })
    }

    pub fn system(&self) -> &TesseraSystem {
        &self.system
    }

    /// Route under the request deadline and render any error as problem+json
    pub async fn handle(&self, req: Request<Bytes>) -> Response<Full<Bytes>> {
        let path = req.uri().path().to_string();

        match tokio::time::timeout(self.request_timeout, self.route(req)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => e.into_response(&path),
            Err(_) => {
                warn!("Request timed out: {}", path);
                ApiError::GatewayTimeout {
                    message: format!("Request exceeded {}s", self.request_timeout.as_secs()),
                }
                .into_response(&path)
            }
        }
    }

    /// Route a request to the appropriate handler
    pub async fn route(&self, mut req: Request<Bytes>) -> ApiResult<Response<Full<Bytes>>> {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        info!("Routing request: {} {}", method, path);

        let (endpoint, params) = self.resolve(&method, &path)?;

        if !endpoint.is_public() {
            let principal = authenticate(&req, &self.system).await?;

            if let Some(permission) = endpoint.required_permission() {
                let id = params.workspace_id()?;
                // An unknown workspace is reported as such, not as a denial
                self.system.workspaces.find_by_id(id).await?;
                authorize(&self.system, &principal, &ObjectIdentity::workspace(id), permission).await?;
            }

            req.extensions_mut().insert(principal);
        }

        let system = &self.system;
        match endpoint {
            Endpoint::Register => auth::register(req, system).await,
            Endpoint::Login => auth::login(req, system).await,
            Endpoint::RefreshToken => auth::refresh_token(req, system).await,
            Endpoint::ListWorkspaces => workspaces::list_workspaces(req, system).await,
            Endpoint::CreateWorkspace => workspaces::create_workspace(req, system).await,
            Endpoint::GetWorkspace => workspaces::get_workspace(system, params.workspace_id()?).await,
            Endpoint::UpdateWorkspace => workspaces::update_workspace(req, system, params.workspace_id()?).await,
            Endpoint::DeleteWorkspace => workspaces::delete_workspace(system, params.workspace_id()?).await,
            Endpoint::AddMembers => workspaces::add_members(req, system, params.workspace_id()?).await,
            Endpoint::RemoveMember => workspaces::remove_member(system, params.workspace_id()?, params.user_id()?).await,
            Endpoint::GrantPermissions => workspaces::grant_permissions(req, system, params.workspace_id()?, params.user_id()?).await,
            Endpoint::RevokePermissions => workspaces::revoke_permissions(req, system, params.workspace_id()?, params.user_id()?).await,
        }
    }

    fn resolve(&self, method: &Method, path: &str) -> ApiResult<(Endpoint, PathParams)> {
        let matched = self.routes.at(path).map_err(|_| {
            warn!("Route not found: {} {}", method, path);
            ApiError::NotFound {
                message: format!("Route not found: {} {}", method, path),
            }
        })?;

        let endpoint = matched
            .value
            .iter()
            .find(|(allowed, _)| allowed == method)
            .map(|(_, endpoint)| *endpoint)
            .ok_or_else(|| ApiError::MethodNotAllowed {
                message: format!("{} is not supported on {}", method, path),
            })?;

        let params = PathParams {
            id: matched.params.get("id").map(parse_id).transpose()?,
            user_id: matched.params.get("user_id").map(parse_id).transpose()?,
        };

        Ok((endpoint, params))
    }
}

fn parse_id(raw: &str) -> ApiResult<u64> {
    raw.parse().map_err(|_| ApiError::BadRequest {
        message: format!("Invalid id: {}", raw),
    })
}
