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

//! Authentication handlers

use crate::error::ApiResult;
use crate::handlers::{json_response, parse_body};
use crate::models::{LoginRequest, RefreshTokenRequest, RegisterRequest};
use http_body_util::Full;
use hyper::{Request, Response, StatusCode, body::Bytes};
use tessera_core::TesseraSystem;
use tracing::info;

/// Register handler
/// POST /auth/register
pub async fn register(req: Request<Bytes>, system: &TesseraSystem) -> ApiResult<Response<Full<Bytes>>> {
    info!("Processing user registration request");

    let register_request: RegisterRequest = parse_body(&req)?;
    let user = system.auth.register(register_request).await?;

    info!("User registered successfully: {}", user.email);
    json_response(StatusCode::CREATED, &user)
}

/// Login handler
/// POST /auth/login
pub async fn login(req: Request<Bytes>, system: &TesseraSystem) -> ApiResult<Response<Full<Bytes>>> {
    info!("Processing login request");

    let login_request: LoginRequest = parse_body(&req)?;
    let token_pair = system.auth.login(&login_request.email, &login_request.password).await?;

    json_response(StatusCode::OK, &token_pair)
}

/// Refresh token handler
/// POST /auth/refresh-token
pub async fn refresh_token(req: Request<Bytes>, system: &TesseraSystem) -> ApiResult<Response<Full<Bytes>>> {
    info!("Processing token refresh request");

    let refresh_request: RefreshTokenRequest = parse_body(&req)?;
    let token_pair = system.auth.refresh(&refresh_request.token).await?;

    json_response(StatusCode::OK, &token_pair)
}
