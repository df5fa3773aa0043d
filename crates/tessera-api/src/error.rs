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

//! Error handling for the HTTP adapter
//! Implements RFC 7807 Problem Details format

use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes};
use serde::{Deserialize, Serialize};
use tessera_core::{CoreError, ErrorKind};
use thiserror::Error;
use tracing::error;

/// API error types following REST conventions
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Method not allowed: {message}")]
    MethodNotAllowed { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Payload too large: {message}")]
    PayloadTooLarge { message: String },

    #[error("Internal server error: {message}")]
    InternalServerError { message: String },

    #[error("Gateway timeout: {message}")]
    GatewayTimeout { message: String },

    #[error("Serde JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Router error: {0}")]
    RouterError(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::GatewayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ApiError::SerdeJsonError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "bad_request",
            ApiError::Unauthorized { .. } => "unauthorized",
            ApiError::Forbidden { .. } => "forbidden",
            ApiError::NotFound { .. } => "not_found",
            ApiError::MethodNotAllowed { .. } => "method_not_allowed",
            ApiError::Conflict { .. } => "conflict",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::InternalServerError { .. } => "internal_server_error",
            ApiError::GatewayTimeout { .. } => "gateway_timeout",
            ApiError::SerdeJsonError(_) => "json_error",
            ApiError::IoError(_) => "io_error",
            ApiError::HttpError(_) => "http_error",
            ApiError::RouterError(_) => "router_error",
        }
    }

    /// Build the problem+json response for a request path
    pub fn into_response(self, instance: &str) -> Response<Full<Bytes>> {
        let status_code = self.status_code();
        let problem_details = ProblemDetails::new(&self, instance.to_string());

        if status_code.is_server_error() {
            error!("API Error: {} - {}", status_code, self);
        }

        let json = match serde_json::to_string(&problem_details) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize error response: {}", e);
                r#"{"type":"/problems/internal_server_error","title":"Internal Server Error","status":500,"detail":"An internal error occurred","instance":"/"}"#.to_string()
            }
        };

        let mut response = Response::new(Full::new(Bytes::from(json)));
        *response.status_mut() = status_code;
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, hyper::header::HeaderValue::from_static("application/problem+json"));
        response
            .headers_mut()
            .insert(hyper::header::CACHE_CONTROL, hyper::header::HeaderValue::from_static("no-cache"));
        response
    }
}

/// Core errors map onto statuses by kind; internal details stay in the log
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::NotFound => ApiError::NotFound { message },
            ErrorKind::Conflict => ApiError::Conflict { message },
            ErrorKind::InvalidInput => ApiError::BadRequest { message },
            ErrorKind::Unauthorized | ErrorKind::Expired => ApiError::Unauthorized { message },
            ErrorKind::Forbidden => ApiError::Forbidden { message },
            ErrorKind::Timeout => ApiError::GatewayTimeout { message },
            ErrorKind::Internal => {
                error!("Core error: {}", message);
                ApiError::InternalServerError {
                    message: "An internal error occurred".to_string(),
                }
            }
        }
    }
}

/// RFC 7807 Problem Details response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// A URI reference that identifies the problem type
    #[serde(rename = "type")]
    pub problem_type: String,

    /// A short, human-readable summary of the problem type
    pub title: String,

    /// The HTTP status code generated by the origin server
    pub status: u16,

    /// A human-readable explanation specific to this occurrence
    pub detail: String,

    /// A URI reference that identifies the specific occurrence
    pub instance: String,
}

impl ProblemDetails {
    pub fn new(error: &ApiError, instance: String) -> Self {
        let status_code = error.status_code();

        Self {
            problem_type: format!("/problems/{}", error.error_type()),
            title: status_code.canonical_reason().unwrap_or("Unknown Error").to_string(),
            status: status_code.as_u16(),
            detail: error.to_string(),
            instance,
        }
    }
}

/// Convert ApiError to HTTP response
impl From<ApiError> for Response<Full<Bytes>> {
    fn from(error: ApiError) -> Self {
        error.into_response("/")
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

impl From<hyper::http::Error> for ApiError {
    fn from(err: hyper::http::Error) -> Self {
        ApiError::HttpError(err.to_string())
    }
}

impl From<matchit::InsertError> for ApiError {
    fn from(err: matchit::InsertError) -> Self {
        ApiError::RouterError(err.to_string())
    }
}
