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

//! HTTP server implementation using Hyper

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::router::Router;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tessera_core::TesseraSystem;
use tokio::net::TcpListener;
use tracing::{error, info};

/// API server using Hyper
pub struct ApiServer {
    config: Config,
    bind_address: SocketAddr,
    router: Arc<Router>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: Config) -> ApiResult<Self> {
        let bind_address: SocketAddr = config.bind_address.parse().map_err(|e| ApiError::BadRequest {
            message: format!("Invalid bind address: {}", e),
        })?;

        let system = TesseraSystem::initialize(&config.core_config());
        let router = Arc::new(Router::new(system, config.request_timeout())?);

        info!("API server created successfully");

        Ok(Self { config, bind_address, router })
    }

    /// Get the bind address
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Start the server
    pub async fn run(self) -> ApiResult<()> {
        let listener = TcpListener::bind(self.bind_address).await?;

        info!("Tessera API listening on http://{}", self.bind_address);

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let io = TokioIo::new(stream);
            let router = self.router.clone();
            let max_body_size = self.config.max_body_size;

            tokio::task::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let router = router.clone();
                    async move { Ok::<_, Infallible>(serve_request(&router, req, max_body_size).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

/// Buffer the body up to the size limit, then hand the request to the router
async fn serve_request(router: &Router, req: Request<Incoming>, max_body_size: usize) -> Response<Full<Bytes>> {
    let path = req.uri().path().to_string();
    let (parts, body) = req.into_parts();

    match Limited::new(body, max_body_size).collect().await {
        Ok(collected) => router.handle(Request::from_parts(parts, collected.to_bytes())).await,
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => ApiError::PayloadTooLarge {
            message: format!("Request body exceeds {} bytes", max_body_size),
        }
        .into_response(&path),
        Err(e) => ApiError::BadRequest {
            message: format!("Failed to read request body: {}", e),
        }
        .into_response(&path),
    }
}
