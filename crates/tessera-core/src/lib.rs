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

//! Tessera core
//!
//! Object-scoped access control lists with ordered, first-match entries, and
//! token authentication built from short-lived JWT access tokens plus opaque
//! refresh tokens.

pub mod acl;
pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod permission;
pub mod system;
pub mod token;
pub mod user;
pub mod workspace;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use permission::Permission;
pub use system::TesseraSystem;
