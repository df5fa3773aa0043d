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

//! Permission vocabulary
//!
//! Every permission is a single bit so entries can be combined and tested
//! independently:
//!
//! | Permission | Bit | Accepted names |
//! |------------|-----|----------------|
//! | [`READ`](Permission::READ) | 1 | `read` |
//! | [`CREATE`](Permission::CREATE) | 2 | `create` |
//! | [`WRITE`](Permission::WRITE) | 4 | `write` |
//! | [`DELETE`](Permission::DELETE) | 8 | `delete` |
//! | [`ADMINISTRATION`](Permission::ADMINISTRATION) | 16 | `admin`, `administration` |
//!
//! Names are matched case-insensitively.

use crate::error::{CoreError, CoreResult};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Permission mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Permission: u32 {
        const READ           = 1 << 0;
        const CREATE         = 1 << 1;
        const WRITE          = 1 << 2;
        const DELETE         = 1 << 3;
        const ADMINISTRATION = 1 << 4;
    }
}

impl Permission {
    /// Grants handed to a resource owner, in insertion order
    pub const OWNER_DEFAULTS: [Permission; 5] = [Permission::READ, Permission::CREATE, Permission::WRITE, Permission::DELETE, Permission::ADMINISTRATION];

    /// Resolve a permission name
    pub fn from_name(name: &str) -> CoreResult<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "READ" => Ok(Permission::READ),
            "CREATE" => Ok(Permission::CREATE),
            "WRITE" => Ok(Permission::WRITE),
            "DELETE" => Ok(Permission::DELETE),
            "ADMIN" | "ADMINISTRATION" => Ok(Permission::ADMINISTRATION),
            _ => Err(CoreError::UnknownPermission { name: name.to_string() }),
        }
    }

    /// Resolve a list of names, failing on the first unknown one
    pub fn parse_all<S: AsRef<str>>(names: &[S]) -> CoreResult<Vec<Permission>> {
        names.iter().map(|name| Permission::from_name(name.as_ref())).collect()
    }

    /// Canonical name of a single-bit permission
    pub fn name(&self) -> &'static str {
        const NAMES: [(Permission, &str); 5] = [
            (Permission::READ, "READ"),
            (Permission::CREATE, "CREATE"),
            (Permission::WRITE, "WRITE"),
            (Permission::DELETE, "DELETE"),
            (Permission::ADMINISTRATION, "ADMINISTRATION"),
        ];

        NAMES.iter().find(|(bit, _)| bit == self).map(|(_, name)| *name).unwrap_or("COMPOSITE")
    }

    /// Split a mask into its single-bit permissions
    pub fn bits_in_order(&self) -> Vec<Permission> {
        Self::OWNER_DEFAULTS.iter().copied().filter(|p| self.contains(*p)).collect()
    }
}

impl FromStr for Permission {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::from_name(s)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.bits_in_order().iter().map(|p| p.name()).collect();
        write!(f, "{}", names.join("|"))
    }
}
