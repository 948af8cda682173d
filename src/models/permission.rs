use std::fmt;
use std::str::FromStr;

use async_graphql::Enum;

/// A role label that grants access to privileged operations
#[derive(Enum, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    #[graphql(name = "ADMIN")]
    Admin,
    #[graphql(name = "USER")]
    User,
    #[graphql(name = "ITEMCREATE")]
    ItemCreate,
    #[graphql(name = "ITEMUPDATE")]
    ItemUpdate,
    #[graphql(name = "ITEMDELETE")]
    ItemDelete,
    #[graphql(name = "PERMISSIONUPDATE")]
    PermissionUpdate,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown permission `{0}`")]
pub struct UnknownPermission(pub String);

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::Admin,
        Permission::User,
        Permission::ItemCreate,
        Permission::ItemUpdate,
        Permission::ItemDelete,
        Permission::PermissionUpdate,
    ];

    /// What every new account starts with.
    pub const DEFAULT: [Permission; 1] = [Permission::User];

    /// The name stored in the database, same as in the schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Admin => "ADMIN",
            Permission::User => "USER",
            Permission::ItemCreate => "ITEMCREATE",
            Permission::ItemUpdate => "ITEMUPDATE",
            Permission::ItemDelete => "ITEMDELETE",
            Permission::PermissionUpdate => "PERMISSIONUPDATE",
        }
    }

    pub fn names(permissions: &[Permission]) -> Vec<String> {
        permissions.iter().map(|p| p.as_str().to_owned()).collect()
    }

    /// Joins permission names for error messages.
    pub fn describe(permissions: &[Permission]) -> String {
        if permissions.is_empty() {
            "none".to_owned()
        } else {
            Self::names(permissions).join(", ")
        }
    }

    /// Drops repeats, keeping the first occurrence of each permission.
    pub fn dedup(permissions: &[Permission]) -> Vec<Permission> {
        let mut unique = Vec::with_capacity(permissions.len());
        for permission in permissions {
            if !unique.contains(permission) {
                unique.push(*permission);
            }
        }

        unique
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|permission| permission.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_owned()))
    }
}
