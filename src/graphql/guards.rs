use async_graphql::{Context, Guard, Result};

use crate::models::permission::Permission;
use crate::models::user::User;

pub const LOGIN_REQUIRED: &str = "You must be logged in to do that!";

pub struct LoggedIn;

impl Guard for LoggedIn {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        if ctx.data_opt::<User>().is_some() {
            Ok(())
        } else {
            Err(LOGIN_REQUIRED.into())
        }
    }
}

/// Passes if the current user holds any one of the listed permissions.
pub struct HasPermission(&'static [Permission]);

impl HasPermission {
    pub const MANAGE_PERMISSIONS: Self =
        Self(&[Permission::Admin, Permission::PermissionUpdate]);
}

impl Guard for HasPermission {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        let user = ctx.data_opt::<User>().ok_or(LOGIN_REQUIRED)?;
        user.ensure_permission(self.0)
    }
}
