use std::sync::Arc;

use async_graphql::{Context, Object, Result};
use axum::http::header::SET_COOKIE;
use sqlx::PgPool;

use crate::auth::{issue_token, login_cookie, logout_cookie};
use crate::config::Config;
use crate::email::reset_password::ResetPasswordEmail;
use crate::email::{send_email, Mailer};
use crate::graphql::guards::{HasPermission, LoggedIn};
use crate::graphql::SuccessMessage;
use crate::models::cart::CartItem;
use crate::models::item::{Item, ItemUpdate, NewItem};
use crate::models::order::Order;
use crate::models::permission::Permission;
use crate::models::user::{normalize_email, NewUser, PasswordReset, User};
use crate::payment::PaymentGateway;

pub struct MutationRoot;

const ITEM_UPDATERS: &[Permission] = &[Permission::Admin, Permission::ItemUpdate];
const ITEM_DELETERS: &[Permission] = &[Permission::Admin, Permission::ItemDelete];

/// Logs the user in for the rest of the browser session.
fn set_login_cookie(ctx: &Context<'_>, user: &User) -> Result<()> {
    let config: &Config = ctx.data_unchecked();
    let token = issue_token(&user.id, &config.app_secret)?;
    ctx.insert_http_header(SET_COOKIE, login_cookie(&token));

    Ok(())
}

#[Object]
impl MutationRoot {
    /// Puts a new item up for sale
    #[graphql(guard = "LoggedIn")]
    pub async fn create_item(
        &self,
        ctx: &Context<'_>,
        title: String,
        description: String,
        price: i32,
        image: Option<String>,
        large_image: Option<String>,
    ) -> Result<Item> {
        let pool: &PgPool = ctx.data_unchecked();
        let user: &User = ctx.data_unchecked();
        let new_item = NewItem {
            title,
            description,
            price,
            image,
            large_image,
        };

        Item::create(new_item, &user.id, pool).await
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn update_item(
        &self,
        ctx: &Context<'_>,
        id: String,
        title: Option<String>,
        description: Option<String>,
        price: Option<i32>,
        image: Option<String>,
        large_image: Option<String>,
    ) -> Result<Item> {
        let pool: &PgPool = ctx.data_unchecked();
        let user: &User = ctx.data_unchecked();
        let item = Item::with_id(&id, pool).await?;
        user.ensure_owner_or_permission(&item.user_id, ITEM_UPDATERS)?;

        let update = ItemUpdate {
            title,
            description,
            price,
            image,
            large_image,
        };
        item.update(update, pool).await
    }

    /// Takes an item down, returning what it was
    #[graphql(guard = "LoggedIn")]
    pub async fn delete_item(&self, ctx: &Context<'_>, id: String) -> Result<Item> {
        let pool: &PgPool = ctx.data_unchecked();
        let user: &User = ctx.data_unchecked();
        let item = Item::with_id(&id, pool).await?;
        user.ensure_owner_or_permission(&item.user_id, ITEM_DELETERS)?;

        item.delete(pool).await?;
        Ok(item)
    }

    /// Creates an account and logs into it
    pub async fn signup(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
        name: String,
    ) -> Result<User> {
        let pool: &PgPool = ctx.data_unchecked();
        let new_user = NewUser {
            name,
            email,
            password,
        };

        let user = User::signup(new_user, pool).await?;
        set_login_cookie(ctx, &user)?;

        Ok(user)
    }

    pub async fn signin(&self, ctx: &Context<'_>, email: String, password: String) -> Result<User> {
        let pool: &PgPool = ctx.data_unchecked();
        let user = User::signin(&email, &password, pool).await?;
        set_login_cookie(ctx, &user)?;

        Ok(user)
    }

    pub async fn signout(&self, ctx: &Context<'_>) -> SuccessMessage {
        ctx.insert_http_header(SET_COOKIE, logout_cookie());
        SuccessMessage::new("Goodbye!")
    }

    /// Emails the user a link for choosing a new password
    pub async fn request_reset(&self, ctx: &Context<'_>, email: String) -> Result<SuccessMessage> {
        let pool: &PgPool = ctx.data_unchecked();
        let config: &Config = ctx.data_unchecked();
        let mailer: &Arc<dyn Mailer> = ctx.data_unchecked();

        let user = User::with_email_opt(&email, pool)
            .await?
            .ok_or_else(|| format!("No such user found for email {}", normalize_email(&email)))?;
        let reset_token = user.start_password_reset(pool).await?;
        let reset_link = config.reset_link(&reset_token);

        send_email(ResetPasswordEmail::for_user(&user, &reset_link), mailer.as_ref()).await?;

        Ok(SuccessMessage::new("Thanks!"))
    }

    pub async fn reset_password(
        &self,
        ctx: &Context<'_>,
        reset_token: String,
        password: String,
        confirm_password: String,
    ) -> Result<User> {
        let pool: &PgPool = ctx.data_unchecked();
        let reset = PasswordReset {
            reset_token,
            password,
            confirm_password,
        };

        let user = User::reset_password(reset, pool).await?;
        set_login_cookie(ctx, &user)?;

        Ok(user)
    }

    #[graphql(guard = "LoggedIn.and(HasPermission::MANAGE_PERMISSIONS)")]
    pub async fn update_permissions(
        &self,
        ctx: &Context<'_>,
        user_id: String,
        permissions: Vec<Permission>,
    ) -> Result<User> {
        let pool: &PgPool = ctx.data_unchecked();
        User::set_permissions(&user_id, &permissions, pool).await
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn add_to_cart(&self, ctx: &Context<'_>, id: String) -> Result<CartItem> {
        let pool: &PgPool = ctx.data_unchecked();
        let user: &User = ctx.data_unchecked();
        CartItem::add(&user.id, &id, pool).await
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn remove_from_cart(&self, ctx: &Context<'_>, id: String) -> Result<CartItem> {
        let pool: &PgPool = ctx.data_unchecked();
        let user: &User = ctx.data_unchecked();
        CartItem::remove(&id, user, pool).await
    }

    /// Charges the card behind `token` for everything in the cart
    #[graphql(guard = "LoggedIn")]
    pub async fn create_order(&self, ctx: &Context<'_>, token: String) -> Result<Order> {
        let pool: &PgPool = ctx.data_unchecked();
        let user: &User = ctx.data_unchecked();
        let payments: &Arc<dyn PaymentGateway> = ctx.data_unchecked();

        Order::checkout(&user.id, &token, payments.as_ref(), pool).await
    }
}
