use std::sync::OnceLock;

use async_graphql::{ComplexObject, Context, Result, SimpleObject};
use regex::Regex;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use time::{Duration, OffsetDateTime};

use crate::auth::verify_token;
use crate::error::{ShopError, ShopResult};
use crate::models::cart::CartItem;
use crate::models::permission::Permission;
use crate::util::{current_time, generate_reset_token, new_id};

pub const PASSWORD_HASH_COST: u32 = 10;
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// How long a password reset link stays valid.
pub const RESET_TOKEN_LIFETIME: Duration = Duration::hours(1);

const USER_COLUMNS: &str = "id, name, email, password, reset_token, reset_token_expiry, \
                            permissions, created_at, updated_at";

#[derive(SimpleObject, Clone, Debug)]
#[graphql(complex)]
pub struct User {
    pub id: String,
    /// The user's display name
    pub name: String,
    /// The user's email, always lowercase
    pub email: String,
    /// What the user is allowed to do
    pub permissions: Vec<Permission>,

    #[graphql(skip)]
    pub password: String,
    #[graphql(skip)]
    pub reset_token: Option<String>,
    #[graphql(skip)]
    pub reset_token_expiry: Option<OffsetDateTime>,
}

#[ComplexObject]
impl User {
    /// The items currently in the user's cart
    pub async fn cart(&self, ctx: &Context<'_>) -> Result<Vec<CartItem>> {
        let pool: &PgPool = ctx.data_unchecked();
        CartItem::for_user(&self.id, pool).await
    }
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let permission_names: Vec<String> = row.try_get("permissions")?;
        let permissions = permission_names
            .iter()
            .map(|name| name.parse::<Permission>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| sqlx::Error::ColumnDecode {
                index: "permissions".to_owned(),
                source: Box::new(err),
            })?;

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            permissions,
            password: row.try_get("password")?,
            reset_token: row.try_get("reset_token")?,
            reset_token_expiry: row.try_get("reset_token_expiry")?,
        })
    }
}

impl User {
    pub async fn with_id(id: &str, pool: &PgPool) -> Result<Self> {
        Self::with_id_opt(id, pool)
            .await?
            .ok_or_else(|| format!("No user found for ID {}", id).into())
    }

    pub async fn with_id_opt(id: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn with_email_opt(email: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// The user a login token names, or `None` if they no longer exist.
    pub async fn with_token(token: &str, secret: &str, pool: &PgPool) -> ShopResult<Option<Self>> {
        let claims = verify_token(token, secret)?;
        let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(&claims.user_id)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn all(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY name, email"))
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub fn has_any_permission(&self, needed: &[Permission]) -> bool {
        self.permissions
            .iter()
            .any(|permission| needed.contains(permission))
    }

    pub fn ensure_permission(&self, needed: &[Permission]) -> Result<()> {
        if self.has_any_permission(needed) {
            Ok(())
        } else {
            Err(format!(
                "You do not have sufficient permissions: {}. You have: {}",
                Permission::describe(needed),
                Permission::describe(&self.permissions)
            )
            .into())
        }
    }

    /// Owners can always act on their own things; anyone else needs one of `needed`.
    pub fn ensure_owner_or_permission(&self, owner_id: &str, needed: &[Permission]) -> Result<()> {
        if self.id == owner_id || self.has_any_permission(needed) {
            Ok(())
        } else {
            Err("You don't have permission to do that!".into())
        }
    }

    pub async fn signup(new_user: NewUser, pool: &PgPool) -> Result<Self> {
        let new_user = new_user.validated()?;
        if Self::with_email_opt(&new_user.email, pool).await?.is_some() {
            return Err(email_taken(&new_user.email));
        }

        let hash = bcrypt::hash(&new_user.password, PASSWORD_HASH_COST)
            .map_err(ShopError::from)?;
        let id = new_id();

        sqlx::query(
            "INSERT INTO users (id, name, email, password, permissions)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&id)
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&hash)
        .bind(Permission::names(&Permission::DEFAULT))
        .execute(pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                email_taken(&new_user.email)
            }
            other => other.into(),
        })?;

        tracing::info!(user = %id, "new user signed up");
        Self::with_id(&id, pool).await
    }

    pub async fn signin(email: &str, password: &str, pool: &PgPool) -> Result<Self> {
        let user = Self::with_email_opt(email, pool)
            .await?
            .ok_or_else(|| format!("No such user found for email {}", email))?;

        let valid = bcrypt::verify(password, &user.password)
            .map_err(ShopError::from)?;
        if !valid {
            return Err("Invalid Password!".into());
        }

        Ok(user)
    }

    /// Stores a new reset token on the user and returns it.
    pub async fn start_password_reset(&self, pool: &PgPool) -> Result<String> {
        let token = generate_reset_token();
        let expiry = current_time() + RESET_TOKEN_LIFETIME;

        sqlx::query(
            "UPDATE users SET reset_token = $1, reset_token_expiry = $2, updated_at = now()
             WHERE id = $3",
        )
        .bind(&token)
        .bind(expiry)
        .bind(&self.id)
        .execute(pool)
        .await?;

        Ok(token)
    }

    pub async fn reset_password(reset: PasswordReset, pool: &PgPool) -> Result<Self> {
        reset.check_passwords_match()?;

        let user: Option<Self> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token = $1 AND reset_token_expiry >= $2"
        ))
        .bind(&reset.reset_token)
        .bind(current_time())
        .fetch_optional(pool)
        .await?;
        let user = user.ok_or("This token is either invalid or expired!")?;

        let hash = bcrypt::hash(&reset.password, PASSWORD_HASH_COST)
            .map_err(ShopError::from)?;
        sqlx::query(
            "UPDATE users SET password = $1, reset_token = NULL, reset_token_expiry = NULL,
                 updated_at = now()
             WHERE id = $2",
        )
        .bind(&hash)
        .bind(&user.id)
        .execute(pool)
        .await?;

        tracing::info!(user = %user.id, "password reset");
        Self::with_id(&user.id, pool).await
    }

    pub async fn set_permissions(
        id: &str,
        permissions: &[Permission],
        pool: &PgPool,
    ) -> Result<Self> {
        let permissions = Permission::dedup(permissions);
        let updated = sqlx::query(
            "UPDATE users SET permissions = $1, updated_at = now() WHERE id = $2",
        )
        .bind(Permission::names(&permissions))
        .bind(id)
        .execute(pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(format!("No user found for ID {}", id).into());
        }

        tracing::info!(user = %id, permissions = %Permission::describe(&permissions), "permissions updated");
        Self::with_id(id, pool).await
    }
}

/// The details needed to create an account.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    /// Normalizes the email and checks that the account details are usable.
    pub fn validated(self) -> Result<Self> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err("Please provide a name".into());
        }

        let email = normalize_email(&self.email);
        if !email_regex()?.is_match(&email) {
            return Err(format!("{} is not a valid email", self.email.trim()).into());
        }

        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(format!(
                "Your password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )
            .into());
        }

        Ok(Self {
            name,
            email,
            password: self.password,
        })
    }
}

/// A request to set a new password from a reset link.
#[derive(Clone, Debug)]
pub struct PasswordReset {
    pub reset_token: String,
    pub password: String,
    pub confirm_password: String,
}

impl PasswordReset {
    pub fn check_passwords_match(&self) -> Result<()> {
        if self.password != self.confirm_password {
            return Err("Yo Passwords don't match!".into());
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(format!(
                "Your password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )
            .into());
        }

        Ok(())
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn email_taken(email: &str) -> async_graphql::Error {
    format!("Another user already has the email {}", email).into()
}

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

fn email_regex() -> Result<&'static Regex> {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    if let Some(regex) = EMAIL.get() {
        return Ok(regex);
    }

    let regex = Regex::new(EMAIL_PATTERN)
        .map_err(|err| format!("Failed to build the email pattern: {}", err))?;
    Ok(EMAIL.get_or_init(|| regex))
}
