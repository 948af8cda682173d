use async_graphql::{ComplexObject, Context, Result, SimpleObject};
use sqlx::{PgConnection, PgPool};

use crate::models::item::Item;
use crate::models::user::User;
use crate::util::new_id;

/// A line in a user's shopping cart
#[derive(SimpleObject, sqlx::FromRow, Clone, Debug)]
#[graphql(complex)]
pub struct CartItem {
    pub id: String,
    /// How many of the item are in the cart
    pub quantity: i32,

    #[graphql(skip)]
    pub item_id: Option<String>,
    #[graphql(skip)]
    pub user_id: String,
}

#[ComplexObject]
impl CartItem {
    /// The item in the cart, or nothing if it has since been removed from the shop
    pub async fn item(&self, ctx: &Context<'_>) -> Result<Option<Item>> {
        let pool: &PgPool = ctx.data_unchecked();
        match &self.item_id {
            Some(item_id) => Item::with_id_opt(item_id, pool).await,
            None => Ok(None),
        }
    }

    /// The user whose cart this is
    pub async fn user(&self, ctx: &Context<'_>) -> Result<User> {
        let pool: &PgPool = ctx.data_unchecked();
        User::with_id(&self.user_id, pool).await
    }
}

/// A cart line joined with the item it points at, for checkout.
#[derive(sqlx::FromRow, Clone, Debug)]
pub struct CartLine {
    pub quantity: i32,
    #[sqlx(flatten)]
    pub item: Item,
}

impl CartLine {
    pub fn subtotal(&self) -> Option<i32> {
        self.item.price.checked_mul(self.quantity)
    }
}

/// A user's cart as read at checkout.
#[derive(Clone, Debug)]
pub struct LockedCart {
    /// Every line read, including ones whose item has been deleted
    pub cart_item_ids: Vec<String>,
    /// The lines that can still be bought
    pub lines: Vec<CartLine>,
}

/// The amount in cents to charge for a cart.
pub fn cart_total(lines: &[CartLine]) -> Result<i32> {
    if lines.is_empty() {
        return Err("Your cart is empty".into());
    }

    lines
        .iter()
        .try_fold(0i32, |total, line| total.checked_add(line.subtotal()?))
        .ok_or_else(|| "Your order total is too large".into())
}

impl CartItem {
    pub async fn with_id_opt(id: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as("SELECT id, quantity, item_id, user_id FROM cart_items WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn for_user(user_id: &str, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as(
            "SELECT id, quantity, item_id, user_id FROM cart_items WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Locks the user's cart until the transaction on `conn` ends, then reads it.
    ///
    /// A second checkout for the same user waits here until the first one
    /// commits or rolls back.
    pub async fn lock_cart(user_id: &str, conn: &mut PgConnection) -> Result<LockedCart> {
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR NO KEY UPDATE")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        let cart_item_ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM cart_items WHERE user_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let lines: Vec<CartLine> = sqlx::query_as(
            "SELECT cart_items.quantity, items.id, items.title, items.description, items.image,
                 items.large_image, items.price, items.user_id, items.created_at, items.updated_at
             FROM cart_items INNER JOIN items ON items.id = cart_items.item_id
             WHERE cart_items.id = ANY($1)
             ORDER BY cart_items.id",
        )
        .bind(&cart_item_ids)
        .fetch_all(&mut *conn)
        .await?;

        Ok(LockedCart {
            cart_item_ids,
            lines,
        })
    }

    /// Puts one more of the item in the user's cart.
    pub async fn add(user_id: &str, item_id: &str, pool: &PgPool) -> Result<Self> {
        Item::with_id(item_id, pool).await?;

        sqlx::query_as(
            "INSERT INTO cart_items (id, quantity, item_id, user_id) VALUES ($1, 1, $2, $3)
             ON CONFLICT (user_id, item_id) DO UPDATE SET quantity = cart_items.quantity + 1
             RETURNING id, quantity, item_id, user_id",
        )
        .bind(new_id())
        .bind(item_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Takes the line out of the user's cart; only the cart's owner may do so.
    pub async fn remove(id: &str, user: &User, pool: &PgPool) -> Result<Self> {
        let cart_item = Self::with_id_opt(id, pool)
            .await?
            .ok_or("No CartItem Found!")?;
        if cart_item.user_id != user.id {
            return Err("Cheatin huhhh".into());
        }

        sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(cart_item)
    }
}
