use async_graphql::{ComplexObject, Context, Result, SimpleObject};
use sqlx::PgPool;

use crate::models::cart::{cart_total, CartItem};
use crate::models::permission::Permission;
use crate::models::user::User;
use crate::models::DateTimeScalar;
use crate::payment::{PaymentGateway, CURRENCY};
use crate::util::new_id;

/// A completed checkout
#[derive(SimpleObject, sqlx::FromRow, Clone, Debug)]
#[graphql(complex)]
pub struct Order {
    pub id: String,
    /// The amount charged in cents
    pub total: i32,
    /// The payment processor's id for the charge
    pub charge: String,
    pub created_at: DateTimeScalar,
    pub updated_at: DateTimeScalar,

    #[graphql(skip)]
    pub user_id: String,
}

/// An item as it was when it was bought
#[derive(SimpleObject, sqlx::FromRow, Clone, Debug)]
#[graphql(complex)]
pub struct OrderItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub large_image: Option<String>,
    /// The price in cents at the time of purchase
    pub price: i32,
    pub quantity: i32,

    #[graphql(skip)]
    pub order_id: String,
    #[graphql(skip)]
    pub user_id: String,
}

#[ComplexObject]
impl Order {
    /// What was bought
    pub async fn items(&self, ctx: &Context<'_>) -> Result<Vec<OrderItem>> {
        let pool: &PgPool = ctx.data_unchecked();
        OrderItem::for_order(&self.id, pool).await
    }

    /// Who bought it
    pub async fn user(&self, ctx: &Context<'_>) -> Result<User> {
        let pool: &PgPool = ctx.data_unchecked();
        User::with_id(&self.user_id, pool).await
    }
}

#[ComplexObject]
impl OrderItem {
    pub async fn user(&self, ctx: &Context<'_>) -> Result<User> {
        let pool: &PgPool = ctx.data_unchecked();
        User::with_id(&self.user_id, pool).await
    }
}

impl OrderItem {
    pub async fn for_order(order_id: &str, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as(
            "SELECT id, title, description, image, large_image, price, quantity, order_id, user_id
             FROM order_items WHERE order_id = $1 ORDER BY title, id",
        )
        .bind(order_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}

impl Order {
    pub async fn with_id_opt(id: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as(
            "SELECT id, total, charge, user_id, created_at, updated_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Loads an order the given user is allowed to see.
    pub async fn visible_to(id: &str, user: &User, pool: &PgPool) -> Result<Self> {
        let order = Self::with_id_opt(id, pool)
            .await?
            .ok_or_else(|| format!("No order found for ID {}", id))?;
        if order.user_id != user.id && !user.has_any_permission(&[Permission::Admin]) {
            return Err("You can't see this order".into());
        }

        Ok(order)
    }

    pub async fn for_user(user_id: &str, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as(
            "SELECT id, total, charge, user_id, created_at, updated_at FROM orders
             WHERE user_id = $1 ORDER BY created_at DESC, id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Charges the user for their cart, then records it as an order and
    /// takes the bought lines out of the cart, all or nothing.
    ///
    /// The cart stays locked from the moment it is read until the order is
    /// committed, so overlapping checkouts of one cart can't both be charged.
    pub async fn checkout(
        user_id: &str,
        payment_token: &str,
        payments: &dyn PaymentGateway,
        pool: &PgPool,
    ) -> Result<Self> {
        let mut transaction = pool.begin().await?;
        let cart = CartItem::lock_cart(user_id, &mut *transaction).await?;
        let total = cart_total(&cart.lines)?;
        let order_id = new_id();

        tracing::info!(order = %order_id, user = %user_id, total, "charging for order");
        let charge = payments
            .charge(total, CURRENCY, payment_token, &order_id)
            .await?;

        sqlx::query("INSERT INTO orders (id, total, charge, user_id) VALUES ($1, $2, $3, $4)")
            .bind(&order_id)
            .bind(charge.amount)
            .bind(&charge.id)
            .bind(user_id)
            .execute(&mut *transaction)
            .await?;

        for line in &cart.lines {
            sqlx::query(
                "INSERT INTO order_items
                     (id, order_id, title, description, image, large_image, price, quantity, user_id)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(new_id())
            .bind(&order_id)
            .bind(&line.item.title)
            .bind(&line.item.description)
            .bind(&line.item.image)
            .bind(&line.item.large_image)
            .bind(line.item.price)
            .bind(line.quantity)
            .bind(user_id)
            .execute(&mut *transaction)
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE id = ANY($1)")
            .bind(&cart.cart_item_ids)
            .execute(&mut *transaction)
            .await?;

        if let Err(err) = transaction.commit().await {
            tracing::error!(order = %order_id, charge = %charge.id, error = %err, "order lost after payment");
            return Err(err.into());
        }

        tracing::info!(order = %order_id, user = %user_id, total = charge.amount, "order placed");
        Self::with_id_opt(&order_id, pool)
            .await?
            .ok_or_else(|| format!("No order found for ID {}", order_id).into())
    }
}
