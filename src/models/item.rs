use async_graphql::{ComplexObject, Context, Enum, Result, SimpleObject};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::user::User;
use crate::models::DateTimeScalar;
use crate::util::new_id;

/// How many items the shop page shows at once.
pub const ITEMS_PER_PAGE: i32 = 4;
pub const MAX_PAGE_SIZE: i32 = 100;

const ITEM_COLUMNS: &str =
    "id, title, description, image, large_image, price, user_id, created_at, updated_at";

/// Something for sale in the shop
#[derive(SimpleObject, sqlx::FromRow, Clone, Debug)]
#[graphql(complex)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub description: String,
    /// A link to a thumbnail-sized image
    pub image: Option<String>,
    /// A link to the full-size image
    pub large_image: Option<String>,
    /// The price in cents
    pub price: i32,
    pub created_at: DateTimeScalar,
    pub updated_at: DateTimeScalar,

    #[graphql(skip)]
    pub user_id: String,
}

#[ComplexObject]
impl Item {
    /// The user selling the item
    pub async fn user(&self, ctx: &Context<'_>) -> Result<User> {
        let pool: &PgPool = ctx.data_unchecked();
        User::with_id(&self.user_id, pool).await
    }
}

#[derive(Enum, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ItemOrder {
    #[default]
    CreatedAtDesc,
    CreatedAtAsc,
    PriceAsc,
    PriceDesc,
    TitleAsc,
    TitleDesc,
}

impl ItemOrder {
    /// The `ORDER BY` clause; ties fall back to the id so pages are stable.
    pub fn sql(self) -> &'static str {
        match self {
            ItemOrder::CreatedAtDesc => " ORDER BY created_at DESC, id",
            ItemOrder::CreatedAtAsc => " ORDER BY created_at ASC, id",
            ItemOrder::PriceAsc => " ORDER BY price ASC, id",
            ItemOrder::PriceDesc => " ORDER BY price DESC, id",
            ItemOrder::TitleAsc => " ORDER BY title ASC, id",
            ItemOrder::TitleDesc => " ORDER BY title DESC, id",
        }
    }
}

/// Which slice of the shop to load.
#[derive(Clone, Debug, Default)]
pub struct ItemPage {
    pub search: Option<String>,
    pub order: ItemOrder,
    pub skip: i32,
    pub first: i32,
}

impl ItemPage {
    pub fn limit(&self) -> i64 {
        self.first.clamp(1, MAX_PAGE_SIZE) as i64
    }

    pub fn offset(&self) -> i64 {
        self.skip.max(0) as i64
    }
}

#[derive(Clone, Debug)]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub price: i32,
    pub image: Option<String>,
    pub large_image: Option<String>,
}

impl NewItem {
    pub fn validated(self) -> Result<Self> {
        let title = self.title.trim().to_owned();
        let description = self.description.trim().to_owned();
        if title.is_empty() {
            return Err("Your item needs a title".into());
        }
        if description.is_empty() {
            return Err("Your item needs a description".into());
        }
        check_price(self.price)?;

        Ok(Self {
            title,
            description,
            ..self
        })
    }
}

/// Fields left as `None` keep their current value.
#[derive(Clone, Debug, Default)]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i32>,
    pub image: Option<String>,
    pub large_image: Option<String>,
}

impl ItemUpdate {
    pub fn apply_to(self, item: &Item) -> Result<NewItem> {
        NewItem {
            title: self.title.unwrap_or_else(|| item.title.clone()),
            description: self.description.unwrap_or_else(|| item.description.clone()),
            price: self.price.unwrap_or(item.price),
            image: self.image.or_else(|| item.image.clone()),
            large_image: self.large_image.or_else(|| item.large_image.clone()),
        }
        .validated()
    }
}

fn check_price(price: i32) -> Result<()> {
    if price < 0 {
        Err("Price can't be negative".into())
    } else {
        Ok(())
    }
}

/// Turns a search term into an `ILIKE` pattern that matches it literally anywhere.
pub fn search_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');

    pattern
}

fn push_search<'a>(query: &mut QueryBuilder<'a, Postgres>, search: Option<&str>) {
    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = search_pattern(search);
        query
            .push(" WHERE (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

impl Item {
    pub async fn with_id(id: &str, pool: &PgPool) -> Result<Self> {
        Self::with_id_opt(id, pool)
            .await?
            .ok_or_else(|| format!("No item found for ID {}", id).into())
    }

    pub async fn with_id_opt(id: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn page(page: &ItemPage, pool: &PgPool) -> Result<Vec<Self>> {
        let mut query = QueryBuilder::new(format!("SELECT {ITEM_COLUMNS} FROM items"));
        push_search(&mut query, page.search.as_deref());
        query
            .push(page.order.sql())
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        query
            .build_query_as()
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn count(search: Option<&str>, pool: &PgPool) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM items");
        push_search(&mut query, search);

        query
            .build_query_scalar()
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn create(new_item: NewItem, user_id: &str, pool: &PgPool) -> Result<Self> {
        let new_item = new_item.validated()?;
        let id = new_id();

        sqlx::query(
            "INSERT INTO items (id, title, description, image, large_image, price, user_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&id)
        .bind(&new_item.title)
        .bind(&new_item.description)
        .bind(&new_item.image)
        .bind(&new_item.large_image)
        .bind(new_item.price)
        .bind(user_id)
        .execute(pool)
        .await?;

        tracing::info!(item = %id, user = %user_id, "item created");
        Self::with_id(&id, pool).await
    }

    pub async fn update(&self, update: ItemUpdate, pool: &PgPool) -> Result<Self> {
        let updated = update.apply_to(self)?;

        sqlx::query(
            "UPDATE items SET title = $1, description = $2, image = $3, large_image = $4,
                 price = $5, updated_at = now()
             WHERE id = $6",
        )
        .bind(&updated.title)
        .bind(&updated.description)
        .bind(&updated.image)
        .bind(&updated.large_image)
        .bind(updated.price)
        .bind(&self.id)
        .execute(pool)
        .await?;

        Self::with_id(&self.id, pool).await
    }

    pub async fn delete(&self, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(&self.id)
            .execute(pool)
            .await?;

        tracing::info!(item = %self.id, "item deleted");
        Ok(())
    }
}
