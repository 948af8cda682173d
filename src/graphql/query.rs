use async_graphql::{Context, Object, Result, SimpleObject};
use sqlx::PgPool;

use crate::graphql::guards::{HasPermission, LoggedIn};
use crate::models::item::{Item, ItemOrder, ItemPage, ITEMS_PER_PAGE};
use crate::models::order::Order;
use crate::models::user::User;

pub struct QueryRoot;

#[derive(SimpleObject)]
pub struct ItemsAggregate {
    /// How many items match
    pub count: i64,
}

#[derive(SimpleObject)]
pub struct ItemsConnection {
    pub aggregate: ItemsAggregate,
}

#[Object]
impl QueryRoot {
    /// The currently logged in user, if there is one
    pub async fn me(&self, ctx: &Context<'_>) -> Option<User> {
        ctx.data_opt::<User>().cloned()
    }

    /// A page of items for sale
    pub async fn items(
        &self,
        ctx: &Context<'_>,
        search: Option<String>,
        #[graphql(default)] order_by: ItemOrder,
        #[graphql(default = 0)] skip: i32,
        #[graphql(default_with = "ITEMS_PER_PAGE")] first: i32,
    ) -> Result<Vec<Item>> {
        let pool: &PgPool = ctx.data_unchecked();
        let page = ItemPage {
            search,
            order: order_by,
            skip,
            first,
        };

        Item::page(&page, pool).await
    }

    pub async fn item(&self, ctx: &Context<'_>, id: String) -> Result<Option<Item>> {
        let pool: &PgPool = ctx.data_unchecked();
        Item::with_id_opt(&id, pool).await
    }

    /// Counts the items matching a search, for pagination
    pub async fn items_connection(
        &self,
        ctx: &Context<'_>,
        search: Option<String>,
    ) -> Result<ItemsConnection> {
        let pool: &PgPool = ctx.data_unchecked();
        let count = Item::count(search.as_deref(), pool).await?;

        Ok(ItemsConnection {
            aggregate: ItemsAggregate { count },
        })
    }

    #[graphql(guard = "LoggedIn.and(HasPermission::MANAGE_PERMISSIONS)")]
    pub async fn users(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        let pool: &PgPool = ctx.data_unchecked();
        User::all(pool).await
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn order(&self, ctx: &Context<'_>, id: String) -> Result<Order> {
        let pool: &PgPool = ctx.data_unchecked();
        let user: &User = ctx.data_unchecked();
        Order::visible_to(&id, user, pool).await
    }

    /// The current user's orders, newest first
    #[graphql(guard = "LoggedIn")]
    pub async fn orders(&self, ctx: &Context<'_>) -> Result<Vec<Order>> {
        let pool: &PgPool = ctx.data_unchecked();
        let user: &User = ctx.data_unchecked();
        Order::for_user(&user.id, pool).await
    }
}
