use std::sync::Arc;

use async_graphql::{EmptySubscription, Request, Response, Schema, SimpleObject};
use sqlx::PgPool;

use crate::config::Config;
use crate::email::Mailer;
use crate::graphql::mutation::MutationRoot;
use crate::graphql::query::QueryRoot;
use crate::models::user::User;
use crate::payment::PaymentGateway;

pub mod guards;
pub mod mutation;
pub mod query;

pub type ShopSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// A plain confirmation for mutations with nothing else to return
#[derive(SimpleObject, Clone, Debug, PartialEq, Eq)]
pub struct SuccessMessage {
    pub message: String,
}

impl SuccessMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything resolvers need besides the current user.
pub struct Services {
    pub pool: PgPool,
    pub config: Config,
    pub payments: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
}

pub fn build_schema(services: Services) -> ShopSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(services.pool)
        .data(services.config)
        .data(services.payments)
        .data(services.mailer)
        .finish()
}

/// Runs an operation, as the given user if someone is logged in.
pub async fn execute(schema: &ShopSchema, request: Request, user: Option<User>) -> Response {
    let request = if let Some(user) = user {
        request.data(user)
    } else {
        request
    };

    schema.execute(request).await
}
