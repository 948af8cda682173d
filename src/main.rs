//! Serves the Sick Fits GraphQL API

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use async_graphql::Request;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use sick_fits::auth::token_from_headers;
use sick_fits::config::Config;
use sick_fits::email::MailgunMailer;
use sick_fits::error::{ShopError, ShopResult};
use sick_fits::graphql::{build_schema, execute, Services, ShopSchema};
use sick_fits::models::user::User;
use sick_fits::payment::StripeGateway;
use sick_fits::util::connect_to_db;

const DEFAULT_LOG_FILTER: &str = "sick_fits=info,tower_http=info";

#[derive(Clone)]
struct AppState {
    schema: ShopSchema,
    pool: PgPool,
    app_secret: Arc<str>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let pool = connect_to_db(&config.database_url)
        .await
        .context("failed to connect to the database")?;
    let frontend_origin: HeaderValue = config
        .frontend_url
        .parse()
        .with_context(|| format!("`{}` is not a valid origin", config.frontend_url))?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let state = AppState {
        pool: pool.clone(),
        app_secret: Arc::from(config.app_secret.as_str()),
        schema: build_schema(Services {
            pool,
            payments: Arc::new(StripeGateway::new(config.stripe_secret.clone())),
            mailer: Arc::new(MailgunMailer::new(
                config.mailgun_token.clone(),
                config.mailgun_domain.clone(),
            )),
            config,
        }),
    };

    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/", get(playground).post(graphql))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!(%addr, "server is running");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn graphql(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<Request>,
) -> ShopResult<impl IntoResponse> {
    let user = current_user(&headers, &state).await?;
    let response = execute(&state.schema, request, user).await;

    Ok((response.http_headers.clone(), Json(response)))
}

/// Loads whoever the request's login cookie names. Bad or expired tokens count as logged out.
async fn current_user(headers: &HeaderMap, state: &AppState) -> ShopResult<Option<User>> {
    let Some(token) = token_from_headers(headers) else {
        return Ok(None);
    };

    match User::with_token(token, &state.app_secret, &state.pool).await {
        Ok(None) => {
            tracing::warn!("login token names a user that no longer exists");
            Ok(None)
        }
        Ok(user) => Ok(user),
        Err(ShopError::InvalidToken(error)) => {
            tracing::warn!(%error, "ignoring invalid login token");
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

async fn playground() -> Html<String> {
    Html(playground_source(
        GraphQLPlaygroundConfig::new("/").with_setting("request.credentials", "include"),
    ))
}
