#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use sick_fits::config::Config;
use sick_fits::email::{Mailer, OutgoingEmail};
use sick_fits::error::{ShopError, ShopResult};
use sick_fits::graphql::{build_schema, Services, ShopSchema};
use sick_fits::models::item::{Item, NewItem};
use sick_fits::models::permission::Permission;
use sick_fits::models::user::{NewUser, User};
use sick_fits::payment::{Charge, PaymentGateway};
use sick_fits::util::{connect_to_db, new_id};

pub const PASSWORD: &str = "dogs1234";

pub fn test_config(database_url: &str) -> Config {
    Config {
        database_url: database_url.to_owned(),
        app_secret: "test-secret".to_owned(),
        stripe_secret: "sk_test".to_owned(),
        mailgun_token: "key-test".to_owned(),
        mailgun_domain: "mail.sickfits.com".to_owned(),
        frontend_url: "http://localhost:7777".to_owned(),
        port: 4444,
    }
}

pub fn test_schema(
    pool: PgPool,
    payments: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
) -> ShopSchema {
    build_schema(Services {
        pool,
        config: test_config("postgres://localhost/sick_fits_test"),
        payments,
        mailer,
    })
}

/// The database named by `DATABASE_URL`, migrated, or `None` when there isn't one.
pub async fn database() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set, skipping");
        return None;
    };

    Some(connect_to_db(&url).await.expect("failed to set up the test database"))
}

pub fn unique_email() -> String {
    format!("{}@sickfits.com", new_id())
}

pub async fn new_user(pool: &PgPool, permissions: &[Permission]) -> User {
    let user = User::signup(
        NewUser {
            name: "Wes".to_owned(),
            email: unique_email(),
            password: PASSWORD.to_owned(),
        },
        pool,
    )
    .await
    .unwrap();

    if permissions == Permission::DEFAULT.as_slice() {
        user
    } else {
        User::set_permissions(&user.id, permissions, pool)
            .await
            .unwrap()
    }
}

pub async fn new_item(pool: &PgPool, seller: &User, title: &str, price: i32) -> Item {
    Item::create(
        NewItem {
            title: title.to_owned(),
            description: "Limited time only".to_owned(),
            price,
            image: None,
            large_image: None,
        },
        &seller.id,
        pool,
    )
    .await
    .unwrap()
}

pub struct DecliningGateway;

#[async_trait]
impl PaymentGateway for DecliningGateway {
    async fn charge(
        &self,
        _amount: i32,
        _currency: &str,
        _source: &str,
        _idempotency_key: &str,
    ) -> ShopResult<Charge> {
        Err(ShopError::Payment("Your card was declined.".to_owned()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChargeRecord {
    pub amount: i32,
    pub currency: String,
    pub source: String,
    pub idempotency_key: String,
}

/// Accepts every charge, optionally after a pause, and remembers them.
#[derive(Default)]
pub struct RecordingGateway {
    delay: Option<Duration>,
    charges: Mutex<Vec<ChargeRecord>>,
}

impl RecordingGateway {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn charges(&self) -> Vec<ChargeRecord> {
        self.charges.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn charge(
        &self,
        amount: i32,
        currency: &str,
        source: &str,
        idempotency_key: &str,
    ) -> ShopResult<Charge> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.charges.lock().unwrap().push(ChargeRecord {
            amount,
            currency: currency.to_owned(),
            source: source.to_owned(),
            idempotency_key: idempotency_key.to_owned(),
        });

        Ok(Charge {
            id: format!("ch_{idempotency_key}"),
            amount,
        })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> ShopResult<()> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}
