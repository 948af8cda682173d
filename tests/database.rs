//! Runs against the Postgres database named by `DATABASE_URL`. Every test
//! makes its own users and items, so they can share one database.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_graphql::Request;
use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;

use sick_fits::error::{ShopError, ShopResult};
use sick_fits::graphql::execute;
use sick_fits::models::cart::CartItem;
use sick_fits::models::item::{Item, ItemPage};
use sick_fits::models::order::{Order, OrderItem};
use sick_fits::models::permission::Permission;
use sick_fits::models::user::{NewUser, PasswordReset, User};
use sick_fits::payment::{Charge, PaymentGateway};
use sick_fits::util::new_id;

use common::{
    database, new_item, new_user, test_schema, unique_email, DecliningGateway, RecordingGateway,
    RecordingMailer, PASSWORD,
};

const CHECKOUT: &str = r#"mutation { createOrder(token: "tok_visa") { id } }"#;

/// Puts another item in the buyer's cart while their card is being charged.
struct CartFillingGateway {
    pool: PgPool,
    user_id: String,
    item_id: String,
}

#[async_trait]
impl PaymentGateway for CartFillingGateway {
    async fn charge(
        &self,
        amount: i32,
        _currency: &str,
        _source: &str,
        idempotency_key: &str,
    ) -> ShopResult<Charge> {
        CartItem::add(&self.user_id, &self.item_id, &self.pool)
            .await
            .map_err(|err| ShopError::Payment(err.message))?;

        Ok(Charge {
            id: format!("ch_{idempotency_key}"),
            amount,
        })
    }
}

#[tokio::test]
async fn checkout_charges_for_the_cart_and_empties_it() {
    let Some(pool) = database().await else { return };
    let seller = new_user(&pool, &[Permission::User, Permission::ItemCreate]).await;
    let buyer = new_user(&pool, &Permission::DEFAULT).await;
    let hat = new_item(&pool, &seller, "Hat", 1000).await;
    let shoe = new_item(&pool, &seller, "Shoe", 2500).await;
    let gone = new_item(&pool, &seller, "Gone", 99).await;

    CartItem::add(&buyer.id, &hat.id, &pool).await.unwrap();
    CartItem::add(&buyer.id, &hat.id, &pool).await.unwrap();
    CartItem::add(&buyer.id, &shoe.id, &pool).await.unwrap();
    CartItem::add(&buyer.id, &gone.id, &pool).await.unwrap();
    gone.delete(&pool).await.unwrap();

    let gateway = Arc::new(RecordingGateway::default());
    let schema = test_schema(
        pool.clone(),
        gateway.clone(),
        Arc::new(RecordingMailer::default()),
    );
    let response = execute(
        &schema,
        Request::new(
            r#"mutation {
                createOrder(token: "tok_visa") { id total charge items { title price quantity } }
            }"#,
        ),
        Some(buyer.clone()),
    )
    .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    let order = &data["createOrder"];
    let order_id = order["id"].as_str().unwrap().to_owned();
    assert_eq!(order["total"], 4500);
    assert_eq!(order["charge"], format!("ch_{order_id}"));
    assert_eq!(
        order["items"],
        json!([
            { "title": "Hat", "price": 1000, "quantity": 2 },
            { "title": "Shoe", "price": 2500, "quantity": 1 },
        ])
    );

    let charges = gateway.charges();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].amount, 4500);
    assert_eq!(charges[0].currency, "USD");
    assert_eq!(charges[0].source, "tok_visa");
    assert_eq!(charges[0].idempotency_key, order_id);

    assert!(CartItem::for_user(&buyer.id, &pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn overlapping_checkouts_charge_once() {
    let Some(pool) = database().await else { return };
    let seller = new_user(&pool, &[Permission::ItemCreate]).await;
    let buyer = new_user(&pool, &Permission::DEFAULT).await;
    let hat = new_item(&pool, &seller, "Hat", 1000).await;
    CartItem::add(&buyer.id, &hat.id, &pool).await.unwrap();

    let gateway = Arc::new(RecordingGateway::slow(Duration::from_millis(300)));
    let schema = test_schema(
        pool.clone(),
        gateway.clone(),
        Arc::new(RecordingMailer::default()),
    );

    let (first, second) = tokio::join!(
        execute(&schema, Request::new(CHECKOUT), Some(buyer.clone())),
        execute(&schema, Request::new(CHECKOUT), Some(buyer.clone())),
    );

    let errors: Vec<_> = first
        .errors
        .iter()
        .chain(&second.errors)
        .map(|err| err.message.as_str())
        .collect();
    assert_eq!(errors, ["Your cart is empty"]);
    assert_eq!(gateway.charges().len(), 1);
    assert_eq!(Order::for_user(&buyer.id, &pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn declined_payments_leave_the_cart_alone() {
    let Some(pool) = database().await else { return };
    let seller = new_user(&pool, &[Permission::ItemCreate]).await;
    let buyer = new_user(&pool, &Permission::DEFAULT).await;
    let hat = new_item(&pool, &seller, "Hat", 1000).await;
    CartItem::add(&buyer.id, &hat.id, &pool).await.unwrap();
    CartItem::add(&buyer.id, &hat.id, &pool).await.unwrap();

    let schema = test_schema(
        pool.clone(),
        Arc::new(DecliningGateway),
        Arc::new(RecordingMailer::default()),
    );
    let response = execute(&schema, Request::new(CHECKOUT), Some(buyer.clone())).await;

    assert_eq!(
        response.errors[0].message,
        "payment failed: Your card was declined."
    );
    let cart = CartItem::for_user(&buyer.id, &pool).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 2);
    assert!(Order::for_user(&buyer.id, &pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn lines_added_during_checkout_stay_in_the_cart() {
    let Some(pool) = database().await else { return };
    let seller = new_user(&pool, &[Permission::ItemCreate]).await;
    let buyer = new_user(&pool, &Permission::DEFAULT).await;
    let hat = new_item(&pool, &seller, "Hat", 1000).await;
    let shoe = new_item(&pool, &seller, "Shoe", 2500).await;
    CartItem::add(&buyer.id, &hat.id, &pool).await.unwrap();

    let gateway = CartFillingGateway {
        pool: pool.clone(),
        user_id: buyer.id.clone(),
        item_id: shoe.id.clone(),
    };
    let order = Order::checkout(&buyer.id, "tok_visa", &gateway, &pool)
        .await
        .unwrap();

    assert_eq!(order.total, 1000);
    let bought = OrderItem::for_order(&order.id, &pool).await.unwrap();
    assert_eq!(bought.len(), 1);
    assert_eq!(bought[0].title, "Hat");

    let cart = CartItem::for_user(&buyer.id, &pool).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].item_id.as_deref(), Some(shoe.id.as_str()));
    assert_eq!(cart[0].quantity, 1);
}

#[tokio::test]
async fn empty_carts_are_not_charged() {
    let Some(pool) = database().await else { return };
    let buyer = new_user(&pool, &Permission::DEFAULT).await;
    let gateway = RecordingGateway::default();

    let err = Order::checkout(&buyer.id, "tok_visa", &gateway, &pool)
        .await
        .unwrap_err();

    assert_eq!(err.message, "Your cart is empty");
    assert!(gateway.charges().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn adding_the_same_item_concurrently_increments_one_line() {
    let Some(pool) = database().await else { return };
    let seller = new_user(&pool, &[Permission::ItemCreate]).await;
    let buyer = new_user(&pool, &Permission::DEFAULT).await;
    let hat = new_item(&pool, &seller, "Hat", 1000).await;

    let adds: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            let user_id = buyer.id.clone();
            let item_id = hat.id.clone();
            tokio::spawn(async move { CartItem::add(&user_id, &item_id, &pool).await })
        })
        .collect();
    for add in adds {
        add.await.unwrap().unwrap();
    }

    let cart = CartItem::for_user(&buyer.id, &pool).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 8);
}

#[tokio::test]
async fn only_the_owner_can_remove_a_cart_item() {
    let Some(pool) = database().await else { return };
    let seller = new_user(&pool, &[Permission::ItemCreate]).await;
    let buyer = new_user(&pool, &Permission::DEFAULT).await;
    let stranger = new_user(&pool, &Permission::DEFAULT).await;
    let hat = new_item(&pool, &seller, "Hat", 1000).await;
    let line = CartItem::add(&buyer.id, &hat.id, &pool).await.unwrap();

    let err = CartItem::remove(&line.id, &stranger, &pool).await.unwrap_err();
    assert_eq!(err.message, "Cheatin huhhh");

    let err = CartItem::remove(&new_id(), &buyer, &pool).await.unwrap_err();
    assert_eq!(err.message, "No CartItem Found!");

    let removed = CartItem::remove(&line.id, &buyer, &pool).await.unwrap();
    assert_eq!(removed.id, line.id);
    assert!(CartItem::for_user(&buyer.id, &pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_an_item_leaves_cart_lines_without_it() {
    let Some(pool) = database().await else { return };
    let seller = new_user(&pool, &[Permission::ItemCreate]).await;
    let buyer = new_user(&pool, &Permission::DEFAULT).await;
    let hat = new_item(&pool, &seller, "Hat", 1000).await;
    CartItem::add(&buyer.id, &hat.id, &pool).await.unwrap();

    let schema = test_schema(
        pool.clone(),
        Arc::new(RecordingGateway::default()),
        Arc::new(RecordingMailer::default()),
    );
    let delete = format!(r#"mutation {{ deleteItem(id: "{}") {{ title }} }}"#, hat.id);

    let response = execute(&schema, Request::new(delete.clone()), Some(buyer.clone())).await;
    assert_eq!(
        response.errors[0].message,
        "You don't have permission to do that!"
    );

    let response = execute(&schema, Request::new(delete), Some(seller.clone())).await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({ "deleteItem": { "title": "Hat" } })
    );

    let response = execute(
        &schema,
        Request::new("{ me { cart { quantity item { id } } } }"),
        Some(buyer.clone()),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({ "me": { "cart": [{ "quantity": 1, "item": null }] } })
    );

    let response = execute(&schema, Request::new(CHECKOUT), Some(buyer.clone())).await;
    assert_eq!(response.errors[0].message, "Your cart is empty");
}

#[tokio::test]
async fn orders_are_visible_to_their_owner_and_admins() {
    let Some(pool) = database().await else { return };
    let seller = new_user(&pool, &[Permission::ItemCreate]).await;
    let buyer = new_user(&pool, &Permission::DEFAULT).await;
    let stranger = new_user(&pool, &Permission::DEFAULT).await;
    let admin = new_user(&pool, &[Permission::Admin]).await;
    let hat = new_item(&pool, &seller, "Hat", 1000).await;
    CartItem::add(&buyer.id, &hat.id, &pool).await.unwrap();
    let order = Order::checkout(&buyer.id, "tok_visa", &RecordingGateway::default(), &pool)
        .await
        .unwrap();

    assert_eq!(
        Order::visible_to(&order.id, &buyer, &pool).await.unwrap().id,
        order.id
    );
    assert_eq!(
        Order::visible_to(&order.id, &admin, &pool).await.unwrap().id,
        order.id
    );
    assert_eq!(
        Order::visible_to(&order.id, &stranger, &pool)
            .await
            .unwrap_err()
            .message,
        "You can't see this order"
    );

    let missing = new_id();
    assert_eq!(
        Order::visible_to(&missing, &buyer, &pool)
            .await
            .unwrap_err()
            .message,
        format!("No order found for ID {missing}")
    );
}

#[tokio::test]
async fn search_matches_wildcards_literally() {
    let Some(pool) = database().await else { return };
    let seller = new_user(&pool, &[Permission::ItemCreate]).await;
    let tag = new_id().replace('-', "");
    for title in [
        format!("{tag} 50% off"),
        format!("{tag} 50 cents off"),
        format!("{tag}_x"),
        format!("{tag}ax"),
    ] {
        new_item(&pool, &seller, &title, 1000).await;
    }

    let percent = format!("{tag} 50%");
    assert_eq!(Item::count(Some(percent.as_str()), &pool).await.unwrap(), 1);
    let page = ItemPage {
        search: Some(percent),
        first: 10,
        ..ItemPage::default()
    };
    let found = Item::page(&page, &pool).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, format!("{tag} 50% off"));

    assert_eq!(
        Item::count(Some(format!("{tag}_").as_str()), &pool).await.unwrap(),
        1
    );
    assert_eq!(
        Item::count(Some(tag.to_uppercase().as_str()), &pool).await.unwrap(),
        4
    );
}

#[tokio::test]
async fn duplicate_emails_are_rejected() {
    let Some(pool) = database().await else { return };
    let email = unique_email();
    let signup = |email: String| {
        User::signup(
            NewUser {
                name: "Wes".to_owned(),
                email,
                password: PASSWORD.to_owned(),
            },
            &pool,
        )
    };

    signup(email.clone()).await.unwrap();
    let err = signup(email.to_uppercase()).await.unwrap_err();
    assert_eq!(
        err.message,
        format!("Another user already has the email {email}")
    );

    let racing = unique_email();
    let (first, second) = tokio::join!(signup(racing.clone()), signup(racing.clone()));
    let errors: Vec<_> = [first, second]
        .into_iter()
        .filter_map(|result| result.err())
        .map(|err| err.message)
        .collect();
    assert_eq!(
        errors,
        [format!("Another user already has the email {racing}")]
    );
}

#[tokio::test]
async fn reset_links_are_emailed_and_expire() {
    let Some(pool) = database().await else { return };
    let user = new_user(&pool, &Permission::DEFAULT).await;
    let mailer = Arc::new(RecordingMailer::default());
    let schema = test_schema(
        pool.clone(),
        Arc::new(RecordingGateway::default()),
        mailer.clone(),
    );

    let request = format!(
        r#"mutation {{ requestReset(email: "{}") {{ message }} }}"#,
        user.email
    );
    let response = execute(&schema, Request::new(request), None).await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({ "requestReset": { "message": "Thanks!" } })
    );

    let reset_token = User::with_id(&user.id, &pool)
        .await
        .unwrap()
        .reset_token
        .unwrap();
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, format!("Wes <{}>", user.email));
    assert!(sent[0]
        .html
        .contains(&format!("http://localhost:7777/reset?resetToken={reset_token}")));

    sqlx::query("UPDATE users SET reset_token_expiry = now() - interval '1 minute' WHERE id = $1")
        .bind(&user.id)
        .execute(&pool)
        .await
        .unwrap();
    let reset = |reset_token: String| PasswordReset {
        reset_token,
        password: "newpass1".to_owned(),
        confirm_password: "newpass1".to_owned(),
    };
    let err = User::reset_password(reset(reset_token), &pool)
        .await
        .unwrap_err();
    assert_eq!(err.message, "This token is either invalid or expired!");

    let fresh_token = user.start_password_reset(&pool).await.unwrap();
    User::reset_password(reset(fresh_token.clone()), &pool)
        .await
        .unwrap();
    assert!(User::signin(&user.email, "newpass1", &pool).await.is_ok());

    let err = User::reset_password(reset(fresh_token), &pool)
        .await
        .unwrap_err();
    assert_eq!(err.message, "This token is either invalid or expired!");
}
