mod common;

use bigdecimal::BigDecimal;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::str::FromStr;

use common::{dec, TestContext, USER_ADDRESS};
use exchange_core::{create_app, HttpSettings};

const PASSWORD: &str = "Str0ng@pass";

struct TestApp {
    base_url: String,
    client: Client,
    ctx: TestContext,
}

async fn spawn_app() -> TestApp {
    spawn_app_with(&[]).await
}

async fn spawn_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let ctx = TestContext::with_overrides(overrides);
    let app = create_app(ctx.state.clone(), &HttpSettings::from_config(&ctx.config));

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
    let server = axum::Server::bind(&addr).serve(app.into_make_service());
    let actual_addr = server.local_addr();

    tokio::spawn(async move {
        server.await.unwrap();
    });

    TestApp {
        base_url: format!("http://{}", actual_addr),
        client: Client::new(),
        ctx,
    }
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn register(&self, email: &str) -> String {
        let res = self
            .client
            .post(self.url("/api/users/register"))
            .json(&json!({
                "email": email,
                "password": PASSWORD,
                "firstName": "Ada",
                "lastName": "Obi",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        let res = self
            .client
            .post(self.url("/api/admin/initialize"))
            .json(&json!({ "email": "ops@example.com", "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn buy(&self, token: &str, amount: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/transactions/buy"))
            .bearer_auth(token)
            .json(&json!({ "liskAmount": amount, "liskAddress": USER_ADDRESS }))
            .send()
            .await
            .unwrap()
    }

    async fn sell(&self, token: &str, amount: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/transactions/sell"))
            .bearer_auth(token)
            .json(&json!({
                "liskAmount": amount,
                "bankDetails": {
                    "accountName": "Ada Obi",
                    "accountNumber": "0987654321",
                    "bankName": "GTBank"
                }
            }))
            .send()
            .await
            .unwrap()
    }

    async fn order_id(&self, res: reqwest::Response) -> String {
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["data"]["transaction"]["id"].as_str().unwrap().to_string()
    }
}

/// Decimal fields are serialized as strings.
fn num(value: &Value) -> BigDecimal {
    BigDecimal::from_str(value.as_str().unwrap()).unwrap()
}

fn image_form(field: &str, bytes: &[u8]) -> Form {
    Form::new().part(
        field.to_string(),
        Part::bytes(bytes.to_vec())
            .file_name("receipt.png")
            .mime_str("image/png")
            .unwrap(),
    )
}

#[tokio::test]
async fn health_reports_healthy_with_request_id() {
    let app = spawn_app().await;

    let res = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn caller_request_id_is_echoed() {
    let app = spawn_app().await;
    let res = app
        .client
        .get(app.url("/health"))
        .header("x-request-id", "trace-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-123");
}

#[tokio::test]
async fn registration_login_and_profile() {
    let app = spawn_app().await;

    let res = app
        .client
        .post(app.url("/api/users/register"))
        .json(&json!({
            "email": "  Ada@Example.COM ",
            "password": PASSWORD,
            "firstName": "Ada",
            "lastName": "Obi",
            "liskAddress": USER_ADDRESS,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["user"]["email"], "ada@example.com");
    assert!(body["data"]["user"].get("passwordHash").is_none());

    let duplicate = app
        .client
        .post(app.url("/api/users/register"))
        .json(&json!({
            "email": "ada@example.com",
            "password": PASSWORD,
            "firstName": "Ada",
            "lastName": "Obi",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let wrong = app
        .client
        .post(app.url("/api/users/login"))
        .json(&json!({ "email": "ada@example.com", "password": "Wr0ng@pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let body: Value = wrong.json().await.unwrap();
    assert_eq!(body["message"], "Invalid email or password");

    let res = app
        .client
        .post(app.url("/api/users/login"))
        .json(&json!({ "email": "ada@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let token = res.json::<Value>().await.unwrap()["token"]
        .as_str()
        .unwrap()
        .to_string();

    let res = app
        .client
        .patch(app.url("/api/users/profile"))
        .bearer_auth(&token)
        .json(&json!({ "firstName": "Adaeze" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let profile: Value = app
        .client
        .get(app.url("/api/users/profile"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["data"]["user"]["firstName"], "Adaeze");
    assert_eq!(profile["data"]["user"]["liskAddress"], USER_ADDRESS);
}

#[tokio::test]
async fn profile_rejects_password_changes_and_weak_input() {
    let app = spawn_app().await;
    let token = app.register("ada@example.com").await;

    let res = app
        .client
        .patch(app.url("/api/users/profile"))
        .bearer_auth(&token)
        .json(&json!({ "password": "N3w@password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .client
        .post(app.url("/api/users/register"))
        .json(&json!({
            "email": "weak@example.com",
            "password": "password",
            "firstName": "Weak",
            "lastName": "Pass",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = spawn_app().await;

    let res = app
        .client
        .get(app.url("/api/transactions/my-transactions"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Not authorized, no token");

    let res = app
        .client
        .get(app.url("/api/users/profile"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn buy_order_returns_quote_and_instructions() {
    let app = spawn_app().await;
    let token = app.register("buyer@example.com").await;

    let res = app.buy(&token, json!(1)).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();

    assert_eq!(body["message"], "Buy order created successfully");
    let data = &body["data"];
    assert_eq!(data["transaction"]["status"], "pending_payment");
    assert!(data["transaction"]["paymentReference"]
        .as_str()
        .unwrap()
        .starts_with("LSK-"));
    assert_eq!(num(&data["amounts"]["base"]["ngn"]), dec("1500"));
    assert_eq!(num(&data["amounts"]["fees"]["ngn"]), dec("22.5"));
    assert_eq!(num(&data["amounts"]["total"]["ngn"]), dec("1522.5"));
    assert_eq!(num(&data["currentRates"]["ngn"]), dec("1500"));
    assert_eq!(data["paymentInstructions"]["currency"], "NGN");
    assert_eq!(
        data["paymentInstructions"]["bankDetails"]["accountNumber"],
        "0123456789"
    );
}

#[tokio::test]
async fn sell_order_accepts_amount_as_string() {
    let app = spawn_app().await;
    let token = app.register("seller@example.com").await;

    let res = app.sell(&token, json!("100")).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    let data = &body["data"];
    assert_eq!(num(&data["amounts"]["total"]["ngn"]), dec("147750"));
    assert_eq!(
        data["paymentInstructions"]["sendToAddress"],
        app.ctx.config.platform_asset_address.as_str()
    );
}

#[tokio::test]
async fn order_input_is_validated() {
    let app = spawn_app().await;
    let token = app.register("buyer@example.com").await;

    for amount in [json!(0), json!(10001), json!("abc"), json!(-5)] {
        let res = app.buy(&token, amount).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    let res = app
        .client
        .post(app.url("/api/transactions/buy"))
        .bearer_auth(&token)
        .json(&json!({ "liskAmount": 10, "liskAddress": "lsk123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .client
        .post(app.url("/api/transactions/sell"))
        .bearer_auth(&token)
        .json(&json!({
            "liskAmount": 10,
            "bankDetails": { "accountName": "Ada Obi", "accountNumber": "12345", "bankName": "GTBank" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .client
        .post(app.url("/api/transactions/buy"))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "error");

    assert_eq!(app.ctx.transactions.len().await, 0);
}

#[tokio::test]
async fn oracle_outage_is_a_bad_gateway() {
    let app = spawn_app().await;
    let token = app.register("buyer@example.com").await;
    app.ctx.oracle.set_failing(true);

    let res = app.buy(&token, json!(10)).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Price service unavailable, please try again later");
}

#[tokio::test]
async fn transactions_are_visible_only_to_owner_and_admin() {
    let app = spawn_app().await;
    let owner = app.register("owner@example.com").await;
    let other = app.register("other@example.com").await;
    let admin = app.admin_token().await;
    let id = app.order_id(app.buy(&owner, json!(5)).await).await;

    let path = format!("/api/transactions/{}", id);
    let res = app.client.get(app.url(&path)).bearer_auth(&owner).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["statusHistory"].as_array().unwrap().len(), 1);

    let res = app.client.get(app.url(&path)).bearer_auth(&other).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.client.get(app.url(&path)).bearer_auth(&admin).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .client
        .get(app.url("/api/transactions/not-a-uuid"))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let mine: Value = app
        .client
        .get(app.url("/api/transactions/my-transactions?page=1&limit=5"))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine["data"]["pagination"]["total"], 0);
}

#[tokio::test]
async fn payment_proof_upload_is_stored_and_served() {
    let app = spawn_app().await;
    let token = app.register("buyer@example.com").await;
    let id = app.order_id(app.buy(&token, json!(5)).await).await;

    let res = app
        .client
        .post(app.url(&format!("/api/transactions/{}/payment-proof", id)))
        .bearer_auth(&token)
        .multipart(image_form("paymentProof", b"\x89PNG receipt"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let proof_url = body["data"]["transaction"]["paymentProof"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(
        body["data"]["transaction"]["statusHistory"].as_array().unwrap().len(),
        1
    );

    let receipt = &body["data"]["paymentProof"];
    assert_eq!(receipt["url"], proof_url.as_str());
    assert!(receipt["uploadedAt"].is_string());
    assert!(receipt["message"].as_str().unwrap().contains("payment receipt"));
    assert_eq!(receipt["instructions"].as_array().unwrap().len(), 4);
    assert!(body["data"].get("sellProof").is_none());

    let served_path = &proof_url[proof_url.find("/uploads/").unwrap()..];
    let res = app.client.get(app.url(served_path)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await.unwrap().as_ref(), b"\x89PNG receipt");
}

#[tokio::test]
async fn sell_proof_upload_returns_sell_receipt() {
    let app = spawn_app().await;
    let token = app.register("seller@example.com").await;
    let id = app.order_id(app.sell(&token, json!(5)).await).await;

    let res = app
        .client
        .post(app.url(&format!("/api/transactions/{}/sell-proof", id)))
        .bearer_auth(&token)
        .multipart(image_form("sellProof", b"hash screenshot"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();

    let receipt = &body["data"]["sellProof"];
    assert_eq!(receipt["url"], body["data"]["transaction"]["paymentProof"]);
    assert!(receipt["message"].as_str().unwrap().contains("transaction hash"));
    assert!(body["data"].get("paymentProof").is_none());
}

#[tokio::test]
async fn html_named_image_is_served_as_image() {
    let app = spawn_app().await;
    let token = app.register("buyer@example.com").await;
    let id = app.order_id(app.buy(&token, json!(5)).await).await;

    let form = Form::new().part(
        "paymentProof",
        Part::bytes(b"<script>alert(1)</script>".to_vec())
            .file_name("receipt.html")
            .mime_str("image/png")
            .unwrap(),
    );
    let res = app
        .client
        .post(app.url(&format!("/api/transactions/{}/payment-proof", id)))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let proof_url = body["data"]["paymentProof"]["url"].as_str().unwrap().to_string();
    assert!(proof_url.ends_with(".png"));

    let served_path = &proof_url[proof_url.find("/uploads/").unwrap()..];
    let res = app.client.get(app.url(served_path)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "image/png");

    let svg = Form::new().part(
        "paymentProof",
        Part::bytes(b"<svg onload=\"alert(1)\"/>".to_vec())
            .file_name("receipt.svg")
            .mime_str("image/svg+xml")
            .unwrap(),
    );
    let res = app
        .client
        .post(app.url(&format!("/api/transactions/{}/payment-proof", id)))
        .bearer_auth(&token)
        .multipart(svg)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn proof_upload_errors() {
    let app = spawn_app().await;
    let token = app.register("buyer@example.com").await;
    let id = app.order_id(app.buy(&token, json!(5)).await).await;

    let res = app
        .client
        .post(app.url(&format!("/api/transactions/{}/sell-proof", id)))
        .bearer_auth(&token)
        .multipart(image_form("sellProof", b"hash"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "This is not a sell transaction");

    let res = app
        .client
        .post(app.url(&format!("/api/transactions/{}/payment-proof", id)))
        .bearer_auth(&token)
        .multipart(image_form("somethingElse", b"receipt"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "No file uploaded");

    let text = Form::new().part(
        "paymentProof",
        Part::bytes(b"plain".to_vec())
            .file_name("notes.txt")
            .mime_str("text/plain")
            .unwrap(),
    );
    let res = app
        .client
        .post(app.url(&format!("/api/transactions/{}/payment-proof", id)))
        .bearer_auth(&token)
        .multipart(text)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_proof_is_rejected() {
    let app = spawn_app_with(&[("MAX_UPLOAD_BYTES", "1024")]).await;
    let token = app.register("buyer@example.com").await;
    let id = app.order_id(app.buy(&token, json!(5)).await).await;

    let res = app
        .client
        .post(app.url(&format!("/api/transactions/{}/payment-proof", id)))
        .bearer_auth(&token)
        .multipart(image_form("paymentProof", &[7u8; 2048]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_drives_the_status_workflow() {
    let app = spawn_app().await;
    let user = app.register("buyer@example.com").await;
    let admin = app.admin_token().await;
    let id = app.order_id(app.buy(&user, json!(5)).await).await;
    let path = format!("/api/transactions/{}/status", id);

    let res = app
        .client
        .patch(app.url(&path))
        .bearer_auth(&user)
        .json(&json!({ "status": "payment_received" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .client
        .patch(app.url(&path))
        .bearer_auth(&admin)
        .json(&json!({ "status": "completed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .client
        .patch(app.url(&path))
        .bearer_auth(&admin)
        .json(&json!({ "status": "shipped" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .client
        .patch(app.url(&path))
        .bearer_auth(&admin)
        .json(&json!({ "status": "PAYMENT_RECEIVED", "note": "Bank alert confirmed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let history = body["data"]["statusHistory"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["status"], "payment_received");
    assert_eq!(history[1]["note"], "Bank alert confirmed");
}

#[tokio::test]
async fn admin_listing_filters_and_paginates() {
    let app = spawn_app().await;
    let user = app.register("trader@example.com").await;
    let admin = app.admin_token().await;

    app.order_id(app.buy(&user, json!(1)).await).await;
    app.order_id(app.buy(&user, json!(2)).await).await;
    app.order_id(app.sell(&user, json!(3)).await).await;

    let body: Value = app
        .client
        .get(app.url("/api/transactions?type=buy&limit=1&page=2"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["pagination"]["total"], 2);
    assert_eq!(body["data"]["pagination"]["pages"], 2);
    assert_eq!(body["data"]["transactions"].as_array().unwrap().len(), 1);

    let body: Value = app
        .client
        .get(app.url("/api/transactions?status=pending_payment"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["pagination"]["total"], 3);

    for query in ["status=done", "limit=500", "page=0", "startDate=2024-02-01&endDate=2024-01-01"] {
        let res = app
            .client
            .get(app.url(&format!("/api/transactions?{}", query)))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", query);
    }

    let res = app
        .client
        .get(app.url("/api/transactions"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_bootstrap_happens_once() {
    let app = spawn_app().await;
    app.admin_token().await;

    let res = app
        .client
        .post(app.url("/api/admin/initialize"))
        .json(&json!({ "email": "second@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .client
        .post(app.url("/api/admin/login"))
        .json(&json!({ "email": "ops@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["admin"]["email"], "ops@example.com");
}

#[tokio::test]
async fn admin_tokens_cannot_place_orders() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let res = app.buy(&admin, json!(5)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn price_endpoints_record_and_report_snapshots() {
    let app = spawn_app().await;

    for _ in 0..3 {
        let res = app.client.get(app.url("/api/crypto/price")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(num(&body["data"]["prices"]["ngn"]), dec("1500"));
    }

    let body: Value = app
        .client
        .get(app.url("/api/crypto/history?limit=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["history"].as_array().unwrap().len(), 2);

    let body: Value = app
        .client
        .get(app.url("/api/crypto/top?limit=3&page=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let coins = body["data"]["coins"].as_array().unwrap();
    assert_eq!(coins.len(), 3);
    assert_eq!(coins[0]["market_cap_rank"], 4);

    let res = app
        .client
        .get(app.url("/api/crypto/history?limit=abc"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
