use super::*;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use chrono::Duration;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::middleware::{AuthState, RateLimitState};

fn test_app(pool: PgPool) -> Router {
    let auth = AuthState::new(Vec::new(), true).expect("auth");
    let rate_limit = RateLimitState::new(1_000, std::time::Duration::from_secs(60));
    build_app(AppState { pool }, auth, rate_limit)
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Seeds two distributors with three stores and one product priced 500.
/// Returns the product id.
async fn seed_catalog(pool: &PgPool) -> i64 {
    let casa: i64 = sqlx::query_scalar(
        "INSERT INTO distributors (name, slug) VALUES ('Casa Piso', 'casa-piso') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .expect("insert distributor");
    let mega: i64 = sqlx::query_scalar(
        "INSERT INTO distributors (name, slug) VALUES ('Mega Azulejo', 'mega-azulejo') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .expect("insert distributor");

    for (distributor_id, slug, state, city) in [
        (casa, "s1", "Jalisco", "Guadalajara"),
        (casa, "s2", "Jalisco", "Zapopan"),
        (mega, "s3", "Sonora", "Hermosillo"),
    ] {
        sqlx::query(
            "INSERT INTO stores (distributor_id, name, slug, state, city) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(distributor_id)
        .bind(format!("Store {slug}"))
        .bind(slug)
        .bind(state)
        .bind(city)
        .execute(pool)
        .await
        .expect("insert store");
    }

    sqlx::query_scalar(
        "INSERT INTO products (sku, name, slug, category, base_price) \
         VALUES ('P1', 'Alpes Gris', 'alpes-gris', 'Porcelánico', 500) RETURNING id",
    )
    .fetch_one(pool)
    .await
    .expect("insert product")
}

fn window() -> (String, String) {
    let today = today();
    (
        (today - Duration::days(1)).to_string(),
        (today + Duration::days(30)).to_string(),
    )
}

fn bulk_body(product_id: i64, filter: &Value) -> Value {
    let (start, end) = window();
    json!({
        "form": {
            "name": "Buen Fin",
            "promo_price": "350",
            "promo_text": "Solo este mes",
            "start_date": start,
            "end_date": end
        },
        "filter": merge(json!({ "products": [product_id] }), filter)
    })
}

fn merge(mut base: Value, extra: &Value) -> Value {
    if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    base
}

async fn store_id(pool: &PgPool, slug: &str) -> i64 {
    sqlx::query_scalar("SELECT id FROM stores WHERE slug = $1")
        .bind(slug)
        .fetch_one(pool)
        .await
        .expect("store id")
}

// ---------------------------------------------------------------------------
// Envelope / error mapping (no DB)
// ---------------------------------------------------------------------------

#[test]
fn api_error_validation_error_maps_to_bad_request() {
    let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn not_found_db_error_maps_to_404() {
    let error = map_db_error_for("req-1".to_owned(), &tilecrm_db::DbError::NotFound, "promotion 9");
    assert_eq!(error.error.code, "not_found");
    assert_eq!(error.error.message, "promotion 9 not found");
    assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);
}

#[test]
fn validation_error_carries_rule_message() {
    let error = validation_error("req-1", &ValidationError::NoProducts);
    assert_eq!(error.error.code, "validation_error");
    assert!(error.error.message.contains("product"));
}

// ---------------------------------------------------------------------------
// Catalog routes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn stores_route_includes_distributor_from_join(pool: PgPool) {
    seed_catalog(&pool).await;

    let (status, json) = send(test_app(pool), Method::GET, "/api/v1/stores?state=Sonora", None).await;

    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().expect("data array");
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["slug"], "s3");
    assert_eq!(data[0]["distributor_slug"], "mega-azulejo");
}

#[sqlx::test(migrations = "../../migrations")]
async fn protected_routes_are_rate_limited_but_landing_is_not(pool: PgPool) {
    seed_catalog(&pool).await;
    let app = build_app(
        AppState { pool },
        AuthState::new(Vec::new(), true).expect("auth"),
        RateLimitState::new(1, std::time::Duration::from_secs(60)),
    );

    let (status, _) = send(app.clone(), Method::GET, "/api/v1/products", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(app.clone(), Method::GET, "/api/v1/products", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");
    assert!(json["meta"]["request_id"].is_string());

    for _ in 0..3 {
        let (status, _) = send(app.clone(), Method::GET, "/api/v1/landing/alpes-gris", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn protected_routes_require_bearer_token_when_enabled(pool: PgPool) {
    let auth = AuthState::new(vec!["secret".to_string()], false).expect("auth");
    let app = build_app(
        AppState { pool },
        auth,
        RateLimitState::new(10, std::time::Duration::from_secs(60)),
    );

    let (status, json) = send(app.clone(), Method::GET, "/api/v1/products", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "unauthorized");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/products")
                .header(header::AUTHORIZATION, "Bearer secret")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Bulk creation and resolution
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_create_then_landing_resolves_per_store(pool: PgPool) {
    let product_id = seed_catalog(&pool).await;
    let s1 = store_id(&pool, "s1").await;

    let (status, json) = send(
        test_app(pool.clone()),
        Method::POST,
        "/api/v1/promotions/bulk",
        Some(bulk_body(product_id, &json!({ "stores": [s1] }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["requested"], 1);
    assert_eq!(json["data"]["created"], 1);
    assert_eq!(json["data"]["failed"], 0);

    let (status, json) = send(
        test_app(pool.clone()),
        Method::GET,
        "/api/v1/landing/p1?store=s1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["price"], "350.00");
    assert_eq!(json["data"]["is_promotional"], true);
    assert_eq!(json["data"]["promo_text"], "Solo este mes");

    let (_, json) = send(
        test_app(pool.clone()),
        Method::GET,
        "/api/v1/landing/alpes-gris?store=s2",
        None,
    )
    .await;
    assert_eq!(json["data"]["price"], "500.00");
    assert_eq!(json["data"]["is_promotional"], false);
    assert!(json["data"]["promo_text"].is_null());

    let (_, json) = send(test_app(pool), Method::GET, "/api/v1/landing/P1", None).await;
    assert_eq!(json["data"]["price"], "500.00");
    assert!(json["data"]["store_slug"].is_null());
}

#[sqlx::test(migrations = "../../migrations")]
async fn landing_accepts_qr_store_parameter(pool: PgPool) {
    let product_id = seed_catalog(&pool).await;
    let s3 = store_id(&pool, "s3").await;

    let (status, _) = send(
        test_app(pool.clone()),
        Method::POST,
        "/api/v1/promotions/bulk",
        Some(bulk_body(product_id, &json!({ "stores": [s3] }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(
        test_app(pool),
        Method::GET,
        "/api/v1/landing/P1?tienda=mega-azulejo-s3",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["store_slug"], "s3");
    assert_eq!(json["data"]["is_promotional"], true);
}

#[sqlx::test(migrations = "../../migrations")]
async fn landing_unknown_product_is_404(pool: PgPool) {
    let (status, json) = send(test_app(pool), Method::GET, "/api/v1/landing/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_over_distributor_creates_cross_product(pool: PgPool) {
    let p1 = seed_catalog(&pool).await;
    let p2: i64 = sqlx::query_scalar(
        "INSERT INTO products (sku, name, base_price) VALUES ('P2', 'Roma', 200) RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .expect("insert product");

    let mut body = bulk_body(p1, &json!({ "distributors": ["Casa Piso"] }));
    body["filter"]["products"] = json!([p1, p2]);

    let (status, json) = send(test_app(pool.clone()), Method::POST, "/api/v1/promotions/bulk", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["requested"], 4);
    assert_eq!(json["data"]["created"], 4);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM promotions WHERE scope_value = 's3'")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(count, 0, "other distributor's store untouched");
}

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_reports_missing_product_as_failure(pool: PgPool) {
    let p1 = seed_catalog(&pool).await;
    let s1 = store_id(&pool, "s1").await;

    let mut body = bulk_body(p1, &json!({ "stores": [s1] }));
    body["filter"]["products"] = json!([p1, 999_999]);

    let (status, json) = send(test_app(pool), Method::POST, "/api/v1/promotions/bulk", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["requested"], 2);
    assert_eq!(json["data"]["created"], 1);
    assert_eq!(json["data"]["failed"], 1);
    assert_eq!(json["data"]["failures"][0]["product_id"], 999_999);
    assert_eq!(json["data"]["failures"][0]["reason"], "product not found");
}

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_validation_errors_write_nothing(pool: PgPool) {
    let p1 = seed_catalog(&pool).await;

    let mut body = bulk_body(p1, &json!({}));
    body["form"]["start_date"] = json!("2026-12-31");
    body["form"]["end_date"] = json!("2026-01-01");
    let (status, json) = send(test_app(pool.clone()), Method::POST, "/api/v1/promotions/bulk", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");

    let no_products = bulk_body(p1, &json!({ "products": [] }));
    let (status, _) = send(test_app(pool.clone()), Method::POST, "/api/v1/promotions/bulk", Some(no_products)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stale = bulk_body(p1, &json!({ "distributors": ["Mega Azulejo"], "states": ["Jalisco"] }));
    let (status, json) = send(test_app(pool.clone()), Method::POST, "/api/v1/promotions/bulk", Some(stale)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"]
        .as_str()
        .is_some_and(|m| m.contains("Jalisco")));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM promotions")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn scope_preview_narrows_options(pool: PgPool) {
    let p1 = seed_catalog(&pool).await;

    let (status, json) = send(
        test_app(pool),
        Method::POST,
        "/api/v1/promotions/scope-preview",
        Some(json!({ "filter": { "products": [p1], "distributors": ["Casa Piso"] } })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["state_options"], json!(["Jalisco"]));
    assert_eq!(json["data"]["city_options"], json!(["Guadalajara", "Zapopan"]));
    assert_eq!(json["data"]["resolved_store_count"], 2);
    assert_eq!(json["data"]["pair_count"], 2);
}

// ---------------------------------------------------------------------------
// Single promotion CRUD and lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn create_update_toggle_delete_single_promotion(pool: PgPool) {
    let p1 = seed_catalog(&pool).await;
    let (start, end) = window();

    let (status, json) = send(
        test_app(pool.clone()),
        Method::POST,
        "/api/v1/promotions",
        Some(json!({
            "name": "Liquidación",
            "product_id": p1,
            "scope_type": "store",
            "scope_value": "s2",
            "promo_price": 410,
            "start_date": start,
            "end_date": end,
            "until_stock": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["until_stock"], true);
    let id = json["data"]["id"].as_i64().expect("id");

    let (status, json) = send(
        test_app(pool.clone()),
        Method::PATCH,
        &format!("/api/v1/promotions/{id}"),
        Some(json!({ "promo_price": "399.90" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["promo_price"], "399.90");
    assert_eq!(json["data"]["name"], "Liquidación");

    let uri = format!("/api/v1/promotions/{id}/toggle");
    let (_, json) = send(test_app(pool.clone()), Method::PUT, &uri, None).await;
    assert_eq!(json["data"]["active"], false);
    let (_, json) = send(test_app(pool.clone()), Method::PUT, &uri, None).await;
    assert_eq!(json["data"]["active"], true);

    let (status, _) = send(
        test_app(pool.clone()),
        Method::DELETE,
        &format!("/api/v1/promotions/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        test_app(pool),
        Method::GET,
        &format!("/api/v1/promotions/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_rejects_unknown_store_and_product(pool: PgPool) {
    let p1 = seed_catalog(&pool).await;
    let (start, end) = window();
    let body = |product_id: i64, store: &str| {
        json!({
            "name": "Liquidación",
            "product_id": product_id,
            "scope_value": store,
            "promo_price": 410,
            "start_date": start,
            "end_date": end
        })
    };

    let (status, _) = send(
        test_app(pool.clone()),
        Method::POST,
        "/api/v1/promotions",
        Some(body(p1, "ghost")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        test_app(pool.clone()),
        Method::POST,
        "/api/v1/promotions",
        Some(body(999_999, "s1")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(
        test_app(pool),
        Method::POST,
        "/api/v1/promotions",
        Some(json!({ "name": "x", "product_id": p1, "scope_value": "s1", "promo_price": 0,
                     "start_date": "2026-01-01", "end_date": "2026-01-02" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn sub_cent_prices_are_rejected_before_any_write(pool: PgPool) {
    let p1 = seed_catalog(&pool).await;

    for price in ["0.004", "350.555", "100000000"] {
        let (status, json) = send(
            test_app(pool.clone()),
            Method::POST,
            "/api/v1/promotions",
            Some(json!({ "name": "x", "product_id": p1, "scope_value": "s1",
                         "promo_price": price,
                         "start_date": "2026-01-01", "end_date": "2026-01-02" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "price {price}");
        assert_eq!(json["error"]["code"], "validation_error");
    }

    let mut bulk = bulk_body(p1, &json!({}));
    bulk["form"]["promo_price"] = json!("0.004");
    let (status, json) = send(
        test_app(pool.clone()),
        Method::POST,
        "/api/v1/promotions/bulk",
        Some(bulk),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM promotions")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn distributor_group_toggle_round_trips(pool: PgPool) {
    let p1 = seed_catalog(&pool).await;

    let (status, _) = send(
        test_app(pool.clone()),
        Method::POST,
        "/api/v1/promotions/bulk",
        Some(bulk_body(p1, &json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = "/api/v1/distributors/casa-piso/promotions/active";
    let (status, json) = send(
        test_app(pool.clone()),
        Method::PUT,
        uri,
        Some(json!({ "active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["changed"], 2);
    assert_eq!(json["data"]["failed"], 0);
    let promotions = json["data"]["promotions"].as_array().expect("promotions");
    assert_eq!(promotions.len(), 2);
    assert!(promotions.iter().all(|p| p["active"] == false));

    // By name this time; nothing left to change on repeat.
    let (_, json) = send(
        test_app(pool.clone()),
        Method::PUT,
        "/api/v1/distributors/Casa%20Piso/promotions/active",
        Some(json!({ "active": false })),
    )
    .await;
    assert_eq!(json["data"]["changed"], 0);
    assert_eq!(json["data"]["unchanged"], 2);

    let (_, json) = send(
        test_app(pool.clone()),
        Method::PUT,
        uri,
        Some(json!({ "active": true })),
    )
    .await;
    assert_eq!(json["data"]["changed"], 2);

    let inactive: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM promotions WHERE NOT active")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(inactive, 0);

    let (status, _) = send(
        test_app(pool),
        Method::PUT,
        "/api/v1/distributors/nobody/promotions/active",
        Some(json!({ "active": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn promotions_grouped_by_distributor(pool: PgPool) {
    let p1 = seed_catalog(&pool).await;
    send(
        test_app(pool.clone()),
        Method::POST,
        "/api/v1/promotions/bulk",
        Some(bulk_body(p1, &json!({}))),
    )
    .await;

    let (status, json) = send(
        test_app(pool.clone()),
        Method::GET,
        "/api/v1/promotions/by-distributor",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let groups = json["data"].as_array().expect("groups");
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["distributor"]["slug"], "casa-piso");
    assert_eq!(groups[0]["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(groups[1]["items"][0]["product_sku"], "P1");

    let (_, json) = send(test_app(pool), Method::GET, "/api/v1/promotions/active", None).await;
    assert_eq!(json["data"].as_array().map(Vec::len), Some(3));
}

#[test]
fn decimal_serializes_as_string() {
    let value = serde_json::to_value(Decimal::new(35_000, 2)).expect("serialize");
    assert_eq!(value, json!("350.00"));
}
