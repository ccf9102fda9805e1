use super::*;
use crate::api::{build_app, rate_limit_state};
use crate::middleware::{AuthState, TokenSet};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request};
use sqlx::PgPool;
use tower::ServiceExt;

const STAFF_TOKEN: &str = "staff-secret";

fn app(pool: PgPool) -> Router {
    build_app(
        AppState {
            pool,
            public_url: None,
        },
        AuthState::from_tokens(TokenSet::default()),
        StaffAuth::from_tokens(TokenSet::from_keys([STAFF_TOKEN])),
        rate_limit_state(10_000),
    )
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, header::HeaderMap, String) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (
        status,
        headers,
        String::from_utf8(body.to_vec()).expect("utf-8 body"),
    )
}

async fn get_page(app: Router, uri: &str) -> (StatusCode, String) {
    let (status, _, body) = send(
        app,
        Request::builder().uri(uri).body(Body::empty()).expect("request"),
    )
    .await;
    (status, body)
}

fn inventory_post(product_id: i64, token: Option<&str>, form: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(format!("/products/{product_id}/inventory/"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(form.to_owned())).expect("request")
}

async fn seed_product(pool: &PgPool, title: &str, description: &str, price: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO products (title, description, price) VALUES ($1, $2, $3::numeric) \
         RETURNING id",
    )
    .bind(title)
    .bind(description)
    .bind(price)
    .fetch_one(pool)
    .await
    .expect("seed_product failed")
}

async fn seed_variation(pool: &PgPool, product_id: i64, title: &str, price: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO variations (product_id, title, price) VALUES ($1, $2, $3::numeric) \
         RETURNING id",
    )
    .bind(product_id)
    .bind(title)
    .bind(price)
    .fetch_one(pool)
    .await
    .expect("seed_variation failed")
}

// -------------------------------------------------------------------------
// Unit tests (no DB)
// -------------------------------------------------------------------------

#[test]
fn notice_cookie_is_read_once() {
    let jar = push_notice(CookieJar::new(), Notice::InventoryUpdated);
    let (jar, notice) = take_notice(jar);
    assert_eq!(notice, Some(Notice::InventoryUpdated));
    assert!(jar.get(FLASH_COOKIE).is_none());

    let (_, notice) = take_notice(jar);
    assert_eq!(notice, None);
}

#[test]
fn page_nav_keeps_other_parameters() {
    let page = PageRequest::parse(Some("2"), None, PAGE_SIZE, PAGE_SIZE).expect("page");
    let nav = PageNav::new(page, 35, Some("q=tee&page=2"));
    assert_eq!(nav.total_pages, 4);
    assert!(nav.has_previous);
    assert!(nav.has_next);
    assert_eq!(nav.previous_href, "?q=tee&page=1");
    assert_eq!(nav.next_href, "?q=tee&page=3");
}

#[test]
fn page_error_maps_core_errors() {
    let response = PageError::from(CoreError::InvalidOrdering("colour".into())).into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = PageError::from(CoreError::InvalidPage("7".into())).into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// An app whose pool points nowhere: any query would fail with a 500.
fn offline_app() -> Router {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_millis(50))
        .connect_lazy("postgres://storefront@127.0.0.1:1/unreachable")
        .expect("lazy pool");
    app(pool)
}

fn staff_login_post(form: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/staff/login/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_owned()))
        .expect("request")
}

#[tokio::test]
async fn inventory_refuses_non_staff_before_touching_the_database() {
    let app = offline_app();

    let (status, _) = get_page(app.clone(), "/products/1/inventory/").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        app.clone(),
        Request::builder()
            .uri("/products/1/inventory/")
            .header(header::AUTHORIZATION, "Bearer shopper")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(
        app,
        inventory_post(1, Some("shopper"), "form-TOTAL_FORMS=0&form-INITIAL_FORMS=0"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn staff_cookie_for_a_non_staff_token_is_forbidden() {
    let (status, _, _) = send(
        offline_app(),
        Request::builder()
            .method(Method::POST)
            .uri("/products/1/inventory/")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, "storefront_staff=shopper")
            .body(Body::from("form-TOTAL_FORMS=0&form-INITIAL_FORMS=0"))
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn staff_login_sets_cookie_for_staff_tokens_only() {
    let app = offline_app();

    let (status, body) = get_page(app.clone(), "/staff/login/?next=/products/4/inventory/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("name=\"next\""));
    assert!(body.contains("inventory"), "next path is carried in the form");

    let (status, headers, _) = send(
        app.clone(),
        staff_login_post("token=staff-secret&next=%2Fproducts%2F4%2Finventory%2F"),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(
        headers.get(header::LOCATION).and_then(|v| v.to_str().ok()),
        Some("/products/4/inventory/")
    );
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("staff cookie");
    assert!(set_cookie.starts_with("storefront_staff=staff-secret"));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));

    let (status, headers, body) = send(
        app.clone(),
        staff_login_post("token=shopper&next=%2F%2Fevil.example%2F"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.get(header::SET_COOKIE).is_none());
    assert!(body.contains("That is not a staff token."));
    assert!(!body.contains("evil.example"), "off-site next is dropped");

    let (status, headers, _) = send(
        app,
        Request::builder()
            .method(Method::POST)
            .uri("/staff/logout/")
            .header(header::COOKIE, "storefront_staff=staff-secret")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let cleared = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("removal cookie");
    assert!(cleared.starts_with("storefront_staff=;"));
}

// -------------------------------------------------------------------------
// Product pages
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn product_list_searches_descriptions_and_prices(pool: PgPool) {
    seed_product(&pool, "Plain Tee", "organic bamboo", "15.00").await;
    seed_product(&pool, "Hoodie", "fleece", "42.50").await;
    let app = app(pool);

    let (status, body) = get_page(app.clone(), "/products/?q=bamboo").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Plain Tee"));
    assert!(!body.contains("Hoodie"));
    assert!(body.contains("value=\"bamboo\""), "query is echoed back");

    let (_, body) = get_page(app, "/products/?q=42.50").await;
    assert!(body.contains("Hoodie"));
    assert!(!body.contains("Plain Tee"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn product_list_rejects_unknown_ordering(pool: PgPool) {
    let (status, body) = get_page(app(pool), "/products/?ordering=colour").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("colour"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn product_list_out_of_range_page_is_not_found(pool: PgPool) {
    seed_product(&pool, "Only", "one", "1.00").await;
    let (status, _) = get_page(app(pool), "/products/?page=2").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn product_detail_shows_related_products(pool: PgPool) {
    let category: i64 = sqlx::query_scalar(
        "INSERT INTO categories (title, slug) VALUES ('Tops', 'tops') RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .expect("category");
    let subject = seed_product(&pool, "Subject", "", "10.00").await;
    let sibling = seed_product(&pool, "Sibling", "", "11.00").await;
    seed_product(&pool, "Stranger", "", "12.00").await;
    sqlx::query("UPDATE products SET default_category_id = $1 WHERE id = ANY($2)")
        .bind(category)
        .bind(vec![subject, sibling])
        .execute(&pool)
        .await
        .expect("assign category");
    seed_variation(&pool, subject, "Small", "10.00").await;

    let app = app(pool);
    let (status, body) = get_page(app.clone(), &format!("/products/{subject}/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Related products"));
    assert!(body.contains("Sibling"));
    assert!(!body.contains("Stranger"));
    assert!(body.contains("Small"));

    let (status, body) = get_page(app.clone(), &format!("/products/legacy/{subject}/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("Related products"));

    let (status, _) = get_page(app, "/products/not-a-number/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn legacy_list_orders_and_filters(pool: PgPool) {
    seed_product(&pool, "Alpha Cap", "", "5.00").await;
    seed_product(&pool, "Beta Cap", "", "6.00").await;
    seed_product(&pool, "Gamma Scarf", "", "7.00").await;

    let (status, body) = get_page(app(pool), "/products/legacy/?ordering=price&title=cap").await;
    assert_eq!(status, StatusCode::OK);
    let alpha = body.find("Alpha Cap").expect("alpha listed");
    let beta = body.find("Beta Cap").expect("beta listed");
    assert!(alpha < beta);
    assert!(!body.contains("Gamma Scarf"));
}

// -------------------------------------------------------------------------
// Category pages
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn category_pages_render(pool: PgPool) {
    let category: i64 = sqlx::query_scalar(
        "INSERT INTO categories (title, slug, description) \
         VALUES ('Outerwear', 'outerwear', 'Coats and jackets') RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .expect("category");
    let linked = seed_product(&pool, "Parka", "", "99.00").await;
    sqlx::query("INSERT INTO product_categories (product_id, category_id) VALUES ($1, $2)")
        .bind(linked)
        .bind(category)
        .execute(&pool)
        .await
        .expect("link");
    let app = app(pool);

    let (status, body) = get_page(app.clone(), "/categories/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Outerwear"));

    let (status, body) = get_page(app.clone(), &format!("/categories/{category}/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Coats and jackets"));
    assert!(body.contains("Parka"));

    let (status, _) = get_page(app, "/categories/999999/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -------------------------------------------------------------------------
// Inventory formset
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn inventory_page_renders_formset_for_staff(pool: PgPool) {
    let product = seed_product(&pool, "Tee", "", "10.00").await;
    seed_variation(&pool, product, "Small", "10.00").await;

    let (status, _, body) = send(
        app(pool),
        Request::builder()
            .uri(format!("/products/{product}/inventory/"))
            .header(header::AUTHORIZATION, format!("Bearer {STAFF_TOKEN}"))
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("name=\"form-TOTAL_FORMS\" value=\"2\""));
    assert!(body.contains("name=\"form-INITIAL_FORMS\" value=\"1\""));
    assert!(body.contains("Small"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn valid_formset_saves_against_route_product_and_flashes(pool: PgPool) {
    let product = seed_product(&pool, "Tee", "", "10.00").await;
    let other = seed_product(&pool, "Other", "", "10.00").await;
    let own = seed_variation(&pool, product, "Small", "10.00").await;
    let foreign = seed_variation(&pool, other, "Large", "12.00").await;

    let form = format!(
        "form-TOTAL_FORMS=3&form-INITIAL_FORMS=2\
         &form-0-id={own}&form-0-price=9.50&form-0-inventory=4&form-0-active=on\
         &form-1-id={foreign}&form-1-price=12.00&form-1-sale_price=10.00\
         &form-2-title=XL&form-2-price=14.00&form-2-active=on"
    );
    let app = app(pool.clone());
    let (status, headers, _) =
        send(app.clone(), inventory_post(product, Some(STAFF_TOKEN), &form)).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(
        headers.get(header::LOCATION).and_then(|v| v.to_str().ok()),
        Some("/products/")
    );
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("flash cookie");
    assert!(set_cookie.starts_with("storefront_flash=inventory_updated"));

    let rows: Vec<(i64, i64, String)> = sqlx::query_as(
        "SELECT id, product_id, price::text FROM variations ORDER BY id",
    )
    .fetch_all(&pool)
    .await
    .expect("variations");
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|(_, product_id, _)| *product_id == product));
    assert_eq!(rows[0].2, "9.50");

    let (status, headers, body) = send(
        app,
        Request::builder()
            .uri("/products/")
            .header(header::COOKIE, "storefront_flash=inventory_updated")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Your inventory and pricing has been updated."));
    assert!(headers.get(header::SET_COOKIE).is_some(), "notice is cleared");
}

#[sqlx::test(migrations = "../../migrations")]
async fn browser_form_post_with_staff_cookie_saves(pool: PgPool) {
    let product = seed_product(&pool, "Tee", "", "10.00").await;
    let own = seed_variation(&pool, product, "Small", "10.00").await;
    let app = app(pool.clone());

    let (status, headers, _) = send(
        app.clone(),
        staff_login_post(&format!("token={STAFF_TOKEN}")),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let session = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("staff cookie")
        .to_owned();

    let (status, _, body) = send(
        app.clone(),
        Request::builder()
            .uri(format!("/products/{product}/inventory/"))
            .header(header::COOKIE, session.as_str())
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Small"));

    let form = format!(
        "form-TOTAL_FORMS=1&form-INITIAL_FORMS=1\
         &form-0-id={own}&form-0-price=8.25&form-0-inventory=3&form-0-active=on"
    );
    let (status, headers, _) = send(
        app,
        Request::builder()
            .method(Method::POST)
            .uri(format!("/products/{product}/inventory/"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, session.as_str())
            .body(Body::from(form))
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(
        headers.get(header::LOCATION).and_then(|v| v.to_str().ok()),
        Some("/products/")
    );

    let price: String = sqlx::query_scalar("SELECT price::text FROM variations WHERE id = $1")
        .bind(own)
        .fetch_one(&pool)
        .await
        .expect("price");
    assert_eq!(price, "8.25");
}

#[sqlx::test(migrations = "../../migrations")]
async fn invalid_formset_is_not_found_and_saves_nothing(pool: PgPool) {
    let product = seed_product(&pool, "Tee", "", "10.00").await;
    let own = seed_variation(&pool, product, "Small", "10.00").await;
    let app = app(pool.clone());

    let bad_price = format!(
        "form-TOTAL_FORMS=1&form-INITIAL_FORMS=1&form-0-id={own}&form-0-price=cheap"
    );
    let (status, _, _) = send(
        app.clone(),
        inventory_post(product, Some(STAFF_TOKEN), &bad_price),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(
        app.clone(),
        inventory_post(product, Some(STAFF_TOKEN), "form-0-price=1.00"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "missing management form");

    let (status, _, _) = send(
        app,
        inventory_post(999_999, Some(STAFF_TOKEN), "form-TOTAL_FORMS=0&form-INITIAL_FORMS=0"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "unknown product");

    let price: String = sqlx::query_scalar("SELECT price::text FROM variations WHERE id = $1")
        .bind(own)
        .fetch_one(&pool)
        .await
        .expect("price");
    assert_eq!(price, "10.00");
}
