//! Server-rendered storefront pages.
//!
//! Public catalog pages live under `/products/` and `/categories/`; the
//! inventory editor under `/products/{id}/inventory/` is gated to staff.
//! Browsers sign in at `/staff/login/`.

mod categories;
mod inventory;
mod products;
mod staff;

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use rust_decimal::Decimal;
use storefront_core::{replace_query_param, CoreError, PageRequest};
use storefront_db::{DbError, ProductRow};

use crate::{
    api::AppState,
    middleware::{require_staff, StaffAuth},
};

/// Rows per page on HTML list pages.
const PAGE_SIZE: i64 = 10;
const FLASH_COOKIE: &str = "storefront_flash";

pub fn router(staff: StaffAuth) -> Router<AppState> {
    let staff_routes = Router::new()
        .route(
            "/products/{id}/inventory/",
            get(inventory::edit_inventory).post(inventory::save_inventory),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            staff.clone(),
            require_staff,
        ));

    Router::new()
        .route("/categories/", get(categories::category_list))
        .route("/categories/{id}/", get(categories::category_detail))
        .route("/products/", get(products::product_list))
        .route("/products/{id}/", get(products::product_detail))
        .route("/products/legacy/", get(products::legacy_product_list))
        .route("/products/legacy/{id}/", get(products::legacy_product_detail))
        .route(
            "/staff/login/",
            get(staff::login_form)
                .post(staff::login)
                .with_state(staff),
        )
        .route("/staff/logout/", post(staff::logout))
        .merge(staff_routes)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) enum PageError {
    NotFound,
    BadRequest(String),
    Internal,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    status: u16,
    title: &'static str,
    message: String,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, title, message) = match self {
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                "Not found",
                "The page you requested does not exist.".to_string(),
            ),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "Bad request", message),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error",
                "Something went wrong on our side.".to_string(),
            ),
        };

        let page = ErrorTemplate {
            status: status.as_u16(),
            title,
            message,
        };
        match page.render() {
            Ok(body) => (status, Html(body)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "failed to render error page");
                (status, title).into_response()
            }
        }
    }
}

impl From<DbError> for PageError {
    fn from(error: DbError) -> Self {
        if matches!(error, DbError::NotFound) {
            return Self::NotFound;
        }
        tracing::error!(error = %error, "database query failed");
        Self::Internal
    }
}

impl From<CoreError> for PageError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::InvalidOrdering(_) => Self::BadRequest(error.to_string()),
            CoreError::InvalidPage(_) => Self::NotFound,
            CoreError::ImproperlyConfigured(_) => {
                tracing::error!(error = %error, "list pipeline misconfigured");
                Self::Internal
            }
        }
    }
}

impl From<askama::Error> for PageError {
    fn from(error: askama::Error) -> Self {
        tracing::error!(error = %error, "template render failed");
        Self::Internal
    }
}

pub(crate) type PageResult<T = Html<String>> = Result<T, PageError>;

fn render(template: &impl Template) -> PageResult {
    Ok(Html(template.render()?))
}

fn parse_path_id(raw: &str) -> Result<i64, PageError> {
    raw.parse::<i64>().map_err(|_| PageError::NotFound)
}

// ---------------------------------------------------------------------------
// Flash notices
// ---------------------------------------------------------------------------

/// One-shot messages carried across a redirect in a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Notice {
    InventoryUpdated,
}

impl Notice {
    fn code(self) -> &'static str {
        match self {
            Self::InventoryUpdated => "inventory_updated",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "inventory_updated" => Some(Self::InventoryUpdated),
            _ => None,
        }
    }

    pub(crate) fn message(self) -> &'static str {
        match self {
            Self::InventoryUpdated => "Your inventory and pricing has been updated.",
        }
    }
}

pub(crate) fn push_notice(jar: CookieJar, notice: Notice) -> CookieJar {
    jar.add(
        Cookie::build((FLASH_COOKIE, notice.code()))
            .path("/")
            .http_only(true),
    )
}

/// Read the pending notice, if any, and clear it so it shows once.
pub(crate) fn take_notice(jar: CookieJar) -> (CookieJar, Option<Notice>) {
    let Some(code) = jar.get(FLASH_COOKIE).map(|c| c.value().to_owned()) else {
        return (jar, None);
    };
    let jar = jar.remove(Cookie::build(FLASH_COOKIE).path("/"));
    (jar, Notice::from_code(&code))
}

// ---------------------------------------------------------------------------
// Shared view models
// ---------------------------------------------------------------------------

fn money(amount: Decimal) -> String {
    format!("{amount:.2}")
}

/// A product as shown in lists and "related" strips.
#[derive(Debug, Clone)]
pub(crate) struct ProductCard {
    pub url: String,
    pub title: String,
    pub description: String,
    pub price: String,
}

impl From<ProductRow> for ProductCard {
    fn from(row: ProductRow) -> Self {
        Self {
            url: format!("/products/{}/", row.id),
            title: row.title,
            description: row.description.unwrap_or_default(),
            price: money(row.price),
        }
    }
}

/// Previous/next links for a paginated HTML list.
#[derive(Debug, Clone)]
pub(crate) struct PageNav {
    pub number: i64,
    pub total_pages: i64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_href: String,
    pub next_href: String,
}

impl PageNav {
    fn new(page: PageRequest, total: i64, raw_query: Option<&str>) -> Self {
        let href = |n: i64| {
            let query = replace_query_param(raw_query, "page", Some(&n.to_string()));
            format!("?{query}")
        };
        Self {
            number: page.page,
            total_pages: page.page_count(total),
            has_previous: page.has_previous(),
            has_next: page.has_next(total),
            previous_href: href(page.page - 1),
            next_href: href(page.page + 1),
        }
    }
}

fn html_page(raw_page: Option<&str>) -> Result<PageRequest, PageError> {
    Ok(PageRequest::parse(raw_page, None, PAGE_SIZE, PAGE_SIZE)?)
}

#[cfg(test)]
#[path = "views_test.rs"]
mod tests;
