//! Product API handlers.
//!
//! - `GET  /api/v1/products/`      page-number paginated list with search,
//!   ordering and the product filter
//! - `POST /api/v1/products/`      create a product
//! - `GET  /api/v1/products/{id}/` product detail

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_core::{
    check_amount, ListParams, OrderingField, Page, PageRequest, ProductFilterForm, ProductSearch,
    Resource,
};
use storefront_db::{NewProduct, NewVariation, ProductRow, VariationRow};

use crate::middleware::RequestId;

use super::{
    link_with, map_core_error, map_db_error, not_found, parse_id, ApiError, ApiResponse,
    AppState, ResponseMeta,
};

pub(super) const PRODUCTS_PATH: &str = "/api/v1/products/";

const PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 20;
const ORDERING_FIELDS: &[OrderingField] = &[OrderingField::Title, OrderingField::Id];
const MAX_TITLE_LEN: usize = 120;

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct VariationItem {
    pub id: i64,
    pub title: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub active: bool,
    pub inventory: Option<i32>,
}

impl From<VariationRow> for VariationItem {
    fn from(row: VariationRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            price: row.price,
            sale_price: row.sale_price,
            active: row.active,
            inventory: row.inventory,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub variation_set: Vec<VariationItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductDetailItem {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub active: bool,
    pub default_category_id: Option<i64>,
    pub category_ids: Vec<i64>,
    pub variation_set: Vec<VariationItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(super) fn product_url(base: &str, id: i64) -> String {
    format!("{base}{PRODUCTS_PATH}{id}/")
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub(super) struct ProductListQuery {
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
    #[serde(flatten)]
    pub filter: ProductFilterForm,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateProductRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default = "default_active")]
    pub active: bool,
    pub default_category_id: Option<i64>,
    #[serde(default)]
    pub category_ids: Vec<i64>,
    #[serde(default)]
    pub variations: Vec<CreateVariationRequest>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateVariationRequest {
    pub title: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    #[serde(default = "default_active")]
    pub active: bool,
    pub inventory: Option<i32>,
}

fn default_active() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn validate_title(req_id: &str, field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            format!("{field} must be 1-{MAX_TITLE_LEN} characters"),
        ));
    }
    Ok(value.to_owned())
}

fn validate_price(req_id: &str, field: &str, value: Decimal) -> Result<Decimal, ApiError> {
    if value.is_sign_negative() {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            format!("{field} must not be negative"),
        ));
    }
    check_amount(value.normalize())
        .map_err(|e| ApiError::new(req_id, "validation_error", format!("{field}: {e}")))
}

fn validate_new_product(req_id: &str, body: CreateProductRequest) -> Result<NewProduct, ApiError> {
    let title = validate_title(req_id, "title", &body.title)?;
    let price = validate_price(req_id, "price", body.price)?;

    let mut variations = Vec::with_capacity(body.variations.len());
    for (index, variation) in body.variations.into_iter().enumerate() {
        let field = |name: &str| format!("variations[{index}].{name}");
        let sale_price = variation
            .sale_price
            .map(|p| validate_price(req_id, &field("sale_price"), p))
            .transpose()?;
        if variation.inventory.is_some_and(|n| n < 0) {
            return Err(ApiError::new(
                req_id,
                "validation_error",
                format!("{} must not be negative", field("inventory")),
            ));
        }
        variations.push(NewVariation {
            title: validate_title(req_id, &field("title"), &variation.title)?,
            price: validate_price(req_id, &field("price"), variation.price)?,
            sale_price,
            active: variation.active,
            inventory: variation.inventory,
        });
    }

    let mut category_ids = body.category_ids;
    category_ids.sort_unstable();
    category_ids.dedup();

    Ok(NewProduct {
        title,
        description: body
            .description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty()),
        price,
        active: body.active,
        default_category_id: body.default_category_id,
        category_ids,
        variations,
    })
}

fn map_foreign_key_violation(req_id: &str, e: &storefront_db::DbError) -> ApiError {
    if let storefront_db::DbError::Sqlx(sqlx::Error::Database(db_err)) = e {
        if db_err.code().as_deref() == Some("23503") {
            return ApiError::new(req_id, "validation_error", "unknown category id");
        }
    }
    map_db_error(req_id.to_owned(), e)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/products/
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ApiResponse<Page<ProductItem>>>, ApiError> {
    let rid = &req_id.0;

    let params = ListParams::new(Resource::Product)
        .with_search(ProductSearch::terms(query.search.as_deref()))
        .and_then(|p| p.with_ordering(query.ordering.as_deref(), Some(ORDERING_FIELDS)))
        .and_then(|p| p.with_filter(query.filter.to_filter()))
        .map_err(|e| map_core_error(rid.clone(), &e))?;
    let page = PageRequest::parse(
        query.page.as_deref(),
        query.size.as_deref(),
        PAGE_SIZE,
        MAX_PAGE_SIZE,
    )
    .map_err(|e| map_core_error(rid.clone(), &e))?;

    let count = storefront_db::count_products_matching(&state.pool, &params)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let page = page
        .resolve(count)
        .map_err(|e| map_core_error(rid.clone(), &e))?;

    let rows = storefront_db::list_products(&state.pool, &params, Some(page))
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut variations: HashMap<i64, Vec<VariationItem>> = HashMap::new();
    for row in storefront_db::list_variations_for_products(&state.pool, &ids)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
    {
        variations
            .entry(row.product_id)
            .or_default()
            .push(VariationItem::from(row));
    }

    let base = state.base_url(&headers);
    let results = rows
        .into_iter()
        .map(|row| ProductItem {
            url: product_url(&base, row.id),
            variation_set: variations.remove(&row.id).unwrap_or_default(),
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
        })
        .collect();

    let list_url = format!("{base}{PRODUCTS_PATH}");
    let next = page.has_next(count).then(|| {
        let target = (page.page + 1).to_string();
        link_with(&list_url, raw_query.as_deref(), "page", Some(&target))
    });
    // The first page is linked without a `page` parameter.
    let previous = page.has_previous().then(|| {
        let target = (page.page > 2).then(|| (page.page - 1).to_string());
        link_with(&list_url, raw_query.as_deref(), "page", target.as_deref())
    });

    Ok(Json(ApiResponse {
        data: Page {
            count,
            next,
            previous,
            results,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

async fn detail_item(
    state: &AppState,
    rid: &str,
    base: &str,
    row: ProductRow,
) -> Result<ProductDetailItem, ApiError> {
    let variation_set = storefront_db::list_variations_for_product(&state.pool, row.id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?
        .into_iter()
        .map(VariationItem::from)
        .collect();
    let category_ids = storefront_db::list_product_category_ids(&state.pool, row.id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    Ok(ProductDetailItem {
        id: row.id,
        url: product_url(base, row.id),
        title: row.title,
        description: row.description,
        price: row.price,
        active: row.active,
        default_category_id: row.default_category_id,
        category_ids,
        variation_set,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// GET /api/v1/products/{id}/
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<ProductDetailItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, "product", &raw_id)?;

    let row = storefront_db::get_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| not_found(rid, "product", id))?;

    let data = detail_item(&state, rid, &state.base_url(&headers), row).await?;
    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/products/
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductDetailItem>>), ApiError> {
    let rid = &req_id.0;
    let new_product = validate_new_product(rid, body)?;

    let row = storefront_db::create_product(&state.pool, &new_product)
        .await
        .map_err(|e| map_foreign_key_violation(rid, &e))?;

    let data = detail_item(&state, rid, &state.base_url(&headers), row).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data,
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(price: &str) -> CreateProductRequest {
        serde_json::from_value(serde_json::json!({
            "title": "  Polo  ",
            "price": price,
            "category_ids": [3, 1, 3],
        }))
        .expect("valid body")
    }

    #[test]
    fn validate_new_product_normalizes_input() {
        let product = validate_new_product("req", request("35.00")).expect("valid");
        assert_eq!(product.title, "Polo");
        assert!(product.active);
        assert_eq!(product.category_ids, vec![1, 3]);
        assert!(product.variations.is_empty());
    }

    #[test]
    fn validate_new_product_rejects_fractional_cents() {
        let err = validate_new_product("req", request("1.005")).expect_err("invalid");
        assert_eq!(err.error.code, "validation_error");
    }

    #[test]
    fn validate_new_product_rejects_prices_too_large_to_store() {
        let err =
            validate_new_product("req", request("1000000000000000000")).expect_err("invalid");
        assert_eq!(err.error.code, "validation_error");
        assert!(err.error.message.contains("20 digits"));
    }

    #[test]
    fn validate_new_product_rejects_negative_inventory() {
        let body: CreateProductRequest = serde_json::from_value(serde_json::json!({
            "title": "Polo",
            "price": "10.00",
            "variations": [{"title": "S", "price": "10.00", "inventory": -1}],
        }))
        .expect("valid body");
        let err = validate_new_product("req", body).expect_err("invalid");
        assert!(err.error.message.contains("variations[0].inventory"));
    }
}
