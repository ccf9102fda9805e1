//! Category API handlers.
//!
//! - `GET /api/v1/categories/`      limit/offset paginated list
//! - `GET /api/v1/categories/{id}/` category detail

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::HeaderMap,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_core::{replace_query_param, Page, Resource, WindowRequest};
use storefront_db::{CategoryRow, ProductRow};

use crate::middleware::RequestId;

use super::{
    link_with, map_db_error, not_found, parse_id, products::product_url, ApiError, ApiResponse,
    AppState, ResponseMeta,
};

pub(super) const CATEGORIES_PATH: &str = "/api/v1/categories/";

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
pub(super) struct CategoryProductItem {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct CategoryItem {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub active: bool,
    pub product_set: Vec<CategoryProductItem>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct WindowQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

fn category_item(base: &str, row: CategoryRow, products: Vec<ProductRow>) -> CategoryItem {
    CategoryItem {
        url: format!("{base}{CATEGORIES_PATH}{}/", row.id),
        id: row.id,
        title: row.title,
        slug: row.slug,
        description: row.description,
        active: row.active,
        product_set: products
            .into_iter()
            .map(|p| CategoryProductItem {
                url: product_url(base, p.id),
                id: p.id,
                title: p.title,
                price: p.price,
            })
            .collect(),
    }
}

fn window_link(list_url: &str, raw_query: Option<&str>, limit: i64, offset: i64) -> String {
    let with_limit = replace_query_param(raw_query, "limit", Some(&limit.to_string()));
    let offset = (offset > 0).then(|| offset.to_string());
    link_with(list_url, Some(&with_limit), "offset", offset.as_deref())
}

/// GET /api/v1/categories/
pub(super) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<WindowQuery>,
) -> Result<Json<ApiResponse<Page<CategoryItem>>>, ApiError> {
    let rid = &req_id.0;
    let window = WindowRequest::parse(
        query.limit.as_deref(),
        query.offset.as_deref(),
        DEFAULT_LIMIT,
        MAX_LIMIT,
    );

    let count = storefront_db::count_categories(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let rows = storefront_db::list_categories(
        &state.pool,
        &Resource::Category.default_ordering(),
        Some(window),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut products: HashMap<i64, Vec<ProductRow>> = HashMap::new();
    for link in storefront_db::list_products_for_categories(&state.pool, &ids)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
    {
        products
            .entry(link.category_id)
            .or_default()
            .push(link.product);
    }

    let base = state.base_url(&headers);
    let results = rows
        .into_iter()
        .map(|row| {
            let set = products.remove(&row.id).unwrap_or_default();
            category_item(&base, row, set)
        })
        .collect();

    let list_url = format!("{base}{CATEGORIES_PATH}");
    let raw_query = raw_query.as_deref();
    let next = window
        .has_next(count)
        .then(|| window_link(&list_url, raw_query, window.limit, window.next_offset()));
    let previous = window
        .has_previous()
        .then(|| window_link(&list_url, raw_query, window.limit, window.previous_offset()));

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

/// GET /api/v1/categories/{id}/
pub(super) async fn get_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<CategoryItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, "category", &raw_id)?;

    let row = storefront_db::get_category(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| not_found(rid, "category", id))?;
    let products = storefront_db::list_category_products(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: category_item(&state.base_url(&headers), row, products),
        meta: ResponseMeta::new(req_id.0),
    }))
}
