use askama::Template;
use axum::extract::{Path, Query, RawQuery, State};
use serde::Deserialize;
use storefront_core::Resource;
use storefront_db::CategoryRow;

use crate::api::AppState;

use super::{html_page, parse_path_id, render, PageError, PageNav, PageResult, ProductCard};

#[derive(Debug, Default, Deserialize)]
pub(super) struct CategoryListQuery {
    pub page: Option<String>,
}

#[derive(Debug, Clone)]
pub(super) struct CategoryLink {
    pub url: String,
    pub title: String,
    pub description: String,
}

impl From<CategoryRow> for CategoryLink {
    fn from(row: CategoryRow) -> Self {
        Self {
            url: format!("/categories/{}/", row.id),
            title: row.title,
            description: row.description.unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "categories/list.html")]
struct CategoryListTemplate {
    categories: Vec<CategoryLink>,
    nav: PageNav,
}

#[derive(Template)]
#[template(path = "categories/detail.html")]
struct CategoryDetailTemplate {
    title: String,
    description: String,
    products: Vec<ProductCard>,
}

/// GET /categories/
pub(super) async fn category_list(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<CategoryListQuery>,
) -> PageResult {
    let page = html_page(query.page.as_deref())?;
    let count = storefront_db::count_categories(&state.pool).await?;
    let page = page.resolve(count)?;

    let window = storefront_core::WindowRequest {
        limit: page.size,
        offset: page.offset(),
    };
    let rows = storefront_db::list_categories(
        &state.pool,
        &Resource::Category.default_ordering(),
        Some(window),
    )
    .await?;

    render(&CategoryListTemplate {
        categories: rows.into_iter().map(CategoryLink::from).collect(),
        nav: PageNav::new(page, count, raw_query.as_deref()),
    })
}

/// GET /categories/{id}/
///
/// Lists products linked to the category together with those that use it
/// as their default category.
pub(super) async fn category_detail(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> PageResult {
    let id = parse_path_id(&raw_id)?;
    let category = storefront_db::get_category(&state.pool, id)
        .await?
        .ok_or(PageError::NotFound)?;
    let products = storefront_db::list_category_products(&state.pool, id).await?;

    render(&CategoryDetailTemplate {
        title: category.title,
        description: category.description.unwrap_or_default(),
        products: products.into_iter().map(ProductCard::from).collect(),
    })
}
