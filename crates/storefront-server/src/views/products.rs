use askama::Template;
use axum::{
    extract::{Path, Query, RawQuery, State},
    response::Html,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use rand::seq::SliceRandom;
use serde::Deserialize;
use storefront_core::{ListParams, ProductFilterForm, ProductSearch, Resource};
use storefront_db::{ProductRow, VariationRow};

use crate::api::AppState;

use super::{
    html_page, money, parse_path_id, render, take_notice, PageError, PageNav, PageResult,
    ProductCard,
};

const RELATED_LIMIT: i64 = 6;

#[derive(Debug, Default, Deserialize)]
pub(super) struct ProductListQuery {
    pub q: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<String>,
    #[serde(flatten)]
    pub filter: ProductFilterForm,
}

/// The filter form, echoed back exactly as submitted.
#[derive(Debug, Clone, Default)]
pub(super) struct FilterFormView {
    pub title: String,
    pub category: String,
    pub category_id: String,
    pub min_price: String,
    pub max_price: String,
}

impl From<&ProductFilterForm> for FilterFormView {
    fn from(form: &ProductFilterForm) -> Self {
        let value = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            title: value(&form.title),
            category: value(&form.category),
            category_id: value(&form.category_id),
            min_price: value(&form.min_price),
            max_price: value(&form.max_price),
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct VariationLine {
    pub title: String,
    pub price: String,
    pub sale_price: String,
    pub on_sale: bool,
    pub availability: String,
}

impl From<VariationRow> for VariationLine {
    fn from(row: VariationRow) -> Self {
        let availability = match row.inventory {
            _ if !row.active => "Unavailable".to_string(),
            None => "In stock".to_string(),
            Some(0) => "Sold out".to_string(),
            Some(n) => format!("{n} left"),
        };
        Self {
            title: row.title,
            price: money(row.price),
            sale_price: row.sale_price.map(money).unwrap_or_default(),
            on_sale: row.sale_price.is_some(),
            availability,
        }
    }
}

#[derive(Template)]
#[template(path = "products/list.html")]
struct ProductListTemplate {
    now: String,
    query: String,
    ordering: String,
    filter: FilterFormView,
    notice: String,
    products: Vec<ProductCard>,
    count: i64,
    nav: PageNav,
}

#[derive(Template)]
#[template(path = "products/detail.html")]
struct ProductDetailTemplate {
    id: i64,
    title: String,
    description: String,
    price: String,
    variations: Vec<VariationLine>,
    related: Vec<ProductCard>,
    show_related: bool,
}

#[derive(Template)]
#[template(path = "products/legacy_list.html")]
struct LegacyProductListTemplate {
    ordering: String,
    filter: FilterFormView,
    products: Vec<ProductCard>,
}

/// GET /products/
pub(super) async fn product_list(
    State(state): State<AppState>,
    jar: CookieJar,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<ProductListQuery>,
) -> PageResult<(CookieJar, Html<String>)> {
    let params = ListParams::new(Resource::Product)
        .with_search(ProductSearch::storefront(query.q.as_deref()))?
        .with_ordering(query.ordering.as_deref(), None)?
        .with_filter(query.filter.to_filter())?;
    let page = html_page(query.page.as_deref())?;

    let count = storefront_db::count_products_matching(&state.pool, &params).await?;
    let page = page.resolve(count)?;
    let rows = storefront_db::list_products(&state.pool, &params, Some(page)).await?;

    let (jar, notice) = take_notice(jar);
    let template = ProductListTemplate {
        now: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        query: query.q.clone().unwrap_or_default(),
        ordering: query.ordering.clone().unwrap_or_default(),
        filter: FilterFormView::from(&query.filter),
        notice: notice.map(|n| n.message().to_string()).unwrap_or_default(),
        products: rows.into_iter().map(ProductCard::from).collect(),
        count,
        nav: PageNav::new(page, count, raw_query.as_deref()),
    };
    Ok((jar, render(&template)?))
}

async fn load_product(state: &AppState, raw_id: &str) -> Result<ProductRow, PageError> {
    let id = parse_path_id(raw_id)?;
    storefront_db::get_product(&state.pool, id)
        .await?
        .ok_or(PageError::NotFound)
}

async fn detail_template(
    state: &AppState,
    product: ProductRow,
    related: Vec<ProductRow>,
    show_related: bool,
) -> Result<ProductDetailTemplate, PageError> {
    let variations = storefront_db::list_variations_for_product(&state.pool, product.id).await?;
    Ok(ProductDetailTemplate {
        id: product.id,
        title: product.title,
        description: product.description.unwrap_or_default(),
        price: money(product.price),
        variations: variations.into_iter().map(VariationLine::from).collect(),
        related: related.into_iter().map(ProductCard::from).collect(),
        show_related,
    })
}

/// GET /products/{id}/
///
/// Related products are reshuffled on every request.
pub(super) async fn product_detail(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> PageResult {
    let product = load_product(&state, &raw_id).await?;
    let mut related =
        storefront_db::list_related_products(&state.pool, &product, RELATED_LIMIT).await?;
    related.shuffle(&mut rand::rng());

    let template = detail_template(&state, product, related, true).await?;
    render(&template)
}

/// GET /products/legacy/
///
/// Ordering and filtering only; no search and no pagination.
pub(super) async fn legacy_product_list(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> PageResult {
    let params = ListParams::new(Resource::Product)
        .with_ordering(query.ordering.as_deref(), None)?
        .with_filter(query.filter.to_filter())?;
    let rows = storefront_db::list_products(&state.pool, &params, None).await?;

    render(&LegacyProductListTemplate {
        ordering: query.ordering.clone().unwrap_or_default(),
        filter: FilterFormView::from(&query.filter),
        products: rows.into_iter().map(ProductCard::from).collect(),
    })
}

/// GET /products/legacy/{id}/
pub(super) async fn legacy_product_detail(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> PageResult {
    let product = load_product(&state, &raw_id).await?;
    let template = detail_template(&state, product, Vec::new(), false).await?;
    render(&template)
}
