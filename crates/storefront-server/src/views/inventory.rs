//! Staff inventory editor: one formset row per variation of a product.

use std::collections::HashMap;

use askama::Template;
use axum::{
    extract::{Path, State},
    response::Redirect,
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use storefront_core::parse_variation_formset;
use storefront_db::VariationRow;

use crate::api::AppState;

use super::{parse_path_id, push_notice, render, Notice, PageError, PageResult};

/// Blank rows offered for adding variations.
const EXTRA_FORMS: usize = 1;

#[derive(Debug, Clone, Default)]
pub(super) struct InventoryRow {
    pub index: usize,
    pub id: String,
    pub title: String,
    pub price: String,
    pub sale_price: String,
    pub inventory: String,
    pub active: bool,
    pub is_new: bool,
}

impl InventoryRow {
    fn existing(index: usize, row: VariationRow) -> Self {
        Self {
            index,
            id: row.id.to_string(),
            title: row.title,
            price: row.price.to_string(),
            sale_price: row.sale_price.map(|p| p.to_string()).unwrap_or_default(),
            inventory: row.inventory.map(|n| n.to_string()).unwrap_or_default(),
            active: row.active,
            is_new: false,
        }
    }

    fn blank(index: usize) -> Self {
        Self {
            index,
            active: true,
            is_new: true,
            ..Self::default()
        }
    }
}

#[derive(Template)]
#[template(path = "products/inventory.html")]
struct InventoryTemplate {
    product_id: i64,
    product_title: String,
    total_forms: usize,
    initial_forms: usize,
    rows: Vec<InventoryRow>,
}

async fn product_exists(state: &AppState, raw_id: &str) -> Result<(i64, String), PageError> {
    let id = parse_path_id(raw_id)?;
    let product = storefront_db::get_product(&state.pool, id)
        .await?
        .ok_or(PageError::NotFound)?;
    Ok((product.id, product.title))
}

/// GET /products/{id}/inventory/
pub(super) async fn edit_inventory(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> PageResult {
    let (product_id, product_title) = product_exists(&state, &raw_id).await?;
    let variations = storefront_db::list_variations_for_product(&state.pool, product_id).await?;

    let initial_forms = variations.len();
    let mut rows: Vec<InventoryRow> = variations
        .into_iter()
        .enumerate()
        .map(|(index, row)| InventoryRow::existing(index, row))
        .collect();
    rows.extend((initial_forms..initial_forms + EXTRA_FORMS).map(InventoryRow::blank));

    render(&InventoryTemplate {
        product_id,
        product_title,
        total_forms: rows.len(),
        initial_forms,
        rows,
    })
}

/// POST /products/{id}/inventory/
///
/// Every row is saved against the product in the URL. An invalid formset
/// answers 404, as does an unknown product or variation.
pub(super) async fn save_inventory(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(raw_id): Path<String>,
    Form(data): Form<HashMap<String, String>>,
) -> PageResult<(CookieJar, Redirect)> {
    let (product_id, _) = product_exists(&state, &raw_id).await?;

    let forms = parse_variation_formset(&data).map_err(|e| {
        tracing::warn!(product_id, error = %e, "rejected inventory formset");
        PageError::NotFound
    })?;

    let saved = storefront_db::save_variation_forms(&state.pool, product_id, &forms).await?;
    tracing::info!(product_id, saved, "inventory updated");

    Ok((
        push_notice(jar, Notice::InventoryUpdated),
        Redirect::to("/products/"),
    ))
}
