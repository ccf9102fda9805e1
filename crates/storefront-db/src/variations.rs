//! Database operations for the `variations` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use storefront_core::VariationForm;

use crate::DbError;

/// A row from the `variations` table.
///
/// `inventory` is `NULL` for variations that are not stock-tracked.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VariationRow {
    pub id: i64,
    pub product_id: i64,
    pub title: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub active: bool,
    pub inventory: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const NEW_VARIATION_TITLE: &str = "Default";

/// Returns the variations of one product, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_variations_for_product(
    pool: &PgPool,
    product_id: i64,
) -> Result<Vec<VariationRow>, DbError> {
    let rows = sqlx::query_as::<_, VariationRow>(
        "SELECT id, product_id, title, price, sale_price, active, inventory, \
                created_at, updated_at \
         FROM variations \
         WHERE product_id = $1 \
         ORDER BY id",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the variations of several products, grouped by `product_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_variations_for_products(
    pool: &PgPool,
    product_ids: &[i64],
) -> Result<Vec<VariationRow>, DbError> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, VariationRow>(
        "SELECT id, product_id, title, price, sale_price, active, inventory, \
                created_at, updated_at \
         FROM variations \
         WHERE product_id = ANY($1) \
         ORDER BY product_id, id",
    )
    .bind(product_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Persists a validated inventory formset for `product_id`.
///
/// Every row is written with `product_id` from the caller, whatever product
/// the variation belonged to before. Rows with an id update that variation;
/// rows without one insert a new variation. All rows share one transaction.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if a row references a variation id that
/// does not exist (nothing is persisted), or [`DbError::Sqlx`] on failure.
pub async fn save_variation_forms(
    pool: &PgPool,
    product_id: i64,
    forms: &[VariationForm],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    for form in forms {
        if let Some(id) = form.id {
            let affected = sqlx::query(
                "UPDATE variations \
                 SET product_id = $1, price = $2, sale_price = $3, inventory = $4, \
                     active = $5, updated_at = NOW() \
                 WHERE id = $6",
            )
            .bind(product_id)
            .bind(form.price)
            .bind(form.sale_price)
            .bind(form.inventory)
            .bind(form.active)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if affected == 0 {
                return Err(DbError::NotFound);
            }
        } else {
            sqlx::query(
                "INSERT INTO variations (product_id, title, price, sale_price, inventory, active) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(product_id)
            .bind(form.title.as_deref().unwrap_or(NEW_VARIATION_TITLE))
            .bind(form.price)
            .bind(form.sale_price)
            .bind(form.inventory)
            .bind(form.active)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(forms.len())
}
