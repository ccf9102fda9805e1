//! Database operations for the `categories` table.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use storefront_core::{Ordering, WindowRequest};

use crate::products::{ProductRow, PRODUCT_COLUMNS};
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `categories` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A product paired with one of the categories it is listed under.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryProductRow {
    pub category_id: i64,
    #[sqlx(flatten)]
    pub product: ProductRow,
}

const CATEGORY_COLUMNS: &str = "c.id, c.title, c.slug, c.description, c.active, c.created_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns one window of categories in the requested order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_categories(
    pool: &PgPool,
    ordering: &Ordering,
    window: Option<WindowRequest>,
) -> Result<Vec<CategoryRow>, DbError> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new(format!("SELECT {CATEGORY_COLUMNS} FROM categories c ORDER BY "));
    qb.push(ordering.to_sql("c"));
    qb.push(", c.id ASC");

    if let Some(window) = window {
        qb.push(" LIMIT ");
        qb.push_bind(window.limit);
        qb.push(" OFFSET ");
        qb.push_bind(window.offset);
    }

    let rows = qb.build_query_as::<CategoryRow>().fetch_all(pool).await?;
    Ok(rows)
}

/// Returns the total number of categories.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_categories(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Returns a single category by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_category(pool: &PgPool, id: i64) -> Result<Option<CategoryRow>, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns every product listed under a category: the explicitly linked
/// products plus those using it as their default category, each once.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_category_products(
    pool: &PgPool,
    category_id: i64,
) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} \
         FROM products p \
         WHERE p.default_category_id = $1 \
            OR EXISTS ( \
                SELECT 1 FROM product_categories pc \
                WHERE pc.product_id = p.id AND pc.category_id = $1 \
            ) \
         ORDER BY p.title DESC, p.id ASC"
    ))
    .bind(category_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Batch form of [`list_category_products`] for a page of categories.
///
/// Rows are grouped by `category_id`; a product appears at most once per
/// category.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products_for_categories(
    pool: &PgPool,
    category_ids: &[i64],
) -> Result<Vec<CategoryProductRow>, DbError> {
    if category_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, CategoryProductRow>(&format!(
        "SELECT links.category_id, {PRODUCT_COLUMNS} \
         FROM ( \
             SELECT pc.category_id, pc.product_id \
             FROM product_categories pc \
             WHERE pc.category_id = ANY($1) \
             UNION \
             SELECT d.default_category_id, d.id \
             FROM products d \
             WHERE d.default_category_id = ANY($1) \
         ) links \
         JOIN products p ON p.id = links.product_id \
         ORDER BY links.category_id, p.title DESC, p.id ASC"
    ))
    .bind(category_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
