//! Database operations for `products` and `product_categories`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use storefront_core::{ListParams, PageRequest};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub active: bool,
    pub default_category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`create_product`].
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub active: bool,
    pub default_category_id: Option<i64>,
    pub category_ids: Vec<i64>,
    /// When empty, a single `Default` variation priced like the product is created.
    pub variations: Vec<NewVariation>,
}

#[derive(Debug, Clone)]
pub struct NewVariation {
    pub title: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub active: bool,
    pub inventory: Option<i32>,
}

pub(crate) const PRODUCT_COLUMNS: &str = "p.id, p.title, p.description, p.price, p.active, \
     p.default_category_id, p.created_at, p.updated_at";

// ---------------------------------------------------------------------------
// List pipeline
// ---------------------------------------------------------------------------

/// Append the search and filter predicates of `params` as `AND` clauses.
///
/// Search is `(every pattern matches title or description) OR price = exact`;
/// filters are applied after it. Multi-valued relations are checked with
/// `EXISTS` so each product appears at most once.
fn push_product_predicates(qb: &mut QueryBuilder<'_, Postgres>, params: &ListParams) {
    if let Some(search) = &params.search {
        qb.push(" AND ((TRUE");
        for pattern in &search.patterns {
            qb.push(" AND (p.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR p.description ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(")");
        }
        qb.push(")");
        if let Some(price) = search.exact_price {
            qb.push(" OR p.price = ");
            qb.push_bind(price);
        }
        qb.push(")");
    }

    let filter = &params.filter;

    if let Some(pattern) = filter.title_pattern() {
        qb.push(" AND p.title ILIKE ");
        qb.push_bind(pattern);
    }

    if let Some(pattern) = filter.category_pattern() {
        qb.push(
            " AND (EXISTS (SELECT 1 FROM product_categories pc \
             JOIN categories c ON c.id = pc.category_id \
             WHERE pc.product_id = p.id AND c.title ILIKE ",
        );
        qb.push_bind(pattern.clone());
        qb.push(
            ") OR EXISTS (SELECT 1 FROM categories dc \
             WHERE dc.id = p.default_category_id AND dc.title ILIKE ",
        );
        qb.push_bind(pattern);
        qb.push("))");
    }

    if let Some(category_id) = filter.category_id {
        qb.push(" AND (p.default_category_id = ");
        qb.push_bind(category_id);
        qb.push(
            " OR EXISTS (SELECT 1 FROM product_categories pc \
             WHERE pc.product_id = p.id AND pc.category_id = ",
        );
        qb.push_bind(category_id);
        qb.push("))");
    }

    if let Some(min_price) = filter.min_price {
        qb.push(" AND EXISTS (SELECT 1 FROM variations v WHERE v.product_id = p.id AND v.price >= ");
        qb.push_bind(min_price);
        qb.push(")");
    }

    if let Some(max_price) = filter.max_price {
        qb.push(" AND EXISTS (SELECT 1 FROM variations v WHERE v.product_id = p.id AND v.price <= ");
        qb.push_bind(max_price);
        qb.push(")");
    }
}

/// Returns products matching `params`, optionally restricted to one page.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &PgPool,
    params: &ListParams,
    page: Option<PageRequest>,
) -> Result<Vec<ProductRow>, DbError> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE TRUE"));
    push_product_predicates(&mut qb, params);

    qb.push(" ORDER BY ");
    qb.push(params.ordering.to_sql("p"));
    qb.push(", p.id ASC");

    if let Some(page) = page {
        qb.push(" LIMIT ");
        qb.push_bind(page.size);
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());
    }

    tracing::debug!(sql = qb.sql(), "listing products");
    let rows = qb.build_query_as::<ProductRow>().fetch_all(pool).await?;
    Ok(rows)
}

/// Counts products matching `params`, ignoring ordering and paging.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_products_matching(pool: &PgPool, params: &ListParams) -> Result<i64, DbError> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM products p WHERE TRUE");
    push_product_predicates(&mut qb, params);

    let count = qb.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(count)
}

/// Returns the total number of products.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_products(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

// ---------------------------------------------------------------------------
// Single records
// ---------------------------------------------------------------------------

/// Returns a single product by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the ids of the categories a product is explicitly linked to.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_product_category_ids(
    pool: &PgPool,
    product_id: i64,
) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT category_id FROM product_categories \
         WHERE product_id = $1 \
         ORDER BY category_id",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Returns up to `limit` active products related to `product`.
///
/// A product is related when it shares an explicit category with `product`
/// or has the same (non-null) default category. `product` itself is excluded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_related_products(
    pool: &PgPool,
    product: &ProductRow,
    limit: i64,
) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} \
         FROM products p \
         WHERE p.active = TRUE \
           AND p.id <> $1 \
           AND ( \
               EXISTS ( \
                   SELECT 1 FROM product_categories pc \
                   WHERE pc.product_id = p.id \
                     AND pc.category_id IN ( \
                         SELECT category_id FROM product_categories WHERE product_id = $1 \
                     ) \
               ) \
               OR ($2::BIGINT IS NOT NULL AND p.default_category_id = $2) \
           ) \
         ORDER BY p.title DESC, p.id ASC \
         LIMIT $3"
    ))
    .bind(product.id)
    .bind(product.default_category_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Inserts a product with its category links and variations in one
/// transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails (for example a foreign
/// key violation on an unknown category id); nothing is persisted then.
pub async fn create_product(pool: &PgPool, new: &NewProduct) -> Result<ProductRow, DbError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, ProductRow>(
        "INSERT INTO products (title, description, price, active, default_category_id) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, title, description, price, active, default_category_id, \
                   created_at, updated_at",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.price)
    .bind(new.active)
    .bind(new.default_category_id)
    .fetch_one(&mut *tx)
    .await?;

    if !new.category_ids.is_empty() {
        sqlx::query(
            "INSERT INTO product_categories (product_id, category_id) \
             SELECT $1, UNNEST($2::BIGINT[]) \
             ON CONFLICT DO NOTHING",
        )
        .bind(row.id)
        .bind(&new.category_ids)
        .execute(&mut *tx)
        .await?;
    }

    let default_variation;
    let variations = if new.variations.is_empty() {
        default_variation = [NewVariation {
            title: "Default".to_string(),
            price: new.price,
            sale_price: None,
            active: true,
            inventory: None,
        }];
        &default_variation[..]
    } else {
        &new.variations[..]
    };

    for variation in variations {
        sqlx::query(
            "INSERT INTO variations (product_id, title, price, sale_price, active, inventory) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(row.id)
        .bind(&variation.title)
        .bind(variation.price)
        .bind(variation.sale_price)
        .bind(variation.active)
        .bind(variation.inventory)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!(product_id = row.id, title = %row.title, "product created");
    Ok(row)
}
