use std::collections::HashMap;

use sqlx::PgPool;
use storefront_core::CatalogFile;

use crate::DbError;

/// Counts of records written by [`seed_catalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub products: usize,
    pub variations: usize,
}

/// Upsert a validated catalog file into the database.
///
/// Categories are keyed by slug. Products are keyed by title: an existing
/// product with the same title is updated and its category links and
/// variations are replaced. All writes run inside a single transaction; if
/// any operation fails the entire batch is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_catalog(pool: &PgPool, catalog: &CatalogFile) -> Result<SeedSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();
    let mut category_ids: HashMap<String, i64> = HashMap::new();

    for category in &catalog.categories {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO categories (title, slug, description, active) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (slug) DO UPDATE SET \
                 title = EXCLUDED.title, \
                 description = EXCLUDED.description, \
                 active = EXCLUDED.active \
             RETURNING id",
        )
        .bind(&category.title)
        .bind(category.slug())
        .bind(&category.description)
        .bind(category.active)
        .fetch_one(&mut *tx)
        .await?;

        category_ids.insert(category.title.to_lowercase(), id);
        summary.categories += 1;
    }

    for product in &catalog.products {
        let default_category_id = product
            .default_category
            .as_ref()
            .and_then(|title| category_ids.get(&title.to_lowercase()).copied());

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM products WHERE title = $1 ORDER BY id LIMIT 1")
                .bind(&product.title)
                .fetch_optional(&mut *tx)
                .await?;

        let product_id: i64 = if let Some(id) = existing {
            sqlx::query(
                "UPDATE products \
                 SET description = $1, price = $2, active = $3, default_category_id = $4, \
                     updated_at = NOW() \
                 WHERE id = $5",
            )
            .bind(&product.description)
            .bind(product.price)
            .bind(product.active)
            .bind(default_category_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            id
        } else {
            sqlx::query_scalar(
                "INSERT INTO products (title, description, price, active, default_category_id) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id",
            )
            .bind(&product.title)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.active)
            .bind(default_category_id)
            .fetch_one(&mut *tx)
            .await?
        };

        sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        for title in &product.categories {
            if let Some(category_id) = category_ids.get(&title.to_lowercase()) {
                sqlx::query(
                    "INSERT INTO product_categories (product_id, category_id) \
                     VALUES ($1, $2) \
                     ON CONFLICT DO NOTHING",
                )
                .bind(product_id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query("DELETE FROM variations WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        if product.variations.is_empty() {
            sqlx::query(
                "INSERT INTO variations (product_id, title, price) VALUES ($1, 'Default', $2)",
            )
            .bind(product_id)
            .bind(product.price)
            .execute(&mut *tx)
            .await?;
            summary.variations += 1;
        }
        for variation in &product.variations {
            sqlx::query(
                "INSERT INTO variations (product_id, title, price, sale_price, active, inventory) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(product_id)
            .bind(&variation.title)
            .bind(variation.price)
            .bind(variation.sale_price)
            .bind(variation.active)
            .bind(variation.inventory)
            .execute(&mut *tx)
            .await?;
            summary.variations += 1;
        }

        summary.products += 1;
    }

    tx.commit().await?;
    Ok(summary)
}
