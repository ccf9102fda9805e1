use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{slugify, ConfigError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl CategoryConfig {
    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Title of the category this product is filed under by default.
    pub default_category: Option<String>,
    /// Titles of additional categories the product is listed in.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub variations: Vec<VariationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationConfig {
    pub title: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    #[serde(default = "default_true")]
    pub active: bool,
    /// `None` means the variation is not stock-tracked.
    pub inventory: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub products: Vec<ProductConfig>,
}

fn default_true() -> bool {
    true
}

/// Load and validate the catalog seed file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog(path: &Path) -> Result<CatalogFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CatalogFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_catalog(&content)
}

/// Parse and validate catalog YAML already in memory.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_catalog(content: &str) -> Result<CatalogFile, ConfigError> {
    let catalog: CatalogFile = serde_yaml::from_str(content)?;
    validate_catalog(&catalog)?;
    Ok(catalog)
}

fn validate_catalog(catalog: &CatalogFile) -> Result<(), ConfigError> {
    let mut titles = HashSet::new();
    let mut slugs = HashSet::new();

    for category in &catalog.categories {
        if category.title.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category title must be non-empty".to_string(),
            ));
        }
        if !titles.insert(category.title.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category title: '{}'",
                category.title
            )));
        }
        let slug = category.slug();
        if slug.is_empty() || !slugs.insert(slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "category '{}' does not produce a unique slug ('{slug}')",
                category.title
            )));
        }
    }

    for product in &catalog.products {
        if product.title.trim().is_empty() {
            return Err(ConfigError::Validation(
                "product title must be non-empty".to_string(),
            ));
        }
        if product.price.is_sign_negative() {
            return Err(ConfigError::Validation(format!(
                "product '{}' has a negative price",
                product.title
            )));
        }

        let referenced = product
            .default_category
            .iter()
            .chain(product.categories.iter());
        for title in referenced {
            if !titles.contains(&title.to_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "product '{}' references unknown category '{title}'",
                    product.title
                )));
            }
        }

        for variation in &product.variations {
            if variation.title.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "product '{}' has a variation without a title",
                    product.title
                )));
            }
            if variation.price.is_sign_negative()
                || variation.sale_price.is_some_and(|p| p.is_sign_negative())
            {
                return Err(ConfigError::Validation(format!(
                    "variation '{}' of '{}' has a negative price",
                    variation.title, product.title
                )));
            }
            if variation.inventory.is_some_and(|n| n < 0) {
                return Err(ConfigError::Validation(format!(
                    "variation '{}' of '{}' has negative inventory",
                    variation.title, product.title
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
