//! Shared domain logic for the storefront: configuration, the catalog seed
//! file, list-query parameters and formset parsing.

pub mod app_config;
pub mod catalog;
pub mod config;
pub mod formset;
pub mod query;

use rust_decimal::Decimal;
use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use catalog::{
    load_catalog, parse_catalog, CatalogFile, CategoryConfig, ProductConfig, VariationConfig,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use formset::{parse_variation_formset, FormsetError, VariationForm};
pub use query::{
    escape_like, replace_query_param, ListParams, Ordering, OrderingField, Page, PageRequest,
    ProductFilter, ProductFilterForm, ProductSearch, Resource, WindowRequest,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read catalog file {path}: {source}")]
    CatalogFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog file: {0}")]
    CatalogFileParse(#[from] serde_yaml::Error),
    #[error("catalog validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// An `ordering` parameter named a field the resource cannot be sorted by.
    #[error("cannot resolve keyword '{0}' into an ordering field")]
    InvalidOrdering(String),
    #[error("invalid page: {0}")]
    InvalidPage(String),
    #[error("improperly configured: {0}")]
    ImproperlyConfigured(String),
}

/// Total digits a stored amount may carry (`NUMERIC(20, 2)`).
pub const AMOUNT_MAX_DIGITS: usize = 20;
/// Decimal places a stored amount may carry.
pub const AMOUNT_DECIMAL_PLACES: u32 = 2;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("ensure that there are no more than 2 decimal places")]
    DecimalPlaces,
    #[error("ensure that there are no more than 20 digits in total")]
    Digits,
}

/// Check that `value` fits the money columns without rounding or overflow.
///
/// # Errors
///
/// Returns [`AmountError`] naming the first limit `value` exceeds.
pub fn check_amount(value: Decimal) -> Result<Decimal, AmountError> {
    if value.scale() > AMOUNT_DECIMAL_PLACES {
        return Err(AmountError::DecimalPlaces);
    }
    let whole_digits = value
        .abs()
        .trunc()
        .to_string()
        .trim_start_matches('0')
        .len();
    if whole_digits > AMOUNT_MAX_DIGITS - AMOUNT_DECIMAL_PLACES as usize {
        return Err(AmountError::Digits);
    }
    Ok(value)
}

/// Generate a URL-safe slug from a display title.
#[must_use]
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else if c.is_whitespace() || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|&c| c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
