//! Parsing and validation of the variation inventory formset.
//!
//! The inventory page posts one row per variation using the conventional
//! `form-TOTAL_FORMS` / `form-INITIAL_FORMS` management fields and
//! `form-<n>-<field>` row fields. Rows below `INITIAL_FORMS` edit existing
//! variations and must carry an id; rows above it are new variations and are
//! skipped when left blank.

use std::collections::HashMap;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::check_amount;

const PREFIX: &str = "form";
/// Hard cap on submitted rows.
pub const MAX_FORMS: usize = 1000;

/// One validated row of the inventory formset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariationForm {
    /// `None` for a new variation.
    pub id: Option<i64>,
    pub title: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub inventory: Option<i32>,
    pub active: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormsetError {
    #[error("management form data is missing or has been tampered with")]
    ManagementForm,
    #[error("too many forms submitted ({0})")]
    TooManyForms(usize),
    #[error("form {index}, field '{field}': {message}")]
    Field {
        index: usize,
        field: &'static str,
        message: String,
    },
}

/// Validate a submitted inventory formset.
///
/// # Errors
///
/// Returns [`FormsetError`] for a missing management form, too many rows, or
/// the first invalid field encountered.
pub fn parse_variation_formset(
    data: &HashMap<String, String>,
) -> Result<Vec<VariationForm>, FormsetError> {
    let total = management_count(data, "TOTAL_FORMS")?;
    let initial = management_count(data, "INITIAL_FORMS")?;
    if initial > total {
        return Err(FormsetError::ManagementForm);
    }
    if total > MAX_FORMS {
        return Err(FormsetError::TooManyForms(total));
    }

    let mut forms = Vec::with_capacity(total);
    for index in 0..total {
        let field = |name: &str| {
            data.get(&format!("{PREFIX}-{index}-{name}"))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };
        let is_extra = index >= initial;

        if is_extra
            && ["id", "title", "price", "sale_price", "inventory"]
                .iter()
                .all(|name| field(name).is_none())
        {
            continue;
        }

        let id = match field("id") {
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| FormsetError::Field {
                index,
                field: "id",
                message: "select a valid choice".to_string(),
            })?),
            None if !is_extra => {
                return Err(FormsetError::Field {
                    index,
                    field: "id",
                    message: "this field is required".to_string(),
                })
            }
            None => None,
        };

        let price = field("price")
            .ok_or_else(|| FormsetError::Field {
                index,
                field: "price",
                message: "this field is required".to_string(),
            })
            .and_then(|raw| parse_amount(index, "price", raw))?;

        let sale_price = field("sale_price")
            .map(|raw| parse_amount(index, "sale_price", raw))
            .transpose()?;

        let inventory = field("inventory")
            .map(|raw| {
                raw.parse::<i32>().map_err(|_| FormsetError::Field {
                    index,
                    field: "inventory",
                    message: "enter a whole number".to_string(),
                })
            })
            .transpose()?;

        forms.push(VariationForm {
            id,
            title: field("title").map(ToOwned::to_owned),
            price,
            sale_price,
            inventory,
            active: checkbox(data.get(&format!("{PREFIX}-{index}-active"))),
        });
    }

    Ok(forms)
}

fn management_count(data: &HashMap<String, String>, name: &str) -> Result<usize, FormsetError> {
    data.get(&format!("{PREFIX}-{name}"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .ok_or(FormsetError::ManagementForm)
}

fn parse_amount(index: usize, field: &'static str, raw: &str) -> Result<Decimal, FormsetError> {
    let invalid = |message: String| FormsetError::Field {
        index,
        field,
        message,
    };

    let value = raw
        .parse::<Decimal>()
        .map_err(|_| invalid("enter a number".to_string()))?;
    check_amount(value).map_err(|e| invalid(e.to_string()))
}

/// Unchecked boxes are absent from the payload; `false` is accepted too.
fn checkbox(value: Option<&String>) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => false,
        Some(v) => !(v.is_empty() || v == "false"),
    }
}
