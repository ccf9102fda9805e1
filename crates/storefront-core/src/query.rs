//! List-query parameters shared by the HTML storefront and the JSON API:
//! free-text search, ordering, the declarative product filter and the two
//! pagination schemes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// The record types that can be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Product,
    Category,
}

impl Resource {
    /// Every field the resource can be ordered by.
    #[must_use]
    pub fn ordering_fields(self) -> &'static [OrderingField] {
        match self {
            Resource::Product => &[
                OrderingField::Id,
                OrderingField::Title,
                OrderingField::Description,
                OrderingField::Price,
                OrderingField::Active,
                OrderingField::DefaultCategory,
                OrderingField::CreatedAt,
                OrderingField::UpdatedAt,
            ],
            Resource::Category => &[
                OrderingField::Id,
                OrderingField::Title,
                OrderingField::Slug,
                OrderingField::Description,
                OrderingField::Active,
                OrderingField::CreatedAt,
            ],
        }
    }

    #[must_use]
    pub fn default_ordering(self) -> Ordering {
        match self {
            Resource::Product => Ordering {
                field: OrderingField::Title,
                descending: true,
            },
            Resource::Category => Ordering {
                field: OrderingField::Title,
                descending: false,
            },
        }
    }

    #[must_use]
    pub fn supports_search(self) -> bool {
        matches!(self, Resource::Product)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingField {
    Id,
    Title,
    Slug,
    Description,
    Price,
    Active,
    DefaultCategory,
    CreatedAt,
    UpdatedAt,
}

impl OrderingField {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "id" | "pk" => Some(Self::Id),
            "title" => Some(Self::Title),
            "slug" => Some(Self::Slug),
            "description" => Some(Self::Description),
            "price" => Some(Self::Price),
            "active" => Some(Self::Active),
            "default" | "default_category" => Some(Self::DefaultCategory),
            "created_at" | "timestamp" => Some(Self::CreatedAt),
            "updated_at" | "updated" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    /// Column name, safe to splice into SQL.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Slug => "slug",
            Self::Description => "description",
            Self::Price => "price",
            Self::Active => "active",
            Self::DefaultCategory => "default_category_id",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

/// A single `ORDER BY` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordering {
    pub field: OrderingField,
    pub descending: bool,
}

impl Ordering {
    /// Parse an `ordering` parameter such as `title` or `-price`.
    ///
    /// Unknown names are an error, never silently dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOrdering`] if the name is not one of `allowed`.
    pub fn parse(raw: &str, allowed: &[OrderingField]) -> Result<Self, CoreError> {
        let raw = raw.trim();
        let (descending, name) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        OrderingField::from_name(name)
            .filter(|field| allowed.contains(field))
            .map(|field| Self { field, descending })
            .ok_or_else(|| CoreError::InvalidOrdering(raw.to_string()))
    }

    /// Render as `<alias>.<column> ASC|DESC`.
    #[must_use]
    pub fn to_sql(&self, alias: &str) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!("{alias}.{} {direction}", self.field.column())
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside `ILIKE`.
#[must_use]
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn contains_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

/// Free-text product search.
///
/// Every entry in `patterns` must match title or description; a row also
/// matches outright when its price equals `exact_price`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSearch {
    pub patterns: Vec<String>,
    pub exact_price: Option<Decimal>,
}

impl ProductSearch {
    /// Storefront `q` semantics: the whole string is one case-insensitive
    /// substring, unioned with an exact price match when it parses as a number.
    #[must_use]
    pub fn storefront(q: Option<&str>) -> Option<Self> {
        let q = q.map(str::trim).filter(|q| !q.is_empty())?;
        Some(Self {
            patterns: vec![contains_pattern(q)],
            exact_price: q.parse::<Decimal>().ok(),
        })
    }

    /// API `search` semantics: whitespace/comma separated terms, each of which
    /// must match title or description.
    #[must_use]
    pub fn terms(search: Option<&str>) -> Option<Self> {
        let patterns: Vec<String> = search?
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(contains_pattern)
            .collect();

        if patterns.is_empty() {
            return None;
        }
        Some(Self {
            patterns,
            exact_price: None,
        })
    }
}

/// Raw product filter parameters as submitted by the filter form.
///
/// Kept as strings so the form can be echoed back exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilterForm {
    pub title: Option<String>,
    pub category: Option<String>,
    pub category_id: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

impl ProductFilterForm {
    /// Convert to typed predicates. Blank or unparseable values are dropped.
    #[must_use]
    pub fn to_filter(&self) -> ProductFilter {
        fn text(value: Option<&String>) -> Option<String> {
            value
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(ToOwned::to_owned)
        }
        fn parsed<T: std::str::FromStr>(value: Option<&String>) -> Option<T> {
            value.and_then(|v| v.trim().parse::<T>().ok())
        }

        ProductFilter {
            title: text(self.title.as_ref()),
            category: text(self.category.as_ref()),
            category_id: parsed(self.category_id.as_ref()),
            min_price: parsed(self.min_price.as_ref()),
            max_price: parsed(self.max_price.as_ref()),
        }
    }
}

/// Declarative product filter.
///
/// `category` and `category_id` match either the explicit category set or
/// the default category; price bounds match against variation prices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub title: Option<String>,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

impl ProductFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    #[must_use]
    pub fn title_pattern(&self) -> Option<String> {
        self.title.as_deref().map(contains_pattern)
    }

    #[must_use]
    pub fn category_pattern(&self) -> Option<String> {
        self.category.as_deref().map(contains_pattern)
    }
}

/// Assembled list pipeline for one resource: base query, then search, then
/// ordering, then the declarative filter.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub resource: Resource,
    pub search: Option<ProductSearch>,
    pub ordering: Ordering,
    pub filter: ProductFilter,
}

impl ListParams {
    #[must_use]
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            search: None,
            ordering: resource.default_ordering(),
            filter: ProductFilter::default(),
        }
    }

    /// # Errors
    ///
    /// Returns [`CoreError::ImproperlyConfigured`] if the resource has no
    /// searchable fields.
    pub fn with_search(mut self, search: Option<ProductSearch>) -> Result<Self, CoreError> {
        if search.is_some() && !self.resource.supports_search() {
            return Err(CoreError::ImproperlyConfigured(format!(
                "{:?} listing has no search fields",
                self.resource
            )));
        }
        self.search = search;
        Ok(self)
    }

    /// Apply an `ordering` parameter restricted to `allowed`, or to every
    /// field of the resource when `allowed` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOrdering`] for unknown or disallowed fields.
    pub fn with_ordering(
        mut self,
        raw: Option<&str>,
        allowed: Option<&[OrderingField]>,
    ) -> Result<Self, CoreError> {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return Ok(self);
        };
        let allowed = allowed.unwrap_or_else(|| self.resource.ordering_fields());
        self.ordering = Ordering::parse(raw, allowed)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns [`CoreError::ImproperlyConfigured`] if a non-empty product
    /// filter is attached to a resource other than products.
    pub fn with_filter(mut self, filter: ProductFilter) -> Result<Self, CoreError> {
        if !filter.is_empty() && self.resource != Resource::Product {
            return Err(CoreError::ImproperlyConfigured(format!(
                "product filter cannot be applied to {:?} listing",
                self.resource
            )));
        }
        self.filter = filter;
        Ok(self)
    }
}

/// Page-number pagination request (`?page=N&size=M`).
///
/// `page=last` names the final page; call [`PageRequest::resolve`] with the
/// result count before using the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
    last: bool,
}

impl PageRequest {
    /// An unparseable or non-positive `size` falls back to `default_size`;
    /// larger values are capped at `max_size`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPage`] when `page` is neither a positive
    /// integer nor `last`.
    pub fn parse(
        page: Option<&str>,
        size: Option<&str>,
        default_size: i64,
        max_size: i64,
    ) -> Result<Self, CoreError> {
        let raw_page = page.map(str::trim).filter(|p| !p.is_empty());
        let last = raw_page == Some("last");
        let page = match raw_page {
            None | Some("last") => 1,
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| CoreError::InvalidPage(raw.to_string()))?,
        };
        let size = size
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|s| *s > 0)
            .map_or(default_size, |s| s.min(max_size));

        Ok(Self { page, size, last })
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.size)
    }

    #[must_use]
    pub fn page_count(&self, total: i64) -> i64 {
        if total <= 0 {
            1
        } else {
            (total + self.size - 1) / self.size
        }
    }

    /// Pin the page against `total` results: `last` becomes the final page.
    /// The first page is always valid, even when there are no results.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPage`] if the page is past the last one.
    pub fn resolve(self, total: i64) -> Result<Self, CoreError> {
        let page_count = self.page_count(total);
        if self.last {
            return Ok(Self {
                page: page_count,
                last: false,
                ..self
            });
        }
        if self.page > 1 && self.page > page_count {
            return Err(CoreError::InvalidPage(self.page.to_string()));
        }
        Ok(self)
    }

    #[must_use]
    pub fn has_next(&self, total: i64) -> bool {
        self.page < self.page_count(total)
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Limit/offset pagination request (`?limit=N&offset=M`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRequest {
    pub limit: i64,
    pub offset: i64,
}

impl WindowRequest {
    #[must_use]
    pub fn parse(
        limit: Option<&str>,
        offset: Option<&str>,
        default_limit: i64,
        max_limit: i64,
    ) -> Self {
        let limit = limit
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l > 0)
            .map_or(default_limit, |l| l.min(max_limit));
        let offset = offset
            .and_then(|o| o.trim().parse::<i64>().ok())
            .filter(|o| *o >= 0)
            .unwrap_or(0);

        Self { limit, offset }
    }

    /// Offset of the following window. Saturates, so a huge `offset` never
    /// wraps around to the start.
    #[must_use]
    pub fn next_offset(&self) -> i64 {
        self.offset.saturating_add(self.limit)
    }

    #[must_use]
    pub fn previous_offset(&self) -> i64 {
        (self.offset - self.limit).max(0)
    }

    #[must_use]
    pub fn has_next(&self, total: i64) -> bool {
        self.next_offset() < total
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.offset > 0
    }
}

/// A paginated collection, serialized as `{count, next, previous, results}`.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T: Serialize> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Rebuild a raw query string with `key` replaced by `value`, or removed
/// when `value` is `None`. Other parameters are kept as sent.
#[must_use]
pub fn replace_query_param(raw_query: Option<&str>, key: &str, value: Option<&str>) -> String {
    let mut pairs: Vec<String> = raw_query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some(key))
        .map(ToOwned::to_owned)
        .collect();

    if let Some(value) = value {
        pairs.push(format!("{key}={value}"));
    }
    pairs.join("&")
}
