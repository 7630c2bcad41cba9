//! List query parameters: search terms, ordering and equality filters.
//!
//! Query-string parameters are turned into a [`ListQuery`] checked against a
//! per-resource [`ListSpec`] whitelist. Stores only ever see whitelisted
//! fields, never raw parameter text.

use std::collections::HashMap;

pub const SEARCH_PARAM: &str = "search";
pub const ORDERING_PARAM: &str = "ordering";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryField {
    Name,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductField {
    Name,
    Price,
    CreatedAt,
}

/// Equality filters a listing may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    CategorySlug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy<F> {
    pub field: F,
    pub direction: Direction,
}

/// Permitted ordering fields and filter parameters of one resource.
pub struct ListSpec<F: 'static> {
    pub ordering: &'static [(&'static str, F)],
    pub default_order: F,
    pub filters: &'static [(&'static str, FilterField)],
}

pub const CATEGORY_LISTING: ListSpec<CategoryField> = ListSpec {
    ordering: &[
        ("name", CategoryField::Name),
        ("created_at", CategoryField::CreatedAt),
    ],
    default_order: CategoryField::Name,
    filters: &[],
};

pub const PRODUCT_LISTING: ListSpec<ProductField> = ListSpec {
    ordering: &[
        ("name", ProductField::Name),
        ("price", ProductField::Price),
        ("created_at", ProductField::CreatedAt),
    ],
    default_order: ProductField::Name,
    filters: &[("category", FilterField::CategorySlug)],
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery<F> {
    /// Every term must match at least one search field.
    pub search: Vec<String>,
    /// Never empty.
    pub ordering: Vec<OrderBy<F>>,
    pub filters: Vec<(FilterField, String)>,
}

impl<F: Copy + PartialEq> ListQuery<F> {
    pub fn unfiltered(spec: &ListSpec<F>) -> Self {
        Self {
            search: Vec::new(),
            ordering: vec![OrderBy {
                field: spec.default_order,
                direction: Direction::Asc,
            }],
            filters: Vec::new(),
        }
    }

    pub fn from_params(spec: &ListSpec<F>, params: &HashMap<String, String>) -> Self {
        let mut query = Self::unfiltered(spec);

        if let Some(raw) = params.get(SEARCH_PARAM) {
            query.search = search_terms(raw);
        }

        if let Some(raw) = params.get(ORDERING_PARAM) {
            let ordering = parse_ordering(spec, raw);
            if !ordering.is_empty() {
                query.ordering = ordering;
            }
        }

        for (param, field) in spec.filters {
            match params.get(*param) {
                Some(value) if !value.is_empty() => query.filters.push((*field, value.clone())),
                _ => {}
            }
        }

        query
    }

    pub fn filter(&self, field: FilterField) -> Option<&str> {
        self.filters
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }
}

/// Splits on whitespace and commas, dropping empty pieces.
pub fn search_terms(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Unknown fields are skipped; a field named twice keeps its first position.
fn parse_ordering<F: Copy + PartialEq>(spec: &ListSpec<F>, raw: &str) -> Vec<OrderBy<F>> {
    let mut out: Vec<OrderBy<F>> = Vec::new();
    for term in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (name, direction) = match term.strip_prefix('-') {
            Some(rest) => (rest, Direction::Desc),
            None => (term, Direction::Asc),
        };
        let Some((_, field)) = spec.ordering.iter().find(|(n, _)| *n == name) else {
            continue;
        };
        if out.iter().any(|o| o.field == *field) {
            continue;
        }
        out.push(OrderBy {
            field: *field,
            direction,
        });
    }
    out
}

/// `%term%` pattern for `ILIKE`, with LIKE wildcards in the term escaped.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Case-insensitive substring test used by the memory store.
pub fn contains_ci(haystack: &str, term: &str) -> bool {
    haystack.to_lowercase().contains(&term.to_lowercase())
}
