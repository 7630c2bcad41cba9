use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    NewProduct, Product, ProductChanges, MIN_PRICE, PRICE_DECIMAL_PLACES, PRICE_MAX_DIGITS,
    PRODUCT_NAME_MAX_LEN, PRODUCT_SLUG_MAX_LEN,
};
use crate::schema::{present, FieldSpec, Payload, ResourceSchema, WriteMode};

pub static PRODUCT_SCHEMA: ResourceSchema = ResourceSchema {
    fields: &[
        FieldSpec::read_only("id"),
        FieldSpec::required("name"),
        FieldSpec::optional("slug"),
        FieldSpec::required("category"),
        FieldSpec::read_only("category_name"),
        FieldSpec::required("description"),
        FieldSpec::required("price"),
        FieldSpec::optional("stock"),
        FieldSpec::optional("available"),
        FieldSpec::read_only("created_at"),
        FieldSpec::read_only("updated_at"),
    ],
};

#[derive(Debug, Serialize)]
pub struct ProductRepresentation {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub category: Uuid,
    pub category_name: String,
    pub description: String,
    #[serde(serialize_with = "serialize_price")]
    pub price: Decimal,
    pub stock: i32,
    pub available: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Product> for ProductRepresentation {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            slug: p.slug,
            category: p.category_id,
            category_name: p.category_name,
            description: p.description,
            price: p.price,
            stock: p.stock,
            available: p.available,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Always exactly two fractional digits, as a string: `"19.90"`.
fn serialize_price<S: Serializer>(price: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    let mut fixed = price.round_dp(PRICE_DECIMAL_PLACES);
    fixed.rescale(PRICE_DECIMAL_PLACES);
    serializer.serialize_str(&fixed.to_string())
}

fn read_price(payload: &mut Payload) -> Option<Decimal> {
    payload.decimal("price", PRICE_MAX_DIGITS, PRICE_DECIMAL_PLACES, MIN_PRICE)
}

pub fn new_product(body: Value) -> Result<NewProduct, ApiError> {
    let mut payload = PRODUCT_SCHEMA.payload(body, WriteMode::Create)?;

    let name = payload.string("name", Some(PRODUCT_NAME_MAX_LEN), false);
    let category = payload.reference("category");
    let description = payload.string("description", None, false);
    let price = read_price(&mut payload);
    let stock = payload.integer("stock", 0);
    let available = payload.boolean("available");
    let slug = match (payload.slug("slug", PRODUCT_SLUG_MAX_LEN), &name) {
        (Some(slug), _) if !slug.is_empty() => Some(slug),
        (_, Some(name)) if !payload.has_error("slug") => {
            payload.derive_slug("slug", name, PRODUCT_SLUG_MAX_LEN)
        }
        _ => None,
    };
    payload.finish()?;

    Ok(NewProduct {
        name: present(name, "name")?,
        slug: present(slug, "slug")?,
        category_id: present(category, "category")?,
        description: present(description, "description")?,
        price: present(price, "price")?,
        stock: stock.unwrap_or(0),
        available: available.unwrap_or(true),
    })
}

/// PUT and PATCH. Slug handling matches categories: blank re-derives,
/// absent keeps.
pub fn product_changes(
    body: Value,
    mode: WriteMode,
    current: &Product,
) -> Result<ProductChanges, ApiError> {
    let mut payload = PRODUCT_SCHEMA.payload(body, mode)?;

    let name = payload.string("name", Some(PRODUCT_NAME_MAX_LEN), false);
    let category_id = payload.reference("category");
    let description = payload.string("description", None, false);
    let price = read_price(&mut payload);
    let stock = payload.integer("stock", 0);
    let available = payload.boolean("available");
    let slug = match payload.slug("slug", PRODUCT_SLUG_MAX_LEN) {
        Some(slug) if slug.is_empty() => {
            let source = name.clone().unwrap_or_else(|| current.name.clone());
            payload.derive_slug("slug", &source, PRODUCT_SLUG_MAX_LEN)
        }
        other => other,
    };
    payload.finish()?;

    Ok(ProductChanges {
        name,
        slug,
        category_id,
        description,
        price,
        stock,
        available,
    })
}
