use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    Category, CategoryChanges, NewCategory, CATEGORY_NAME_MAX_LEN, CATEGORY_SLUG_MAX_LEN,
};
use crate::schema::{present, FieldSpec, ResourceSchema, WriteMode};

pub static CATEGORY_SCHEMA: ResourceSchema = ResourceSchema {
    fields: &[
        FieldSpec::read_only("id"),
        FieldSpec::required("name"),
        FieldSpec::optional("slug"),
        FieldSpec::optional("description"),
        FieldSpec::read_only("product_count"),
        FieldSpec::read_only("created_at"),
        FieldSpec::read_only("updated_at"),
    ],
};

#[derive(Debug, Serialize)]
pub struct CategoryRepresentation {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub product_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Category> for CategoryRepresentation {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            slug: c.slug,
            description: c.description,
            product_count: c.product_count,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

pub fn new_category(body: Value) -> Result<NewCategory, ApiError> {
    let mut payload = CATEGORY_SCHEMA.payload(body, WriteMode::Create)?;

    let name = payload.string("name", Some(CATEGORY_NAME_MAX_LEN), false);
    let description = payload.string("description", None, true);
    let slug = match (payload.slug("slug", CATEGORY_SLUG_MAX_LEN), &name) {
        (Some(slug), _) if !slug.is_empty() => Some(slug),
        (_, Some(name)) if !payload.has_error("slug") => {
            payload.derive_slug("slug", name, CATEGORY_SLUG_MAX_LEN)
        }
        _ => None,
    };
    payload.finish()?;

    Ok(NewCategory {
        name: present(name, "name")?,
        slug: present(slug, "slug")?,
        description: description.unwrap_or_default(),
    })
}

/// PUT and PATCH. A blank slug is re-derived from the (possibly new) name;
/// an absent one keeps the stored slug.
pub fn category_changes(
    body: Value,
    mode: WriteMode,
    current: &Category,
) -> Result<CategoryChanges, ApiError> {
    let mut payload = CATEGORY_SCHEMA.payload(body, mode)?;

    let name = payload.string("name", Some(CATEGORY_NAME_MAX_LEN), false);
    let description = payload.string("description", None, true);
    let slug = match payload.slug("slug", CATEGORY_SLUG_MAX_LEN) {
        Some(slug) if slug.is_empty() => {
            let source = name.clone().unwrap_or_else(|| current.name.clone());
            payload.derive_slug("slug", &source, CATEGORY_SLUG_MAX_LEN)
        }
        other => other,
    };
    payload.finish()?;

    Ok(CategoryChanges {
        name,
        slug,
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldErrors;
    use serde_json::json;

    fn field_errors(err: ApiError) -> FieldErrors {
        match err {
            ApiError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn stored(name: &str, slug: &str) -> Category {
        let now = OffsetDateTime::now_utc();
        Category {
            id: Uuid::new_v4(),
            name: name.into(),
            slug: slug.into(),
            description: String::new(),
            created_at: now,
            updated_at: now,
            product_count: 0,
        }
    }

    #[test]
    fn slug_is_derived_from_name() {
        let new = new_category(json!({"name": "Home Appliances"})).unwrap();
        assert_eq!(new.slug, "home-appliances");
        assert_eq!(new.description, "");

        let blank = new_category(json!({"name": "Home Appliances", "slug": ""})).unwrap();
        assert_eq!(blank.slug, "home-appliances");
    }

    #[test]
    fn explicit_slug_wins() {
        let new = new_category(json!({"name": "Home Appliances", "slug": "appliances"})).unwrap();
        assert_eq!(new.slug, "appliances");
    }

    #[test]
    fn read_only_fields_are_ignored() {
        let new = new_category(json!({
            "name": "Books",
            "product_count": 99,
            "created_at": "2000-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(new.name, "Books");
    }

    #[test]
    fn missing_name_and_bad_slug_are_reported_together() {
        let errors = field_errors(new_category(json!({"slug": "bad slug"})).unwrap_err());
        assert!(errors.contains("name"));
        assert!(errors.contains("slug"));
    }

    #[test]
    fn name_length_is_bounded() {
        let long = "x".repeat(CATEGORY_NAME_MAX_LEN + 1);
        let errors = field_errors(new_category(json!({ "name": long })).unwrap_err());
        assert!(errors.messages("name")[0].contains("no more than 100 characters"));
    }

    #[test]
    fn rename_keeps_slug() {
        let current = stored("Books", "books");
        let changes =
            category_changes(json!({"name": "Printed Books"}), WriteMode::Partial, &current)
                .unwrap();
        assert_eq!(changes.name.as_deref(), Some("Printed Books"));
        assert_eq!(changes.slug, None);
    }

    #[test]
    fn blank_slug_on_update_is_rederived() {
        let current = stored("Books", "old");
        let changes = category_changes(json!({"slug": ""}), WriteMode::Partial, &current).unwrap();
        assert_eq!(changes.slug.as_deref(), Some("books"));
    }

    #[test]
    fn put_requires_name() {
        let current = stored("Books", "books");
        let errors = field_errors(
            category_changes(json!({"description": "x"}), WriteMode::Replace, &current)
                .unwrap_err(),
        );
        assert!(errors.contains("name"));
    }

    #[test]
    fn representation_matches_schema_fields() {
        let value = serde_json::to_value(CategoryRepresentation::from(stored("Books", "books")))
            .unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        let mut expected = CATEGORY_SCHEMA.field_names();
        expected.sort_unstable();
        let mut keys = keys;
        keys.sort_unstable();
        assert_eq!(keys, expected);
        assert!(value["created_at"].as_str().unwrap().contains('T'));
    }
}
