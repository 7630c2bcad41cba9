use std::cmp::Ordering;

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CatalogStore, StoreError, StoreResult, UserStore};
use crate::models::{
    Category, CategoryChanges, NewCategory, NewProduct, Product, ProductChanges, User, MIN_PRICE,
};
use crate::query::{
    contains_ci, CategoryField, Direction, FilterField, ListQuery, OrderBy, ProductField,
};

#[derive(Debug, Clone)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    description: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct ProductRow {
    id: Uuid,
    name: String,
    slug: String,
    category_id: Uuid,
    description: String,
    price: Decimal,
    stock: i32,
    available: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Default)]
struct Tables {
    categories: Vec<CategoryRow>,
    products: Vec<ProductRow>,
    users: Vec<User>,
}

impl Tables {
    fn category(&self, row: &CategoryRow) -> Category {
        Category {
            id: row.id,
            name: row.name.clone(),
            slug: row.slug.clone(),
            description: row.description.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            product_count: self
                .products
                .iter()
                .filter(|p| p.category_id == row.id)
                .count() as i64,
        }
    }

    fn product(&self, row: &ProductRow) -> StoreResult<Product> {
        let category = self
            .categories
            .iter()
            .find(|c| c.id == row.category_id)
            .ok_or(StoreError::MissingReference {
                field: "category",
                value: row.category_id.to_string(),
            })?;
        Ok(Product {
            id: row.id,
            name: row.name.clone(),
            slug: row.slug.clone(),
            category_id: row.category_id,
            category_name: category.name.clone(),
            description: row.description.clone(),
            price: row.price,
            stock: row.stock,
            available: row.available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn check_category_unique(
        &self,
        name: &str,
        slug: &str,
        except: Option<Uuid>,
    ) -> StoreResult<()> {
        let others = self.categories.iter().filter(|c| Some(c.id) != except);
        for c in others {
            if c.name == name {
                return Err(StoreError::Conflict {
                    entity: "category",
                    field: "name",
                });
            }
            if c.slug == slug {
                return Err(StoreError::Conflict {
                    entity: "category",
                    field: "slug",
                });
            }
        }
        Ok(())
    }

    fn check_product_refs(
        &self,
        slug: &str,
        category_id: Uuid,
        except: Option<Uuid>,
    ) -> StoreResult<()> {
        if self
            .products
            .iter()
            .any(|p| Some(p.id) != except && p.slug == slug)
        {
            return Err(StoreError::Conflict {
                entity: "product",
                field: "slug",
            });
        }
        if !self.categories.iter().any(|c| c.id == category_id) {
            return Err(StoreError::MissingReference {
                field: "category",
                value: category_id.to_string(),
            });
        }
        Ok(())
    }
}

fn check_product_values(price: Decimal, stock: i32) -> StoreResult<()> {
    if price < MIN_PRICE {
        return Err(StoreError::Constraint { field: "price" });
    }
    if stock < 0 {
        return Err(StoreError::Constraint { field: "stock" });
    }
    Ok(())
}

fn directed(ordering: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    }
}

fn compare_categories(a: &Category, b: &Category, ordering: &[OrderBy<CategoryField>]) -> Ordering {
    ordering
        .iter()
        .map(|o| {
            let cmp = match o.field {
                CategoryField::Name => a.name.cmp(&b.name),
                CategoryField::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            directed(cmp, o.direction)
        })
        .fold(Ordering::Equal, Ordering::then)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

fn compare_products(a: &Product, b: &Product, ordering: &[OrderBy<ProductField>]) -> Ordering {
    ordering
        .iter()
        .map(|o| {
            let cmp = match o.field {
                ProductField::Name => a.name.cmp(&b.name),
                ProductField::Price => a.price.cmp(&b.price),
                ProductField::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            directed(cmp, o.direction)
        })
        .fold(Ordering::Equal, Ordering::then)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Process-local store. Every write runs under one write lock, which makes
/// constraint checks and the cascade atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_categories(
        &self,
        query: &ListQuery<CategoryField>,
    ) -> StoreResult<Vec<Category>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Category> = tables
            .categories
            .iter()
            .filter(|c| {
                query
                    .search
                    .iter()
                    .all(|t| contains_ci(&c.name, t) || contains_ci(&c.description, t))
            })
            .map(|c| tables.category(c))
            .collect();
        rows.sort_by(|a, b| compare_categories(a, b, &query.ordering));
        Ok(rows)
    }

    async fn find_category(&self, slug: &str) -> StoreResult<Option<Category>> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .iter()
            .find(|c| c.slug == slug)
            .map(|c| tables.category(c)))
    }

    async fn create_category(&self, new: NewCategory) -> StoreResult<Category> {
        let mut tables = self.tables.write().await;
        tables.check_category_unique(&new.name, &new.slug, None)?;
        let now = OffsetDateTime::now_utc();
        let row = CategoryRow {
            id: Uuid::new_v4(),
            name: new.name,
            slug: new.slug,
            description: new.description,
            created_at: now,
            updated_at: now,
        };
        let category = tables.category(&row);
        tables.categories.push(row);
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, changes: CategoryChanges) -> StoreResult<Category> {
        let mut tables = self.tables.write().await;
        let mut row = tables
            .categories
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)?;

        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(slug) = changes.slug {
            row.slug = slug;
        }
        if let Some(description) = changes.description {
            row.description = description;
        }
        row.updated_at = OffsetDateTime::now_utc();
        tables.check_category_unique(&row.name, &row.slug, Some(id))?;

        let category = tables.category(&row);
        if let Some(slot) = tables.categories.iter_mut().find(|c| c.id == id) {
            *slot = row;
        }
        Ok(category)
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.categories.len();
        tables.categories.retain(|c| c.id != id);
        if tables.categories.len() == before {
            return Err(StoreError::NotFound);
        }
        let products_before = tables.products.len();
        tables.products.retain(|p| p.category_id != id);
        Ok((products_before - tables.products.len()) as u64)
    }

    async fn list_products(&self, query: &ListQuery<ProductField>) -> StoreResult<Vec<Product>> {
        let tables = self.tables.read().await;
        let category_slug = query.filter(FilterField::CategorySlug);
        let mut rows = Vec::new();
        for row in &tables.products {
            let product = tables.product(row)?;
            if let Some(slug) = category_slug {
                let owned = tables
                    .categories
                    .iter()
                    .any(|c| c.id == row.category_id && c.slug == slug);
                if !owned {
                    continue;
                }
            }
            let matches = query.search.iter().all(|t| {
                contains_ci(&product.name, t)
                    || contains_ci(&product.description, t)
                    || contains_ci(&product.category_name, t)
            });
            if matches {
                rows.push(product);
            }
        }
        rows.sort_by(|a, b| compare_products(a, b, &query.ordering));
        Ok(rows)
    }

    async fn find_product(&self, slug: &str) -> StoreResult<Option<Product>> {
        let tables = self.tables.read().await;
        tables
            .products
            .iter()
            .find(|p| p.slug == slug)
            .map(|p| tables.product(p))
            .transpose()
    }

    async fn create_product(&self, new: NewProduct) -> StoreResult<Product> {
        let mut tables = self.tables.write().await;
        tables.check_product_refs(&new.slug, new.category_id, None)?;
        check_product_values(new.price, new.stock)?;
        let now = OffsetDateTime::now_utc();
        let row = ProductRow {
            id: Uuid::new_v4(),
            name: new.name,
            slug: new.slug,
            category_id: new.category_id,
            description: new.description,
            price: new.price,
            stock: new.stock,
            available: new.available,
            created_at: now,
            updated_at: now,
        };
        let product = tables.product(&row)?;
        tables.products.push(row);
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, changes: ProductChanges) -> StoreResult<Product> {
        let mut tables = self.tables.write().await;
        let mut row = tables
            .products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)?;

        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(slug) = changes.slug {
            row.slug = slug;
        }
        if let Some(category_id) = changes.category_id {
            row.category_id = category_id;
        }
        if let Some(description) = changes.description {
            row.description = description;
        }
        if let Some(price) = changes.price {
            row.price = price;
        }
        if let Some(stock) = changes.stock {
            row.stock = stock;
        }
        if let Some(available) = changes.available {
            row.available = available;
        }
        row.updated_at = OffsetDateTime::now_utc();
        tables.check_product_refs(&row.slug, row.category_id, Some(id))?;
        check_product_values(row.price, row.stock)?;

        let product = tables.product(&row)?;
        if let Some(slot) = tables.products.iter_mut().find(|p| p.id == id) {
            *slot = row;
        }
        Ok(product)
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.products.len();
        tables.products.retain(|p| p.id != id);
        if tables.products.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == email) {
            return Err(StoreError::Conflict {
                entity: "user",
                field: "email",
            });
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }
}
