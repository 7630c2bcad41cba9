//! Persistence seam. Handlers talk to `dyn CatalogStore` / `dyn UserStore`;
//! the Postgres store backs a deployed service and the memory store backs
//! local runs without `DATABASE_URL` and the test-suite.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Category, CategoryChanges, NewCategory, NewProduct, Product, ProductChanges, User,
};
use crate::query::{CategoryField, ListQuery, ProductField};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("{entity} with this {field} already exists")]
    Conflict {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{field} references missing record {value}")]
    MissingReference { field: &'static str, value: String },

    #[error("constraint violated on {field}")]
    Constraint { field: &'static str },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_categories(&self, query: &ListQuery<CategoryField>) -> StoreResult<Vec<Category>>;
    async fn find_category(&self, slug: &str) -> StoreResult<Option<Category>>;
    async fn create_category(&self, new: NewCategory) -> StoreResult<Category>;
    async fn update_category(&self, id: Uuid, changes: CategoryChanges) -> StoreResult<Category>;
    /// Removes the category and every product it owns in one atomic step.
    /// Returns the number of products removed with it.
    async fn delete_category(&self, id: Uuid) -> StoreResult<u64>;

    async fn list_products(&self, query: &ListQuery<ProductField>) -> StoreResult<Vec<Product>>;
    async fn find_product(&self, slug: &str) -> StoreResult<Option<Product>>;
    async fn create_product(&self, new: NewProduct) -> StoreResult<Product>;
    async fn update_product(&self, id: Uuid, changes: ProductChanges) -> StoreResult<Product>;
    async fn delete_product(&self, id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn create_user(&self, email: &str, password_hash: &str) -> StoreResult<User>;
}
