use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use sqlx::migrate::Migrator;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CatalogStore, StoreError, StoreResult, UserStore};
use crate::models::{
    Category, CategoryChanges, NewCategory, NewProduct, Product, ProductChanges, User,
};
use crate::query::{
    like_pattern, CategoryField, Direction, FilterField, ListQuery, OrderBy, ProductField,
};

const CATEGORY_SELECT: &str = r#"
    SELECT c.id, c.name, c.slug, c.description, c.created_at, c.updated_at,
           COUNT(p.id) AS product_count
      FROM categories c
      LEFT JOIN products p ON p.category_id = c.id
"#;

const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.name, p.slug, p.category_id, c.name AS category_name, p.description,
           p.price, p.stock, p.available, p.created_at, p.updated_at
      FROM products p
      JOIN categories c ON c.id = p.category_id
"#;

/// Applied by [`PgStore::connect`]; a failed migration aborts startup.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;

        MIGRATOR.run(&pool).await.context("run migrations")?;
        info!(migrations = MIGRATOR.iter().count(), "schema up to date");

        Ok(Self { pool })
    }
}

/// Maps constraint violations onto the field they guard.
fn classify(err: sqlx::Error, category_id: Option<Uuid>) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        let code = db.code();
        match (code.as_deref(), db.constraint()) {
            (Some("23505"), Some("categories_name_key")) => {
                return StoreError::Conflict {
                    entity: "category",
                    field: "name",
                }
            }
            (Some("23505"), Some("categories_slug_key")) => {
                return StoreError::Conflict {
                    entity: "category",
                    field: "slug",
                }
            }
            (Some("23505"), Some("products_slug_key")) => {
                return StoreError::Conflict {
                    entity: "product",
                    field: "slug",
                }
            }
            (Some("23505"), Some("users_email_key")) => {
                return StoreError::Conflict {
                    entity: "user",
                    field: "email",
                }
            }
            (Some("23503"), Some("products_category_id_fkey")) => {
                return StoreError::MissingReference {
                    field: "category",
                    value: category_id.map(|id| id.to_string()).unwrap_or_default(),
                }
            }
            (Some("23514"), Some("products_price_check")) => {
                return StoreError::Constraint { field: "price" }
            }
            (Some("23514"), Some("products_stock_check")) => {
                return StoreError::Constraint { field: "stock" }
            }
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn direction_sql(direction: Direction) -> &'static str {
    match direction {
        Direction::Asc => "ASC",
        Direction::Desc => "DESC",
    }
}

fn category_column(field: CategoryField) -> &'static str {
    match field {
        CategoryField::Name => "c.name",
        CategoryField::CreatedAt => "c.created_at",
    }
}

fn product_column(field: ProductField) -> &'static str {
    match field {
        ProductField::Name => "p.name",
        ProductField::Price => "p.price",
        ProductField::CreatedAt => "p.created_at",
    }
}

/// `ORDER BY` from whitelisted columns, with name and id as tie-breakers.
fn push_order_by<F: Copy>(
    qb: &mut QueryBuilder<'_, Postgres>,
    ordering: &[OrderBy<F>],
    column: fn(F) -> &'static str,
    name_column: &str,
    id_column: &str,
) {
    qb.push(" ORDER BY ");
    for order in ordering {
        qb.push(column(order.field))
            .push(" ")
            .push(direction_sql(order.direction))
            .push(", ");
    }
    qb.push(name_column)
        .push(" ASC, ")
        .push(id_column)
        .push(" ASC");
}

/// One `AND (col ILIKE $n OR ...)` group per search term.
fn push_search(qb: &mut QueryBuilder<'_, Postgres>, terms: &[String], columns: &[&str]) {
    for term in terms {
        let pattern = like_pattern(term);
        qb.push(" AND (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(*column).push(" ILIKE ").push_bind(pattern.clone());
        }
        qb.push(")");
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_categories(
        &self,
        query: &ListQuery<CategoryField>,
    ) -> StoreResult<Vec<Category>> {
        let mut qb = QueryBuilder::<Postgres>::new(CATEGORY_SELECT);
        qb.push(" WHERE TRUE");
        push_search(&mut qb, &query.search, &["c.name", "c.description"]);
        qb.push(" GROUP BY c.id");
        push_order_by(&mut qb, &query.ordering, category_column, "c.name", "c.id");

        debug!(sql = qb.sql(), "list categories");
        let rows = qb
            .build_query_as::<Category>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify(e, None))?;
        Ok(rows)
    }

    async fn find_category(&self, slug: &str) -> StoreResult<Option<Category>> {
        let sql = format!("{CATEGORY_SELECT} WHERE c.slug = $1 GROUP BY c.id");
        let row = sqlx::query_as::<_, Category>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, None))?;
        Ok(row)
    }

    async fn create_category(&self, new: NewCategory) -> StoreResult<Category> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, slug, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, description, created_at, updated_at,
                      0::BIGINT AS product_count
            "#,
        )
        .bind(new.name)
        .bind(new.slug)
        .bind(new.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, None))?;
        Ok(row)
    }

    async fn update_category(&self, id: Uuid, changes: CategoryChanges) -> StoreResult<Category> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
               SET name = COALESCE($2, name),
                   slug = COALESCE($3, slug),
                   description = COALESCE($4, description),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, slug, description, created_at, updated_at,
                      (SELECT COUNT(*) FROM products p WHERE p.category_id = categories.id)
                          AS product_count
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.slug)
        .bind(changes.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, None))?;
        row.ok_or(StoreError::NotFound)
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        let products = sqlx::query("DELETE FROM products WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        Ok(products)
    }

    async fn list_products(&self, query: &ListQuery<ProductField>) -> StoreResult<Vec<Product>> {
        let mut qb = QueryBuilder::<Postgres>::new(PRODUCT_SELECT);
        qb.push(" WHERE TRUE");
        if let Some(slug) = query.filter(FilterField::CategorySlug) {
            qb.push(" AND c.slug = ").push_bind(slug.to_string());
        }
        push_search(
            &mut qb,
            &query.search,
            &["p.name", "p.description", "c.name"],
        );
        push_order_by(&mut qb, &query.ordering, product_column, "p.name", "p.id");

        debug!(sql = qb.sql(), "list products");
        let rows = qb
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify(e, None))?;
        Ok(rows)
    }

    async fn find_product(&self, slug: &str) -> StoreResult<Option<Product>> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.slug = $1");
        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, None))?;
        Ok(row)
    }

    async fn create_product(&self, new: NewProduct) -> StoreResult<Product> {
        let category_id = new.category_id;
        let row = sqlx::query_as::<_, Product>(
            r#"
            WITH inserted AS (
                INSERT INTO products (name, slug, category_id, description, price, stock, available)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            )
            SELECT i.id, i.name, i.slug, i.category_id, c.name AS category_name, i.description,
                   i.price, i.stock, i.available, i.created_at, i.updated_at
              FROM inserted i
              JOIN categories c ON c.id = i.category_id
            "#,
        )
        .bind(new.name)
        .bind(new.slug)
        .bind(new.category_id)
        .bind(new.description)
        .bind(new.price)
        .bind(new.stock)
        .bind(new.available)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, Some(category_id)))?;
        Ok(row)
    }

    async fn update_product(&self, id: Uuid, changes: ProductChanges) -> StoreResult<Product> {
        let category_id = changes.category_id;
        let row = sqlx::query_as::<_, Product>(
            r#"
            WITH updated AS (
                UPDATE products
                   SET name = COALESCE($2, name),
                       slug = COALESCE($3, slug),
                       category_id = COALESCE($4, category_id),
                       description = COALESCE($5, description),
                       price = COALESCE($6, price),
                       stock = COALESCE($7, stock),
                       available = COALESCE($8, available),
                       updated_at = now()
                 WHERE id = $1
                RETURNING *
            )
            SELECT u.id, u.name, u.slug, u.category_id, c.name AS category_name, u.description,
                   u.price, u.stock, u.available, u.created_at, u.updated_at
              FROM updated u
              JOIN categories c ON c.id = u.category_id
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.slug)
        .bind(changes.category_id)
        .bind(changes.description)
        .bind(changes.price)
        .bind(changes.stock)
        .bind(changes.available)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, category_id))?;
        row.ok_or(StoreError::NotFound)
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<()> {
        let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, None))?;
        Ok(user)
    }
}
