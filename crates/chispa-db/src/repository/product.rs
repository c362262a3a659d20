//! # Product Repository
//!
//! Catalog operations: CRUD, search and the atomic stock decrement.
//!
//! ## Stock decrement
//! ```text
//! UPDATE products
//! SET quantity = quantity - :amount
//! WHERE id = :id AND quantity >= :amount
//! ```
//! The guard makes the read-check-write a single atomic step at the row
//! level, so two concurrent sales of the last unit cannot both succeed and
//! the `quantity >= 0` invariant holds without application-level locking.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use chispa_core::validation::{validate_new_product, validate_product_fields};
use chispa_core::{Product, ProductFields};

/// Repository for product catalog operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// All products ordered by name. An empty catalog yields an empty list.
    pub async fn get_all(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, brand, cost_cents, sale_price_cents, quantity
            FROM products
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Looks up a product by its business code. Absence is `Ok(None)`,
    /// not an error.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, brand, cost_cents, sale_price_cents, quantity
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a new product after validating id format and field rules.
    /// A duplicate code surfaces as [`DbError::UniqueViolation`].
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        validate_new_product(product)?;

        debug!(id = %product.id, name = %product.name, "inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, name, brand, cost_cents, sale_price_cents, quantity)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(product.cost_cents)
        .bind(product.sale_price_cents)
        .bind(product.quantity)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("product id", &product.id),
            other => other,
        })?;

        Ok(())
    }

    /// Updates the mutable fields of a product. The id addresses the row
    /// and can never change.
    pub async fn update(&self, id: &str, fields: &ProductFields) -> DbResult<()> {
        validate_product_fields(fields)?;

        debug!(id = %id, "updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                brand = ?3,
                cost_cents = ?4,
                sale_price_cents = ?5,
                quantity = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.brand)
        .bind(fields.cost_cents)
        .bind(fields.sale_price_cents)
        .bind(fields.quantity)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("product", id));
        }

        Ok(())
    }

    /// Deletes a product. Historic invoices keep their own copy of the
    /// descriptive fields, so no referential check against the ledger is
    /// made.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("product", id));
        }

        Ok(())
    }

    /// Atomically reduces stock by `amount`.
    ///
    /// Fails with [`DbError::InsufficientStock`] when fewer than `amount`
    /// units are on hand and [`DbError::NotFound`] when the product does
    /// not exist. The conditional update is the atomicity boundary; the
    /// follow-up read only classifies the failure.
    pub async fn decrement_quantity(&self, id: &str, amount: i64) -> DbResult<()> {
        if amount <= 0 {
            return Err(chispa_core::ValidationError::MustBePositive {
                field: "amount".to_string(),
            }
            .into());
        }

        debug!(id = %id, amount = %amount, "decrementing stock");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET quantity = quantity - ?2
            WHERE id = ?1 AND quantity >= ?2
            "#,
        )
        .bind(id)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_by_id(id).await? {
                Some(product) => Err(DbError::InsufficientStock {
                    product_id: id.to_string(),
                    available: product.quantity,
                    requested: amount,
                }),
                None => Err(DbError::not_found("product", id)),
            };
        }

        Ok(())
    }

    /// Case-insensitive substring search over id and name, ordered by name.
    pub async fn search(&self, term: &str) -> DbResult<Vec<Product>> {
        let pattern = format!("%{}%", term.trim());

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, brand, cost_cents, sale_price_cents, quantity
            FROM products
            WHERE id LIKE ?1 OR name LIKE ?1
            ORDER BY name
            "#,
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        debug!(term = %term, count = products.len(), "product search");
        Ok(products)
    }

    /// Products at or below the given stock threshold, lowest first.
    pub async fn list_low_stock(&self, threshold: i64) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, brand, cost_cents, sale_price_cents, quantity
            FROM products
            WHERE quantity <= ?1
            ORDER BY quantity ASC, name
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chispa_core::ValidationError;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn led_panel() -> Product {
        Product {
            id: "1001".to_string(),
            name: "LED panel 18W".to_string(),
            brand: "Sica".to_string(),
            cost_cents: 40_000,
            sale_price_cents: 65_000,
            quantity: 5,
        }
    }

    #[tokio::test]
    async fn insert_and_get() {
        let db = test_db().await;
        let repo = db.products();

        repo.insert(&led_panel()).await.unwrap();

        let found = repo.get_by_id("1001").await.unwrap().unwrap();
        assert_eq!(found, led_panel());

        assert!(repo.get_by_id("9999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_duplicate_id_fails() {
        let db = test_db().await;
        let repo = db.products();

        repo.insert(&led_panel()).await.unwrap();
        let err = repo.insert(&led_panel()).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn insert_rejects_bad_input() {
        let db = test_db().await;
        let repo = db.products();

        let mut bad_id = led_panel();
        bad_id.id = "10".to_string();
        assert!(matches!(
            repo.insert(&bad_id).await.unwrap_err(),
            DbError::Invalid(ValidationError::InvalidFormat { .. })
        ));

        let mut bad_price = led_panel();
        bad_price.sale_price_cents = 0;
        assert!(matches!(
            repo.insert(&bad_price).await.unwrap_err(),
            DbError::Invalid(ValidationError::MustBePositive { .. })
        ));
    }

    #[tokio::test]
    async fn update_and_not_found() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert(&led_panel()).await.unwrap();

        let mut fields = ProductFields::from_product(&led_panel());
        fields.sale_price_cents = 70_000;
        repo.update("1001", &fields).await.unwrap();

        let found = repo.get_by_id("1001").await.unwrap().unwrap();
        assert_eq!(found.sale_price_cents, 70_000);

        let err = repo.update("9999", &fields).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_and_not_found() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert(&led_panel()).await.unwrap();

        repo.delete("1001").await.unwrap();
        assert!(repo.get_by_id("1001").await.unwrap().is_none());

        let err = repo.delete("1001").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn decrement_happy_path() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert(&led_panel()).await.unwrap();

        repo.decrement_quantity("1001", 3).await.unwrap();
        assert_eq!(repo.get_by_id("1001").await.unwrap().unwrap().quantity, 2);

        repo.decrement_quantity("1001", 2).await.unwrap();
        assert_eq!(repo.get_by_id("1001").await.unwrap().unwrap().quantity, 0);
    }

    #[tokio::test]
    async fn decrement_never_goes_negative() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert(&led_panel()).await.unwrap();

        let err = repo.decrement_quantity("1001", 6).await.unwrap_err();
        match err {
            DbError::InsufficientStock {
                product_id,
                available,
                requested,
            } => {
                assert_eq!(product_id, "1001");
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected error: {other}"),
        }

        // quantity untouched
        assert_eq!(repo.get_by_id("1001").await.unwrap().unwrap().quantity, 5);

        let err = repo.decrement_quantity("9999", 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let err = repo.decrement_quantity("1001", 0).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
    }

    #[tokio::test]
    async fn search_matches_id_and_name_case_insensitive() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert(&led_panel()).await.unwrap();

        let mut breaker = led_panel();
        breaker.id = "2002".to_string();
        breaker.name = "Thermal breaker 16A".to_string();
        repo.insert(&breaker).await.unwrap();

        let by_name = repo.search("led").await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, "1001");

        let by_id = repo.search("200").await.unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].id, "2002");

        assert!(repo.search("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_all_ordered_by_name() {
        let db = test_db().await;
        let repo = db.products();

        assert!(repo.get_all().await.unwrap().is_empty());

        let mut z = led_panel();
        z.id = "3003".to_string();
        z.name = "Zinc clamp".to_string();
        repo.insert(&z).await.unwrap();
        repo.insert(&led_panel()).await.unwrap();

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "LED panel 18W");
        assert_eq!(all[1].name, "Zinc clamp");
    }

    #[tokio::test]
    async fn low_stock_listing() {
        let db = test_db().await;
        let repo = db.products();

        repo.insert(&led_panel()).await.unwrap(); // quantity 5

        let mut scarce = led_panel();
        scarce.id = "2002".to_string();
        scarce.name = "Thermal breaker 16A".to_string();
        scarce.quantity = 1;
        repo.insert(&scarce).await.unwrap();

        let low = repo.list_low_stock(3).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].id, "2002");
    }
}
