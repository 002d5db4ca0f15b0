use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::{InvoiceId, Money, UserId};

use crate::records::{Cart, CartLine, Invoice, InvoiceLine, Product, ProductId, ProductPatch, Version};
use crate::store::{CartStore, InvoiceStore, ProductStore, PutOptions};
use crate::{Result, StoreError};

/// PostgreSQL-backed store implementation.
///
/// Stock reservation is a single conditional `UPDATE`, so the
/// check-and-decrement is atomic at the database even across processes.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: row.try_get::<i64, _>("stock")? as u32,
            status: row.try_get("status")?,
        })
    }

    fn row_to_cart(row: PgRow) -> Result<Cart> {
        let lines: Vec<CartLine> = serde_json::from_value(row.try_get("lines")?)?;
        Ok(Cart {
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            lines,
            total: Money::from_cents(row.try_get("total_cents")?),
            version: Version::new(row.try_get("version")?),
        })
    }

    fn row_to_invoice(row: PgRow) -> Result<Invoice> {
        let lines: Vec<InvoiceLine> = serde_json::from_value(row.try_get("lines")?)?;
        Ok(Invoice {
            id: InvoiceId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            lines,
            total: Money::from_cents(row.try_get("total_cents")?),
            date: row.try_get("date")?,
        })
    }

    async fn cart_version(&self, user_id: UserId) -> Result<Version> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM carts WHERE user_id = $1")
                .bind(user_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(version.map(Version::new).unwrap_or(Version::initial()))
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn insert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock, status)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.stock as i64)
        .bind(product.status)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("products_pkey")
            {
                return StoreError::ProductExists(product.id.clone());
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, name, price_cents, stock, status FROM products WHERE id = $1",
        )
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn update_product(&self, product_id: &ProductId, patch: ProductPatch) -> Result<Product> {
        let row = sqlx::query(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                price_cents = COALESCE($3, price_cents),
                stock = COALESCE($4, stock),
                status = COALESCE($5, status)
            WHERE id = $1
            RETURNING id, name, price_cents, stock, status
            "#,
        )
        .bind(product_id.as_str())
        .bind(patch.name)
        .bind(patch.price.map(|p| p.cents()))
        .bind(patch.stock.map(|s| s as i64))
        .bind(patch.status)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(StoreError::ProductNotFound(product_id.clone())),
        }
    }

    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<Money> {
        // Single conditional decrement: only succeeds when the product is
        // active and holds enough stock.
        let row = sqlx::query(
            r#"
            UPDATE products SET stock = stock - $2
            WHERE id = $1 AND status AND stock >= $2
            RETURNING price_cents
            "#,
        )
        .bind(product_id.as_str())
        .bind(quantity as i64)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(Money::from_cents(row.try_get("price_cents")?));
        }

        // The decrement didn't apply; classify why. The read is only for
        // the error report, the failed update mutated nothing.
        let row = sqlx::query("SELECT status, stock FROM products WHERE id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            None => Err(StoreError::ProductNotFound(product_id.clone())),
            Some(row) => {
                let status: bool = row.try_get("status")?;
                if !status {
                    Err(StoreError::ProductUnavailable(product_id.clone()))
                } else {
                    Err(StoreError::InsufficientStock {
                        product_id: product_id.clone(),
                        requested: quantity,
                        available: row.try_get::<i64, _>("stock")? as u32,
                    })
                }
            }
        }
    }

    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let result = sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
            .bind(product_id.as_str())
            .bind(quantity as i64)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(product_id.clone()));
        }
        Ok(())
    }

    async fn price_of(&self, product_id: &ProductId) -> Result<Option<Money>> {
        let price: Option<i64> =
            sqlx::query_scalar("SELECT price_cents FROM products WHERE id = $1")
                .bind(product_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(price.map(Money::from_cents))
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        let row = sqlx::query(
            "SELECT user_id, lines, total_cents, version FROM carts WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_cart).transpose()
    }

    async fn put_cart(&self, cart: &Cart, options: PutOptions) -> Result<Version> {
        let lines = serde_json::to_value(&cart.lines)?;

        match options.expected_version {
            Some(expected) if expected == Version::initial() => {
                // New cart: the primary key enforces one cart per user.
                let new_version = Version::first();
                sqlx::query(
                    r#"
                    INSERT INTO carts (user_id, lines, total_cents, version)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(cart.user_id.as_uuid())
                .bind(&lines)
                .bind(cart.total.cents())
                .bind(new_version.as_i64())
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(ref db_err) = e
                        && db_err.constraint() == Some("carts_pkey")
                    {
                        return StoreError::VersionConflict {
                            user_id: cart.user_id,
                            expected,
                            actual: Version::first(),
                        };
                    }
                    StoreError::Database(e)
                })?;

                Ok(new_version)
            }
            Some(expected) => {
                // Conditional update: only applies when the stored version
                // still matches what the caller loaded.
                let new_version = expected.next();
                let result = sqlx::query(
                    r#"
                    UPDATE carts SET lines = $2, total_cents = $3, version = $4
                    WHERE user_id = $1 AND version = $5
                    "#,
                )
                .bind(cart.user_id.as_uuid())
                .bind(&lines)
                .bind(cart.total.cents())
                .bind(new_version.as_i64())
                .bind(expected.as_i64())
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    let actual = self.cart_version(cart.user_id).await?;
                    return Err(StoreError::VersionConflict {
                        user_id: cart.user_id,
                        expected,
                        actual,
                    });
                }

                Ok(new_version)
            }
            None => {
                let current = self.cart_version(cart.user_id).await?;
                let new_version = current.next();
                sqlx::query(
                    r#"
                    INSERT INTO carts (user_id, lines, total_cents, version)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (user_id) DO UPDATE SET
                        lines = EXCLUDED.lines,
                        total_cents = EXCLUDED.total_cents,
                        version = EXCLUDED.version
                    "#,
                )
                .bind(cart.user_id.as_uuid())
                .bind(&lines)
                .bind(cart.total.cents())
                .bind(new_version.as_i64())
                .execute(&self.pool)
                .await?;

                Ok(new_version)
            }
        }
    }

    async fn delete_cart(&self, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl InvoiceStore for PostgresStore {
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<()> {
        let lines = serde_json::to_value(&invoice.lines)?;

        sqlx::query(
            r#"
            INSERT INTO invoices (id, user_id, lines, total_cents, date)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.user_id.as_uuid())
        .bind(&lines)
        .bind(invoice.total.cents())
        .bind(invoice.date)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_invoice(&self, invoice_id: InvoiceId) -> Result<Option<Invoice>> {
        let row = sqlx::query(
            "SELECT id, user_id, lines, total_cents, date FROM invoices WHERE id = $1",
        )
        .bind(invoice_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_invoice).transpose()
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<()> {
        let lines = serde_json::to_value(&invoice.lines)?;

        let result = sqlx::query(
            r#"
            UPDATE invoices SET lines = $2, total_cents = $3, date = $4
            WHERE id = $1
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(&lines)
        .bind(invoice.total.cents())
        .bind(invoice.date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvoiceNotFound(invoice.id));
        }
        Ok(())
    }

    async fn invoices_for_user(&self, user_id: UserId) -> Result<Vec<Invoice>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, lines, total_cents, date
            FROM invoices
            WHERE user_id = $1
            ORDER BY date ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_invoice).collect()
    }
}
