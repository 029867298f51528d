//! Postgres-backed stock store.
//!
//! Persists the stock tree and the movement ledger in four tables:
//!
//! - `stock_products(product_id, name, reference, unit_price_cents, quantity)`
//! - `stock_color_variants(color_variant_id, product_id, color, quantity)`
//! - `stock_size_variants(size_variant_id, color_variant_id, product_id, size, quantity)`
//! - `stock_movements(movement_id, node_kind, node_id, previous_quantity,
//!   new_quantity, quantity_delta, reason, note, actor, recorded_at)`
//!
//! `commit_mutation` runs one transaction: it locks the product row
//! (`FOR UPDATE`, serializing writers per product), writes the target
//! quantity, inserts the ledger row, and re-sums affected ancestors with
//! `UPDATE ... SET quantity = (SELECT COALESCE(SUM(...)))`. The sums read
//! sibling rows at write time, never a cached delta.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StockStoreError | Scenario |
//! |------------|----------------------|-----------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Concurrent insert detected |
//! | Database (check constraint violation) | `23514` | `Conflict` | Negative quantity reached storage (planner bug) |
//! | Database (other) | Any other | `Persistence` | Other database errors |
//! | PoolClosed / network | N/A | `Persistence` | Storage unavailable, caller may retry |

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::{instrument, Span};

use async_trait::async_trait;
use stocktide_core::{ColorVariantId, MovementId, ProductId, SizeVariantId};
use stocktide_stock::{
    ColorVariant, InventoryStats, NodeRef, ProductTree, ReasonCode, ReconcileScope,
    ReconciliationPlan, SizeVariant, StockMovement,
};

use super::r#trait::{CommittedMutation, StockStore, StockStoreError};
use crate::ledger::MovementLedger;
use crate::query::{Page, PageRequest, StockItemView, StockQuery};

/// Postgres-backed stock store, ledger, and query facade.
///
/// ## Thread Safety
///
/// Uses the SQLx connection pool, which is thread-safe (Arc + Send + Sync).
///
/// ## Isolation
///
/// Postgres defaults to read-committed; the per-product `FOR UPDATE` lock on
/// top of that serializes mutations within one product subtree, which is the
/// unit the cross-level invariants span.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: Arc<PgPool>,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self), fields(product_id = %product_id.as_uuid()), err)]
    async fn load_product_tree(
        &self,
        product_id: ProductId,
    ) -> Result<Option<ProductTree>, StockStoreError> {
        let span = Span::current();
        span.record("operation", "load_product_tree");

        let product = sqlx::query(
            r#"
            SELECT product_id, name, reference, unit_price_cents, quantity
            FROM stock_products
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_product", e))?;

        let Some(product) = product else {
            return Ok(None);
        };
        let product = ProductRow::from_row(&product)
            .map_err(|e| StockStoreError::Persistence(format!("bad product row: {e}")))?;

        let color_rows = sqlx::query(
            r#"
            SELECT color_variant_id, color, quantity
            FROM stock_color_variants
            WHERE product_id = $1
            ORDER BY color ASC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_color_variants", e))?;

        let size_rows = sqlx::query(
            r#"
            SELECT size_variant_id, color_variant_id, size, quantity
            FROM stock_size_variants
            WHERE product_id = $1
            ORDER BY size ASC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_size_variants", e))?;

        let mut colors = Vec::with_capacity(color_rows.len());
        for row in color_rows {
            let color = ColorRow::from_row(&row)
                .map_err(|e| StockStoreError::Persistence(format!("bad color row: {e}")))?;
            colors.push(ColorVariant {
                id: ColorVariantId::from_uuid(color.color_variant_id),
                color: color.color,
                quantity: color.quantity,
                sizes: Vec::new(),
            });
        }
        for row in size_rows {
            let size = SizeRow::from_row(&row)
                .map_err(|e| StockStoreError::Persistence(format!("bad size row: {e}")))?;
            let owner = colors
                .iter_mut()
                .find(|c| *c.id.as_uuid() == size.color_variant_id)
                .ok_or_else(|| {
                    StockStoreError::Persistence(format!(
                        "size variant {} references unknown color row",
                        size.size_variant_id
                    ))
                })?;
            owner.sizes.push(SizeVariant {
                id: SizeVariantId::from_uuid(size.size_variant_id),
                size: size.size,
                quantity: size.quantity,
            });
        }

        Ok(Some(ProductTree {
            id: ProductId::from_uuid(product.product_id),
            name: product.name,
            reference: product.reference,
            unit_price_cents: product.unit_price_cents,
            quantity: product.quantity,
            colors,
        }))
    }

    /// One transaction: lock product, write target, append ledger row,
    /// re-sum ancestors from committed sibling rows.
    #[instrument(
        skip(self, plan),
        fields(
            target = %plan.target,
            new_quantity = plan.new_quantity,
            reason = %plan.reason,
        ),
        err
    )]
    async fn commit(&self, plan: ReconciliationPlan) -> Result<CommittedMutation, StockStoreError> {
        let span = Span::current();
        span.record("operation", "commit_mutation");

        let product_id = plan.scope.product_id();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Serialize writers per product subtree.
        let product_before: i64 = sqlx::query(
            "SELECT quantity FROM stock_products WHERE product_id = $1 FOR UPDATE",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?
        .ok_or(StockStoreError::NotFound)?
        .try_get("quantity")
        .map_err(|e| StockStoreError::Persistence(format!("bad quantity column: {e}")))?;

        let previous = read_target_quantity(&mut tx, &plan.target).await?;
        if let Err(e) = plan.expected.check(previous) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StockStoreError::Conflict(e.to_string()));
        }

        write_target_quantity(&mut tx, &plan.target, plan.new_quantity).await?;

        let product_after = match plan.scope {
            ReconcileScope::Size { color_id, .. } => {
                // Derived writes, no ledger entries: color row re-summed over
                // all sizes sharing its color label, product over all sizes.
                sqlx::query(
                    r#"
                    UPDATE stock_color_variants c
                    SET quantity = (
                        SELECT COALESCE(SUM(s.quantity), 0)
                        FROM stock_size_variants s
                        JOIN stock_color_variants c2 ON s.color_variant_id = c2.color_variant_id
                        WHERE c2.product_id = c.product_id AND c2.color = c.color
                    )
                    WHERE c.color_variant_id = $1
                    "#,
                )
                .bind(color_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("resum_color", e))?;

                resum_product(&mut tx, product_id).await?
            }
            ReconcileScope::Color { .. } => resum_product(&mut tx, product_id).await?,
            ReconcileScope::ProductLeaf { .. } => plan.new_quantity,
        };

        let movement = StockMovement {
            id: MovementId::new(),
            node: plan.target,
            previous_quantity: previous,
            new_quantity: plan.new_quantity,
            quantity_delta: plan.new_quantity - previous,
            reason: plan.reason,
            note: plan.note,
            actor: plan.actor,
            recorded_at: Utc::now(),
        };

        let (node_kind, node_id) = node_columns(&movement.node);
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                movement_id,
                node_kind,
                node_id,
                previous_quantity,
                new_quantity,
                quantity_delta,
                reason,
                note,
                actor,
                recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(node_kind)
        .bind(node_id)
        .bind(movement.previous_quantity)
        .bind(movement.new_quantity)
        .bind(movement.quantity_delta)
        .bind(movement.reason.as_str())
        .bind(&movement.note)
        .bind(&movement.actor)
        .bind(movement.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        span.record("quantity_delta", movement.quantity_delta);
        Ok(CommittedMutation {
            movement,
            product_quantity: product_after,
            product_quantity_changed: product_after != product_before,
        })
    }
}

/// Read (and implicitly lock via the product row) the target's current quantity.
async fn read_target_quantity(
    tx: &mut Transaction<'_, Postgres>,
    target: &NodeRef,
) -> Result<i64, StockStoreError> {
    let (sql, id) = match target {
        NodeRef::Product(id) => (
            "SELECT quantity FROM stock_products WHERE product_id = $1",
            *id.as_uuid(),
        ),
        NodeRef::Color(id) => (
            "SELECT quantity FROM stock_color_variants WHERE color_variant_id = $1 FOR UPDATE",
            *id.as_uuid(),
        ),
        NodeRef::Size(id) => (
            "SELECT quantity FROM stock_size_variants WHERE size_variant_id = $1 FOR UPDATE",
            *id.as_uuid(),
        ),
    };

    sqlx::query(sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("read_target", e))?
        .ok_or(StockStoreError::NotFound)?
        .try_get("quantity")
        .map_err(|e| StockStoreError::Persistence(format!("bad quantity column: {e}")))
}

async fn write_target_quantity(
    tx: &mut Transaction<'_, Postgres>,
    target: &NodeRef,
    quantity: i64,
) -> Result<(), StockStoreError> {
    let (sql, id) = match target {
        NodeRef::Product(id) => (
            "UPDATE stock_products SET quantity = $1 WHERE product_id = $2",
            *id.as_uuid(),
        ),
        NodeRef::Color(id) => (
            "UPDATE stock_color_variants SET quantity = $1 WHERE color_variant_id = $2",
            *id.as_uuid(),
        ),
        NodeRef::Size(id) => (
            "UPDATE stock_size_variants SET quantity = $1 WHERE size_variant_id = $2",
            *id.as_uuid(),
        ),
    };

    let result = sqlx::query(sql)
        .bind(quantity)
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("write_target", e))?;

    if result.rows_affected() == 0 {
        return Err(StockStoreError::NotFound);
    }
    Ok(())
}

/// Re-sum the product row from its children and return the new quantity.
///
/// The size sum wins whenever size variants exist anywhere under the
/// product (the inner SUM is NULL only when there are no size rows),
/// matching the cross-level invariant; otherwise the color rows are summed.
async fn resum_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
) -> Result<i64, StockStoreError> {
    sqlx::query(
        r#"
        UPDATE stock_products p
        SET quantity = COALESCE(
            (SELECT SUM(s.quantity) FROM stock_size_variants s
             WHERE s.product_id = p.product_id),
            (SELECT COALESCE(SUM(c.quantity), 0) FROM stock_color_variants c
             WHERE c.product_id = p.product_id)
        )
        WHERE p.product_id = $1
        RETURNING quantity
        "#,
    )
        .bind(product_id.as_uuid())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("resum_product", e))?
        .try_get("quantity")
        .map_err(|e| StockStoreError::Persistence(format!("bad quantity column: {e}")))
}

fn node_columns(node: &NodeRef) -> (&'static str, uuid::Uuid) {
    match node {
        NodeRef::Product(id) => ("product", *id.as_uuid()),
        NodeRef::Color(id) => ("color_variant", *id.as_uuid()),
        NodeRef::Size(id) => ("size_variant", *id.as_uuid()),
    }
}

fn node_from_columns(kind: &str, id: uuid::Uuid) -> Result<NodeRef, StockStoreError> {
    match kind {
        "product" => Ok(NodeRef::Product(ProductId::from_uuid(id))),
        "color_variant" => Ok(NodeRef::Color(ColorVariantId::from_uuid(id))),
        "size_variant" => Ok(NodeRef::Size(SizeVariantId::from_uuid(id))),
        other => Err(StockStoreError::Persistence(format!(
            "unknown node_kind '{other}' in stock_movements"
        ))),
    }
}

/// Map SQLx errors to StockStoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StockStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                // Unique violation: concurrent insert.
                Some("23505") => StockStoreError::Conflict(msg),
                // Check constraint: a negative quantity reached storage.
                Some("23514") => StockStoreError::Conflict(msg),
                _ => StockStoreError::Persistence(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StockStoreError::Persistence(format!("connection pool closed in {operation}"))
        }
        _ => StockStoreError::Persistence(format!("sqlx error in {operation}: {err}")),
    }
}

/// Run a storage future to completion from a synchronous trait method.
///
/// Requires the multi-threaded tokio runtime: `block_in_place` parks the
/// current worker so `Handle::block_on` can drive the future without
/// deadlocking the executor (the same bridge axum handlers go through).
fn block_on_storage<F>(fut: F) -> Result<F::Output, StockStoreError>
where
    F: std::future::Future,
{
    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        StockStoreError::Persistence(
            "PostgresStockStore requires a tokio runtime; call from within a runtime context"
                .to_string(),
        )
    })?;
    Ok(tokio::task::block_in_place(|| handle.block_on(fut)))
}

// The StockStore trait is synchronous (the mutation path is blocking by
// design), but Postgres operations require async.
impl StockStore for PostgresStockStore {
    fn product_tree(&self, product_id: ProductId) -> Result<Option<ProductTree>, StockStoreError> {
        block_on_storage(self.load_product_tree(product_id))?
    }

    fn commit_mutation(&self, plan: ReconciliationPlan) -> Result<CommittedMutation, StockStoreError> {
        block_on_storage(self.commit(plan))?
    }
}

#[async_trait]
impl MovementLedger for PostgresStockStore {
    async fn list(
        &self,
        node: &NodeRef,
        limit: usize,
    ) -> Result<Vec<StockMovement>, StockStoreError> {
        let (node_kind, node_id) = node_columns(node);

        let rows = sqlx::query(
            r#"
            SELECT
                movement_id,
                node_kind,
                node_id,
                previous_quantity,
                new_quantity,
                quantity_delta,
                reason,
                note,
                actor,
                recorded_at
            FROM stock_movements
            WHERE node_kind = $1 AND node_id = $2
            ORDER BY recorded_at DESC, movement_id DESC
            LIMIT $3
            "#,
        )
        .bind(node_kind)
        .bind(node_id)
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        let mut movements = Vec::with_capacity(rows.len());
        for row in rows {
            let row = MovementRow::from_row(&row)
                .map_err(|e| StockStoreError::Persistence(format!("bad movement row: {e}")))?;
            movements.push(row.try_into()?);
        }
        Ok(movements)
    }
}

#[async_trait]
impl StockQuery for PostgresStockStore {
    async fn list(
        &self,
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<Page<StockItemView>, StockStoreError> {
        let term = search.unwrap_or_default();

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM stock_products
            WHERE name ILIKE '%' || $1 || '%' OR reference ILIKE '%' || $1 || '%'
            "#,
        )
        .bind(term)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_products", e))?;

        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StockStoreError::Persistence(format!("bad count column: {e}")))?;

        let rows = sqlx::query(
            r#"
            SELECT product_id
            FROM stock_products
            WHERE name ILIKE '%' || $1 || '%' OR reference ILIKE '%' || $1 || '%'
            ORDER BY name ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(term)
        .bind(i64::from(page.page_size()))
        .bind(page.offset() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let product_id: uuid::Uuid = row
                .try_get("product_id")
                .map_err(|e| StockStoreError::Persistence(format!("bad product_id column: {e}")))?;
            if let Some(tree) = self.load_product_tree(ProductId::from_uuid(product_id)).await? {
                items.push(StockItemView::from(&tree));
            }
        }

        Ok(Page {
            items,
            page: page.page(),
            page_size: page.page_size(),
            total_items: total as u64,
        })
    }

    async fn stats(&self, search: Option<&str>) -> Result<InventoryStats, StockStoreError> {
        let term = search.unwrap_or_default();

        // Whole filtered set, independent of listing pagination.
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(quantity * unit_price_cents), 0) AS total_value_cents,
                COUNT(*) FILTER (WHERE quantity > 0 AND quantity < 5) AS low_stock_count,
                COUNT(*) FILTER (WHERE quantity = 0) AS out_of_stock_count
            FROM stock_products
            WHERE name ILIKE '%' || $1 || '%' OR reference ILIKE '%' || $1 || '%'
            "#,
        )
        .bind(term)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stats", e))?;

        let total_value_cents: i64 = row
            .try_get("total_value_cents")
            .map_err(|e| StockStoreError::Persistence(format!("bad total_value_cents: {e}")))?;
        let low_stock_count: i64 = row
            .try_get("low_stock_count")
            .map_err(|e| StockStoreError::Persistence(format!("bad low_stock_count: {e}")))?;
        let out_of_stock_count: i64 = row
            .try_get("out_of_stock_count")
            .map_err(|e| StockStoreError::Persistence(format!("bad out_of_stock_count: {e}")))?;

        Ok(InventoryStats {
            total_value_cents,
            low_stock_count: low_stock_count as u64,
            out_of_stock_count: out_of_stock_count as u64,
        })
    }
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    product_id: uuid::Uuid,
    name: String,
    reference: String,
    unit_price_cents: i64,
    quantity: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            product_id: row.try_get("product_id")?,
            name: row.try_get("name")?,
            reference: row.try_get("reference")?,
            unit_price_cents: row.try_get("unit_price_cents")?,
            quantity: row.try_get("quantity")?,
        })
    }
}

#[derive(Debug)]
struct ColorRow {
    color_variant_id: uuid::Uuid,
    color: String,
    quantity: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ColorRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ColorRow {
            color_variant_id: row.try_get("color_variant_id")?,
            color: row.try_get("color")?,
            quantity: row.try_get("quantity")?,
        })
    }
}

#[derive(Debug)]
struct SizeRow {
    size_variant_id: uuid::Uuid,
    color_variant_id: uuid::Uuid,
    size: String,
    quantity: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for SizeRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(SizeRow {
            size_variant_id: row.try_get("size_variant_id")?,
            color_variant_id: row.try_get("color_variant_id")?,
            size: row.try_get("size")?,
            quantity: row.try_get("quantity")?,
        })
    }
}

#[derive(Debug)]
struct MovementRow {
    movement_id: uuid::Uuid,
    node_kind: String,
    node_id: uuid::Uuid,
    previous_quantity: i64,
    new_quantity: i64,
    quantity_delta: i64,
    reason: String,
    note: Option<String>,
    actor: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for MovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            movement_id: row.try_get("movement_id")?,
            node_kind: row.try_get("node_kind")?,
            node_id: row.try_get("node_id")?,
            previous_quantity: row.try_get("previous_quantity")?,
            new_quantity: row.try_get("new_quantity")?,
            quantity_delta: row.try_get("quantity_delta")?,
            reason: row.try_get("reason")?,
            note: row.try_get("note")?,
            actor: row.try_get("actor")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = StockStoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let reason: ReasonCode = row.reason.parse().map_err(|_| {
            StockStoreError::Persistence(format!(
                "unknown reason '{}' in stock_movements",
                row.reason
            ))
        })?;

        Ok(StockMovement {
            id: MovementId::from_uuid(row.movement_id),
            node: node_from_columns(&row.node_kind, row.node_id)?,
            previous_quantity: row.previous_quantity,
            new_quantity: row.new_quantity,
            quantity_delta: row.quantity_delta,
            reason,
            note: row.note,
            actor: row.actor,
            recorded_at: row.recorded_at,
        })
    }
}
