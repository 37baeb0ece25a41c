use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// One stock count of an inventory item. The history is append-only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct InventoryCheck {
    pub id: Uuid,
    pub inventory_item_id: Uuid,
    pub previous_stock: f64,
    pub checked_stock: f64,
    pub checked_by: String,
    pub note: Option<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateInventoryCheck {
    pub checked_stock: f64,
    pub note: Option<String>,
}

impl InventoryCheck {
    pub async fn create(
        conn: &mut SqliteConnection,
        inventory_item_id: Uuid,
        previous_stock: f64,
        data: &CreateInventoryCheck,
        checked_by: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, InventoryCheck>(
            r#"INSERT INTO inventory_checks (id, inventory_item_id, previous_stock, checked_stock, checked_by, note, checked_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, inventory_item_id, previous_stock, checked_stock, checked_by, note, checked_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(inventory_item_id)
        .bind(previous_stock)
        .bind(data.checked_stock)
        .bind(checked_by)
        .bind(&data.note)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
    }

    /// Newest first.
    pub async fn find_by_item(
        pool: &SqlitePool,
        inventory_item_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, InventoryCheck>(
            r#"SELECT id, inventory_item_id, previous_stock, checked_stock, checked_by, note, checked_at
               FROM inventory_checks
               WHERE inventory_item_id = $1
               ORDER BY checked_at DESC, rowid DESC
               LIMIT $2"#,
        )
        .bind(inventory_item_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
