use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection};
use ts_rs::TS;
use uuid::Uuid;

/// Completion state of one checklist item within an instance.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct ChecklistItemProgress {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub checklist_item_id: Uuid,
    pub is_completed: bool,
    pub completed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Completion state of one connected item within an instance.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct ConnectedItemProgress {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub connected_item_id: Uuid,
    pub is_completed: bool,
    pub completed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewItemProgress {
    pub checklist_item_id: Uuid,
    pub is_completed: bool,
    pub completed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewConnectedProgress {
    pub connected_item_id: Uuid,
    pub is_completed: bool,
    pub completed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ChecklistItemProgress {
    pub async fn find_by_instance<'e, E>(
        executor: E,
        instance_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ChecklistItemProgress>(
            r#"SELECT id, instance_id, checklist_item_id, is_completed, completed_by, completed_at, notes
               FROM checklist_item_progress
               WHERE instance_id = $1"#,
        )
        .bind(instance_id)
        .fetch_all(executor)
        .await
    }
}

impl ConnectedItemProgress {
    pub async fn find_by_instance<'e, E>(
        executor: E,
        instance_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ConnectedItemProgress>(
            r#"SELECT id, instance_id, connected_item_id, is_completed, completed_by, completed_at
               FROM connected_item_progress
               WHERE instance_id = $1"#,
        )
        .bind(instance_id)
        .fetch_all(executor)
        .await
    }
}

/// Delete every progress row of the instance and insert `items` and
/// `connected` in their place. Callers run this inside a transaction.
pub async fn replace_for_instance(
    conn: &mut SqliteConnection,
    instance_id: Uuid,
    items: &[NewItemProgress],
    connected: &[NewConnectedProgress],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM connected_item_progress WHERE instance_id = $1")
        .bind(instance_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM checklist_item_progress WHERE instance_id = $1")
        .bind(instance_id)
        .execute(&mut *conn)
        .await?;

    for row in items {
        sqlx::query(
            r#"INSERT INTO checklist_item_progress (id, instance_id, checklist_item_id, is_completed, completed_by, completed_at, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(Uuid::new_v4())
        .bind(instance_id)
        .bind(row.checklist_item_id)
        .bind(row.is_completed)
        .bind(&row.completed_by)
        .bind(row.completed_at)
        .bind(&row.notes)
        .execute(&mut *conn)
        .await?;
    }

    for row in connected {
        sqlx::query(
            r#"INSERT INTO connected_item_progress (id, instance_id, connected_item_id, is_completed, completed_by, completed_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(Uuid::new_v4())
        .bind(instance_id)
        .bind(row.connected_item_id)
        .bind(row.is_completed)
        .bind(&row.completed_by)
        .bind(row.completed_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
