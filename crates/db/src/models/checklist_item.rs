use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::ValidationError;

const ITEM_COLUMNS: &str =
    "id, template_id, content, instructions, position, is_required, is_active, created_at, updated_at";

/// Resolves the display title of whatever a connected item points at. Targets
/// that no longer exist resolve to NULL.
const CONNECTED_SELECT: &str = r#"SELECT c.id, c.checklist_item_id, c.item_type, c.item_id, c.position,
       CASE c.item_type
           WHEN 'inventory' THEN (SELECT name FROM inventory_items WHERE id = c.item_id)
           WHEN 'manual' THEN (SELECT title FROM manuals WHERE id = c.item_id)
           WHEN 'precaution' THEN (SELECT title FROM precautions WHERE id = c.item_id)
       END AS target_title
FROM connected_items c"#;

/// Kind of record a checklist item links to.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "connected_item_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectedItemType {
    Inventory,
    Precaution,
    Manual,
}

impl ConnectedItemType {
    fn table(self) -> &'static str {
        match self {
            ConnectedItemType::Inventory => "inventory_items",
            ConnectedItemType::Precaution => "precautions",
            ConnectedItemType::Manual => "manuals",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct ChecklistItem {
    pub id: Uuid,
    pub template_id: Uuid,
    pub content: String,
    pub instructions: Option<String>,
    pub position: i64,
    pub is_required: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct ConnectedItem {
    pub id: Uuid,
    pub checklist_item_id: Uuid,
    pub item_type: ConnectedItemType,
    pub item_id: Uuid,
    pub position: i64,
    pub target_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ChecklistItemWithConnections {
    #[serde(flatten)]
    #[ts(flatten)]
    pub item: ChecklistItem,
    pub connected_items: Vec<ConnectedItem>,
}

impl std::ops::Deref for ChecklistItemWithConnections {
    type Target = ChecklistItem;
    fn deref(&self) -> &Self::Target {
        &self.item
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
pub struct ConnectedItemInput {
    pub item_type: ConnectedItemType,
    pub item_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateChecklistItem {
    pub content: String,
    pub instructions: Option<String>,
    pub is_required: Option<bool>,
    pub position: Option<i64>,
    pub connected_items: Option<Vec<ConnectedItemInput>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateChecklistItem {
    pub content: Option<String>,
    #[ts(optional = nullable, as = "Option<String>")]
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub instructions: Option<Option<String>>,
    pub is_required: Option<bool>,
    pub is_active: Option<bool>,
    pub position: Option<i64>,
    pub connected_items: Option<Vec<ConnectedItemInput>>,
}

fn check_connections(inputs: Option<&[ConnectedItemInput]>) -> Result<(), ValidationError> {
    let Some(inputs) = inputs else {
        return Ok(());
    };
    let mut seen = std::collections::HashSet::new();
    for input in inputs {
        if !seen.insert(input) {
            return Err(ValidationError::new(format!(
                "{} {} is connected more than once",
                input.item_type, input.item_id
            )));
        }
    }
    Ok(())
}

impl CreateChecklistItem {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::new("Item content is required"));
        }
        check_connections(self.connected_items.as_deref())
    }
}

impl UpdateChecklistItem {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ValidationError::new("Item content cannot be empty"));
        }
        check_connections(self.connected_items.as_deref())
    }
}

impl ChecklistItem {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ChecklistItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM checklist_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Items of a template in display order, inactive ones included.
    pub async fn find_by_template<'e, E>(
        executor: E,
        template_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ChecklistItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM checklist_items WHERE template_id = $1 ORDER BY position ASC, created_at ASC"
        ))
        .bind(template_id)
        .fetch_all(executor)
        .await
    }

    async fn next_position(conn: &mut SqliteConnection, template_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM checklist_items WHERE template_id = $1",
        )
        .bind(template_id)
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn create(
        conn: &mut SqliteConnection,
        template_id: Uuid,
        data: &CreateChecklistItem,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let position = match data.position {
            Some(position) => position,
            None => Self::next_position(conn, template_id).await?,
        };
        sqlx::query_as::<_, ChecklistItem>(&format!(
            r#"INSERT INTO checklist_items (id, template_id, content, instructions, position, is_required, is_active, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, 1, $7, $7)
               RETURNING {ITEM_COLUMNS}"#
        ))
        .bind(id)
        .bind(template_id)
        .bind(data.content.trim())
        .bind(&data.instructions)
        .bind(position)
        .bind(data.is_required.unwrap_or(true))
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn update(
        conn: &mut SqliteConnection,
        existing: &ChecklistItem,
        data: &UpdateChecklistItem,
    ) -> Result<Self, sqlx::Error> {
        let content = data
            .content
            .as_deref()
            .map(|c| c.trim().to_string())
            .unwrap_or_else(|| existing.content.clone());
        let instructions = data
            .instructions
            .clone()
            .unwrap_or_else(|| existing.instructions.clone());
        sqlx::query_as::<_, ChecklistItem>(&format!(
            r#"UPDATE checklist_items
               SET content = $2, instructions = $3, position = $4, is_required = $5, is_active = $6, updated_at = $7
               WHERE id = $1
               RETURNING {ITEM_COLUMNS}"#
        ))
        .bind(existing.id)
        .bind(content)
        .bind(instructions)
        .bind(data.position.unwrap_or(existing.position))
        .bind(data.is_required.unwrap_or(existing.is_required))
        .bind(data.is_active.unwrap_or(existing.is_active))
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
    }

    /// Rewrite positions so items appear in `ordered_ids` order.
    pub async fn reorder(
        conn: &mut SqliteConnection,
        template_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        for (position, id) in ordered_ids.iter().enumerate() {
            sqlx::query(
                "UPDATE checklist_items SET position = $3, updated_at = $4 WHERE id = $1 AND template_id = $2",
            )
            .bind(id)
            .bind(template_id)
            .bind(position as i64)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM checklist_items WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

impl ConnectedItem {
    pub async fn find_by_item<'e, E>(
        executor: E,
        checklist_item_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ConnectedItem>(&format!(
            "{CONNECTED_SELECT} WHERE c.checklist_item_id = $1 ORDER BY c.position ASC"
        ))
        .bind(checklist_item_id)
        .fetch_all(executor)
        .await
    }

    /// All connected items of a template, grouped by parent checklist item.
    pub async fn find_by_template<'e, E>(
        executor: E,
        template_id: Uuid,
    ) -> Result<HashMap<Uuid, Vec<Self>>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, ConnectedItem>(&format!(
            r#"{CONNECTED_SELECT}
               JOIN checklist_items i ON i.id = c.checklist_item_id
               WHERE i.template_id = $1
               ORDER BY c.position ASC"#
        ))
        .bind(template_id)
        .fetch_all(executor)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<ConnectedItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.checklist_item_id).or_default().push(row);
        }
        Ok(grouped)
    }

    pub async fn target_exists(
        conn: &mut SqliteConnection,
        input: &ConnectedItemInput,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
            input.item_type.table()
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(input.item_id)
            .fetch_one(&mut *conn)
            .await
    }

    /// Make the connections of `checklist_item_id` equal `inputs`, in order.
    /// Links that survive keep their id so their progress rows survive too.
    pub async fn replace_for_item(
        conn: &mut SqliteConnection,
        checklist_item_id: Uuid,
        inputs: &[ConnectedItemInput],
    ) -> Result<(), sqlx::Error> {
        let existing = Self::find_by_item(&mut *conn, checklist_item_id).await?;
        let mut by_target: HashMap<ConnectedItemInput, Uuid> = existing
            .iter()
            .map(|c| {
                (
                    ConnectedItemInput {
                        item_type: c.item_type,
                        item_id: c.item_id,
                    },
                    c.id,
                )
            })
            .collect();

        for (position, input) in inputs.iter().enumerate() {
            match by_target.remove(input) {
                Some(id) => {
                    sqlx::query("UPDATE connected_items SET position = $2 WHERE id = $1")
                        .bind(id)
                        .bind(position as i64)
                        .execute(&mut *conn)
                        .await?;
                }
                None => {
                    sqlx::query(
                        r#"INSERT INTO connected_items (id, checklist_item_id, item_type, item_id, position)
                           VALUES ($1, $2, $3, $4, $5)"#,
                    )
                    .bind(Uuid::new_v4())
                    .bind(checklist_item_id)
                    .bind(input.item_type)
                    .bind(input.item_id)
                    .bind(position as i64)
                    .execute(&mut *conn)
                    .await?;
                }
            }
        }

        for stale in by_target.into_values() {
            sqlx::query("DELETE FROM connected_items WHERE id = $1")
                .bind(stale)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Remove every link to a record that is being deleted.
    pub async fn delete_for_target<'e, E>(
        executor: E,
        item_type: ConnectedItemType,
        item_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM connected_items WHERE item_type = $1 AND item_id = $2")
            .bind(item_type)
            .bind(item_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

impl ChecklistItemWithConnections {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        let Some(item) = ChecklistItem::find_by_id(&mut *conn, id).await? else {
            return Ok(None);
        };
        let connected_items = ConnectedItem::find_by_item(&mut *conn, id).await?;
        Ok(Some(Self {
            item,
            connected_items,
        }))
    }

    pub async fn find_by_template(
        conn: &mut SqliteConnection,
        template_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let items = ChecklistItem::find_by_template(&mut *conn, template_id).await?;
        let mut connected = ConnectedItem::find_by_template(&mut *conn, template_id).await?;
        Ok(items
            .into_iter()
            .map(|item| {
                let connected_items = connected.remove(&item.id).unwrap_or_default();
                Self {
                    item,
                    connected_items,
                }
            })
            .collect())
    }
}
