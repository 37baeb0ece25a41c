use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::ValidationError;

pub const DEFAULT_TAG_COLOR: &str = "#64748b";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTag {
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateTag {
    pub name: Option<String>,
    pub color: Option<String>,
}

/// Records that can carry tags. Each variant owns one link table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagTarget {
    Inventory,
    Manual,
    Precaution,
}

impl TagTarget {
    fn table(self) -> &'static str {
        match self {
            TagTarget::Inventory => "inventory_item_tags",
            TagTarget::Manual => "manual_tags",
            TagTarget::Precaution => "precaution_tags",
        }
    }

    fn owner_column(self) -> &'static str {
        match self {
            TagTarget::Inventory => "inventory_item_id",
            TagTarget::Manual => "manual_id",
            TagTarget::Precaution => "precaution_id",
        }
    }

    /// Appends `EXISTS (...)` restricting `owner` (the owning table's id
    /// expression) to records carrying `tag_id`.
    pub(crate) fn push_has_tag(self, builder: &mut QueryBuilder<'_, Sqlite>, owner: &str, tag_id: Uuid) {
        builder
            .push(format!(
                "EXISTS (SELECT 1 FROM {} l WHERE l.{} = {} AND l.tag_id = ",
                self.table(),
                self.owner_column(),
                owner
            ))
            .push_bind(tag_id)
            .push(")");
    }
}

#[derive(FromRow)]
struct TagLinkRow {
    owner_id: Uuid,
    #[sqlx(flatten)]
    tag: Tag,
}

fn is_hex_color(color: &str) -> bool {
    let hex = color.strip_prefix('#').unwrap_or("");
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

impl CreateTag {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("Tag name is required"));
        }
        if let Some(color) = self.color.as_deref().filter(|c| !is_hex_color(c)) {
            return Err(ValidationError::new(format!("Invalid tag color '{color}'")));
        }
        Ok(())
    }
}

impl UpdateTag {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ValidationError::new("Tag name cannot be empty"));
        }
        if let Some(color) = self.color.as_deref().filter(|c| !is_hex_color(c)) {
            return Err(ValidationError::new(format!("Invalid tag color '{color}'")));
        }
        Ok(())
    }
}

impl Tag {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            "SELECT id, name, color, created_at, updated_at FROM tags ORDER BY name COLLATE NOCASE ASC",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            "SELECT id, name, color, created_at, updated_at FROM tags WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateTag, id: Uuid) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Tag>(
            r#"INSERT INTO tags (id, name, name_key, color, created_at, updated_at)
               VALUES ($1, $2, $5, $3, $4, $4)
               RETURNING id, name, color, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(data.color.as_deref().unwrap_or(DEFAULT_TAG_COLOR))
        .bind(now)
        .bind(utils::text::name_key(&data.name))
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateTag,
    ) -> Result<Option<Self>, sqlx::Error> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let name = data
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.name)
            .to_string();
        let color = data.color.clone().unwrap_or(existing.color);
        sqlx::query_as::<_, Tag>(
            r#"UPDATE tags SET name = $2, name_key = $5, color = $3, updated_at = $4
               WHERE id = $1
               RETURNING id, name, color, created_at, updated_at"#,
        )
        .bind(id)
        .bind(&name)
        .bind(color)
        .bind(Utc::now())
        .bind(utils::text::name_key(&name))
        .fetch_optional(pool)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Tags attached to one record, ordered by name.
    pub async fn find_for<'e, E>(
        executor: E,
        target: TagTarget,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            r#"SELECT t.id, t.name, t.color, t.created_at, t.updated_at
               FROM tags t
               JOIN {table} l ON l.tag_id = t.id
               WHERE l.{owner} = $1
               ORDER BY t.name COLLATE NOCASE ASC"#,
            table = target.table(),
            owner = target.owner_column(),
        );
        sqlx::query_as::<_, Tag>(&sql)
            .bind(owner_id)
            .fetch_all(executor)
            .await
    }

    /// Every tag link of one target kind, grouped by owning record. Used by
    /// list endpoints to avoid a lookup per row.
    pub async fn links_for(
        pool: &SqlitePool,
        target: TagTarget,
    ) -> Result<HashMap<Uuid, Vec<Self>>, sqlx::Error> {
        let sql = format!(
            r#"SELECT l.{owner} AS owner_id, t.id, t.name, t.color, t.created_at, t.updated_at
               FROM {table} l
               JOIN tags t ON t.id = l.tag_id
               ORDER BY t.name COLLATE NOCASE ASC"#,
            table = target.table(),
            owner = target.owner_column(),
        );
        let rows = sqlx::query_as::<_, TagLinkRow>(&sql).fetch_all(pool).await?;

        let mut grouped: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in rows {
            grouped.entry(row.owner_id).or_default().push(row.tag);
        }
        Ok(grouped)
    }

    /// Replace the tag set of a record. Unknown tag ids fail with a foreign
    /// key violation.
    pub async fn set_links(
        conn: &mut SqliteConnection,
        target: TagTarget,
        owner_id: Uuid,
        tag_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        let delete = format!(
            "DELETE FROM {} WHERE {} = $1",
            target.table(),
            target.owner_column()
        );
        sqlx::query(&delete).bind(owner_id).execute(&mut *conn).await?;

        let insert = format!(
            "INSERT OR IGNORE INTO {} ({}, tag_id) VALUES ($1, $2)",
            target.table(),
            target.owner_column()
        );
        for tag_id in tag_ids {
            sqlx::query(&insert)
                .bind(owner_id)
                .bind(tag_id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }
}
