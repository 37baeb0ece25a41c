use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "favorite_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FavoriteKind {
    Inventory,
    Manual,
    Precaution,
    Template,
}

impl FavoriteKind {
    fn table(self) -> &'static str {
        match self {
            FavoriteKind::Inventory => "inventory_items",
            FavoriteKind::Manual => "manuals",
            FavoriteKind::Precaution => "precautions",
            FavoriteKind::Template => "checklist_templates",
        }
    }
}

/// A record pinned by one staff member for quick access.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct Favorite {
    pub id: Uuid,
    pub actor_name: String,
    pub kind: FavoriteKind,
    pub target_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateFavorite {
    pub kind: FavoriteKind,
    pub target_id: Uuid,
}

impl Favorite {
    pub async fn find_for_actor(
        pool: &SqlitePool,
        actor_name: &str,
        kind: Option<FavoriteKind>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Favorite>(
            r#"SELECT id, actor_name, kind, target_id, created_at
               FROM favorites
               WHERE actor_name = $1 AND ($2 IS NULL OR kind = $2)
               ORDER BY created_at DESC"#,
        )
        .bind(actor_name)
        .bind(kind)
        .fetch_all(pool)
        .await
    }

    /// Idempotent: favoriting the same record twice returns the original row.
    pub async fn create(
        pool: &SqlitePool,
        actor_name: &str,
        data: &CreateFavorite,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO favorites (id, actor_name, kind, target_id, created_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT(actor_name, kind, target_id) DO NOTHING"#,
        )
        .bind(Uuid::new_v4())
        .bind(actor_name)
        .bind(data.kind)
        .bind(data.target_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        sqlx::query_as::<_, Favorite>(
            r#"SELECT id, actor_name, kind, target_id, created_at
               FROM favorites
               WHERE actor_name = $1 AND kind = $2 AND target_id = $3"#,
        )
        .bind(actor_name)
        .bind(data.kind)
        .bind(data.target_id)
        .fetch_one(pool)
        .await
    }

    pub async fn target_exists(pool: &SqlitePool, data: &CreateFavorite) -> Result<bool, sqlx::Error> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
            data.kind.table()
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(data.target_id)
            .fetch_one(pool)
            .await
    }

    /// Only the owner can remove a favorite.
    pub async fn delete(pool: &SqlitePool, id: Uuid, actor_name: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM favorites WHERE id = $1 AND actor_name = $2")
            .bind(id)
            .bind(actor_name)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_target<'e, E>(
        executor: E,
        kind: FavoriteKind,
        target_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM favorites WHERE kind = $1 AND target_id = $2")
            .bind(kind)
            .bind(target_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[tokio::test]
    async fn favorites_are_per_actor_and_idempotent() {
        let db = DBService::new_in_memory().await.unwrap();
        let data = CreateFavorite {
            kind: FavoriteKind::Manual,
            target_id: Uuid::new_v4(),
        };
        let first = Favorite::create(&db.pool, "aiko", &data).await.unwrap();
        let again = Favorite::create(&db.pool, "aiko", &data).await.unwrap();
        assert_eq!(first.id, again.id);

        Favorite::create(&db.pool, "ben", &data).await.unwrap();
        let mine = Favorite::find_for_actor(&db.pool, "aiko", None).await.unwrap();
        assert_eq!(mine.len(), 1);

        let none = Favorite::find_for_actor(&db.pool, "aiko", Some(FavoriteKind::Inventory))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn only_owner_can_delete() {
        let db = DBService::new_in_memory().await.unwrap();
        let favorite = Favorite::create(
            &db.pool,
            "aiko",
            &CreateFavorite {
                kind: FavoriteKind::Template,
                target_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap();

        assert_eq!(Favorite::delete(&db.pool, favorite.id, "ben").await.unwrap(), 0);
        assert_eq!(Favorite::delete(&db.pool, favorite.id, "aiko").await.unwrap(), 1);
        assert!(Favorite::find_for_actor(&db.pool, "aiko", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn target_must_exist_in_its_table() {
        let db = DBService::new_in_memory().await.unwrap();
        let template_id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO checklist_templates (id, name, workplace, time_slot, is_active, created_at, updated_at)
               VALUES ($1, 'Opening', 'hall', 'morning', 1, $2, $2)"#,
        )
        .bind(template_id)
        .bind(Utc::now())
        .execute(&db.pool)
        .await
        .unwrap();

        let template = CreateFavorite {
            kind: FavoriteKind::Template,
            target_id: template_id,
        };
        assert!(Favorite::target_exists(&db.pool, &template).await.unwrap());
        let wrong_kind = CreateFavorite {
            kind: FavoriteKind::Manual,
            target_id: template_id,
        };
        assert!(!Favorite::target_exists(&db.pool, &wrong_kind).await.unwrap());
    }
}
