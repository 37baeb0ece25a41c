use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    ValidationError,
    checklist_item::{ConnectedItem, ConnectedItemType},
    favorite::{Favorite, FavoriteKind},
    precaution::Precaution,
    shift::{ContentFilter, TimeSlot, Workplace, push_scope_filters, push_text_search},
    tag::{Tag, TagTarget},
};

const COLUMNS: &str =
    "id, title, content, workplace, time_slot, category, media_url, is_active, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct Manual {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub workplace: Workplace,
    pub time_slot: TimeSlot,
    pub category: Option<String>,
    pub media_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A manual with its tags and the precautions staff should read alongside it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ManualDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub manual: Manual,
    pub tags: Vec<Tag>,
    pub precautions: Vec<Precaution>,
}

impl std::ops::Deref for ManualDetail {
    type Target = Manual;
    fn deref(&self) -> &Self::Target {
        &self.manual
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateManual {
    pub title: String,
    pub content: String,
    pub workplace: Option<Workplace>,
    pub time_slot: Option<TimeSlot>,
    pub category: Option<String>,
    pub media_url: Option<String>,
    pub tag_ids: Option<Vec<Uuid>>,
    pub precaution_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateManual {
    pub title: Option<String>,
    pub content: Option<String>,
    pub workplace: Option<Workplace>,
    pub time_slot: Option<TimeSlot>,
    #[ts(optional = nullable, as = "Option<String>")]
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub category: Option<Option<String>>,
    #[ts(optional = nullable, as = "Option<String>")]
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub media_url: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub tag_ids: Option<Vec<Uuid>>,
    pub precaution_ids: Option<Vec<Uuid>>,
}

impl CreateManual {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("Title is required"));
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::new("Content is required"));
        }
        Ok(())
    }
}

impl UpdateManual {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ValidationError::new("Title cannot be empty"));
        }
        if self.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ValidationError::new("Content cannot be empty"));
        }
        Ok(())
    }
}

impl Manual {
    pub async fn find_filtered(
        pool: &SqlitePool,
        filter: &ContentFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM manuals m WHERE 1 = 1"));
        push_scope_filters(
            &mut query,
            "m",
            filter.workplace,
            filter.time_slot,
            filter.category.as_deref(),
            filter.include_inactive.unwrap_or(false),
        );
        push_text_search(&mut query, "m", filter.search.as_deref());
        if let Some(tag_id) = filter.tag_id {
            query.push(" AND ");
            TagTarget::Manual.push_has_tag(&mut query, "m.id", tag_id);
        }
        query.push(" ORDER BY m.title COLLATE NOCASE ASC");
        query.build_query_as::<Manual>().fetch_all(pool).await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Manual>(&format!("SELECT {COLUMNS} FROM manuals WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn create(
        conn: &mut SqliteConnection,
        data: &CreateManual,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Manual>(&format!(
            r#"INSERT INTO manuals (id, title, content, workplace, time_slot, category, media_url, is_active, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $8)
               RETURNING {COLUMNS}"#
        ))
        .bind(id)
        .bind(data.title.trim())
        .bind(&data.content)
        .bind(data.workplace.unwrap_or_default())
        .bind(data.time_slot.unwrap_or_default())
        .bind(&data.category)
        .bind(&data.media_url)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn update(
        conn: &mut SqliteConnection,
        existing: &Manual,
        data: &UpdateManual,
    ) -> Result<Self, sqlx::Error> {
        let title = data
            .title
            .as_deref()
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| existing.title.clone());
        let content = data.content.clone().unwrap_or_else(|| existing.content.clone());
        let category = data.category.clone().unwrap_or_else(|| existing.category.clone());
        let media_url = data.media_url.clone().unwrap_or_else(|| existing.media_url.clone());
        sqlx::query_as::<_, Manual>(&format!(
            r#"UPDATE manuals
               SET title = $2, content = $3, workplace = $4, time_slot = $5, category = $6,
                   media_url = $7, is_active = $8, updated_at = $9
               WHERE id = $1
               RETURNING {COLUMNS}"#
        ))
        .bind(existing.id)
        .bind(title)
        .bind(content)
        .bind(data.workplace.unwrap_or(existing.workplace))
        .bind(data.time_slot.unwrap_or(existing.time_slot))
        .bind(category)
        .bind(media_url)
        .bind(data.is_active.unwrap_or(existing.is_active))
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn set_precautions(
        conn: &mut SqliteConnection,
        manual_id: Uuid,
        precaution_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM manual_precautions WHERE manual_id = $1")
            .bind(manual_id)
            .execute(&mut *conn)
            .await?;
        for precaution_id in precaution_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO manual_precautions (manual_id, precaution_id) VALUES ($1, $2)",
            )
            .bind(manual_id)
            .bind(precaution_id)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let mut tx = crate::begin_write(pool).await?;
        ConnectedItem::delete_for_target(&mut *tx, ConnectedItemType::Manual, id).await?;
        Favorite::delete_for_target(&mut *tx, FavoriteKind::Manual, id).await?;
        let result = sqlx::query("DELETE FROM manuals WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

impl ManualDetail {
    async fn assemble(conn: &mut SqliteConnection, manual: Manual) -> Result<Self, sqlx::Error> {
        let tags = Tag::find_for(&mut *conn, TagTarget::Manual, manual.id).await?;
        let precautions = Precaution::find_for_manual(&mut *conn, manual.id).await?;
        Ok(Self {
            manual,
            tags,
            precautions,
        })
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        match Manual::find_by_id(&mut *conn, id).await? {
            Some(manual) => Ok(Some(Self::assemble(&mut conn, manual).await?)),
            None => Ok(None),
        }
    }

    /// List view: tags are attached, linked precautions are left empty.
    pub async fn load_many(pool: &SqlitePool, manuals: Vec<Manual>) -> Result<Vec<Self>, sqlx::Error> {
        let mut links = Tag::links_for(pool, TagTarget::Manual).await?;
        Ok(manuals
            .into_iter()
            .map(|manual| {
                let tags = links.remove(&manual.id).unwrap_or_default();
                Self {
                    manual,
                    tags,
                    precautions: Vec::new(),
                }
            })
            .collect())
    }

    pub async fn create(pool: &SqlitePool, data: &CreateManual) -> Result<Self, sqlx::Error> {
        let mut tx = crate::begin_write(pool).await?;
        let manual = Manual::create(&mut tx, data, Uuid::new_v4()).await?;
        Tag::set_links(
            &mut tx,
            TagTarget::Manual,
            manual.id,
            data.tag_ids.as_deref().unwrap_or_default(),
        )
        .await?;
        Manual::set_precautions(&mut tx, manual.id, data.precaution_ids.as_deref().unwrap_or_default())
            .await?;
        let detail = Self::assemble(&mut tx, manual).await?;
        tx.commit().await?;
        Ok(detail)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateManual,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = crate::begin_write(pool).await?;
        let Some(existing) = Manual::find_by_id(&mut *tx, id).await? else {
            return Ok(None);
        };
        let manual = Manual::update(&mut tx, &existing, data).await?;
        if let Some(tag_ids) = &data.tag_ids {
            Tag::set_links(&mut tx, TagTarget::Manual, id, tag_ids).await?;
        }
        if let Some(precaution_ids) = &data.precaution_ids {
            Manual::set_precautions(&mut tx, id, precaution_ids).await?;
        }
        let detail = Self::assemble(&mut tx, manual).await?;
        tx.commit().await?;
        Ok(Some(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            precaution::{CreatePrecaution, PrecautionWithTags},
            test_support::{link_and_favorite, links_and_favorites},
        },
    };

    fn sample(title: &str) -> CreateManual {
        CreateManual {
            title: title.to_string(),
            content: "1. Wipe the hood filters\n2. Empty the grease trap".to_string(),
            workplace: Some(Workplace::Kitchen),
            time_slot: Some(TimeSlot::Closing),
            category: Some("Cleaning".to_string()),
            media_url: None,
            tag_ids: None,
            precaution_ids: None,
        }
    }

    async fn precaution(pool: &SqlitePool, title: &str) -> Uuid {
        PrecautionWithTags::create(
            pool,
            &CreatePrecaution {
                title: title.to_string(),
                content: "Wear gloves".to_string(),
                workplace: None,
                time_slot: None,
                category: None,
                severity: Some(2),
                tag_ids: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn create_links_precautions() {
        let db = DBService::new_in_memory().await.unwrap();
        let precaution_id = precaution(&db.pool, "Hot grease").await;
        let mut data = sample("Hood cleaning");
        data.precaution_ids = Some(vec![precaution_id]);

        let created = ManualDetail::create(&db.pool, &data).await.unwrap();
        let fetched = ManualDetail::find_by_id(&db.pool, created.id).await.unwrap().unwrap();
        assert_eq!(fetched.manual, created.manual);
        assert_eq!(fetched.time_slot, TimeSlot::Closing);
        assert_eq!(
            fetched.precautions.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![precaution_id]
        );
    }

    #[tokio::test]
    async fn update_replaces_precaution_links() {
        let db = DBService::new_in_memory().await.unwrap();
        let first = precaution(&db.pool, "Sharp blades").await;
        let second = precaution(&db.pool, "Wet floor").await;
        let mut data = sample("Slicer");
        data.precaution_ids = Some(vec![first]);
        let created = ManualDetail::create(&db.pool, &data).await.unwrap();

        let updated = ManualDetail::update(
            &db.pool,
            created.id,
            &UpdateManual {
                precaution_ids: Some(vec![second]),
                media_url: Some(Some("https://example.com/slicer.mp4".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(
            updated.precautions.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![second]
        );
        assert_eq!(updated.media_url.as_deref(), Some("https://example.com/slicer.mp4"));
    }

    #[tokio::test]
    async fn search_matches_title_and_content() {
        let db = DBService::new_in_memory().await.unwrap();
        ManualDetail::create(&db.pool, &sample("Hood cleaning")).await.unwrap();
        let mut other = sample("Opening the register");
        other.content = "Count the float".to_string();
        ManualDetail::create(&db.pool, &other).await.unwrap();

        let found = Manual::find_filtered(
            &db.pool,
            &ContentFilter {
                search: Some("grease".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Hood cleaning");
    }

    #[tokio::test]
    async fn unknown_manual_is_none() {
        let db = DBService::new_in_memory().await.unwrap();
        assert!(ManualDetail::find_by_id(&db.pool, Uuid::new_v4()).await.unwrap().is_none());
        assert_eq!(Manual::delete(&db.pool, Uuid::new_v4()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_removes_links_and_favorites() {
        let db = DBService::new_in_memory().await.unwrap();
        let manual = ManualDetail::create(&db.pool, &sample("Hood cleaning"))
            .await
            .unwrap();
        let item_id = link_and_favorite(
            &db.pool,
            ConnectedItemType::Manual,
            FavoriteKind::Manual,
            manual.id,
        )
        .await;
        assert_eq!(links_and_favorites(&db.pool, item_id).await, (1, 1));

        assert_eq!(Manual::delete(&db.pool, manual.id).await.unwrap(), 1);
        assert_eq!(links_and_favorites(&db.pool, item_id).await, (0, 0));
    }
}
