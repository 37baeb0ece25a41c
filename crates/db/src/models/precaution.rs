use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    ValidationError,
    checklist_item::{ConnectedItem, ConnectedItemType},
    favorite::{Favorite, FavoriteKind},
    shift::{ContentFilter, TimeSlot, Workplace, push_scope_filters, push_text_search},
    tag::{Tag, TagTarget},
};

const COLUMNS: &str =
    "id, title, content, workplace, time_slot, category, severity, is_active, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct Precaution {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub workplace: Workplace,
    pub time_slot: TimeSlot,
    pub category: Option<String>,
    /// 1 = note, 2 = caution, 3 = critical
    pub severity: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PrecautionWithTags {
    #[serde(flatten)]
    #[ts(flatten)]
    pub precaution: Precaution,
    pub tags: Vec<Tag>,
}

impl std::ops::Deref for PrecautionWithTags {
    type Target = Precaution;
    fn deref(&self) -> &Self::Target {
        &self.precaution
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatePrecaution {
    pub title: String,
    pub content: String,
    pub workplace: Option<Workplace>,
    pub time_slot: Option<TimeSlot>,
    pub category: Option<String>,
    pub severity: Option<i64>,
    pub tag_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdatePrecaution {
    pub title: Option<String>,
    pub content: Option<String>,
    pub workplace: Option<Workplace>,
    pub time_slot: Option<TimeSlot>,
    #[ts(optional = nullable, as = "Option<String>")]
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub category: Option<Option<String>>,
    pub severity: Option<i64>,
    pub is_active: Option<bool>,
    pub tag_ids: Option<Vec<Uuid>>,
}

fn check_severity(severity: Option<i64>) -> Result<(), ValidationError> {
    match severity {
        Some(s) if !(1..=3).contains(&s) => {
            Err(ValidationError::new("Severity must be between 1 and 3"))
        }
        _ => Ok(()),
    }
}

impl CreatePrecaution {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("Title is required"));
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::new("Content is required"));
        }
        check_severity(self.severity)
    }
}

impl UpdatePrecaution {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ValidationError::new("Title cannot be empty"));
        }
        if self.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ValidationError::new("Content cannot be empty"));
        }
        check_severity(self.severity)
    }
}

impl Precaution {
    pub async fn find_filtered(
        pool: &SqlitePool,
        filter: &ContentFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM precautions p WHERE 1 = 1"));
        push_scope_filters(
            &mut query,
            "p",
            filter.workplace,
            filter.time_slot,
            filter.category.as_deref(),
            filter.include_inactive.unwrap_or(false),
        );
        push_text_search(&mut query, "p", filter.search.as_deref());
        if let Some(tag_id) = filter.tag_id {
            query.push(" AND ");
            TagTarget::Precaution.push_has_tag(&mut query, "p.id", tag_id);
        }
        query.push(" ORDER BY p.severity DESC, p.title COLLATE NOCASE ASC");
        query.build_query_as::<Precaution>().fetch_all(pool).await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Precaution>(&format!("SELECT {COLUMNS} FROM precautions WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn create(
        conn: &mut SqliteConnection,
        data: &CreatePrecaution,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Precaution>(&format!(
            r#"INSERT INTO precautions (id, title, content, workplace, time_slot, category, severity, is_active, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $8)
               RETURNING {COLUMNS}"#
        ))
        .bind(id)
        .bind(data.title.trim())
        .bind(&data.content)
        .bind(data.workplace.unwrap_or_default())
        .bind(data.time_slot.unwrap_or_default())
        .bind(&data.category)
        .bind(data.severity.unwrap_or(1))
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn update(
        conn: &mut SqliteConnection,
        existing: &Precaution,
        data: &UpdatePrecaution,
    ) -> Result<Self, sqlx::Error> {
        let title = data
            .title
            .as_deref()
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| existing.title.clone());
        let content = data.content.clone().unwrap_or_else(|| existing.content.clone());
        let category = data.category.clone().unwrap_or_else(|| existing.category.clone());
        sqlx::query_as::<_, Precaution>(&format!(
            r#"UPDATE precautions
               SET title = $2, content = $3, workplace = $4, time_slot = $5, category = $6,
                   severity = $7, is_active = $8, updated_at = $9
               WHERE id = $1
               RETURNING {COLUMNS}"#
        ))
        .bind(existing.id)
        .bind(title)
        .bind(content)
        .bind(data.workplace.unwrap_or(existing.workplace))
        .bind(data.time_slot.unwrap_or(existing.time_slot))
        .bind(category)
        .bind(data.severity.unwrap_or(existing.severity))
        .bind(data.is_active.unwrap_or(existing.is_active))
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let mut tx = crate::begin_write(pool).await?;
        ConnectedItem::delete_for_target(&mut *tx, ConnectedItemType::Precaution, id).await?;
        Favorite::delete_for_target(&mut *tx, FavoriteKind::Precaution, id).await?;
        let result = sqlx::query("DELETE FROM precautions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Precautions linked to a manual, most severe first.
    pub async fn find_for_manual<'e, E>(executor: E, manual_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Precaution>(
            r#"SELECT p.id, p.title, p.content, p.workplace, p.time_slot, p.category, p.severity, p.is_active, p.created_at, p.updated_at
               FROM precautions p
               JOIN manual_precautions mp ON mp.precaution_id = p.id
               WHERE mp.manual_id = $1
               ORDER BY p.severity DESC, p.title COLLATE NOCASE ASC"#,
        )
        .bind(manual_id)
        .fetch_all(executor)
        .await
    }
}

impl PrecautionWithTags {
    pub async fn load(pool: &SqlitePool, precaution: Precaution) -> Result<Self, sqlx::Error> {
        let tags = Tag::find_for(pool, TagTarget::Precaution, precaution.id).await?;
        Ok(Self { precaution, tags })
    }

    pub async fn load_many(
        pool: &SqlitePool,
        precautions: Vec<Precaution>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut links = Tag::links_for(pool, TagTarget::Precaution).await?;
        Ok(precautions
            .into_iter()
            .map(|precaution| {
                let tags = links.remove(&precaution.id).unwrap_or_default();
                Self { precaution, tags }
            })
            .collect())
    }

    /// Insert the precaution and its tag links atomically.
    pub async fn create(pool: &SqlitePool, data: &CreatePrecaution) -> Result<Self, sqlx::Error> {
        let mut tx = crate::begin_write(pool).await?;
        let precaution = Precaution::create(&mut tx, data, Uuid::new_v4()).await?;
        let tag_ids = data.tag_ids.clone().unwrap_or_default();
        Tag::set_links(&mut tx, TagTarget::Precaution, precaution.id, &tag_ids).await?;
        let tags = Tag::find_for(&mut *tx, TagTarget::Precaution, precaution.id).await?;
        tx.commit().await?;
        Ok(Self { precaution, tags })
    }

    /// Apply a partial update; tag links are replaced only when `tag_ids` is present.
    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdatePrecaution,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = crate::begin_write(pool).await?;
        let Some(existing) = Precaution::find_by_id(&mut *tx, id).await? else {
            return Ok(None);
        };
        let precaution = Precaution::update(&mut tx, &existing, data).await?;
        if let Some(tag_ids) = &data.tag_ids {
            Tag::set_links(&mut tx, TagTarget::Precaution, id, tag_ids).await?;
        }
        let tags = Tag::find_for(&mut *tx, TagTarget::Precaution, id).await?;
        tx.commit().await?;
        Ok(Some(Self { precaution, tags }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            tag::CreateTag,
            test_support::{link_and_favorite, links_and_favorites},
        },
    };

    fn sample(title: &str, workplace: Workplace) -> CreatePrecaution {
        CreatePrecaution {
            title: title.to_string(),
            content: "Keep the fryer lid closed while heating".to_string(),
            workplace: Some(workplace),
            time_slot: Some(TimeSlot::Morning),
            category: Some("Safety".to_string()),
            severity: Some(3),
            tag_ids: None,
        }
    }

    #[tokio::test]
    async fn create_with_tags_then_fetch() {
        let db = DBService::new_in_memory().await.unwrap();
        let tag = Tag::create(
            &db.pool,
            &CreateTag {
                name: "Fire".to_string(),
                color: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let mut data = sample("Fryer", Workplace::Kitchen);
        data.tag_ids = Some(vec![tag.id]);

        let created = PrecautionWithTags::create(&db.pool, &data).await.unwrap();
        let fetched = Precaution::find_by_id(&db.pool, created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created.precaution);
        assert_eq!(fetched.severity, 3);
        assert_eq!(created.tags.iter().map(|t| t.id).collect::<Vec<_>>(), vec![tag.id]);
    }

    #[tokio::test]
    async fn workplace_filter_includes_common_records() {
        let db = DBService::new_in_memory().await.unwrap();
        let kitchen = PrecautionWithTags::create(&db.pool, &sample("Knives", Workplace::Kitchen))
            .await
            .unwrap();
        let common = PrecautionWithTags::create(&db.pool, &sample("Floors", Workplace::Common))
            .await
            .unwrap();
        PrecautionWithTags::create(&db.pool, &sample("Trays", Workplace::Hall))
            .await
            .unwrap();

        let found = Precaution::find_filtered(
            &db.pool,
            &ContentFilter {
                workplace: Some(Workplace::Kitchen),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let mut ids: Vec<_> = found.iter().map(|p| p.id).collect();
        ids.sort();
        let mut expected = vec![kitchen.id, common.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn update_without_tag_ids_keeps_tags() {
        let db = DBService::new_in_memory().await.unwrap();
        let tag = Tag::create(
            &db.pool,
            &CreateTag {
                name: "Hygiene".to_string(),
                color: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let mut data = sample("Gloves", Workplace::Kitchen);
        data.tag_ids = Some(vec![tag.id]);
        let created = PrecautionWithTags::create(&db.pool, &data).await.unwrap();

        let updated = PrecautionWithTags::update(
            &db.pool,
            created.id,
            &UpdatePrecaution {
                severity: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.severity, 2);
        assert_eq!(updated.tags.len(), 1);
    }

    #[tokio::test]
    async fn deleted_precaution_disappears_from_list() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = PrecautionWithTags::create(&db.pool, &sample("Ice", Workplace::Hall))
            .await
            .unwrap();
        assert_eq!(Precaution::delete(&db.pool, created.id).await.unwrap(), 1);
        assert!(
            Precaution::find_filtered(&db.pool, &ContentFilter::default())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn delete_removes_links_and_favorites() {
        let db = DBService::new_in_memory().await.unwrap();
        let precaution = PrecautionWithTags::create(&db.pool, &sample("Hot oil", Workplace::Kitchen))
            .await
            .unwrap();
        let item_id = link_and_favorite(
            &db.pool,
            ConnectedItemType::Precaution,
            FavoriteKind::Precaution,
            precaution.id,
        )
        .await;
        assert_eq!(links_and_favorites(&db.pool, item_id).await, (1, 1));

        Precaution::delete(&db.pool, precaution.id).await.unwrap();
        assert_eq!(links_and_favorites(&db.pool, item_id).await, (0, 0));
    }

    #[test]
    fn severity_out_of_range_is_rejected() {
        let mut data = sample("Oil", Workplace::Kitchen);
        data.severity = Some(4);
        assert!(data.validate().is_err());
    }
}
