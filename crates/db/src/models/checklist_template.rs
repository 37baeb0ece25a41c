use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    ValidationError,
    checklist_item::ChecklistItemWithConnections,
    favorite::{Favorite, FavoriteKind},
    shift::{TimeSlot, Workplace, push_scope_filters},
};

const COLUMNS: &str =
    "id, name, description, workplace, time_slot, category, is_active, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct ChecklistTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub workplace: Workplace,
    pub time_slot: TimeSlot,
    pub category: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ChecklistTemplateWithItems {
    #[serde(flatten)]
    #[ts(flatten)]
    pub template: ChecklistTemplate,
    pub items: Vec<ChecklistItemWithConnections>,
}

impl std::ops::Deref for ChecklistTemplateWithItems {
    type Target = ChecklistTemplate;
    fn deref(&self) -> &Self::Target {
        &self.template
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateChecklistTemplate {
    pub name: String,
    pub description: Option<String>,
    pub workplace: Option<Workplace>,
    pub time_slot: Option<TimeSlot>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateChecklistTemplate {
    pub name: Option<String>,
    #[ts(optional = nullable, as = "Option<String>")]
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    pub workplace: Option<Workplace>,
    pub time_slot: Option<TimeSlot>,
    #[ts(optional = nullable, as = "Option<String>")]
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub category: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Template filter; `workplace`/`time_slot` also match `common`/`anytime`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct TemplateFilter {
    pub workplace: Option<Workplace>,
    pub time_slot: Option<TimeSlot>,
    pub category: Option<String>,
    pub active_only: Option<bool>,
}

impl CreateChecklistTemplate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("Template name is required"));
        }
        Ok(())
    }
}

impl UpdateChecklistTemplate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ValidationError::new("Template name cannot be empty"));
        }
        Ok(())
    }
}

impl ChecklistTemplate {
    pub async fn find_filtered(
        pool: &SqlitePool,
        filter: &TemplateFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COLUMNS} FROM checklist_templates t WHERE 1 = 1"
        ));
        push_scope_filters(
            &mut query,
            "t",
            filter.workplace,
            filter.time_slot,
            filter.category.as_deref(),
            !filter.active_only.unwrap_or(false),
        );
        query.push(" ORDER BY t.workplace ASC, t.name COLLATE NOCASE ASC");
        query.build_query_as::<ChecklistTemplate>().fetch_all(pool).await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ChecklistTemplate>(&format!(
            "SELECT {COLUMNS} FROM checklist_templates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateChecklistTemplate,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ChecklistTemplate>(&format!(
            r#"INSERT INTO checklist_templates (id, name, description, workplace, time_slot, category, is_active, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, 1, $7, $7)
               RETURNING {COLUMNS}"#
        ))
        .bind(id)
        .bind(data.name.trim())
        .bind(&data.description)
        .bind(data.workplace.unwrap_or_default())
        .bind(data.time_slot.unwrap_or_default())
        .bind(&data.category)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateChecklistTemplate,
    ) -> Result<Option<Self>, sqlx::Error> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let name = data
            .name
            .as_deref()
            .map(|n| n.trim().to_string())
            .unwrap_or(existing.name);
        let description = data.description.clone().unwrap_or(existing.description);
        let category = data.category.clone().unwrap_or(existing.category);
        sqlx::query_as::<_, ChecklistTemplate>(&format!(
            r#"UPDATE checklist_templates
               SET name = $2, description = $3, workplace = $4, time_slot = $5, category = $6,
                   is_active = $7, updated_at = $8
               WHERE id = $1
               RETURNING {COLUMNS}"#
        ))
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(data.workplace.unwrap_or(existing.workplace))
        .bind(data.time_slot.unwrap_or(existing.time_slot))
        .bind(category)
        .bind(data.is_active.unwrap_or(existing.is_active))
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }

    /// Deleting a template cascades to its items, connected items, instances
    /// and their progress rows.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let mut tx = crate::begin_write(pool).await?;
        Favorite::delete_for_target(&mut *tx, FavoriteKind::Template, id).await?;
        let result = sqlx::query("DELETE FROM checklist_templates WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

impl ChecklistTemplateWithItems {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        let Some(template) = ChecklistTemplate::find_by_id(&mut *conn, id).await? else {
            return Ok(None);
        };
        let items = ChecklistItemWithConnections::find_by_template(&mut conn, id).await?;
        Ok(Some(Self { template, items }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            checklist_item::{ChecklistItem, CreateChecklistItem},
            favorite::CreateFavorite,
        },
    };

    fn sample(name: &str, workplace: Workplace, time_slot: TimeSlot) -> CreateChecklistTemplate {
        CreateChecklistTemplate {
            name: name.to_string(),
            description: Some("Daily routine".to_string()),
            workplace: Some(workplace),
            time_slot: Some(time_slot),
            category: None,
        }
    }

    #[tokio::test]
    async fn create_then_fetch_with_items() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = ChecklistTemplate::create(
            &db.pool,
            &sample("Hall opening", Workplace::Hall, TimeSlot::Morning),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        ChecklistItem::create(
            &mut conn,
            created.id,
            &CreateChecklistItem {
                content: "Unlock the front door".to_string(),
                instructions: None,
                is_required: Some(false),
                position: None,
                connected_items: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        drop(conn);

        let fetched = ChecklistTemplateWithItems::find_by_id(&db.pool, created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.template, created);
        assert_eq!(fetched.items.len(), 1);
        assert!(!fetched.items[0].is_required);
    }

    #[tokio::test]
    async fn filter_includes_shared_scopes() {
        let db = DBService::new_in_memory().await.unwrap();
        let hall = ChecklistTemplate::create(
            &db.pool,
            &sample("Hall lunch", Workplace::Hall, TimeSlot::Lunch),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let shared = ChecklistTemplate::create(
            &db.pool,
            &sample("Hand washing", Workplace::Common, TimeSlot::Anytime),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        ChecklistTemplate::create(
            &db.pool,
            &sample("Kitchen lunch", Workplace::Kitchen, TimeSlot::Lunch),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let found = ChecklistTemplate::find_filtered(
            &db.pool,
            &TemplateFilter {
                workplace: Some(Workplace::Hall),
                time_slot: Some(TimeSlot::Lunch),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let mut ids = found.iter().map(|t| t.id).collect::<Vec<_>>();
        ids.sort();
        let mut expected = vec![hall.id, shared.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn inactive_templates_hidden_when_active_only() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = ChecklistTemplate::create(
            &db.pool,
            &sample("Old routine", Workplace::Kitchen, TimeSlot::Evening),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let updated = ChecklistTemplate::update(
            &db.pool,
            created.id,
            &UpdateChecklistTemplate {
                is_active: Some(false),
                description: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.description, None);
        assert_eq!(updated.name, "Old routine");

        let active = ChecklistTemplate::find_filtered(
            &db.pool,
            &TemplateFilter {
                active_only: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(active.is_empty());
        let all = ChecklistTemplate::find_filtered(&db.pool, &TemplateFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn deleted_template_disappears() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = ChecklistTemplate::create(
            &db.pool,
            &sample("Temp", Workplace::Hall, TimeSlot::Closing),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        assert_eq!(ChecklistTemplate::delete(&db.pool, created.id).await.unwrap(), 1);
        assert!(ChecklistTemplate::find_by_id(&db.pool, created.id).await.unwrap().is_none());
        assert_eq!(ChecklistTemplate::delete(&db.pool, created.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_removes_favorites() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = ChecklistTemplate::create(
            &db.pool,
            &sample("Opening", Workplace::Hall, TimeSlot::Morning),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let favorite = CreateFavorite {
            kind: FavoriteKind::Template,
            target_id: created.id,
        };
        Favorite::create(&db.pool, "aiko", &favorite).await.unwrap();

        ChecklistTemplate::delete(&db.pool, created.id).await.unwrap();
        assert!(Favorite::find_for_actor(&db.pool, "aiko", None).await.unwrap().is_empty());
    }
}
