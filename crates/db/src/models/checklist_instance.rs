use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

const COLUMNS: &str = "id, template_id, target_date, is_completed, completed_at, is_submitted, submitted_at, submitted_by, created_at, updated_at";

/// A template materialized for one business day.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct ChecklistInstance {
    pub id: Uuid,
    pub template_id: Uuid,
    pub target_date: NaiveDate,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_submitted: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub submitted_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChecklistInstance {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ChecklistInstance>(&format!(
            "SELECT {COLUMNS} FROM checklist_instances WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// The instance of `template_id` for `target_date`, created on first use.
    /// Two concurrent callers converge on the same row.
    pub async fn find_or_create(
        pool: &SqlitePool,
        template_id: Uuid,
        target_date: NaiveDate,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO checklist_instances (id, template_id, target_date, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $4)
               ON CONFLICT(template_id, target_date) DO NOTHING"#,
        )
        .bind(Uuid::new_v4())
        .bind(template_id)
        .bind(target_date)
        .bind(now)
        .execute(pool)
        .await?;

        sqlx::query_as::<_, ChecklistInstance>(&format!(
            "SELECT {COLUMNS} FROM checklist_instances WHERE template_id = $1 AND target_date = $2"
        ))
        .bind(template_id)
        .bind(target_date)
        .fetch_one(pool)
        .await
    }

    pub async fn set_completion(
        conn: &mut SqliteConnection,
        id: Uuid,
        is_completed: bool,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE checklist_instances SET is_completed = $2, completed_at = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(is_completed)
        .bind(completed_at)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Flip `is_submitted` once. Returns the updated row, or `None` when the
    /// instance does not exist or was already submitted.
    pub async fn mark_submitted(
        pool: &SqlitePool,
        id: Uuid,
        submitted_by: &str,
        submitted_at: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChecklistInstance>(&format!(
            r#"UPDATE checklist_instances
               SET is_submitted = 1, submitted_at = $2, submitted_by = $3, updated_at = $2
               WHERE id = $1 AND is_submitted = 0
               RETURNING {COLUMNS}"#
        ))
        .bind(id)
        .bind(submitted_at)
        .bind(submitted_by)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::checklist_template::{ChecklistTemplate, CreateChecklistTemplate},
    };

    async fn template(pool: &SqlitePool) -> Uuid {
        ChecklistTemplate::create(
            pool,
            &CreateChecklistTemplate {
                name: "Evening".to_string(),
                description: None,
                workplace: None,
                time_slot: None,
                category: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn one_instance_per_template_and_day() {
        let db = DBService::new_in_memory().await.unwrap();
        let template_id = template(&db.pool).await;
        let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        let first = ChecklistInstance::find_or_create(&db.pool, template_id, day)
            .await
            .unwrap();
        let again = ChecklistInstance::find_or_create(&db.pool, template_id, day)
            .await
            .unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(first.target_date, day);

        let next_day = ChecklistInstance::find_or_create(&db.pool, template_id, day.succ_opt().unwrap())
            .await
            .unwrap();
        assert_ne!(next_day.id, first.id);
        let stored = ChecklistInstance::find_by_id(&db.pool, first.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn submission_happens_once() {
        let db = DBService::new_in_memory().await.unwrap();
        let template_id = template(&db.pool).await;
        let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let instance = ChecklistInstance::find_or_create(&db.pool, template_id, day)
            .await
            .unwrap();

        let at = Utc::now();
        let submitted = ChecklistInstance::mark_submitted(&db.pool, instance.id, "aiko", at)
            .await
            .unwrap()
            .unwrap();
        assert!(submitted.is_submitted);
        assert_eq!(submitted.submitted_by.as_deref(), Some("aiko"));
        assert_eq!(submitted.submitted_at, Some(at));

        let second = ChecklistInstance::mark_submitted(&db.pool, instance.id, "ben", Utc::now())
            .await
            .unwrap();
        assert!(second.is_none());
        let stored = ChecklistInstance::find_by_id(&db.pool, instance.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.submitted_by.as_deref(), Some("aiko"));
    }
}
