//! Daily checklist runs: materializing instances, saving progress and
//! submitting.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use db::{
    DBService,
    models::{
        checklist_instance::ChecklistInstance,
        checklist_item::ChecklistItemWithConnections,
        checklist_progress::{
            ChecklistItemProgress, ConnectedItemProgress, NewConnectedProgress, NewItemProgress,
            replace_for_instance,
        },
        checklist_template::{ChecklistTemplate, TemplateFilter},
        shift::{TimeSlot, Workplace},
    },
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use thiserror::Error;
use tracing::{error, info};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    checklist_progress::{ChecklistInstanceView, build_instance_view, is_instance_complete},
    mail::MailService,
    session::Actor,
};

#[derive(Debug, Error)]
pub enum ChecklistRunError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Checklist instance not found")]
    InstanceNotFound,
    #[error("Checklist template not found")]
    TemplateNotFound,
    #[error("Checklist has already been submitted")]
    AlreadySubmitted,
    #[error("{0}")]
    InvalidReference(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ProgressFilter {
    pub date: Option<String>,
    pub workplace: Option<Workplace>,
    pub time_slot: Option<TimeSlot>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ItemProgressInput {
    pub checklist_item_id: Uuid,
    pub is_completed: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ConnectedProgressInput {
    pub connected_item_id: Uuid,
    pub is_completed: bool,
}

/// Full progress state of an instance. Rows left out are cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct SaveProgress {
    #[serde(default)]
    pub items: Vec<ItemProgressInput>,
    #[serde(default)]
    pub connected_items: Vec<ConnectedProgressInput>,
}

#[derive(Clone)]
pub struct ChecklistRunService {
    db: DBService,
    mail: MailService,
}

impl ChecklistRunService {
    pub fn new(db: DBService, mail: MailService) -> Self {
        Self { db, mail }
    }

    /// One view per active template matching the filter, creating the
    /// instances for `date` on first access. Ordered by time slot, then name.
    pub async fn progress_for_date(
        &self,
        date: NaiveDate,
        workplace: Option<Workplace>,
        time_slot: Option<TimeSlot>,
        category: Option<String>,
    ) -> Result<Vec<ChecklistInstanceView>, ChecklistRunError> {
        let pool = &self.db.pool;
        let mut templates = ChecklistTemplate::find_filtered(
            pool,
            &TemplateFilter {
                workplace,
                time_slot,
                category,
                active_only: Some(true),
            },
        )
        .await?;
        templates.sort_by(|a, b| {
            a.time_slot
                .cmp(&b.time_slot)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        let mut views = Vec::with_capacity(templates.len());
        for template in templates {
            let instance = ChecklistInstance::find_or_create(pool, template.id, date).await?;
            let mut conn = pool.acquire().await?;
            views.push(load_view(&mut conn, template, instance).await?);
        }
        Ok(views)
    }

    pub async fn instance_view(
        &self,
        instance_id: Uuid,
    ) -> Result<ChecklistInstanceView, ChecklistRunError> {
        let mut conn = self.db.pool.acquire().await?;
        let instance = ChecklistInstance::find_by_id(&mut *conn, instance_id)
            .await?
            .ok_or(ChecklistRunError::InstanceNotFound)?;
        let template = ChecklistTemplate::find_by_id(&mut *conn, instance.template_id)
            .await?
            .ok_or(ChecklistRunError::TemplateNotFound)?;
        load_view(&mut conn, template, instance).await
    }

    /// Replace the progress of an instance with `data`.
    ///
    /// Rows that were already complete keep their original attribution, newly
    /// completed rows are stamped with `actor`. The instance completion flags
    /// are recomputed from the derived view in the same transaction.
    pub async fn save_progress(
        &self,
        instance_id: Uuid,
        actor: &Actor,
        data: &SaveProgress,
    ) -> Result<ChecklistInstanceView, ChecklistRunError> {
        let mut tx = db::begin_write(&self.db.pool).await?;
        let instance = ChecklistInstance::find_by_id(&mut *tx, instance_id)
            .await?
            .ok_or(ChecklistRunError::InstanceNotFound)?;
        if instance.is_submitted {
            return Err(ChecklistRunError::AlreadySubmitted);
        }
        let template = ChecklistTemplate::find_by_id(&mut *tx, instance.template_id)
            .await?
            .ok_or(ChecklistRunError::TemplateNotFound)?;
        let items = ChecklistItemWithConnections::find_by_template(&mut tx, template.id).await?;
        check_references(&items, data)?;

        let now = Utc::now();
        let previous_items: HashMap<Uuid, ChecklistItemProgress> =
            ChecklistItemProgress::find_by_instance(&mut *tx, instance_id)
                .await?
                .into_iter()
                .map(|p| (p.checklist_item_id, p))
                .collect();
        let previous_connected: HashMap<Uuid, ConnectedItemProgress> =
            ConnectedItemProgress::find_by_instance(&mut *tx, instance_id)
                .await?
                .into_iter()
                .map(|p| (p.connected_item_id, p))
                .collect();

        let new_items: Vec<NewItemProgress> = data
            .items
            .iter()
            .map(|input| {
                let kept = previous_items
                    .get(&input.checklist_item_id)
                    .filter(|p| p.is_completed && input.is_completed);
                let (completed_by, completed_at) = match kept {
                    Some(p) => (p.completed_by.clone(), p.completed_at),
                    None if input.is_completed => (Some(actor.name.clone()), Some(now)),
                    None => (None, None),
                };
                NewItemProgress {
                    checklist_item_id: input.checklist_item_id,
                    is_completed: input.is_completed,
                    completed_by,
                    completed_at,
                    notes: input.notes.clone().filter(|n| !n.trim().is_empty()),
                }
            })
            .collect();
        let new_connected: Vec<NewConnectedProgress> = data
            .connected_items
            .iter()
            .map(|input| {
                let kept = previous_connected
                    .get(&input.connected_item_id)
                    .filter(|p| p.is_completed && input.is_completed);
                let (completed_by, completed_at) = match kept {
                    Some(p) => (p.completed_by.clone(), p.completed_at),
                    None if input.is_completed => (Some(actor.name.clone()), Some(now)),
                    None => (None, None),
                };
                NewConnectedProgress {
                    connected_item_id: input.connected_item_id,
                    is_completed: input.is_completed,
                    completed_by,
                    completed_at,
                }
            })
            .collect();

        replace_for_instance(&mut tx, instance_id, &new_items, &new_connected).await?;

        let item_progress = ChecklistItemProgress::find_by_instance(&mut *tx, instance_id).await?;
        let connected_progress =
            ConnectedItemProgress::find_by_instance(&mut *tx, instance_id).await?;
        let was_completed_at = instance.completed_at;
        let mut view =
            build_instance_view(template, items, instance, &item_progress, &connected_progress);
        let complete = is_instance_complete(&view);
        let completed_at = complete.then(|| was_completed_at.unwrap_or(now));
        ChecklistInstance::set_completion(&mut tx, instance_id, complete, completed_at).await?;
        view.instance = ChecklistInstance::find_by_id(&mut *tx, instance_id)
            .await?
            .ok_or(ChecklistRunError::InstanceNotFound)?;
        tx.commit().await?;

        info!(
            instance_id = %instance_id,
            actor = %actor.name,
            completed = view.completed_items,
            total = view.total_items,
            "Checklist progress saved"
        );
        Ok(view)
    }

    /// Submit an instance once. The submission email goes out afterwards and
    /// its failure only gets logged.
    pub async fn submit(
        &self,
        instance_id: Uuid,
        actor: &Actor,
    ) -> Result<ChecklistInstanceView, ChecklistRunError> {
        let pool = &self.db.pool;
        if ChecklistInstance::find_by_id(pool, instance_id).await?.is_none() {
            return Err(ChecklistRunError::InstanceNotFound);
        }
        let submitted_at = Utc::now();
        let Some(instance) =
            ChecklistInstance::mark_submitted(pool, instance_id, &actor.name, submitted_at).await?
        else {
            return Err(ChecklistRunError::AlreadySubmitted);
        };
        info!(instance_id = %instance_id, actor = %actor.name, "Checklist submitted");

        let mut conn = pool.acquire().await?;
        let template = ChecklistTemplate::find_by_id(&mut *conn, instance.template_id)
            .await?
            .ok_or(ChecklistRunError::TemplateNotFound)?;
        let view = load_view(&mut conn, template, instance).await?;
        drop(conn);

        if let Err(e) = self
            .mail
            .send_submission(&view, &actor.name, submitted_at)
            .await
        {
            error!(instance_id = %instance_id, error = %e, "Failed to send submission mail");
        }
        Ok(view)
    }
}

async fn load_view(
    conn: &mut SqliteConnection,
    template: ChecklistTemplate,
    instance: ChecklistInstance,
) -> Result<ChecklistInstanceView, ChecklistRunError> {
    let items = ChecklistItemWithConnections::find_by_template(&mut *conn, template.id).await?;
    let item_progress = ChecklistItemProgress::find_by_instance(&mut *conn, instance.id).await?;
    let connected_progress = ConnectedItemProgress::find_by_instance(&mut *conn, instance.id).await?;
    Ok(build_instance_view(
        template,
        items,
        instance,
        &item_progress,
        &connected_progress,
    ))
}

/// Every referenced row has to belong to the instance's template, once.
fn check_references(
    items: &[ChecklistItemWithConnections],
    data: &SaveProgress,
) -> Result<(), ChecklistRunError> {
    let item_ids: HashSet<Uuid> = items.iter().map(|i| i.id).collect();
    let connected_ids: HashSet<Uuid> = items
        .iter()
        .flat_map(|i| i.connected_items.iter().map(|c| c.id))
        .collect();

    let mut seen = HashSet::new();
    for input in &data.items {
        if !item_ids.contains(&input.checklist_item_id) {
            return Err(ChecklistRunError::InvalidReference(format!(
                "Checklist item {} does not belong to this checklist",
                input.checklist_item_id
            )));
        }
        if !seen.insert(input.checklist_item_id) {
            return Err(ChecklistRunError::InvalidReference(format!(
                "Checklist item {} is listed more than once",
                input.checklist_item_id
            )));
        }
    }
    for input in &data.connected_items {
        if !connected_ids.contains(&input.connected_item_id) {
            return Err(ChecklistRunError::InvalidReference(format!(
                "Connected item {} does not belong to this checklist",
                input.connected_item_id
            )));
        }
        if !seen.insert(input.connected_item_id) {
            return Err(ChecklistRunError::InvalidReference(format!(
                "Connected item {} is listed more than once",
                input.connected_item_id
            )));
        }
    }
    Ok(())
}
