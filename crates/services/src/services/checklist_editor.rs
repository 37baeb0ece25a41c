use std::collections::HashSet;

use db::models::{
    ValidationError,
    checklist_item::{
        ChecklistItem, ChecklistItemWithConnections, ConnectedItem, ConnectedItemInput,
        ConnectedItemType, CreateChecklistItem, UpdateChecklistItem,
    },
    checklist_template::ChecklistTemplate,
};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ChecklistEditError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Checklist template not found")]
    TemplateNotFound,
    #[error("Checklist item not found")]
    ItemNotFound,
    #[error("Connected {item_type} {item_id} does not exist")]
    MissingTarget {
        item_type: ConnectedItemType,
        item_id: Uuid,
    },
}

/// Admin edits to the items of a checklist template.
pub struct ChecklistEditor;

impl ChecklistEditor {
    pub async fn add_item(
        pool: &SqlitePool,
        template_id: Uuid,
        data: &CreateChecklistItem,
    ) -> Result<ChecklistItemWithConnections, ChecklistEditError> {
        data.validate()?;
        let mut tx = db::begin_write(pool).await?;
        if ChecklistTemplate::find_by_id(&mut *tx, template_id).await?.is_none() {
            return Err(ChecklistEditError::TemplateNotFound);
        }
        let item = ChecklistItem::create(&mut tx, template_id, data, Uuid::new_v4()).await?;
        if let Some(connected) = &data.connected_items {
            ensure_targets_exist(&mut tx, connected).await?;
            ConnectedItem::replace_for_item(&mut tx, item.id, connected).await?;
        }
        let connected_items = ConnectedItem::find_by_item(&mut *tx, item.id).await?;
        tx.commit().await?;

        info!(template_id = %template_id, item_id = %item.id, "Checklist item added");
        Ok(ChecklistItemWithConnections {
            item,
            connected_items,
        })
    }

    /// Connections are only touched when `connected_items` is present.
    pub async fn update_item(
        pool: &SqlitePool,
        item_id: Uuid,
        data: &UpdateChecklistItem,
    ) -> Result<ChecklistItemWithConnections, ChecklistEditError> {
        data.validate()?;
        let mut tx = db::begin_write(pool).await?;
        let existing = ChecklistItem::find_by_id(&mut *tx, item_id)
            .await?
            .ok_or(ChecklistEditError::ItemNotFound)?;
        let item = ChecklistItem::update(&mut tx, &existing, data).await?;
        if let Some(connected) = &data.connected_items {
            ensure_targets_exist(&mut tx, connected).await?;
            ConnectedItem::replace_for_item(&mut tx, item.id, connected).await?;
        }
        let connected_items = ConnectedItem::find_by_item(&mut *tx, item.id).await?;
        tx.commit().await?;

        Ok(ChecklistItemWithConnections {
            item,
            connected_items,
        })
    }

    /// `ordered_ids` must name every item of the template exactly once.
    pub async fn reorder_items(
        pool: &SqlitePool,
        template_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> Result<Vec<ChecklistItemWithConnections>, ChecklistEditError> {
        let mut tx = db::begin_write(pool).await?;
        if ChecklistTemplate::find_by_id(&mut *tx, template_id).await?.is_none() {
            return Err(ChecklistEditError::TemplateNotFound);
        }
        let current: HashSet<Uuid> = ChecklistItem::find_by_template(&mut *tx, template_id)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();
        let requested: HashSet<Uuid> = ordered_ids.iter().copied().collect();
        if requested.len() != ordered_ids.len() || requested != current {
            return Err(ValidationError::new(
                "Item order must list every item of the checklist exactly once",
            )
            .into());
        }

        ChecklistItem::reorder(&mut tx, template_id, ordered_ids).await?;
        let items = ChecklistItemWithConnections::find_by_template(&mut tx, template_id).await?;
        tx.commit().await?;
        Ok(items)
    }

    pub async fn delete_item(pool: &SqlitePool, item_id: Uuid) -> Result<(), ChecklistEditError> {
        match ChecklistItem::delete(pool, item_id).await? {
            0 => Err(ChecklistEditError::ItemNotFound),
            _ => Ok(()),
        }
    }
}

async fn ensure_targets_exist(
    conn: &mut SqliteConnection,
    inputs: &[ConnectedItemInput],
) -> Result<(), ChecklistEditError> {
    for input in inputs {
        if !ConnectedItem::target_exists(conn, input).await? {
            return Err(ChecklistEditError::MissingTarget {
                item_type: input.item_type,
                item_id: input.item_id,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            checklist_template::CreateChecklistTemplate,
            precaution::{CreatePrecaution, PrecautionWithTags},
        },
    };

    use super::*;

    async fn template(pool: &SqlitePool) -> Uuid {
        ChecklistTemplate::create(
            pool,
            &CreateChecklistTemplate {
                name: "Hall opening".to_string(),
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

    fn item(content: &str, connected_items: Option<Vec<ConnectedItemInput>>) -> CreateChecklistItem {
        CreateChecklistItem {
            content: content.to_string(),
            instructions: Some("Use the blue cloth".to_string()),
            is_required: None,
            position: None,
            connected_items,
        }
    }

    #[tokio::test]
    async fn add_item_links_existing_targets() {
        let db = DBService::new_in_memory().await.unwrap();
        let template_id = template(&db.pool).await;
        let precaution = PrecautionWithTags::create(
            &db.pool,
            &CreatePrecaution {
                title: "Wet floor".to_string(),
                content: "Put out the sign".to_string(),
                workplace: None,
                time_slot: None,
                category: None,
                severity: None,
                tag_ids: None,
            },
        )
        .await
        .unwrap();

        let created = ChecklistEditor::add_item(
            &db.pool,
            template_id,
            &item(
                "Mop the entrance",
                Some(vec![ConnectedItemInput {
                    item_type: ConnectedItemType::Precaution,
                    item_id: precaution.id,
                }]),
            ),
        )
        .await
        .unwrap();
        assert_eq!(created.connected_items.len(), 1);
        assert_eq!(created.connected_items[0].target_title.as_deref(), Some("Wet floor"));

        let fetched = ChecklistItemWithConnections::find_by_id(&db.pool, created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.item, created.item);
        assert_eq!(fetched.connected_items, created.connected_items);
    }

    #[tokio::test]
    async fn missing_targets_roll_back_the_item() {
        let db = DBService::new_in_memory().await.unwrap();
        let template_id = template(&db.pool).await;
        let result = ChecklistEditor::add_item(
            &db.pool,
            template_id,
            &item(
                "Check stock",
                Some(vec![ConnectedItemInput {
                    item_type: ConnectedItemType::Inventory,
                    item_id: Uuid::new_v4(),
                }]),
            ),
        )
        .await;
        assert!(matches!(result, Err(ChecklistEditError::MissingTarget { .. })));
        let items = ChecklistItem::find_by_template(&db.pool, template_id).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn unknown_template_is_not_found() {
        let db = DBService::new_in_memory().await.unwrap();
        let result = ChecklistEditor::add_item(&db.pool, Uuid::new_v4(), &item("x", None)).await;
        assert!(matches!(result, Err(ChecklistEditError::TemplateNotFound)));
    }

    #[tokio::test]
    async fn reorder_requires_a_full_permutation() {
        let db = DBService::new_in_memory().await.unwrap();
        let template_id = template(&db.pool).await;
        let a = ChecklistEditor::add_item(&db.pool, template_id, &item("Lights", None))
            .await
            .unwrap();
        let b = ChecklistEditor::add_item(&db.pool, template_id, &item("Music", None))
            .await
            .unwrap();

        let partial = ChecklistEditor::reorder_items(&db.pool, template_id, &[b.id]).await;
        assert!(matches!(partial, Err(ChecklistEditError::Validation(_))));
        let repeated =
            ChecklistEditor::reorder_items(&db.pool, template_id, &[b.id, b.id, a.id]).await;
        assert!(matches!(repeated, Err(ChecklistEditError::Validation(_))));

        let items = ChecklistEditor::reorder_items(&db.pool, template_id, &[b.id, a.id])
            .await
            .unwrap();
        assert_eq!(
            items.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![b.id, a.id]
        );
    }

    #[tokio::test]
    async fn update_without_connections_keeps_them() {
        let db = DBService::new_in_memory().await.unwrap();
        let template_id = template(&db.pool).await;
        let created = ChecklistEditor::add_item(&db.pool, template_id, &item("Tables", None))
            .await
            .unwrap();

        let updated = ChecklistEditor::update_item(
            &db.pool,
            created.id,
            &UpdateChecklistItem {
                is_required: Some(false),
                instructions: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(!updated.is_required);
        assert_eq!(updated.instructions, None);
        assert_eq!(updated.content, "Tables");

        ChecklistEditor::delete_item(&db.pool, created.id).await.unwrap();
        assert!(matches!(
            ChecklistEditor::delete_item(&db.pool, created.id).await,
            Err(ChecklistEditError::ItemNotFound)
        ));
    }
}
