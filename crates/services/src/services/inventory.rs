use db::models::{
    ValidationError,
    inventory_check::{CreateInventoryCheck, InventoryCheck},
    inventory_item::{
        CreateInventoryItem, InventoryItem, InventoryItemWithTags, UpdateInventoryItem,
    },
    tag::{Tag, TagTarget},
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::session::Actor;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("An inventory item named \"{0}\" already exists")]
    DuplicateName(String),
    #[error("Inventory item not found")]
    NotFound,
}

/// Inventory writes that need more than a single statement: name uniqueness,
/// tag links and stock checks.
pub struct InventoryService;

impl InventoryService {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateInventoryItem,
    ) -> Result<InventoryItemWithTags, InventoryError> {
        data.validate()?;
        let name = utils::text::normalize_name(&data.name);
        if let Some(existing) = InventoryItem::find_by_name_ci(pool, &name).await? {
            return Err(InventoryError::DuplicateName(existing.name));
        }

        let mut tx = db::begin_write(pool).await?;
        let item = InventoryItem::create(&mut tx, data, Uuid::new_v4()).await?;
        if let Some(tag_ids) = &data.tag_ids {
            Tag::set_links(&mut tx, TagTarget::Inventory, item.id, tag_ids).await?;
        }
        tx.commit().await?;

        info!(item_id = %item.id, name = %item.name, "Inventory item created");
        Ok(InventoryItemWithTags::load(pool, item).await?)
    }

    /// Renaming onto another item's name is a duplicate; changing only the
    /// case of an item's own name is not.
    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateInventoryItem,
    ) -> Result<InventoryItemWithTags, InventoryError> {
        data.validate()?;
        let existing = InventoryItem::find_by_id(pool, id)
            .await?
            .ok_or(InventoryError::NotFound)?;
        if let Some(name) = data.name.as_deref().map(utils::text::normalize_name) {
            let clash = InventoryItem::find_by_name_ci(pool, &name)
                .await?
                .filter(|other| other.id != id);
            if let Some(other) = clash {
                return Err(InventoryError::DuplicateName(other.name));
            }
        }

        let mut tx = db::begin_write(pool).await?;
        let item = InventoryItem::update(&mut tx, &existing, data).await?;
        if let Some(tag_ids) = &data.tag_ids {
            Tag::set_links(&mut tx, TagTarget::Inventory, item.id, tag_ids).await?;
        }
        tx.commit().await?;
        Ok(InventoryItemWithTags::load(pool, item).await?)
    }

    /// Append a stock count to the item's history and make it the current stock.
    pub async fn record_check(
        pool: &SqlitePool,
        item_id: Uuid,
        actor: &Actor,
        data: &CreateInventoryCheck,
    ) -> Result<InventoryCheck, InventoryError> {
        if !data.checked_stock.is_finite() || data.checked_stock < 0.0 {
            return Err(ValidationError::new("Counted stock must be a non-negative number").into());
        }
        let item = InventoryItem::find_by_id(pool, item_id)
            .await?
            .ok_or(InventoryError::NotFound)?;

        let mut tx = db::begin_write(pool).await?;
        let check =
            InventoryCheck::create(&mut tx, item.id, item.current_stock, data, &actor.name).await?;
        InventoryItem::set_stock(&mut tx, item.id, data.checked_stock).await?;
        tx.commit().await?;

        info!(
            item_id = %item.id,
            previous = item.current_stock,
            counted = data.checked_stock,
            actor = %actor.name,
            "Stock check recorded"
        );
        Ok(check)
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;
    use crate::services::session::ActorRole;

    fn sample(name: &str) -> CreateInventoryItem {
        CreateInventoryItem {
            name: name.to_string(),
            category: "Sauces".to_string(),
            current_stock: Some(4.0),
            minimum_stock: Some(2.0),
            unit: "bottle".to_string(),
            supplier: None,
            cost_per_unit: None,
            location: None,
            notes: None,
            tag_ids: None,
        }
    }

    fn actor() -> Actor {
        Actor {
            name: "Chika".to_string(),
            role: ActorRole::Employee,
        }
    }

    #[tokio::test]
    async fn duplicate_names_ignore_case() {
        let db = DBService::new_in_memory().await.unwrap();
        InventoryService::create(&db.pool, &sample("Soy Sauce")).await.unwrap();
        let err = InventoryService::create(&db.pool, &sample("  soy   sauce "))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateName(name) if name == "Soy Sauce"));

        InventoryService::create(&db.pool, &sample("Äpfel")).await.unwrap();
        let err = InventoryService::create(&db.pool, &sample("äpfel"))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateName(name) if name == "Äpfel"));
    }

    #[tokio::test]
    async fn rename_checks_other_items_only() {
        let db = DBService::new_in_memory().await.unwrap();
        let ponzu = InventoryService::create(&db.pool, &sample("Ponzu")).await.unwrap();
        InventoryService::create(&db.pool, &sample("Mirin")).await.unwrap();

        let recased = InventoryService::update(
            &db.pool,
            ponzu.id,
            &UpdateInventoryItem {
                name: Some("PONZU".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(recased.name, "PONZU");

        let clash = InventoryService::update(
            &db.pool,
            ponzu.id,
            &UpdateInventoryItem {
                name: Some("mirin".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(clash, Err(InventoryError::DuplicateName(_))));
    }

    #[tokio::test]
    async fn negative_values_are_rejected() {
        let db = DBService::new_in_memory().await.unwrap();
        let mut data = sample("Yuzu");
        data.current_stock = Some(-1.0);
        assert!(matches!(
            InventoryService::create(&db.pool, &data).await,
            Err(InventoryError::Validation(_))
        ));

        let item = InventoryService::create(&db.pool, &sample("Yuzu")).await.unwrap();
        let check = InventoryService::record_check(
            &db.pool,
            item.id,
            &actor(),
            &CreateInventoryCheck {
                checked_stock: -3.0,
                note: None,
            },
        )
        .await;
        assert!(matches!(check, Err(InventoryError::Validation(_))));
    }

    #[tokio::test]
    async fn stock_check_updates_current_stock() {
        let db = DBService::new_in_memory().await.unwrap();
        let item = InventoryService::create(&db.pool, &sample("Sesame oil")).await.unwrap();
        let check = InventoryService::record_check(
            &db.pool,
            item.id,
            &actor(),
            &CreateInventoryCheck {
                checked_stock: 1.0,
                note: Some("one bottle opened".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(check.previous_stock, 4.0);
        assert_eq!(check.checked_by, "Chika");

        let stored = InventoryItem::find_by_id(&db.pool, item.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 1.0);
        assert!(stored.is_low_stock());
        let history = InventoryCheck::find_by_item(&db.pool, item.id, 10).await.unwrap();
        assert_eq!(history, vec![check]);
    }

    #[tokio::test]
    async fn missing_item_is_not_found() {
        let db = DBService::new_in_memory().await.unwrap();
        let result = InventoryService::record_check(
            &db.pool,
            Uuid::new_v4(),
            &actor(),
            &CreateInventoryCheck {
                checked_stock: 1.0,
                note: None,
            },
        )
        .await;
        assert!(matches!(result, Err(InventoryError::NotFound)));
    }
}
