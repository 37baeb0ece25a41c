use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    ValidationError,
    checklist_item::{ConnectedItem, ConnectedItemType},
    favorite::{Favorite, FavoriteKind},
    like_pattern,
    tag::{Tag, TagTarget},
};

const COLUMNS: &str = "id, name, category, current_stock, minimum_stock, unit, supplier, cost_per_unit, location, notes, is_active, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct InventoryItem {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub current_stock: f64,
    pub minimum_stock: f64,
    pub unit: String,
    pub supplier: Option<String>,
    pub cost_per_unit: Option<f64>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.current_stock < self.minimum_stock
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct InventoryItemWithTags {
    #[serde(flatten)]
    #[ts(flatten)]
    pub item: InventoryItem,
    pub tags: Vec<Tag>,
    pub is_low_stock: bool,
}

impl std::ops::Deref for InventoryItemWithTags {
    type Target = InventoryItem;
    fn deref(&self) -> &Self::Target {
        &self.item
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateInventoryItem {
    pub name: String,
    pub category: String,
    pub current_stock: Option<f64>,
    pub minimum_stock: Option<f64>,
    pub unit: String,
    pub supplier: Option<String>,
    pub cost_per_unit: Option<f64>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub tag_ids: Option<Vec<Uuid>>,
}

/// Partial update. Nullable columns use a double option: absent leaves the
/// value alone, `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateInventoryItem {
    pub name: Option<String>,
    pub category: Option<String>,
    pub current_stock: Option<f64>,
    pub minimum_stock: Option<f64>,
    pub unit: Option<String>,
    #[ts(optional = nullable, as = "Option<String>")]
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub supplier: Option<Option<String>>,
    #[ts(optional = nullable, as = "Option<f64>")]
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub cost_per_unit: Option<Option<f64>>,
    #[ts(optional = nullable, as = "Option<String>")]
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub location: Option<Option<String>>,
    #[ts(optional = nullable, as = "Option<String>")]
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub notes: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub tag_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct InventoryFilter {
    pub category: Option<String>,
    pub tag_id: Option<Uuid>,
    pub search: Option<String>,
    pub low_stock: Option<bool>,
    pub include_inactive: Option<bool>,
}

fn check_quantity(label: &str, value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ValidationError::new(format!(
            "{label} must be a non-negative number"
        ))),
        _ => Ok(()),
    }
}

impl CreateInventoryItem {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("Item name is required"));
        }
        if self.category.trim().is_empty() {
            return Err(ValidationError::new("Category is required"));
        }
        if self.unit.trim().is_empty() {
            return Err(ValidationError::new("Unit is required"));
        }
        check_quantity("Current stock", self.current_stock)?;
        check_quantity("Minimum stock", self.minimum_stock)?;
        check_quantity("Cost per unit", self.cost_per_unit)
    }
}

impl UpdateInventoryItem {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (label, value) in [
            ("Item name", &self.name),
            ("Category", &self.category),
            ("Unit", &self.unit),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ValidationError::new(format!("{label} cannot be empty")));
            }
        }
        check_quantity("Current stock", self.current_stock)?;
        check_quantity("Minimum stock", self.minimum_stock)?;
        check_quantity("Cost per unit", self.cost_per_unit.flatten())
    }
}

impl InventoryItem {
    pub async fn find_filtered(
        pool: &SqlitePool,
        filter: &InventoryFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COLUMNS} FROM inventory_items i WHERE 1 = 1"
        ));
        if !filter.include_inactive.unwrap_or(false) {
            query.push(" AND i.is_active = 1");
        }
        if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
            query.push(" AND i.category = ").push_bind(category.to_string());
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            query
                .push(" AND (i.name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR i.supplier LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if filter.low_stock.unwrap_or(false) {
            query.push(" AND i.current_stock < i.minimum_stock");
        }
        if let Some(tag_id) = filter.tag_id {
            query.push(" AND ");
            TagTarget::Inventory.push_has_tag(&mut query, "i.id", tag_id);
        }
        query.push(" ORDER BY i.category ASC, i.name COLLATE NOCASE ASC");

        query.build_query_as::<InventoryItem>().fetch_all(pool).await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {COLUMNS} FROM inventory_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Item whose name matches `name` ignoring case and spacing.
    pub async fn find_by_name_ci(
        pool: &SqlitePool,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {COLUMNS} FROM inventory_items WHERE name_key = $1"
        ))
        .bind(utils::text::name_key(name))
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        conn: &mut SqliteConnection,
        data: &CreateInventoryItem,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, InventoryItem>(&format!(
            r#"INSERT INTO inventory_items (id, name, name_key, category, current_stock, minimum_stock, unit, supplier, cost_per_unit, location, notes, is_active, created_at, updated_at)
               VALUES ($1, $2, $12, $3, $4, $5, $6, $7, $8, $9, $10, 1, $11, $11)
               RETURNING {COLUMNS}"#
        ))
        .bind(id)
        .bind(utils::text::normalize_name(&data.name))
        .bind(data.category.trim())
        .bind(data.current_stock.unwrap_or(0.0))
        .bind(data.minimum_stock.unwrap_or(0.0))
        .bind(data.unit.trim())
        .bind(&data.supplier)
        .bind(data.cost_per_unit)
        .bind(&data.location)
        .bind(&data.notes)
        .bind(now)
        .bind(utils::text::name_key(&data.name))
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn update(
        conn: &mut SqliteConnection,
        existing: &InventoryItem,
        data: &UpdateInventoryItem,
    ) -> Result<Self, sqlx::Error> {
        let name = data
            .name
            .as_deref()
            .map(utils::text::normalize_name)
            .unwrap_or_else(|| existing.name.clone());
        let category = data
            .category
            .as_deref()
            .map(|c| c.trim().to_string())
            .unwrap_or_else(|| existing.category.clone());
        let unit = data
            .unit
            .as_deref()
            .map(|u| u.trim().to_string())
            .unwrap_or_else(|| existing.unit.clone());
        let supplier = data.supplier.clone().unwrap_or_else(|| existing.supplier.clone());
        let cost_per_unit = data.cost_per_unit.unwrap_or(existing.cost_per_unit);
        let location = data.location.clone().unwrap_or_else(|| existing.location.clone());
        let notes = data.notes.clone().unwrap_or_else(|| existing.notes.clone());

        sqlx::query_as::<_, InventoryItem>(&format!(
            r#"UPDATE inventory_items
               SET name = $2, name_key = $13, category = $3, current_stock = $4, minimum_stock = $5, unit = $6,
                   supplier = $7, cost_per_unit = $8, location = $9, notes = $10, is_active = $11,
                   updated_at = $12
               WHERE id = $1
               RETURNING {COLUMNS}"#
        ))
        .bind(existing.id)
        .bind(&name)
        .bind(category)
        .bind(data.current_stock.unwrap_or(existing.current_stock))
        .bind(data.minimum_stock.unwrap_or(existing.minimum_stock))
        .bind(unit)
        .bind(supplier)
        .bind(cost_per_unit)
        .bind(location)
        .bind(notes)
        .bind(data.is_active.unwrap_or(existing.is_active))
        .bind(Utc::now())
        .bind(utils::text::name_key(&name))
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn set_stock(
        conn: &mut SqliteConnection,
        id: Uuid,
        stock: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE inventory_items SET current_stock = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(stock)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Delete the item together with checklist links and favorites pointing at it.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let mut tx = crate::begin_write(pool).await?;
        ConnectedItem::delete_for_target(&mut *tx, ConnectedItemType::Inventory, id).await?;
        Favorite::delete_for_target(&mut *tx, FavoriteKind::Inventory, id).await?;
        let result = sqlx::query("DELETE FROM inventory_items WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

impl InventoryItemWithTags {
    pub async fn load(pool: &SqlitePool, item: InventoryItem) -> Result<Self, sqlx::Error> {
        let tags = Tag::find_for(pool, TagTarget::Inventory, item.id).await?;
        Ok(Self::from_parts(item, tags))
    }

    pub async fn load_many(
        pool: &SqlitePool,
        items: Vec<InventoryItem>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut links = Tag::links_for(pool, TagTarget::Inventory).await?;
        Ok(items
            .into_iter()
            .map(|item| {
                let tags = links.remove(&item.id).unwrap_or_default();
                Self::from_parts(item, tags)
            })
            .collect())
    }

    fn from_parts(item: InventoryItem, tags: Vec<Tag>) -> Self {
        Self {
            is_low_stock: item.is_low_stock(),
            item,
            tags,
        }
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

    fn sample(name: &str) -> CreateInventoryItem {
        CreateInventoryItem {
            name: name.to_string(),
            category: "Dry goods".to_string(),
            current_stock: Some(3.0),
            minimum_stock: Some(5.0),
            unit: "kg".to_string(),
            supplier: Some("Okada Foods".to_string()),
            cost_per_unit: Some(420.0),
            location: Some("Shelf B".to_string()),
            notes: None,
            tag_ids: None,
        }
    }

    async fn insert(pool: &SqlitePool, data: &CreateInventoryItem) -> InventoryItem {
        let mut conn = pool.acquire().await.unwrap();
        InventoryItem::create(&mut conn, data, Uuid::new_v4()).await.unwrap()
    }

    #[tokio::test]
    async fn create_then_fetch_returns_same_fields() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = insert(&db.pool, &sample("  Rice   flour ")).await;
        let fetched = InventoryItem::find_by_id(&db.pool, created.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.name, "Rice flour");
        assert_eq!(fetched.supplier.as_deref(), Some("Okada Foods"));
        assert!(fetched.is_low_stock());
    }

    #[tokio::test]
    async fn find_by_name_ignores_case() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = insert(&db.pool, &sample("Mirin")).await;
        let found = InventoryItem::find_by_name_ci(&db.pool, "MIRIN").await.unwrap();
        assert_eq!(found.map(|i| i.id), Some(created.id));
    }

    #[tokio::test]
    async fn non_ascii_names_collide_ignoring_case() {
        let db = DBService::new_in_memory().await.unwrap();
        let apples = insert(&db.pool, &sample("Äpfel")).await;
        let found = InventoryItem::find_by_name_ci(&db.pool, " äpfel ").await.unwrap();
        assert_eq!(found.map(|i| i.id), Some(apples.id));

        let mut conn = db.pool.acquire().await.unwrap();
        let err = InventoryItem::create(&mut conn, &sample("ÄPFEL"), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(e) if e.is_unique_violation()));
    }

    #[tokio::test]
    async fn filters_compose() {
        let db = DBService::new_in_memory().await.unwrap();
        let frozen = Tag::create(
            &db.pool,
            &CreateTag {
                name: "Frozen".to_string(),
                color: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let shrimp = insert(&db.pool, &sample("Shrimp")).await;
        let mut well_stocked = sample("Salt");
        well_stocked.current_stock = Some(10.0);
        let salt = insert(&db.pool, &well_stocked).await;
        let mut other_category = sample("Napkins");
        other_category.category = "Supplies".to_string();
        insert(&db.pool, &other_category).await;

        let mut conn = db.pool.acquire().await.unwrap();
        Tag::set_links(&mut conn, TagTarget::Inventory, shrimp.id, &[frozen.id])
            .await
            .unwrap();
        drop(conn);

        let by_tag = InventoryItem::find_filtered(
            &db.pool,
            &InventoryFilter {
                tag_id: Some(frozen.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_tag.iter().map(|i| i.id).collect::<Vec<_>>(), vec![shrimp.id]);

        let low = InventoryItem::find_filtered(
            &db.pool,
            &InventoryFilter {
                category: Some("Dry goods".to_string()),
                low_stock: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(low.iter().map(|i| i.id).collect::<Vec<_>>(), vec![shrimp.id]);

        let searched = InventoryItem::find_filtered(
            &db.pool,
            &InventoryFilter {
                search: Some("sal".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(searched.iter().map(|i| i.id).collect::<Vec<_>>(), vec![salt.id]);
    }

    #[tokio::test]
    async fn update_merges_and_clears_fields() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = insert(&db.pool, &sample("Sake")).await;
        let update: UpdateInventoryItem =
            serde_json::from_str(r#"{"minimum_stock": 1, "supplier": null}"#).unwrap();

        let mut conn = db.pool.acquire().await.unwrap();
        let updated = InventoryItem::update(&mut conn, &created, &update).await.unwrap();
        assert_eq!(updated.minimum_stock, 1.0);
        assert_eq!(updated.supplier, None);
        assert_eq!(updated.location, created.location);
        assert_eq!(updated.name, "Sake");
    }

    #[tokio::test]
    async fn deleted_item_disappears_from_list() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = insert(&db.pool, &sample("Nori")).await;
        assert_eq!(InventoryItem::delete(&db.pool, created.id).await.unwrap(), 1);
        let all = InventoryItem::find_filtered(&db.pool, &InventoryFilter::default())
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn validation_rejects_negative_stock() {
        let mut data = sample("Oil");
        data.current_stock = Some(-1.0);
        assert!(data.validate().is_err());

        let update = UpdateInventoryItem {
            name: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[tokio::test]
    async fn delete_removes_links_and_favorites() {
        let db = DBService::new_in_memory().await.unwrap();
        let wasabi = insert(&db.pool, &sample("Wasabi")).await;
        let item_id = link_and_favorite(
            &db.pool,
            ConnectedItemType::Inventory,
            FavoriteKind::Inventory,
            wasabi.id,
        )
        .await;
        assert_eq!(links_and_favorites(&db.pool, item_id).await, (1, 1));

        assert_eq!(InventoryItem::delete(&db.pool, wasabi.id).await.unwrap(), 1);
        assert_eq!(links_and_favorites(&db.pool, item_id).await, (0, 0));
    }

    #[test]
    fn clearable_fields_are_optional_and_nullable() {
        let decl = UpdateInventoryItem::decl();
        assert!(decl.contains("supplier?: string | null"), "{decl}");
        assert!(decl.contains("cost_per_unit?: number | null"), "{decl}");

        let absent: UpdateInventoryItem = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.supplier, None);
        let cleared: UpdateInventoryItem =
            serde_json::from_str(r#"{ "supplier": null }"#).unwrap();
        assert_eq!(cleared.supplier, Some(None));
    }
}
