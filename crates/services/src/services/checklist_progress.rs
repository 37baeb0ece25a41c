//! Derives the completion view of a checklist instance from its raw progress rows.
//!
//! Nothing here touches the database: callers load the template, its items and
//! the instance's progress rows and hand them over. The derived state is never
//! written back as the source of truth, only the instance-level flags are.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use db::models::{
    checklist_instance::ChecklistInstance,
    checklist_item::{ChecklistItem, ChecklistItemWithConnections, ConnectedItem},
    checklist_progress::{ChecklistItemProgress, ConnectedItemProgress},
    checklist_template::ChecklistTemplate,
};
use serde::Serialize;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct ItemCompletion {
    pub is_completed: bool,
    pub completed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub connected_done: usize,
    pub connected_total: usize,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ConnectedItemView {
    #[serde(flatten)]
    #[ts(flatten)]
    pub connected: ConnectedItem,
    pub is_completed: bool,
    pub completed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ChecklistItemView {
    #[serde(flatten)]
    #[ts(flatten)]
    pub item: ChecklistItem,
    pub notes: Option<String>,
    #[serde(flatten)]
    #[ts(flatten)]
    pub completion: ItemCompletion,
    pub connected_items: Vec<ConnectedItemView>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ChecklistInstanceView {
    pub instance: ChecklistInstance,
    pub template: ChecklistTemplate,
    pub items: Vec<ChecklistItemView>,
    pub completed_items: usize,
    pub total_items: usize,
    pub required_remaining: usize,
}

/// Completion of one checklist item.
///
/// An item without connected items follows its own progress row. An item with
/// connected items is complete only when every connected item has a completed
/// progress row; the attribution then comes from the most recently completed
/// connected row.
pub fn derive_item_completion(
    item: &ChecklistItemWithConnections,
    own_progress: Option<&ChecklistItemProgress>,
    connected_progress: &HashMap<Uuid, &ConnectedItemProgress>,
) -> ItemCompletion {
    if item.connected_items.is_empty() {
        let done = own_progress.filter(|p| p.is_completed);
        return ItemCompletion {
            is_completed: done.is_some(),
            completed_by: done.and_then(|p| p.completed_by.clone()),
            completed_at: done.and_then(|p| p.completed_at),
            connected_done: 0,
            connected_total: 0,
        };
    }

    let completed: Vec<&ConnectedItemProgress> = item
        .connected_items
        .iter()
        .filter_map(|c| connected_progress.get(&c.id).copied())
        .filter(|p| p.is_completed)
        .collect();
    let connected_total = item.connected_items.len();
    let is_completed = completed.len() == connected_total;
    let latest = completed
        .iter()
        .filter(|_| is_completed)
        .max_by_key(|p| p.completed_at);

    ItemCompletion {
        is_completed,
        completed_by: latest.and_then(|p| p.completed_by.clone()),
        completed_at: latest.and_then(|p| p.completed_at),
        connected_done: completed.len(),
        connected_total,
    }
}

/// Assemble the view of one instance. Inactive items are left out.
pub fn build_instance_view(
    template: ChecklistTemplate,
    items: Vec<ChecklistItemWithConnections>,
    instance: ChecklistInstance,
    item_progress: &[ChecklistItemProgress],
    connected_progress: &[ConnectedItemProgress],
) -> ChecklistInstanceView {
    let own_by_item: HashMap<Uuid, &ChecklistItemProgress> = item_progress
        .iter()
        .map(|p| (p.checklist_item_id, p))
        .collect();
    let connected_by_id: HashMap<Uuid, &ConnectedItemProgress> = connected_progress
        .iter()
        .map(|p| (p.connected_item_id, p))
        .collect();

    let items: Vec<ChecklistItemView> = items
        .into_iter()
        .filter(|i| i.is_active)
        .map(|i| {
            let own = own_by_item.get(&i.id).copied();
            let completion = derive_item_completion(&i, own, &connected_by_id);
            let connected_items = i
                .connected_items
                .into_iter()
                .map(|connected| {
                    let progress = connected_by_id
                        .get(&connected.id)
                        .copied()
                        .filter(|p| p.is_completed);
                    ConnectedItemView {
                        is_completed: progress.is_some(),
                        completed_by: progress.and_then(|p| p.completed_by.clone()),
                        completed_at: progress.and_then(|p| p.completed_at),
                        connected,
                    }
                })
                .collect();
            ChecklistItemView {
                item: i.item,
                notes: own.and_then(|p| p.notes.clone()),
                completion,
                connected_items,
            }
        })
        .collect();

    let completed_items = items.iter().filter(|i| i.completion.is_completed).count();
    let required_remaining = items
        .iter()
        .filter(|i| i.item.is_required && !i.completion.is_completed)
        .count();

    ChecklistInstanceView {
        total_items: items.len(),
        completed_items,
        required_remaining,
        instance,
        template,
        items,
    }
}

/// Every active required item is done. Without required items every active
/// item has to be done, and an empty checklist is never complete.
pub fn is_instance_complete(view: &ChecklistInstanceView) -> bool {
    if view.items.is_empty() {
        return false;
    }
    let mut required = view.items.iter().filter(|i| i.item.is_required).peekable();
    if required.peek().is_some() {
        required.all(|i| i.completion.is_completed)
    } else {
        view.items.iter().all(|i| i.completion.is_completed)
    }
}
