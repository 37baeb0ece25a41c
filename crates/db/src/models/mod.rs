use thiserror::Error;

pub mod checklist_instance;
pub mod checklist_item;
pub mod checklist_progress;
pub mod checklist_template;
pub mod favorite;
pub mod inventory_check;
pub mod inventory_item;
pub mod manual;
pub mod precaution;
pub mod shift;
pub mod tag;

/// Input rejected before it reaches the database.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Escape LIKE wildcards in user search text and wrap it for a substring match.
pub(crate) fn like_pattern(search: &str) -> String {
    let escaped = search
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
