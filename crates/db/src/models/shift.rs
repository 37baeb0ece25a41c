use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::like_pattern;

/// Area of the restaurant a piece of content or a checklist applies to.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "workplace", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Workplace {
    Hall,
    Kitchen,
    #[default]
    Common,
}

/// Part of the business day. Declaration order is the order of the day.
#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sqlx(type_name = "time_slot", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimeSlot {
    Morning,
    Lunch,
    Evening,
    Closing,
    #[default]
    Anytime,
}

/// Query-string filter shared by manuals and precautions.
///
/// A workplace filter also matches `common` records and a time slot filter
/// also matches `anytime` records, since those apply everywhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ContentFilter {
    pub workplace: Option<Workplace>,
    pub time_slot: Option<TimeSlot>,
    pub category: Option<String>,
    pub tag_id: Option<Uuid>,
    pub search: Option<String>,
    pub include_inactive: Option<bool>,
}

/// Appends the workplace/time-slot/category/active conditions for the table
/// aliased `alias`.
pub(crate) fn push_scope_filters(
    query: &mut QueryBuilder<'_, Sqlite>,
    alias: &str,
    workplace: Option<Workplace>,
    time_slot: Option<TimeSlot>,
    category: Option<&str>,
    include_inactive: bool,
) {
    if !include_inactive {
        query.push(format!(" AND {alias}.is_active = 1"));
    }
    if let Some(workplace) = workplace {
        query
            .push(format!(" AND ({alias}.workplace = "))
            .push_bind(workplace)
            .push(format!(" OR {alias}.workplace = "))
            .push_bind(Workplace::Common)
            .push(")");
    }
    if let Some(time_slot) = time_slot {
        query
            .push(format!(" AND ({alias}.time_slot = "))
            .push_bind(time_slot)
            .push(format!(" OR {alias}.time_slot = "))
            .push_bind(TimeSlot::Anytime)
            .push(")");
    }
    if let Some(category) = category.filter(|c| !c.is_empty()) {
        query
            .push(format!(" AND {alias}.category = "))
            .push_bind(category.to_string());
    }
}

/// Appends a title/content substring match for the table aliased `alias`.
pub(crate) fn push_text_search(query: &mut QueryBuilder<'_, Sqlite>, alias: &str, search: Option<&str>) {
    if let Some(search) = search.filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        query
            .push(format!(" AND ({alias}.title LIKE "))
            .push_bind(pattern.clone())
            .push(format!(" ESCAPE '\\' OR {alias}.content LIKE "))
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn time_slots_sort_in_day_order() {
        let mut slots = vec![TimeSlot::Closing, TimeSlot::Morning, TimeSlot::Anytime, TimeSlot::Lunch];
        slots.sort();
        assert_eq!(
            slots,
            vec![TimeSlot::Morning, TimeSlot::Lunch, TimeSlot::Closing, TimeSlot::Anytime]
        );
    }

    #[test]
    fn workplace_round_trips_through_strings() {
        assert_eq!(Workplace::from_str("kitchen").unwrap(), Workplace::Kitchen);
        assert_eq!(Workplace::Hall.to_string(), "hall");
        assert!(Workplace::from_str("garage").is_err());
    }
}
