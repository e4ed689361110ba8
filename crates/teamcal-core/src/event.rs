use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datemath::{self, FormatError};

/// One scheduled work item. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,

    pub title: String,

    pub owner: String,

    pub date: NaiveDate,

    /// `HH:MM`, zero padded so lexical order is chronological.
    pub start: String,

    pub end: String,

    #[serde(default)]
    pub slot: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Raw form input for the free-form variant. Every field is exactly what the
/// user typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFields {
    pub title: String,
    pub owner: String,
    pub date: String,
    pub start: String,
    pub end: String,
    pub location: String,
    pub notes: String,
}

/// Raw form input for the team variant, where the time comes from a fixed
/// slot such as `09:00-10:00`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotFields {
    pub title: String,
    pub owner: String,
    pub date: String,
    pub slot: String,
    pub location: String,
    pub notes: String,
}

impl Event {
    /// Builds an event from free-form fields the validator already accepted.
    pub fn from_fields(fields: &EventFields, now: DateTime<Utc>) -> Result<Self, FormatError> {
        let date = datemath::from_iso_date(&fields.date)?;
        let start = normalize_clock(&fields.start)?;
        let end = normalize_clock(&fields.end)?;

        Ok(Self {
            id: Uuid::new_v4(),
            title: fields.title.trim().to_string(),
            owner: fields.owner.trim().to_string(),
            date,
            start,
            end,
            slot: None,
            location: non_blank(&fields.location),
            notes: non_blank(&fields.notes),
            created_at: now,
        })
    }

    /// Builds an event from team-variant fields the validator already
    /// accepted. Start and end are taken from the slot label.
    pub fn from_slot_fields(fields: &SlotFields, now: DateTime<Utc>) -> Result<Self, FormatError> {
        let date = datemath::from_iso_date(&fields.date)?;
        let slot = fields.slot.trim();
        let (start, end) = datemath::parse_time_range(slot)?;

        Ok(Self {
            id: Uuid::new_v4(),
            title: fields.title.trim().to_string(),
            owner: fields.owner.trim().to_string(),
            date,
            start: datemath::format_minutes(start),
            end: datemath::format_minutes(end),
            slot: Some(slot.to_string()),
            location: non_blank(&fields.location),
            notes: non_blank(&fields.notes),
            created_at: now,
        })
    }

    pub fn time_range(&self) -> String {
        datemath::format_time_range(&self.start, &self.end)
    }
}

fn normalize_clock(raw: &str) -> Result<String, FormatError> {
    datemath::minutes_of_day(raw).map(datemath::format_minutes)
}

fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
