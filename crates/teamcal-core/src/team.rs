use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::datemath;

pub const FALLBACK_OWNER_COLOR: &str = "#60a5fa";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default = "fallback_color")]
    pub color: String,
}

impl TeamMember {
    fn new(id: &str, name: &str, role: &str, color: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            role: role.to_string(),
            color: color.to_string(),
        }
    }

    /// Label used in member pickers, e.g. `Anna — Product Owner`.
    pub fn option_label(&self) -> String {
        if self.role.trim().is_empty() {
            self.name.clone()
        } else {
            format!("{} — {}", self.name, self.role)
        }
    }
}

fn fallback_color() -> String {
    FALLBACK_OWNER_COLOR.to_string()
}

pub fn default_members() -> Vec<TeamMember> {
    vec![
        TeamMember::new("anna", "Anna", "Product Owner", "#63b3ed"),
        TeamMember::new("liam", "Liam", "Developer", "#f6e05e"),
        TeamMember::new("sofia", "Sofia", "Developer", "#9f7aea"),
        TeamMember::new("noah", "Noah", "QA Engineer", "#68d391"),
    ]
}

pub fn default_slots() -> Vec<String> {
    [
        "09:00-10:00",
        "10:00-11:00",
        "11:00-12:00",
        "13:00-14:00",
        "14:00-15:00",
        "15:00-16:00",
        "16:00-17:00",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// The team and the fixed time slots its events may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    members: Vec<TeamMember>,
    slots: Vec<String>,
}

impl Default for Team {
    fn default() -> Self {
        Self {
            members: default_members(),
            slots: default_slots(),
        }
    }
}

impl Team {
    /// Builds a team from configured values. Malformed slots and members with
    /// a blank or duplicate id are dropped; an empty result falls back to the
    /// defaults.
    pub fn new(members: Vec<TeamMember>, slots: Vec<String>) -> Self {
        let mut kept_members: Vec<TeamMember> = Vec::with_capacity(members.len());
        for member in members {
            let id = member.id.trim();
            if id.is_empty() || kept_members.iter().any(|m| m.id == id) {
                warn!(id = %member.id, "dropping team member with blank or duplicate id");
                continue;
            }
            kept_members.push(TeamMember {
                id: id.to_string(),
                ..member
            });
        }

        let mut kept_slots: Vec<String> = Vec::with_capacity(slots.len());
        for slot in slots {
            let slot = slot.trim().to_string();
            match datemath::parse_time_range(&slot) {
                Ok(_) if !kept_slots.contains(&slot) => kept_slots.push(slot),
                Ok(_) => warn!(slot = %slot, "dropping duplicate time slot"),
                Err(err) => warn!(slot = %slot, error = %err, "dropping invalid time slot"),
            }
        }

        if kept_members.is_empty() {
            kept_members = default_members();
        }
        if kept_slots.is_empty() {
            kept_slots = default_slots();
        }

        Self {
            members: kept_members,
            slots: kept_slots,
        }
    }

    pub fn members(&self) -> &[TeamMember] {
        &self.members
    }

    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    pub fn member(&self, id: &str) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn has_slot(&self, slot: &str) -> bool {
        self.slots.iter().any(|s| s == slot)
    }

    /// Display name for an owner: the member name for a known id, otherwise
    /// the raw owner text.
    pub fn owner_display(&self, owner: &str) -> String {
        self.member(owner)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| owner.to_string())
    }

    pub fn owner_color(&self, owner: &str) -> String {
        self.member(owner)
            .map(|m| m.color.clone())
            .unwrap_or_else(fallback_color)
    }
}
