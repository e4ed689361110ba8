use std::fmt;

use tracing::debug;

use crate::datemath::{
  from_iso_date,
  minutes_of_day
};
use crate::event::{
  EventFields,
  SlotFields
};
use crate::team::Team;

pub const TITLE_REQUIRED: &str =
  "Title is required.";
pub const OWNER_REQUIRED: &str =
  "Owner is required.";
pub const DATE_REQUIRED: &str =
  "Date is required.";
pub const START_REQUIRED: &str =
  "Start time is required.";
pub const END_REQUIRED: &str =
  "End time is required.";
pub const END_BEFORE_START: &str =
  "End time must be after start time.";
pub const SLOT_REQUIRED: &str =
  "Time slot is required.";
pub const SLOT_INVALID: &str =
  "Invalid time slot. Please choose a \
   valid time.";
pub const OWNER_UNKNOWN: &str =
  "Unknown team member.";

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Field {
  Title,
  Owner,
  Date,
  Start,
  End,
  Slot
}

impl Field {
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Title => "title",
      | Self::Owner => "owner",
      | Self::Date => "date",
      | Self::Start => "start",
      | Self::End => "end",
      | Self::Slot => "slot"
    }
  }
}

impl fmt::Display for Field {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One field-level reason a submission
/// was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
  pub field:   Field,
  pub message: &'static str
}

impl Problem {
  fn new(
    field: Field,
    message: &'static str
  ) -> Self {
    Self {
      field,
      message
    }
  }
}

impl fmt::Display for Problem {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{}: {}",
      self.field, self.message
    )
  }
}

/// Checks a free-form submission. An
/// empty result means the fields may be
/// turned into an event.
pub fn validate_fields(
  fields: &EventFields
) -> Vec<Problem> {
  let mut problems = Vec::new();

  require_text(
    &mut problems,
    &fields.title,
    Field::Title,
    TITLE_REQUIRED
  );
  require_text(
    &mut problems,
    &fields.owner,
    Field::Owner,
    OWNER_REQUIRED
  );
  require_date(
    &mut problems,
    &fields.date
  );

  let start =
    minutes_of_day(&fields.start).ok();
  let end =
    minutes_of_day(&fields.end).ok();
  if start.is_none() {
    problems.push(Problem::new(
      Field::Start,
      START_REQUIRED
    ));
  }
  if end.is_none() {
    problems.push(Problem::new(
      Field::End,
      END_REQUIRED
    ));
  }
  if let (Some(start), Some(end)) =
    (start, end)
    && end <= start
  {
    problems.push(Problem::new(
      Field::End,
      END_BEFORE_START
    ));
  }

  debug!(
    problems = problems.len(),
    "validated free-form submission"
  );
  problems
}

/// Checks a team submission. The slot
/// must be one of the team's slots even
/// when non-empty, which rejects values
/// left over from older slot sets.
pub fn validate_slot_fields(
  fields: &SlotFields,
  team: &Team
) -> Vec<Problem> {
  let mut problems = Vec::new();

  require_text(
    &mut problems,
    &fields.title,
    Field::Title,
    TITLE_REQUIRED
  );
  require_date(
    &mut problems,
    &fields.date
  );

  let slot = fields.slot.trim();
  if slot.is_empty() {
    problems.push(Problem::new(
      Field::Slot,
      SLOT_REQUIRED
    ));
  } else if !team.has_slot(slot) {
    problems.push(Problem::new(
      Field::Slot,
      SLOT_INVALID
    ));
  }

  let owner = fields.owner.trim();
  if owner.is_empty() {
    problems.push(Problem::new(
      Field::Owner,
      OWNER_REQUIRED
    ));
  } else if team.member(owner).is_none()
  {
    problems.push(Problem::new(
      Field::Owner,
      OWNER_UNKNOWN
    ));
  }

  debug!(
    problems = problems.len(),
    "validated slot submission"
  );
  problems
}

fn require_text(
  problems: &mut Vec<Problem>,
  raw: &str,
  field: Field,
  message: &'static str
) {
  if raw.trim().is_empty() {
    problems
      .push(Problem::new(field, message));
  }
}

fn require_date(
  problems: &mut Vec<Problem>,
  raw: &str
) {
  if from_iso_date(raw).is_err() {
    problems.push(Problem::new(
      Field::Date,
      DATE_REQUIRED
    ));
  }
}
