use std::collections::BTreeMap;

use chrono::{
  Datelike,
  NaiveDate
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::datemath::{
  self,
  FormatError
};
use crate::event::Event;
use crate::filter::OwnerFilter;
use crate::team::Team;

pub const DEFAULT_PREVIEW_LIMIT: usize =
  2;
pub const EMPTY_DAY_MESSAGE: &str =
  "No events for this day.";

/// View parameters owned by the
/// controller.
#[derive(Debug, Clone)]
pub struct ViewParams<'a> {
  pub view_year:     i32,
  pub view_month:    u32,
  pub selected_date: NaiveDate,
  pub owner_filter:  &'a OwnerFilter,
  pub today:         NaiveDate,
  pub preview_limit: usize
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct EventPreview {
  pub id:          Uuid,
  pub title:       String,
  pub time_range:  String,
  pub owner_color: String
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct DayCell {
  pub date:             NaiveDate,
  pub day_of_month:     u32,
  pub in_current_month: bool,
  pub is_today:         bool,
  pub is_selected:      bool,
  pub event_count:      usize,
  pub previews:         Vec<EventPreview>,
  /// Matches beyond the previews.
  pub more:             usize
}

impl DayCell {
  #[must_use]
  pub fn more_label(
    &self
  ) -> Option<String> {
    (self.more > 0).then(|| {
      format!("+{} more", self.more)
    })
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct DayEntry {
  pub id:            Uuid,
  pub title:         String,
  pub time_range:    String,
  pub owner:         String,
  pub owner_display: String,
  pub owner_color:   String,
  pub location:      Option<String>,
  pub notes:         Option<String>
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct CalendarView {
  pub month_label:         String,
  pub today_label:         String,
  pub grid:                Vec<DayCell>,
  pub selected_date:       NaiveDate,
  pub selected_day_label:  String,
  pub selected_day_events: Vec<DayEntry>,
  pub empty_message: Option<&'static str>
}

/// Derives the render-ready month grid
/// and day panel from an event snapshot.
/// Pure: identical inputs give identical
/// output.
pub fn build_view(
  events: &[Event],
  params: &ViewParams<'_>,
  team: &Team
) -> Result<CalendarView, FormatError> {
  let cells = datemath::month_grid(
    params.view_year,
    params.view_month
  )?;

  let by_day =
    group_by_day(events, params.owner_filter);

  let grid = cells
    .into_iter()
    .map(|cell| {
      let matches = by_day
        .get(&cell.date)
        .map(Vec::as_slice)
        .unwrap_or_default();
      let previews = matches
        .iter()
        .take(params.preview_limit)
        .map(|event| {
          EventPreview {
            id:          event.id,
            title:       event
              .title
              .clone(),
            time_range:  event
              .time_range(),
            owner_color: team
              .owner_color(&event.owner)
          }
        })
        .collect::<Vec<_>>();
      DayCell {
        date: cell.date,
        day_of_month: cell.date.day(),
        in_current_month: cell
          .in_current_month,
        is_today: cell.date
          == params.today,
        is_selected: cell.date
          == params.selected_date,
        event_count: matches.len(),
        more: matches.len()
          - previews.len(),
        previews
      }
    })
    .collect::<Vec<_>>();

  let selected_day_events = by_day
    .get(&params.selected_date)
    .map(Vec::as_slice)
    .unwrap_or_default()
    .iter()
    .map(|event| {
      DayEntry {
        id:            event.id,
        title:         event
          .title
          .clone(),
        time_range:    event.time_range(),
        owner:         event
          .owner
          .clone(),
        owner_display: team
          .owner_display(&event.owner),
        owner_color:   team
          .owner_color(&event.owner),
        location:      event
          .location
          .clone(),
        notes:         event
          .notes
          .clone()
      }
    })
    .collect::<Vec<_>>();

  debug!(
    year = params.view_year,
    month = params.view_month,
    selected = %params.selected_date,
    filtered = !params.owner_filter.is_all(),
    day_events = selected_day_events.len(),
    "calendar view built"
  );

  Ok(CalendarView {
    month_label: datemath::month_label(
      params.view_year,
      params.view_month
    )?,
    today_label: format!(
      "Today: {}",
      datemath::to_iso_date(
        params.today
      )
    ),
    grid,
    selected_date: params.selected_date,
    selected_day_label:
      datemath::day_label(
        params.selected_date
      ),
    empty_message: selected_day_events
      .is_empty()
      .then_some(EMPTY_DAY_MESSAGE),
    selected_day_events
  })
}

/// Filtered events per day, each day
/// sorted by start time.
fn group_by_day<'e>(
  events: &'e [Event],
  filter: &OwnerFilter
) -> BTreeMap<NaiveDate, Vec<&'e Event>>
{
  let mut by_day: BTreeMap<
    NaiveDate,
    Vec<&Event>
  > = BTreeMap::new();
  for event in events
    .iter()
    .filter(|event| {
      filter.matches(&event.owner)
    })
  {
    by_day
      .entry(event.date)
      .or_default()
      .push(event);
  }
  for day in by_day.values_mut() {
    day.sort_by(|a, b| {
      a.start.cmp(&b.start)
    });
  }
  by_day
}
