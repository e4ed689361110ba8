use std::sync::OnceLock;

use chrono::{
  Datelike,
  Days,
  NaiveDate
};
use regex::Regex;
use thiserror::Error;

/// Number of cells in a month grid: six
/// Monday-first weeks.
pub const GRID_CELLS: usize = 42;

#[derive(
  Debug, Clone, PartialEq, Eq, Error,
)]
pub enum FormatError {
  #[error(
    "invalid date `{0}`; expected \
     YYYY-MM-DD"
  )]
  Date(String),
  #[error(
    "invalid time `{0}`; expected \
     HH:MM"
  )]
  Time(String),
  #[error(
    "invalid time range `{0}`; \
     expected HH:MM-HH:MM with the \
     end after the start"
  )]
  Range(String),
  #[error(
    "month {month} of year {year} is \
     out of range"
  )]
  Month { year: i32, month: u32 }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct GridCell {
  pub date:             NaiveDate,
  pub in_current_month: bool
}

fn iso_date_re()
-> Option<&'static Regex> {
  static RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(
      r"^(?P<year>\d{4})-(?P<month>\d{2})-(?P<day>\d{2})$"
    )
    .ok()
  })
  .as_ref()
}

fn clock_re()
-> Option<&'static Regex> {
  static RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(
      r"^(?P<hour>\d{2}):(?P<minute>\d{2})$"
    )
    .ok()
  })
  .as_ref()
}

#[must_use]
pub fn to_iso_date(
  date: NaiveDate
) -> String {
  date.format("%Y-%m-%d").to_string()
}

pub fn from_iso_date(
  raw: &str
) -> Result<NaiveDate, FormatError> {
  let trimmed = raw.trim();
  let captures = iso_date_re()
    .and_then(|re| re.captures(trimmed))
    .ok_or_else(|| {
      FormatError::Date(
        raw.to_string()
      )
    })?;

  let field = |name: &str| {
    captures
      .name(name)
      .and_then(|m| {
        m.as_str().parse::<u32>().ok()
      })
  };
  let (Some(year), Some(month), Some(day)) =
    (field("year"), field("month"), field("day"))
  else {
    return Err(FormatError::Date(
      raw.to_string()
    ));
  };

  NaiveDate::from_ymd_opt(
    year as i32,
    month,
    day
  )
  .ok_or_else(|| {
    FormatError::Date(raw.to_string())
  })
}

pub fn minutes_of_day(
  raw: &str
) -> Result<u32, FormatError> {
  let captures = clock_re()
    .and_then(|re| re.captures(raw.trim()))
    .ok_or_else(|| {
      FormatError::Time(raw.to_string())
    })?;

  let hour = captures
    .name("hour")
    .and_then(|m| {
      m.as_str().parse::<u32>().ok()
    });
  let minute = captures
    .name("minute")
    .and_then(|m| {
      m.as_str().parse::<u32>().ok()
    });

  match (hour, minute) {
    | (Some(hour), Some(minute))
      if hour <= 23 && minute <= 59 =>
    {
      Ok(hour * 60 + minute)
    }
    | _ => {
      Err(FormatError::Time(
        raw.to_string()
      ))
    }
  }
}

#[must_use]
pub fn format_minutes(
  minutes: u32
) -> String {
  format!(
    "{:02}:{:02}",
    minutes / 60,
    minutes % 60
  )
}

/// Splits a `HH:MM-HH:MM` label into its
/// start and end minute-of-day values.
pub fn parse_time_range(
  raw: &str
) -> Result<(u32, u32), FormatError> {
  let range_err = || {
    FormatError::Range(raw.to_string())
  };
  let (start, end) = raw
    .trim()
    .split_once('-')
    .ok_or_else(range_err)?;
  let start = minutes_of_day(start)
    .map_err(|_| range_err())?;
  let end = minutes_of_day(end)
    .map_err(|_| range_err())?;
  if end <= start {
    return Err(range_err());
  }
  Ok((start, end))
}

#[must_use]
pub fn format_time_range(
  start: &str,
  end: &str
) -> String {
  format!("{start}-{end}")
}

pub fn first_of_month(
  year: i32,
  month: u32
) -> Result<NaiveDate, FormatError> {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .ok_or(FormatError::Month {
    year,
    month
  })
}

/// Builds the fixed 6x7 grid for a month,
/// starting on the Monday on or before
/// the 1st. Leading and trailing cells
/// carry real dates from the adjacent
/// months.
pub fn month_grid(
  year: i32,
  month: u32
) -> Result<Vec<GridCell>, FormatError> {
  let first =
    first_of_month(year, month)?;
  let lead = u64::from(
    first
      .weekday()
      .num_days_from_monday()
  );
  let grid_start = first
    .checked_sub_days(Days::new(lead))
    .ok_or(FormatError::Month {
      year,
      month
    })?;

  Ok(
    grid_start
      .iter_days()
      .take(GRID_CELLS)
      .map(|date| {
        GridCell {
          date,
          in_current_month: date
            .year()
            == year
            && date.month() == month
        }
      })
      .collect()
  )
}

/// Moves a (year, month) pair by `delta`
/// months, wrapping the year. Fails when
/// the result leaves the calendar range.
pub fn shift_month(
  year: i32,
  month: u32,
  delta: i32
) -> Result<(i32, u32), FormatError> {
  let index = i64::from(year) * 12
    + i64::from(month)
    - 1
    + i64::from(delta);
  let shifted_year =
    i32::try_from(index.div_euclid(12))
      .map_err(|_| {
        FormatError::Month {
          year,
          month
        }
      })?;
  let shifted_month =
    index.rem_euclid(12) as u32 + 1;

  first_of_month(
    shifted_year,
    shifted_month
  )?;
  Ok((shifted_year, shifted_month))
}

pub fn month_label(
  year: i32,
  month: u32
) -> Result<String, FormatError> {
  Ok(
    first_of_month(year, month)?
      .format("%B %Y")
      .to_string()
  )
}

#[must_use]
pub fn day_label(
  date: NaiveDate
) -> String {
  date
    .format("%A, %b %-d, %Y")
    .to_string()
}
