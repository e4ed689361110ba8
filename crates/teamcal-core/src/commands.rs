use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cli::{AddArgs, Command, ShowArgs};
use crate::config::{CalendarMode, Config};
use crate::datemath;
use crate::event::{EventFields, SlotFields};
use crate::filter::OwnerFilter;
use crate::session::{CalendarSession, Confirm, SubmitOutcome};
use crate::storage::KeyValueStore;

/// Asks on stderr and reads the answer from stdin. Anything but `y`/`yes`
/// counts as no, including end of input.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, message: &str) -> bool {
        let mut stderr = io::stderr().lock();
        if write!(stderr, "{message} [y/N] ").and_then(|()| stderr.flush()).is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => parse_yes(&answer),
            Err(err) => {
                warn!(error = %err, "failed reading confirmation; treating as no");
                false
            }
        }
    }
}

fn parse_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Output switches that are not part of the calendar state.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
}

#[instrument(skip(session, cfg, command))]
pub fn dispatch<S: KeyValueStore>(
    session: &mut CalendarSession<S>,
    cfg: &Config,
    command: Command,
    opts: OutputOptions,
) -> anyhow::Result<()> {
    debug!(?command, mode = ?cfg.mode, "dispatching command");

    match command {
        Command::Show(args) => cmd_show(session, cfg, &args),
        Command::Add(args) => cmd_add(session, cfg, args, opts),
        Command::Delete { id } => cmd_delete(session, id, opts),
        Command::Clear => cmd_clear(session, opts),
        Command::Members => cmd_members(session, opts),
    }
}

fn owner_filter(cfg: &Config, raw: Option<&str>) -> OwnerFilter {
    let raw = raw.unwrap_or_default();
    match cfg.mode {
        CalendarMode::FreeForm => OwnerFilter::contains(raw),
        CalendarMode::Slots => OwnerFilter::member(raw),
    }
}

fn parse_month(raw: &str) -> anyhow::Result<(i32, u32)> {
    let (year, month) = raw
        .trim()
        .split_once('-')
        .ok_or_else(|| anyhow!("invalid month `{raw}`; expected YYYY-MM"))?;
    let year = year
        .parse::<i32>()
        .with_context(|| format!("invalid year in `{raw}`"))?;
    let month = month
        .parse::<u32>()
        .with_context(|| format!("invalid month in `{raw}`"))?;
    datemath::first_of_month(year, month)?;
    Ok((year, month))
}

#[instrument(skip(session, cfg, args))]
fn cmd_show<S: KeyValueStore>(
    session: &mut CalendarSession<S>,
    cfg: &Config,
    args: &ShowArgs,
) -> anyhow::Result<()> {
    info!("command show");

    let selected: NaiveDate = match args.date.as_deref() {
        Some(raw) => datemath::from_iso_date(raw)?,
        None => session.selected_date(),
    };
    let (year, month) = match args.month.as_deref() {
        Some(raw) => parse_month(raw)?,
        None => (selected.year(), selected.month()),
    };
    let (year, month) = datemath::shift_month(year, month, args.shift)?;

    session.restore(year, month, selected, owner_filter(cfg, args.owner.as_deref()))?;
    session.refresh()
}

#[instrument(skip(session, cfg, args))]
fn cmd_add<S: KeyValueStore>(
    session: &mut CalendarSession<S>,
    cfg: &Config,
    args: AddArgs,
    opts: OutputOptions,
) -> anyhow::Result<()> {
    info!("command add");

    let outcome = match cfg.mode {
        CalendarMode::FreeForm => session.submit(&EventFields {
            title: args.title,
            owner: args.owner,
            date: args.date,
            start: args.start,
            end: args.end,
            location: args.location,
            notes: args.notes,
        })?,
        CalendarMode::Slots => session.submit_slot(&SlotFields {
            title: args.title,
            owner: args.owner,
            date: args.date,
            slot: args.slot,
            location: args.location,
            notes: args.notes,
        })?,
    };

    match outcome {
        SubmitOutcome::Created(event) => {
            if !opts.json {
                println!("Created event {}.", event.id);
            }
            Ok(())
        }
        SubmitOutcome::Rejected(problems) => {
            for problem in &problems {
                eprintln!("{problem}");
            }
            Err(anyhow!("event rejected with {} problem(s)", problems.len()))
        }
    }
}

#[instrument(skip(session), fields(id = %id))]
fn cmd_delete<S: KeyValueStore>(
    session: &mut CalendarSession<S>,
    id: Uuid,
    opts: OutputOptions,
) -> anyhow::Result<()> {
    info!("command delete");

    if session.store().get(id).is_none() {
        warn!("no event with this id");
        if !opts.json {
            println!("No event {id}.");
        }
        return Ok(());
    }

    let removed = session.delete_event(id)?;
    if !opts.json {
        if removed {
            println!("Deleted event {id}.");
        } else {
            println!("Nothing deleted.");
        }
    }
    Ok(())
}

#[instrument(skip(session))]
fn cmd_clear<S: KeyValueStore>(
    session: &mut CalendarSession<S>,
    opts: OutputOptions,
) -> anyhow::Result<()> {
    info!("command clear");

    let before = session.store().len();
    let cleared = session.clear_all()?;
    if !opts.json {
        if cleared {
            println!("Deleted {before} event(s).");
        } else {
            println!("Nothing deleted.");
        }
    }
    Ok(())
}

fn cmd_members<S: KeyValueStore>(
    session: &CalendarSession<S>,
    opts: OutputOptions,
) -> anyhow::Result<()> {
    let team = session.team();
    if opts.json {
        let payload = serde_json::json!({
            "members": team.members(),
            "slots": team.slots(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("Members:");
    for member in team.members() {
        println!("  {:<8} {}", member.id, member.option_label());
    }
    println!("Time slots:");
    for slot in team.slots() {
        println!("  {slot}");
    }
    Ok(())
}
