use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "teamcal",
    version,
    about = "Team work calendar: month grid, day agenda and event bookkeeping",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    /// Answer yes to confirmation prompts.
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    /// Print the view model as JSON instead of the text calendar.
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the month grid and the agenda of the selected day.
    Show(ShowArgs),
    /// Create an event.
    Add(AddArgs),
    /// Delete one event by id.
    Delete {
        id: Uuid,
    },
    /// Delete every event.
    Clear,
    /// List team members and time slots.
    Members,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ShowArgs {
    /// Visible month as YYYY-MM; defaults to the month of --date.
    #[arg(long)]
    pub month: Option<String>,

    /// Selected day as YYYY-MM-DD; defaults to today.
    #[arg(long)]
    pub date: Option<String>,

    /// Owner filter: substring in free-form mode, member id in slots mode.
    #[arg(long)]
    pub owner: Option<String>,

    /// Shift the visible month by N (negative goes back).
    #[arg(long, allow_hyphen_values = true, default_value_t = 0)]
    pub shift: i32,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AddArgs {
    #[arg(long, default_value = "")]
    pub title: String,

    #[arg(long, default_value = "")]
    pub owner: String,

    #[arg(long, default_value = "")]
    pub date: String,

    /// Fixed slot such as 09:00-10:00 (slots mode).
    #[arg(long, default_value = "")]
    pub slot: String,

    /// Start time HH:MM (free-form mode).
    #[arg(long, default_value = "")]
    pub start: String,

    /// End time HH:MM (free-form mode).
    #[arg(long, default_value = "")]
    pub end: String,

    #[arg(long, default_value = "")]
    pub location: String,

    #[arg(long, default_value = "")]
    pub notes: String,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli, KeyVal};

    #[test]
    fn keyval_requires_equals() {
        let kv: KeyVal = "mode = slots".parse().expect("parse keyval");
        assert_eq!(kv.key, "mode");
        assert_eq!(kv.value, "slots");
        assert!("mode".parse::<KeyVal>().is_err());
    }

    #[test]
    fn parses_add_with_global_flags_anywhere() {
        let cli = GlobalCli::parse_from([
            "teamcal",
            "add",
            "--title",
            "Standup",
            "--owner",
            "anna",
            "--date",
            "2024-03-04",
            "--slot",
            "09:00-10:00",
            "-vv",
            "--rc",
            "mode=slots",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rc_overrides.len(), 1);
        match cli.command {
            Some(Command::Add(args)) => {
                assert_eq!(args.title, "Standup");
                assert_eq!(args.slot, "09:00-10:00");
                assert!(args.start.is_empty());
            }
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn show_accepts_negative_shift() {
        let cli = GlobalCli::parse_from(["teamcal", "show", "--shift", "-2", "--owner", "liam"]);
        match cli.command {
            Some(Command::Show(args)) => {
                assert_eq!(args.shift, -2);
                assert_eq!(args.owner.as_deref(), Some("liam"));
            }
            other => panic!("expected show, got {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = GlobalCli::parse_from(["teamcal"]);
        assert!(cli.command.is_none());
        assert!(!cli.yes);
    }
}
