use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use vox_core::time::{format_friendly, local_to_utc};
use vox_core::{Coordinates, next_occurrence};
use vox_engine::ports::{AlarmStore, ReminderStore};

mod calendar;
mod config;
mod geofence_cmd;
mod session;
mod state;

use crate::session::{Session, user_error};

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("VOX_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "vox", version, long_version = LONG_VERSION, about = "Voice-command reminders, alarms, tasks and places")]
struct Cli {
    /// Pin the clock, e.g. 2026-10-19T09:00 (defaults to now in the profile timezone)
    #[arg(long, global = true, value_parser = parse_now)]
    now: Option<NaiveDateTime>,

    /// Print machine-readable JSON instead of sentences
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a transcript through the router, as if it had been spoken
    Say {
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Show how a transcript parses without saving anything
    Parse {
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// List stored items
    List {
        #[arg(value_enum, default_value_t = ListKind::All)]
        what: ListKind,
    },

    /// Next occurrences of a recurring reminder or alarm
    Next {
        id: i64,

        #[arg(long, default_value_t = 5)]
        count: usize,
    },

    /// Everything scheduled in a month (YYYY-MM, default: this month)
    Calendar { month: Option<String> },

    /// Simulate the system alarm for a reminder or alarm going off
    Fire { kind: ItemKind, id: i64 },

    /// Snooze a reminder, alarm or location reminder
    Snooze {
        kind: ItemKind,
        id: i64,

        #[arg(long)]
        minutes: Option<i64>,
    },

    /// Turn an alarm on or off
    Alarm {
        id: i64,

        #[arg(long, default_value_t = false)]
        off: bool,
    },

    /// Delete an item
    Delete { kind: ItemKind, id: i64 },

    /// Location events and permission changes
    Geofence {
        #[command(subcommand)]
        command: geofence_cmd::GeofenceCommand,
    },

    /// Spending by category for a month (YYYY-MM, default: this month)
    Summary { month: Option<String> },

    /// Saved named places
    Places {
        #[command(subcommand)]
        command: PlacesCommand,
    },

    /// Config file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ListKind {
    All,
    Reminders,
    Alarms,
    Tasks,
    Locations,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ItemKind {
    Reminder,
    Alarm,
    Task,
    Location,
}

#[derive(Subcommand, Debug)]
enum PlacesCommand {
    /// Save (or move) a named place
    Add {
        name: String,
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },

    /// Show saved places
    List,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default ~/.vox/config.toml
    Init,

    /// Print the effective config
    Show,
}

fn parse_now(s: &str) -> Result<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .with_context(|| format!("expected YYYY-MM-DDTHH:MM, got {s:?}"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("VOX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let json = cli.json;

    match cli.command {
        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                let cfg = config::load_config()?;
                println!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },

        Command::Places { command } => match command {
            PlacesCommand::Add { name, latitude, longitude } => {
                let at = Coordinates::new(latitude, longitude);
                if !at.is_valid() {
                    bail!("coordinates out of range: {latitude}, {longitude}");
                }
                let mut cfg = config::load_config()?;
                cfg.upsert_place(&name, at);
                config::save_config(&cfg)?;
                println!("Saved {name}.");
            }
            PlacesCommand::List => {
                let cfg = config::load_config()?;
                if cfg.places.is_empty() {
                    println!("(no saved places; add one with `vox places add home <lat> <lon>`)");
                }
                for p in &cfg.places {
                    println!("- {}: {:.5}, {:.5}", p.name, p.latitude, p.longitude);
                }
            }
        },

        Command::Parse { text } => {
            let session = Session::open(cli.now).await?;
            let command = session.engine.parser.parse(&text.join(" "), session.now());
            match command {
                Ok(command) => println!("{}", serde_json::to_string_pretty(&command)?),
                Err(e) => bail!("{} ({:?})", e.message, e.kind),
            }
        }

        Command::Say { text } => {
            let session = Session::open(cli.now).await?;
            let response = session.engine.handle(&text.join(" ")).await.map_err(user_error)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.message);
            }
            session.save().await?;
        }

        Command::List { what } => {
            let session = Session::open(cli.now).await?;
            list(&session, what, json).await?;
        }

        Command::Next { id, count } => {
            let session = Session::open(cli.now).await?;
            let (start, rule) = if let Some(r) = session.mem.store.reminder(id).await? {
                (r.scheduled_time, r.recurrence()?)
            } else if let Some(a) = session.mem.store.alarm(id).await? {
                (Some(a.scheduled_time), a.recurrence()?)
            } else {
                bail!("no reminder or alarm with id {id}");
            };
            let Some(mut at) = start else {
                bail!("item {id} is not time-based");
            };
            let mut times = vec![at];
            if let Some(rule) = rule {
                while times.len() < count {
                    match next_occurrence(at, &rule) {
                        Some(next) => {
                            times.push(next);
                            at = next;
                        }
                        None => break,
                    }
                }
            }
            if json {
                let tz = session.config.timezone()?;
                let rows = times
                    .iter()
                    .map(|t| Ok(serde_json::json!({ "local": t, "utc": local_to_utc(*t, tz)? })))
                    .collect::<Result<Vec<_>>>()?;
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for t in times {
                    println!("{}", format_friendly(t));
                }
            }
        }

        Command::Calendar { month } => {
            let session = Session::open(cli.now).await?;
            let (year, month) = match month {
                Some(m) => calendar::parse_month(&m)?,
                None => {
                    let today = session.now().date();
                    (today.year(), today.month())
                }
            };
            let reminders = session.mem.store.reminders().await?;
            let alarms = session.mem.store.alarms().await?;
            let entries = calendar::month_entries(&reminders, &alarms, year, month)?;
            print!("{}", calendar::render(&entries));
        }

        Command::Fire { kind, id } => {
            let session = Session::open(cli.now).await?;
            let next = match kind {
                ItemKind::Reminder => session.engine.reminders.on_fired(id).await,
                ItemKind::Alarm => session.engine.alarms.on_fired(id).await,
                ItemKind::Task | ItemKind::Location => bail!("only reminders and alarms fire on a timer"),
            }
            .map_err(user_error)?;
            for n in session.mem.notifier.sent().await {
                println!("[{}] {}: {}", n.channel, n.title, n.body);
            }
            match next {
                Some(at) => println!("Next: {}", format_friendly(at)),
                None => println!("No further occurrences."),
            }
            session.save().await?;
        }

        Command::Snooze { kind, id, minutes } => {
            let session = Session::open(cli.now).await?;
            let until = match kind {
                ItemKind::Reminder => session.engine.reminders.snooze(id, minutes).await,
                ItemKind::Alarm => session.engine.alarms.snooze(id, minutes).await,
                ItemKind::Location => session.engine.locations.snooze(id, minutes).await,
                ItemKind::Task => bail!("tasks can't be snoozed"),
            }
            .map_err(user_error)?;
            println!("Snoozed until {}.", format_friendly(until));
            session.save().await?;
        }

        Command::Alarm { id, off } => {
            let session = Session::open(cli.now).await?;
            let alarm = session.engine.alarms.set_enabled(id, !off).await.map_err(user_error)?;
            if alarm.enabled {
                println!("Alarm {id} on for {}.", format_friendly(alarm.scheduled_time));
            } else {
                println!("Alarm {id} off.");
            }
            session.save().await?;
        }

        Command::Delete { kind, id } => {
            let session = Session::open(cli.now).await?;
            match kind {
                ItemKind::Reminder => session.engine.reminders.delete(id).await,
                ItemKind::Alarm => session.engine.alarms.delete(id).await,
                ItemKind::Task => session.engine.tasks.delete(id).await,
                ItemKind::Location => session.engine.locations.delete(id).await,
            }
            .map_err(user_error)?;
            println!("Deleted.");
            session.save().await?;
        }

        Command::Geofence { command } => {
            let mut session = Session::open(cli.now).await?;
            geofence_cmd::run(&mut session, command, json).await?;
        }

        Command::Summary { month } => {
            let session = Session::open(cli.now).await?;
            let month = month.as_deref().map(calendar::parse_month).transpose()?;
            let totals = session.engine.finance.monthly_summary(month).await.map_err(user_error)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&totals)?);
            } else if totals.is_empty() {
                println!("(no entries)");
            } else {
                for t in &totals {
                    println!("- {} ({} entries)", t.summary, t.entry_count);
                }
                let net = session.engine.finance.net_by_currency().await.map_err(user_error)?;
                for (currency, amount) in net {
                    println!("Net {currency}: {amount:+.2}");
                }
            }
        }
    }

    Ok(())
}

async fn list(session: &Session, what: ListKind, json: bool) -> Result<()> {
    let engine = &session.engine;
    let show = |kind: ListKind| what == ListKind::All || what == kind;

    if show(ListKind::Reminders) {
        let reminders = engine.reminders.upcoming().await.map_err(user_error)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&reminders)?);
        } else {
            println!("## Reminders");
            for r in &reminders {
                let when = r.scheduled_time.map(format_friendly).unwrap_or_default();
                let repeat = r.recurrence()?.map(|rule| format!(" ({})", rule.describe())).unwrap_or_default();
                println!("[{}] {when}  {}{repeat}", r.id, r.message);
            }
        }
    }
    if show(ListKind::Locations) {
        let pending = engine.locations.pending().await.map_err(user_error)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&pending)?);
        } else {
            println!("## Location reminders");
            for r in &pending {
                let place = r.location()?.map(|d| d.target.display_name()).unwrap_or_default();
                println!("[{}] at {place}  {}", r.id, r.message);
            }
        }
    }
    if show(ListKind::Alarms) {
        let alarms = engine.alarms.list().await.map_err(user_error)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&alarms)?);
        } else {
            println!("## Alarms");
            for a in &alarms {
                let state = if a.enabled { "on " } else { "off" };
                println!("[{}] {state} {}  {}", a.id, format_friendly(a.scheduled_time), a.label);
            }
        }
    }
    if show(ListKind::Tasks) {
        let tasks = engine.tasks.open_tasks().await.map_err(user_error)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        } else {
            println!("## Tasks");
            let today = session.now().date();
            for t in &tasks {
                let due = t.due_date.map(|d| format!(" due {}", d.format("%a %b %-d"))).unwrap_or_default();
                let overdue = if t.is_overdue(today) { " (overdue)" } else { "" };
                println!("[{}] {:?}  {}{due}{overdue}", t.id, t.priority, t.title);
            }
        }
    }
    Ok(())
}
