use anyhow::Result;
use clap::Subcommand;
use vox_core::Transition;
use vox_engine::TransitionOutcome;

use crate::config::save_config;
use crate::session::{Session, user_error};

#[derive(Subcommand, Debug)]
pub enum GeofenceCommand {
    /// Simulate the platform reporting an ENTER for a geofence id
    Enter { id: String },

    /// Simulate an EXIT
    Exit { id: String },

    /// Fire this reminder again when you leave instead of when you arrive
    SnoozeUntilLeave { reminder: i64 },

    /// Mark a location reminder done and drop its geofences
    Done { reminder: i64 },

    /// Location permission was revoked: cancel and remember pending reminders
    Revoke,

    /// Location permission is back: restore what the revoke cancelled
    Grant,

    /// Re-register reminders whose geofences went missing
    Reconcile,

    /// Geofence ids currently registered
    Status,
}

pub async fn run(session: &mut Session, cmd: GeofenceCommand, json: bool) -> Result<()> {
    let locations = session.engine.locations.clone();
    match cmd {
        GeofenceCommand::Enter { id } => transition(session, &id, Transition::Enter, json).await?,
        GeofenceCommand::Exit { id } => transition(session, &id, Transition::Exit, json).await?,
        GeofenceCommand::SnoozeUntilLeave { reminder } => {
            locations.snooze_until_leave(reminder).await.map_err(user_error)?;
            println!("Okay, I'll remind you when you leave.");
        }
        GeofenceCommand::Done { reminder } => {
            locations.complete(reminder).await.map_err(user_error)?;
            println!("Marked reminder {reminder} as done.");
        }
        GeofenceCommand::Revoke => {
            let cancelled = locations.on_permission_revoked().await.map_err(user_error)?;
            session.config.location.permission = false;
            save_config(&session.config)?;
            println!("Location permission revoked; paused {cancelled} reminder(s).");
        }
        GeofenceCommand::Grant => {
            session.config.location.permission = true;
            session.mem.permissions.set(true, session.config.location.background_permission);
            save_config(&session.config)?;
            let restored = locations.on_permission_granted().await.map_err(user_error)?;
            println!("Location permission granted; restored {restored} reminder(s).");
        }
        GeofenceCommand::Reconcile => {
            let repaired = locations.reconcile().await.map_err(user_error)?;
            if repaired.is_empty() {
                println!("All geofences are registered.");
            } else {
                println!("Re-registered reminders: {repaired:?}");
            }
        }
        GeofenceCommand::Status => {
            let ids = session.engine.geofences.tracked_ids().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&ids)?);
            } else if ids.is_empty() {
                println!("(no geofences registered)");
            } else {
                for id in ids {
                    println!("- {id}");
                }
            }
        }
    }
    session.save().await
}

async fn transition(session: &Session, id: &str, transition: Transition, json: bool) -> Result<()> {
    let outcome = session
        .engine
        .locations
        .handle_transition(id, transition)
        .await
        .map_err(user_error)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    match outcome {
        TransitionOutcome::Fired { reminder_id, completed } => {
            let done = if completed { " (done)" } else { "" };
            println!("Fired reminder {reminder_id}{done}.");
            for n in session.mem.notifier.sent().await {
                println!("  [{}] {}: {}", n.channel, n.title, n.body);
            }
        }
        TransitionOutcome::Ignored { reason } => println!("Ignored: {reason}."),
    }
    Ok(())
}
