//! vox-engine: the managers behind the voice assistant, wired to platform ports.
//!
//! `Engine` is the composition root. It owns one instance of every manager and
//! hands out references; nothing in here is a global.

pub mod alarms;
pub mod error;
pub mod finance;
pub mod gating;
pub mod geofence;
pub mod location_reminders;
pub mod memory;
pub mod ports;
pub mod reminders;
pub mod retry;
pub mod router;
pub mod tasks;

use std::sync::Arc;

use tracing::info;
use vox_core::EngineConfig;
use vox_parse::CommandParser;

pub use alarms::EnhancedAlarmManager;
pub use error::{EngineError, EngineResult, PlatformError, StoreError};
pub use finance::FinanceManager;
pub use gating::IgnoreReason;
pub use geofence::GeofenceManager;
pub use location_reminders::{LocationReminderCreated, LocationReminderManager, TransitionOutcome};
pub use ports::{AlarmKey, Ports};
pub use reminders::ReminderManager;
pub use retry::RetryPolicy;
pub use router::{CommandResponse, CommandRouter};
pub use tasks::{TaskCompletion, TaskManager};

pub struct Engine {
    pub config: EngineConfig,
    pub parser: Arc<CommandParser>,
    pub geofences: Arc<GeofenceManager>,
    pub reminders: Arc<ReminderManager>,
    pub alarms: Arc<EnhancedAlarmManager>,
    pub tasks: Arc<TaskManager>,
    pub finance: Arc<FinanceManager>,
    pub locations: Arc<LocationReminderManager>,
    router: CommandRouter,
}

impl Engine {
    pub fn new(ports: Ports, config: EngineConfig) -> anyhow::Result<Self> {
        let parser = Arc::new(CommandParser::new()?);
        let geofences = Arc::new(GeofenceManager::new(
            ports.geofencing.clone(),
            RetryPolicy::new(config.geofence_retry_attempts, config.geofence_retry_base_ms),
            config.max_geofences,
        ));
        let reminders = Arc::new(ReminderManager::new(ports.clone(), config.clone()));
        let alarms = Arc::new(EnhancedAlarmManager::new(ports.clone(), config.clone()));
        let tasks = Arc::new(TaskManager::new(ports.clone()));
        let finance = Arc::new(FinanceManager::new(ports.clone()));
        let locations = Arc::new(LocationReminderManager::new(ports.clone(), config.clone(), geofences.clone()));

        let router = CommandRouter {
            parser: parser.clone(),
            clock: ports.clock.clone(),
            reminders: reminders.clone(),
            alarms: alarms.clone(),
            tasks: tasks.clone(),
            finance: finance.clone(),
            locations: locations.clone(),
        };

        Ok(Self {
            config,
            parser,
            geofences,
            reminders,
            alarms,
            tasks,
            finance,
            locations,
            router,
        })
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    pub async fn handle(&self, text: &str) -> EngineResult<CommandResponse> {
        self.router.handle(text).await
    }

    /// Boot work: re-arm system alarms and rebuild the geofence cache.
    pub async fn start(&self) -> EngineResult<()> {
        let reminders = self.reminders.reschedule_all().await?;
        let alarms = self.alarms.reschedule_all().await?;
        let geofences = self.locations.restore_geofences().await?;
        info!(reminders, alarms, geofences, "engine started");
        Ok(())
    }
}
