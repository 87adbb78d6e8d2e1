//! vox-core: domain types and scheduling math for the vox voice assistant

pub mod alarm;
pub mod config;
pub mod finance;
pub mod geo;
pub mod location;
pub mod recurrence;
pub mod reminder;
pub mod scheduler;
pub mod task;
pub mod time;

pub use alarm::Alarm;
pub use config::EngineConfig;
pub use finance::{Category, FinanceEntry, TransactionType};
pub use geo::{distance_meters, within_radius};
pub use location::{
    Coordinates, LocationData, LocationRecurrence, LocationTarget, LocationType, PlaceCategory,
    TimeConstraint, Transition, TriggerType, DEFAULT_RADIUS_METERS,
};
pub use recurrence::{RecurrenceRule, RecurrenceType};
pub use reminder::{Reminder, ReminderStatus, ReminderType};
pub use scheduler::{
    first_occurrence_after, matches_date, next_occurrence, next_occurrence_after, occurrences_in_range,
};
pub use task::{Task, TaskPriority};
