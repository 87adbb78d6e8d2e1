//! vox-parse: rule-based parsing of spoken commands into typed requests.

pub mod command;
pub mod error;
pub mod finance;
pub mod location;
pub mod patterns;
pub mod recurring;
pub mod task;
pub mod time_expr;

pub use command::{CLASSIFICATION_ORDER, Command, CommandKind, CommandParser, ParsedCommand};
pub use error::{CommandError, ParseErrorKind};
pub use finance::ParsedFinanceCommand;
pub use location::ParsedLocationCommand;
pub use patterns::PatternLibrary;
pub use recurring::ParsedRecurringCommand;
pub use task::ParsedTask;
