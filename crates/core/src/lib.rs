//! Domain model, configuration and error taxonomy shared by every Soberly crate.

pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod text;

pub use domain::biometrics::{BiometricLog, BiometricSummary};
pub use domain::check_in::{CheckIn, Mood, MoodTrend};
pub use domain::coping::{CopingActivity, CopingSuggestions, StressLevel};
pub use domain::goal::{Goal, GoalId, GoalStatus};
pub use domain::intervention::Intervention;
pub use domain::journal::JournalEntry;
pub use domain::profile::{Profile, StreakSummary};
pub use domain::user::UserId;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use observability::ObservabilityRecord;
