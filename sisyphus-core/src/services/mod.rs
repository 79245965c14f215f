//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. The enforcement
//! core is `scanner` -> `disclosure` -> `sealer`, driven by `sweep`.

mod demo;
pub mod disclosure;
pub mod logging;
pub mod migration;
pub mod scanner;
pub mod sealer;
mod status;
pub mod sweep;

pub use demo::{DemoService, DEMO_DB_FILENAME};
pub use disclosure::DisclosureFanout;
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use scanner::{BreachScanner, ScanOutcome};
pub use sealer::AccountSealer;
pub use status::{AccountSummary, StatusService, StatusSummary};
pub use sweep::{SweepOptions, SweepService};
