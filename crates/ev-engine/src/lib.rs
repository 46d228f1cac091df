//! ev-engine: migration orchestration for Evolve
//!
//! Merges registered and discovered migrations into one version-ordered set,
//! serializes runs across processes through the metadata lock, executes each
//! applicable migration in order, and records every attempt.

pub mod error;
pub mod lock;
pub mod migration;
pub mod orchestrator;
pub mod resolver;
pub mod script;
pub mod source;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use error::{EngineError, EngineResult};
pub use lock::{wait_for_release, LockWait, WaitPolicy};
pub use migration::{Migration, SharedMigration};
pub use orchestrator::{CurrentVersion, MigrateOutcome, Orchestrator};
pub use resolver::{resolve, ResolvedMigrations};
pub use script::ScriptMigration;
pub use source::{DirectorySource, MigrationSource};
