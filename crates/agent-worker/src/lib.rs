// agent-worker: step directive processing engine for the pipeline agent.
//
// Control flow per step:
//   FileCommandManager::initialize → (step runs; OutputScanner consumes each
//   stdout/stderr line) → FileCommandManager::process after the step exits.
// Both channels converge on command_applier, the single point of truth for
// execution-context mutation.

pub mod command_applier;
pub mod command_registry;
pub mod execution_context;
pub mod file_command;
pub mod file_command_manager;
pub mod output_scanner;

pub use command_applier::CommandChannel;
pub use execution_context::{ExecutionContext, Issue, IssueSeverity};
pub use file_command::{FileCommandEntry, FileCommandError};
pub use file_command_manager::{FileCommandCategory, FileCommandManager};
pub use output_scanner::OutputScanner;
