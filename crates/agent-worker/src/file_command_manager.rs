// Provisions the designated file command files for a step and processes
// them once after the step process exits. Each category maps to a distinct
// mutation target: environment overlay, step outputs, intra-action state,
// and prepended path entries.

use std::fmt;
use std::fs;

use anyhow::Context;
use uuid::Uuid;

use crate::command_applier::{apply_file_entries, apply_path_entries};
use crate::execution_context::{ExecutionContext, Issue, IssueSeverity};
use crate::file_command::{self, FileCommandError};

/// The file command categories, one designated file each per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCommandCategory {
    Env,
    Output,
    State,
    Path,
}

impl FileCommandCategory {
    pub const ALL: [FileCommandCategory; 4] = [
        FileCommandCategory::Env,
        FileCommandCategory::Output,
        FileCommandCategory::State,
        FileCommandCategory::Path,
    ];

    /// Environment variable exported to the step process with the file path.
    pub fn env_var_name(self) -> &'static str {
        match self {
            FileCommandCategory::Env => "ENV_FILE",
            FileCommandCategory::Output => "OUTPUT_FILE",
            FileCommandCategory::State => "STATE_FILE",
            FileCommandCategory::Path => "PATH_FILE",
        }
    }

    fn file_stem(self) -> &'static str {
        match self {
            FileCommandCategory::Env => "env",
            FileCommandCategory::Output => "output",
            FileCommandCategory::State => "state",
            FileCommandCategory::Path => "path",
        }
    }
}

impl fmt::Display for FileCommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

/// Manages the file-based command channel for one step.
pub struct FileCommandManager;

impl FileCommandManager {
    /// Provision one empty temp file per category and record its path on the
    /// context, keyed by the environment variable name the step host exports.
    pub fn initialize(context: &mut ExecutionContext) {
        let temp_dir = context.temp_directory.clone();

        for category in FileCommandCategory::ALL {
            let file_path = temp_dir.join(format!(
                "{}_{}.txt",
                category.file_stem(),
                Uuid::new_v4().as_simple()
            ));

            if let Err(e) = fs::write(&file_path, "") {
                context.warning(&format!(
                    "Failed to provision {} file command file: {}",
                    category, e
                ));
                continue;
            }

            context
                .file_command_paths
                .insert(category.env_var_name().to_string(), file_path);
        }
    }

    /// Process every provisioned file command file after the step exits.
    ///
    /// A malformed file is surfaced as a step-level error annotation and
    /// applies none of its entries; processing continues with the remaining
    /// files. A missing containing directory (or any other I/O failure) means
    /// the step environment was not provisioned correctly and is fatal.
    /// Cancellation stops processing between files.
    pub fn process(context: &mut ExecutionContext) -> anyhow::Result<()> {
        for category in FileCommandCategory::ALL {
            if context.cancel_token().is_cancelled() {
                context.debug("Step cancelled; skipping remaining file commands.");
                break;
            }

            let path = match context.file_command_paths.get(category.env_var_name()) {
                Some(p) => p.clone(),
                None => continue,
            };

            let result = match category {
                FileCommandCategory::Path => file_command::read_path_entries(&path)
                    .map(|paths| apply_path_entries(context, &paths)),
                _ => file_command::read_entries(&path)
                    .map(|entries| apply_file_entries(context, category, &entries)),
            };

            match result {
                Ok(()) => {}
                Err(err @ FileCommandError::MissingDirectory { .. })
                | Err(err @ FileCommandError::Io { .. }) => {
                    return Err(err).with_context(|| {
                        format!("failed to process {} file {}", category, path.display())
                    });
                }
                Err(err) => {
                    context.annotate(Issue::new(
                        IssueSeverity::Error,
                        format!(
                            "Failed to process {} file {}: {}",
                            category,
                            path.display(),
                            err
                        ),
                    ));
                }
            }

            let _ = fs::remove_file(&path);
        }

        context.file_command_paths.clear();
        Ok(())
    }
}
