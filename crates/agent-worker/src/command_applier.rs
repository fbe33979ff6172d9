// Command validator and state applier. Both directive channels converge
// here: inline logging commands parsed from step output, and entries parsed
// from the designated file command files. This module owns key validation,
// the channel trust policy, and last-write-wins resolution.

use agent_common::Command;

use crate::command_registry::{self, CommandKind};
use crate::execution_context::{ExecutionContext, Issue, IssueSeverity};
use crate::file_command::FileCommandEntry;
use crate::file_command_manager::FileCommandCategory;

/// The channel a directive arrived on.
///
/// The inline channel is fed from arbitrary step stdout and is not trusted
/// for state mutation; the file-based channel requires filesystem access
/// granted explicitly to the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandChannel {
    InlineLog,
    CommandFile,
}

/// Keys carrying this prefix are reserved for the agent's own bookkeeping.
const RESERVED_KEY_PREFIX: &str = "_AGENT_";

/// Validate a variable/output/state key. Returns the rejection reason on
/// failure; a rejected key drops only that entry.
pub fn validate_key(key: &str) -> Result<(), String> {
    if key.chars().any(char::is_control) {
        return Err("key contains control characters".to_string());
    }
    if key.starts_with("::") {
        return Err("key must not start with '::'".to_string());
    }
    if key
        .to_ascii_uppercase()
        .starts_with(RESERVED_KEY_PREFIX)
    {
        return Err(format!(
            "key matches the reserved prefix '{RESERVED_KEY_PREFIX}'"
        ));
    }
    Ok(())
}

/// Apply one parsed logging command to the execution context.
///
/// Unknown `(area, event)` pairs with valid syntax are reported as warnings.
/// State-mutating commands arriving on the inline channel are rejected with
/// a security warning and leave the context untouched.
pub fn apply_command(context: &mut ExecutionContext, command: &Command, channel: CommandChannel) {
    let handler = match command_registry::lookup(&command.area, &command.event) {
        Some(h) => h,
        None => {
            context.warning(&format!(
                "Unrecognized agent command '{}.{}'.",
                command.area, command.event
            ));
            return;
        }
    };

    if handler.requires_file_channel && channel == CommandChannel::InlineLog {
        context.warning(&format!(
            "Refusing '{}.{}' from step output: state mutation is only accepted \
             through the file-based channel.",
            command.area, command.event
        ));
        return;
    }

    match handler.kind {
        CommandKind::SetVariable => {
            let name = match command.properties.get("variable") {
                Some(name) => name.to_string(),
                None => {
                    context.warning("'task.setvariable' requires a 'variable' property.");
                    return;
                }
            };
            if let Err(reason) = validate_key(&name) {
                context.warning(&format!("Skipping variable '{name}': {reason}"));
                return;
            }
            let is_secret = command
                .properties
                .get("issecret")
                .is_some_and(|v| v.eq_ignore_ascii_case("true"));
            context.set_variable(&name, &command.data, is_secret);
        }
        CommandKind::SetOutput => {
            let name = match command.properties.get("name") {
                Some(name) => name.to_string(),
                None => {
                    context.warning("'task.setoutput' requires a 'name' property.");
                    return;
                }
            };
            if let Err(reason) = validate_key(&name) {
                context.warning(&format!("Skipping output '{name}': {reason}"));
                return;
            }
            context.set_output(&name, &command.data);
        }
        CommandKind::SaveState => {
            let name = match command.properties.get("name") {
                Some(name) => name.to_string(),
                None => {
                    context.warning("'task.savestate' requires a 'name' property.");
                    return;
                }
            };
            if let Err(reason) = validate_key(&name) {
                context.warning(&format!("Skipping state '{name}': {reason}"));
                return;
            }
            context.set_intra_action_state(&name, &command.data);
        }
        CommandKind::PrependPath => {
            let entry = command.data.trim();
            if entry.is_empty() {
                context.warning("'task.prependpath' requires a non-empty path.");
                return;
            }
            context.prepend_path_entry(entry);
        }
        CommandKind::SetSecret => {
            if command.data.trim().is_empty() {
                context.debug("'task.setsecret' received an empty value, ignoring.");
                return;
            }
            context.add_mask(&command.data);
        }
        CommandKind::LogIssue => {
            let severity = match command.properties.get("type") {
                Some("error") | None => IssueSeverity::Error,
                Some("warning") => IssueSeverity::Warning,
                Some("notice") => IssueSeverity::Notice,
                Some(other) => {
                    context.warning(&format!(
                        "Unknown issue type '{other}', treating as error."
                    ));
                    IssueSeverity::Error
                }
            };
            let mut issue = Issue::new(severity, command.data.clone());
            issue.file = command.properties.get("sourcepath").map(str::to_string);
            issue.line = command
                .properties
                .get("linenumber")
                .and_then(|v| v.parse().ok());
            issue.col = command
                .properties
                .get("columnnumber")
                .and_then(|v| v.parse().ok());
            context.annotate(issue);
        }
        CommandKind::Debug => {
            context.debug(&command.data);
        }
        CommandKind::GroupStart => {
            context.begin_group(&command.data);
        }
        CommandKind::GroupEnd => {
            context.end_group();
        }
    }
}

/// Apply parsed file command entries for a mapping-style category.
///
/// Entries are applied in file order, so a later entry for the same key
/// supersedes an earlier one. Applying the same sequence twice is
/// idempotent.
pub fn apply_file_entries(
    context: &mut ExecutionContext,
    category: FileCommandCategory,
    entries: &[FileCommandEntry],
) {
    for entry in entries {
        if let Err(reason) = validate_key(&entry.key) {
            context.warning(&format!(
                "Skipping {} entry '{}' (line {}): {}",
                category, entry.key, entry.source_line, reason
            ));
            continue;
        }
        match category {
            FileCommandCategory::Env => context.set_variable(&entry.key, &entry.value, false),
            FileCommandCategory::Output => context.set_output(&entry.key, &entry.value),
            FileCommandCategory::State => {
                context.set_intra_action_state(&entry.key, &entry.value)
            }
            FileCommandCategory::Path => {
                // Path files are line-oriented; see `apply_path_entries`.
                context.warning(&format!(
                    "Ignoring key/value entry '{}' in a path file.",
                    entry.key
                ));
            }
        }
    }
}

/// Apply path file entries: every entry is kept, in file order.
pub fn apply_path_entries(context: &mut ExecutionContext, paths: &[String]) {
    for path in paths {
        context.prepend_path_entry(path);
    }
}
