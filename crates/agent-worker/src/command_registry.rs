// Static registry of recognized logging-command identities. Maps a
// case-insensitive `(area, event)` pair to a handler capability; commands
// with well-formed syntax but no registered handler are reported, not
// failed at parse time.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// What a registered command does when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `task.setvariable` - set a variable for subsequent steps.
    SetVariable,
    /// `task.setoutput` - set a step output.
    SetOutput,
    /// `task.savestate` - save intra-action state.
    SaveState,
    /// `task.prependpath` - prepend an executable search path entry.
    PrependPath,
    /// `task.setsecret` - register a value with the secret masker.
    SetSecret,
    /// `task.logissue` - record an error/warning/notice annotation.
    LogIssue,
    /// `task.debug` - write a debug log line.
    Debug,
    /// `log.group` - open a collapsible log group.
    GroupStart,
    /// `log.endgroup` - close the innermost log group.
    GroupEnd,
}

/// Handler capability for one registered command.
#[derive(Debug, Clone, Copy)]
pub struct CommandHandler {
    pub kind: CommandKind,
    /// State-mutating commands are only honored from the trusted file-based
    /// channel. The inline channel is reachable from arbitrary step stdout.
    pub requires_file_channel: bool,
}

static REGISTRY: Lazy<HashMap<(String, String), CommandHandler>> = Lazy::new(|| {
    fn handler(kind: CommandKind, requires_file_channel: bool) -> CommandHandler {
        CommandHandler {
            kind,
            requires_file_channel,
        }
    }

    let mut map = HashMap::new();
    let mut register = |area: &str, event: &str, h: CommandHandler| {
        map.insert((area.to_string(), event.to_string()), h);
    };

    register("task", "setvariable", handler(CommandKind::SetVariable, true));
    register("task", "setoutput", handler(CommandKind::SetOutput, true));
    register("task", "savestate", handler(CommandKind::SaveState, true));
    register("task", "prependpath", handler(CommandKind::PrependPath, true));
    register("task", "setsecret", handler(CommandKind::SetSecret, false));
    register("task", "logissue", handler(CommandKind::LogIssue, false));
    register("task", "debug", handler(CommandKind::Debug, false));
    register("log", "group", handler(CommandKind::GroupStart, false));
    register("log", "endgroup", handler(CommandKind::GroupEnd, false));
    map
});

/// Look up the handler for an `(area, event)` pair, case-insensitively.
pub fn lookup(area: &str, event: &str) -> Option<CommandHandler> {
    REGISTRY
        .get(&(area.to_ascii_lowercase(), event.to_ascii_lowercase()))
        .copied()
}
