// Scans a step's stdout/stderr lines for inline logging commands.
// Command lines dispatch through the applier on the untrusted inline
// channel; everything else is ordinary log output and is written (masked)
// to the context.

use agent_common::Command;

use crate::command_applier::{apply_command, CommandChannel};
use crate::execution_context::ExecutionContext;

/// Processes output lines from a running step.
pub struct OutputScanner<'a> {
    context: &'a mut ExecutionContext,
}

impl<'a> OutputScanner<'a> {
    pub fn new(context: &'a mut ExecutionContext) -> Self {
        Self { context }
    }

    /// Process one line of stdout. Returns `true` if the line carried a
    /// logging command.
    pub fn on_stdout_line(&mut self, line: &str) -> bool {
        self.process_line(line)
    }

    /// Process one line of stderr.
    pub fn on_stderr_line(&mut self, line: &str) -> bool {
        self.process_line(line)
    }

    /// Drain a finite line source, e.g. the step's captured output stream.
    pub fn scan<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.process_line(line.as_ref());
        }
    }

    fn process_line(&mut self, line: &str) -> bool {
        match Command::try_parse(line) {
            Some(cmd) => {
                apply_command(self.context, &cmd, CommandChannel::InlineLog);
                true
            }
            None => {
                self.context.write(line);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ctx() -> ExecutionContext {
        ExecutionContext::new("test-step", std::env::temp_dir())
    }

    #[test]
    fn test_plain_lines_are_logged() {
        let mut ctx = make_ctx();
        let mut scanner = OutputScanner::new(&mut ctx);
        assert!(!scanner.on_stdout_line("compiling foo v0.1.0"));
        assert_eq!(ctx.log_lines(), ["compiling foo v0.1.0"]);
    }

    #[test]
    fn test_command_lines_are_dispatched_not_logged() {
        let mut ctx = make_ctx();
        let mut scanner = OutputScanner::new(&mut ctx);
        assert!(scanner.on_stdout_line("##vso[log.group]Tests"));
        assert_eq!(ctx.group_depth(), 1);
        // The raw command line itself is not echoed as plain output.
        assert_eq!(ctx.log_lines(), ["##[group]Tests"]);
    }

    #[test]
    fn test_inline_state_mutation_blocked_end_to_end() {
        let mut ctx = make_ctx();
        let mut scanner = OutputScanner::new(&mut ctx);
        scanner.scan([
            "echo something",
            "##vso[task.setvariable variable=INJECTED;]owned",
            "##vso[task.setsecret]visible-token",
            "leaked visible-token here",
        ]);
        assert!(ctx.variables.is_empty());
        assert_eq!(ctx.log_lines().last().unwrap(), "leaked *** here");
    }

    #[test]
    fn test_stderr_lines_share_the_scanner() {
        let mut ctx = make_ctx();
        let mut scanner = OutputScanner::new(&mut ctx);
        assert!(scanner.on_stderr_line("##vso[task.debug]from stderr"));
        assert!(!scanner.on_stderr_line("real error text"));
    }
}
