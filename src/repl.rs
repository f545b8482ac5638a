//! The line-oriented REPL: reads a line, splits on single spaces,
//! dispatches the first token as a command with the rest as positional
//! arguments, and loops until a command returns `DebuggeeFinished`.

use crate::commands::CommandTable;
use crate::error::DebuggerError;
use crate::session::TraceSession;
use std::io::{self, BufRead, Write};

const PROMPT: &str = "go-debugger> ";

pub fn run(session: &mut TraceSession, input: impl BufRead, mut output: impl Write) -> io::Result<()> {
    let table = CommandTable::new();
    write!(output, "{}", PROMPT)?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        let (command, args) = split_command_line(&line);
        if command.is_empty() {
            write!(output, "\n{}", PROMPT)?;
            output.flush()?;
            continue;
        }

        match table.find(command) {
            None => {
                writeln!(output, "command {} is not found", command)?;
            }
            Some(cmd) => match cmd(session, &args) {
                Ok(()) => {}
                Err(DebuggerError::DebuggeeFinished) => break,
                Err(e) => {
                    writeln!(output, "{}", e)?;
                    if matches!(e, DebuggerError::TraceSyscallFailed(_)) {
                        break;
                    }
                }
            },
        }
        write!(output, "\n{}", PROMPT)?;
        output.flush()?;
    }
    Ok(())
}

pub fn run_stdio(session: &mut TraceSession) -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    run(session, stdin.lock(), stdout.lock())
}

/// Splits `"<command> <arg1> <arg2>"` on single spaces; the first token is
/// the command, the rest are positional arguments.
fn split_command_line(line: &str) -> (&str, Vec<&str>) {
    let mut parts = line.split(' ');
    let command = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.filter(|s| !s.is_empty()).collect();
    (command, args)
}
