//! REPL command dispatch: a small table of `{aliases, fn pointer}`
//! entries rather than a big match statement, so aliases and dispatch
//! stay in one place.

use crate::error::{DebuggerError, Result};
use crate::session::{SetBreakpointArgs, TraceSession};

struct Entry {
    aliases: &'static [&'static str],
    cmd: fn(&mut TraceSession, &[&str]) -> Result<()>,
}

/// The full command table. Built once; `find` looks it up by the first
/// whitespace-split token of a REPL line.
pub struct CommandTable {
    entries: Vec<Entry>,
}

impl CommandTable {
    pub fn new() -> CommandTable {
        CommandTable {
            entries: vec![
                Entry {
                    aliases: &["continue", "c"],
                    cmd: cont,
                },
                Entry {
                    aliases: &["quit", "q"],
                    cmd: quit,
                },
                Entry {
                    aliases: &["break", "b"],
                    cmd: set_breakpoint,
                },
                Entry {
                    aliases: &["dump", "d"],
                    cmd: dump,
                },
            ],
        }
    }

    pub fn find(&self, name: &str) -> Option<fn(&mut TraceSession, &[&str]) -> Result<()>> {
        self.entries
            .iter()
            .find(|e| e.aliases.contains(&name))
            .map(|e| e.cmd)
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

fn cont(session: &mut TraceSession, _args: &[&str]) -> Result<()> {
    session.continue_()
}

fn quit(session: &mut TraceSession, _args: &[&str]) -> Result<()> {
    session.quit()
}

fn dump(session: &mut TraceSession, _args: &[&str]) -> Result<()> {
    session.dump_registers()
}

/// `break <hex-addr>` / `break <symbol>` / `break <file> <line>`, checked
/// in that shape-detection order.
fn set_breakpoint(session: &mut TraceSession, args: &[&str]) -> Result<()> {
    let bp_args = parse_break_args(args)?;
    session.set_breakpoint(bp_args)?;
    Ok(())
}

fn parse_break_args(args: &[&str]) -> Result<SetBreakpointArgs> {
    match args {
        [only] => Ok(match u64::from_str_radix(only.trim_start_matches("0x"), 16) {
            Ok(addr) => SetBreakpointArgs {
                addr,
                ..Default::default()
            },
            Err(_) => SetBreakpointArgs {
                function_symbol: only.to_string(),
                ..Default::default()
            },
        }),
        [file, line] => {
            let line: u64 = line.parse().map_err(|_| {
                DebuggerError::InvalidArgs(format!("{} is not a valid line number", line))
            })?;
            Ok(SetBreakpointArgs {
                filename: file.to_string(),
                line,
                ..Default::default()
            })
        }
        _ => Err(DebuggerError::InvalidArgs(
            "break requires 1 or 2 arguments".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continue_and_quit_and_dump_have_their_aliases() {
        let table = CommandTable::new();
        assert!(table.find("continue").is_some());
        assert!(table.find("c").is_some());
        assert!(table.find("quit").is_some());
        assert!(table.find("q").is_some());
        assert!(table.find("dump").is_some());
        assert!(table.find("d").is_some());
        assert!(table.find("break").is_some());
        assert!(table.find("b").is_some());
    }

    #[test]
    fn unknown_command_is_not_found() {
        let table = CommandTable::new();
        assert!(table.find("frobnicate").is_none());
    }

    #[test]
    fn single_hex_argument_parses_as_addr() {
        let parsed = parse_break_args(&["0x401000"]).unwrap();
        assert_eq!(parsed.addr, 0x401000);
        assert!(parsed.function_symbol.is_empty());
    }

    #[test]
    fn single_non_hex_argument_is_a_function_symbol() {
        let parsed = parse_break_args(&["main.main"]).unwrap();
        assert_eq!(parsed.addr, 0);
        assert_eq!(parsed.function_symbol, "main.main");
    }

    #[test]
    fn two_arguments_are_file_and_line() {
        let parsed = parse_break_args(&["main.go", "7"]).unwrap();
        assert_eq!(parsed.filename, "main.go");
        assert_eq!(parsed.line, 7);
    }

    #[test]
    fn wrong_argument_count_is_invalid() {
        assert!(parse_break_args(&[]).is_err());
        assert!(parse_break_args(&["a", "b", "c"]).is_err());
    }

    #[test]
    fn non_numeric_line_is_invalid() {
        assert!(parse_break_args(&["main.go", "notaline"]).is_err());
    }
}
