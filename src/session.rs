//! The trace controller: owns the debuggee process under trace, holds
//! the breakpoint table, and implements launch / continue /
//! set-breakpoint / dump-registers, dispatching on wait status.

use crate::breakpoint::Breakpoint;
use crate::error::{DebuggerError, Result};
use crate::locator::{FuncLookupError, Locator};
use crate::ptrace;
use crate::registers;
use crate::source_window;
use log::{debug, info, warn};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus as NixWaitStatus};
use nix::unistd::{execv, fork, setpgid, ForkResult, Pid};
use std::collections::HashMap;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

/// Every operation that reads/writes debuggee memory or registers
/// requires `Stopped`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SessionState {
    Uninitialized,
    Stopped,
    Running,
    Exited,
}

/// The three mutually-exclusive ways to name a breakpoint target,
/// checked in priority order: `addr` first, then `function_symbol`,
/// then `filename`+`line`.
#[derive(Debug, Clone, Default)]
pub struct SetBreakpointArgs {
    pub addr: u64,
    pub function_symbol: String,
    pub filename: String,
    pub line: u64,
}

pub struct TraceSession {
    executable_path: PathBuf,
    pid: Option<Pid>,
    breakpoints: HashMap<u64, Breakpoint>,
    locator: Locator,
    state: SessionState,
}

impl TraceSession {
    /// Fork-execs the debuggee with the trace-me request set before exec,
    /// places it in its own process group, and waits for the initial
    /// stop.
    pub fn launch(executable_path: PathBuf, locator: Locator) -> Result<TraceSession> {
        let path_cstr = CString::new(executable_path.as_os_str().as_bytes())
            .map_err(|e| DebuggerError::LaunchFailed(e.to_string()))?;

        // SAFETY: the child side only calls async-signal-safe functions
        // (ptrace, setpgid, execv) before replacing its image.
        match unsafe { fork() }.map_err(|e| DebuggerError::LaunchFailed(e.to_string()))? {
            ForkResult::Child => {
                if ptrace::traceme().is_err() {
                    std::process::exit(127);
                }
                let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
                let _ = execv(&path_cstr, &[path_cstr.clone()]);
                // execv only returns on failure.
                std::process::exit(127);
            }
            ForkResult::Parent { child } => {
                let mut session = TraceSession {
                    executable_path,
                    pid: Some(child),
                    breakpoints: HashMap::new(),
                    locator,
                    state: SessionState::Uninitialized,
                };
                session.wait_for_status()?;
                info!("pid of debuggee program is {}", child);
                Ok(session)
            }
        }
    }

    fn pid(&self) -> Result<Pid> {
        self.pid
            .ok_or_else(|| DebuggerError::LaunchFailed("no debuggee process".into()))
    }

    /// Steps over a breakpoint at the current PC if needed, resumes the
    /// debuggee, and waits for the next stop, transparently re-continuing
    /// on any stop signal other than the trap a breakpoint raises.
    pub fn continue_(&mut self) -> Result<()> {
        if self.state == SessionState::Exited {
            return Err(DebuggerError::DebuggeeFinished);
        }
        self.step_over_breakpoint_if_needed()?;

        let pid = self.pid()?;
        ptrace::cont(pid, 0)?;
        self.state = SessionState::Running;

        // A non-trap stop signal is passed through and tracing resumes;
        // this loop (rather than recursion) keeps a long run of
        // passed-through signals from growing the stack.
        loop {
            match self.wait_for_status()? {
                NixWaitStatus::Stopped(_, Signal::SIGTRAP) => {
                    self.state = SessionState::Stopped;
                    return self.handle_breakpoint_hit();
                }
                NixWaitStatus::Stopped(_, other) => {
                    debug!("transparently passing through stop signal {:?}", other);
                    ptrace::cont(pid, 0)?;
                    self.state = SessionState::Running;
                }
                _ => {
                    // Any other wait status (PTRACE_EVENT_* notifications
                    // etc.) is not one we act on; keep waiting.
                }
            }
        }
    }

    /// Resolves one breakpoint target, installs it, and stores it in the
    /// breakpoint table keyed by address. Overwriting an existing entry
    /// at the same address is permitted; the prior breakpoint's true
    /// original instruction byte is carried forward rather than dropped.
    pub fn set_breakpoint(&mut self, args: SetBreakpointArgs) -> Result<u64> {
        let addr = self.resolve_breakpoint_address(&args)?;
        let pid = self.pid()?;

        let bp = match self.breakpoints.get(&addr) {
            Some(existing) => Breakpoint::reinstall(pid, addr, existing.original_instruction())?,
            None => Breakpoint::install(pid, addr)?,
        };
        debug!("installed breakpoint at {:#x}", addr);
        self.breakpoints.insert(addr, bp);
        Ok(addr)
    }

    fn resolve_breakpoint_address(&self, args: &SetBreakpointArgs) -> Result<u64> {
        if args.addr != 0 {
            return Ok(args.addr);
        }
        if !args.function_symbol.is_empty() {
            return self
                .locator
                .func_to_addr(&args.function_symbol)
                .map_err(|e| match e {
                    FuncLookupError::SymbolNotFound => {
                        DebuggerError::SymbolNotFound(args.function_symbol.clone())
                    }
                    FuncLookupError::PrologueNotFound => {
                        DebuggerError::PrologueNotFound(args.function_symbol.clone())
                    }
                });
        }
        if !args.filename.is_empty() && args.line != 0 {
            return self
                .locator
                .file_line_to_addr(&args.filename, args.line)
                .ok_or_else(|| DebuggerError::LocationNotFound {
                    file: args.filename.clone(),
                    line: args.line,
                });
        }
        Err(DebuggerError::InvalidBreakpointSpec(args.clone()))
    }

    /// Prints `Name: 0x<hex>` for every general-purpose register.
    pub fn dump_registers(&self) -> Result<()> {
        let pid = self.pid()?;
        let regs = ptrace::get_regs(pid)?;
        for (name, value) in registers::all_fields(&regs) {
            println!("{}: {:#x}", name, value);
        }
        Ok(())
    }

    /// Signals the child's process group and returns the terminal
    /// sentinel so the REPL exits.
    pub fn quit(&mut self) -> Result<()> {
        if let Some(pid) = self.pid {
            if let Err(e) = kill(Pid::from_raw(-pid.as_raw()), Signal::SIGTERM) {
                warn!("failed to signal debuggee process group: {}", e);
            }
        }
        self.state = SessionState::Exited;
        Err(DebuggerError::DebuggeeFinished)
    }

    pub fn executable_path(&self) -> &PathBuf {
        &self.executable_path
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn step_over_breakpoint_if_needed(&mut self) -> Result<()> {
        let pid = self.pid()?;
        let pc = ptrace::get_regs(pid)?.rip;
        let enabled = self.breakpoints.get(&pc).map(|b| b.is_enabled()).unwrap_or(false);
        if !enabled {
            return Ok(());
        }
        // The breakpoint borrow cannot stay live across `wait_for_status`,
        // which needs `&mut self` itself; look it up again on each side.
        self.breakpoints.get_mut(&pc).unwrap().disable()?;
        ptrace::single_step(pid, 0)?;
        self.wait_for_status()?;
        self.breakpoints.get_mut(&pc).unwrap().enable()?;
        Ok(())
    }

    fn handle_breakpoint_hit(&mut self) -> Result<()> {
        let pid = self.pid()?;
        let mut regs = ptrace::get_regs(pid)?;
        // The trap instruction is one byte and the CPU advances RIP past
        // it; decrement by one to leave execution positioned to
        // re-execute the original instruction on next continue.
        let pc = regs.rip.wrapping_sub(1);
        regs.rip = pc;
        ptrace::set_regs(pid, &regs)?;

        println!("hit breakpoint at {:#x}", pc);

        let (file, line) = self.locator.pc_to_file_line(pc);
        if file.is_empty() {
            return Ok(());
        }
        if let Err(e) = source_window::print_source_window(&file, line) {
            // SourceFileUnavailable is non-fatal: execution remains
            // stopped and the session stays usable.
            eprintln!("source file unavailable: {}", e);
        }
        Ok(())
    }

    /// Waits for the next status change. Translates `Exited` into the
    /// `DebuggeeFinished` sentinel without issuing further trace
    /// syscalls, and updates `state` accordingly.
    fn wait_for_status(&mut self) -> Result<NixWaitStatus> {
        let pid = self.pid()?;
        let status = waitpid(pid, Some(WaitPidFlag::__WALL)).map_err(|source| {
            DebuggerError::WaitFailed {
                pid: pid.as_raw(),
                source,
            }
        })?;
        match status {
            NixWaitStatus::Exited(..) | NixWaitStatus::Signaled(..) => {
                self.state = SessionState::Exited;
                Err(DebuggerError::DebuggeeFinished)
            }
            other => {
                self.state = SessionState::Stopped;
                Ok(other)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::LineRow;

    fn row(address: u64, file: &str, line: u64, prologue_end: bool) -> LineRow {
        LineRow {
            address,
            file: file.to_string(),
            line,
            prologue_end,
        }
    }

    fn session_for_test(locator: Locator) -> TraceSession {
        TraceSession {
            executable_path: PathBuf::from("/tmp/debuggee"),
            pid: None,
            breakpoints: HashMap::new(),
            locator,
            state: SessionState::Uninitialized,
        }
    }

    #[test]
    fn addr_wins_over_symbol_and_location_when_all_three_are_given() {
        let locator = Locator::for_test(
            vec![("main.main", 0x401000)],
            vec![vec![
                row(0x401000, "main.go", 7, false),
                row(0x401010, "main.go", 8, true),
            ]],
        );
        let session = session_for_test(locator);
        let args = SetBreakpointArgs {
            addr: 0x999999,
            function_symbol: "main.main".into(),
            filename: "main.go".into(),
            line: 7,
        };
        assert_eq!(session.resolve_breakpoint_address(&args).unwrap(), 0x999999);
    }

    #[test]
    fn symbol_wins_over_location_when_addr_is_absent() {
        let locator = Locator::for_test(
            vec![("main.main", 0x401000)],
            vec![vec![
                row(0x401000, "main.go", 7, false),
                row(0x401010, "main.go", 8, true),
            ]],
        );
        let session = session_for_test(locator);
        let args = SetBreakpointArgs {
            addr: 0,
            function_symbol: "main.main".into(),
            filename: "main.go".into(),
            line: 7,
        };
        assert_eq!(session.resolve_breakpoint_address(&args).unwrap(), 0x401010);
    }

    #[test]
    fn falls_back_to_file_and_line_when_addr_and_symbol_are_absent() {
        let locator = Locator::for_test(
            vec![],
            vec![vec![row(0x401004, "main.go", 9, false)]],
        );
        let session = session_for_test(locator);
        let args = SetBreakpointArgs {
            addr: 0,
            function_symbol: String::new(),
            filename: "main.go".into(),
            line: 9,
        };
        assert_eq!(session.resolve_breakpoint_address(&args).unwrap(), 0x401004);
    }

    #[test]
    fn none_of_the_three_shapes_given_is_invalid_spec() {
        let locator = Locator::for_test(vec![], vec![]);
        let session = session_for_test(locator);
        let err = session
            .resolve_breakpoint_address(&SetBreakpointArgs::default())
            .unwrap_err();
        assert!(matches!(err, DebuggerError::InvalidBreakpointSpec(_)));
    }

    #[test]
    fn unknown_symbol_is_symbol_not_found() {
        let locator = Locator::for_test(vec![], vec![]);
        let session = session_for_test(locator);
        let args = SetBreakpointArgs {
            function_symbol: "main.nope".into(),
            ..Default::default()
        };
        let err = session.resolve_breakpoint_address(&args).unwrap_err();
        assert!(matches!(err, DebuggerError::SymbolNotFound(s) if s == "main.nope"));
    }

    #[test]
    fn default_args_have_no_addr_no_symbol_no_location() {
        let args = SetBreakpointArgs::default();
        assert_eq!(args.addr, 0);
        assert!(args.function_symbol.is_empty());
        assert!(args.filename.is_empty());
        assert_eq!(args.line, 0);
    }
}
