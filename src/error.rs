use std::path::PathBuf;

/// The debugger's error taxonomy.
///
/// `DebuggeeFinished` is a control-flow sentinel, not a real failure: it
/// tells the REPL to stop looping cleanly. Everything else is either
/// fatal for the session (`LaunchFailed`, `WaitFailed`, `TraceSyscallFailed`)
/// or user-recoverable (printed, prompt resumes).
#[derive(Debug, thiserror::Error)]
pub enum DebuggerError {
    /// Terminal sentinel. The debuggee has exited or the user asked to quit.
    #[error("debuggee process is finished")]
    DebuggeeFinished,

    #[error("failed to launch debuggee process: {0}")]
    LaunchFailed(String),

    #[error("failed to wait for debuggee pid {pid}: {source}")]
    WaitFailed { pid: i32, source: nix::Error },

    #[error("failed to find symbol {0}")]
    SymbolNotFound(String),

    #[error("failed to find address for {file}:{line}")]
    LocationNotFound { file: String, line: u64 },

    #[error("no prologue_end line record found for function {0}")]
    PrologueNotFound(String),

    #[error("invalid breakpoint spec: {0:?}")]
    InvalidBreakpointSpec(crate::session::SetBreakpointArgs),

    #[error("ptrace syscall failed: {0}")]
    TraceSyscallFailed(#[from] nix::Error),

    #[error("source file {path} unavailable: {source}")]
    SourceFileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build debuggee program: {0}")]
    BuildFailed(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("failed to parse debuggee executable: {0}")]
    LocatorConstruction(#[from] LocatorError),
}

/// Distinct failure modes when constructing a [`crate::locator::Locator`]
/// from an on-disk ELF binary, so a broken binary is diagnosable instead
/// of collapsing into one generic "parse failed".
#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("failed to open debuggee executable {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("required section {0} is missing from the debuggee executable")]
    MissingSection(&'static str),

    #[error("failed to parse ELF: {0}")]
    ElfParse(#[from] goblin::error::Error),

    #[error("failed to parse DWARF debug info: {0}")]
    DwarfParse(#[from] gimli::Error),
}

pub type Result<T> = std::result::Result<T, DebuggerError>;
