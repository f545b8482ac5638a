use std::path::PathBuf;
use structopt::StructOpt;

/// Command-line surface: one required flag naming the debuggee source
/// to build and trace.
#[derive(Debug, StructOpt)]
#[structopt(name = "linedbg", about = "An interactive source-level debugger")]
pub struct Options {
    /// Path to the debuggee source.
    #[structopt(long = "path", parse(from_os_str))]
    pub path: PathBuf,
}

impl Options {
    pub fn from_args_checked() -> crate::error::Result<Options> {
        let opts = Options::from_args();
        if opts.path.as_os_str().is_empty() {
            return Err(crate::error::DebuggerError::InvalidArgs(
                "path of debuggee program must be given".into(),
            ));
        }
        Ok(opts)
    }
}
