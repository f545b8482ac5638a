use linedbg::build::build_debuggee_program;
use linedbg::cli::Options;
use linedbg::locator::Locator;
use linedbg::session::TraceSession;
use log::error;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> linedbg::error::Result<()> {
    let opts = Options::from_args_checked()?;

    let artifact = build_debuggee_program(&opts.path)?;

    let locator = Locator::new(artifact.path())?;
    let mut session = TraceSession::launch(artifact.path().to_path_buf(), locator)?;

    linedbg::repl::run_stdio(&mut session).map_err(|e| {
        linedbg::error::DebuggerError::LaunchFailed(format!("repl I/O error: {}", e))
    })?;

    // The artifact (and its cleanup guard) is dropped here, after the
    // debuggee process itself has already exited or been killed by the
    // session's `quit`.
    drop(artifact);
    Ok(())
}
