use std::process::ExitCode;

use clap::Parser;

use sftp_mirror::cli::Cli;
use sftp_mirror::config::Config;
use sftp_mirror::{MirrorError, logging, mirror};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            if e.downcast_ref::<MirrorError>().is_some_and(MirrorError::is_connection_stage) {
                eprintln!("no files were transferred");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let (config, source) = Config::load_with_source(cli.config.as_deref())?;
    // guard flushes the file log on exit
    let _guard = logging::init_logging(cli.verbose, config.log_dir().as_deref())?;
    match &source {
        Some(path) => tracing::debug!("loaded config from {}", path.display()),
        None => tracing::debug!("no config file, using defaults"),
    }
    let args = cli.into_args(&config)?;
    let report = mirror::handle_mirror(args)?;
    tracing::info!(
        "finished: remote={} local={} complete={}",
        report.summary.remote_files,
        report.summary.local_files,
        report.summary.is_complete()
    );
    Ok(())
}
