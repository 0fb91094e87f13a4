use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::thread;

use clap::Args;
use ifu_core::errors::IfuError;
use ifu_fit::CancelToken;
use ifu_pipe::{load_params, load_recipe, sequencer, StepTable};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status of a run stopped by Ctrl+C or SIGTERM.
const INTERRUPTED_EXIT: i32 = 130;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML recipe listing the steps to execute.
    #[arg(long)]
    pub recipe: PathBuf,
    /// YAML parameter file of the target.
    #[arg(long)]
    pub params: PathBuf,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let params = load_params(&args.params)?;
    init_logging(params.verbose);
    let recipe = load_recipe(&args.recipe)?;

    let cancel = CancelToken::new();
    spawn_signal_listener(cancel.clone())?;

    match sequencer::run(&recipe, &params, &StepTable::standard(), &cancel) {
        Ok(summary) => {
            info!(executed = summary.executed.len(), skipped = summary.skipped.len(), "recipe complete");
            println!("All done in {:.1} s", summary.duration.as_secs_f64());
            Ok(())
        }
        Err(err @ IfuError::Interrupted(_)) => {
            match (err.interrupted_row(), err.interrupted_step_name()) {
                (Some(row), _) => eprintln!("row {row} interrupted"),
                (None, Some(step)) => eprintln!("step {step} interrupted"),
                (None, None) => eprintln!("{err}"),
            }
            process::exit(INTERRUPTED_EXIT);
        }
        Err(err) => Err(Box::new(err)),
    }
}

/// `RUST_LOG` wins; otherwise `info` when the parameters ask for verbosity.
fn init_logging(verbose: bool) {
    let base = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));
    // A subscriber installed by an embedding process takes precedence.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Cancels `cancel` on the first Ctrl+C or SIGTERM.
fn spawn_signal_listener(cancel: CancelToken) -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    thread::Builder::new()
        .name("ifu-signals".into())
        .spawn(move || {
            runtime.block_on(shutdown_signal());
            cancel.cancel();
        })?;
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(%err, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(%err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("received Ctrl+C, finishing in-flight spectra"),
        _ = terminate => warn!("received SIGTERM, finishing in-flight spectra"),
    }
}
