mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

use crate::cli::{Cli, Command};
use crate::error::CliError;

type FilterHandle = reload::Handle<EnvFilter, Registry>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = init_tracing(cli.global.verbose);

    if let Err(err) = run(cli, &filter).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) -> FilterHandle {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let (filter, handle) = reload::Layer::new(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
    handle
}

/// `verbose = true` in the config raises the default level to info. An
/// explicit `-v` or `RUST_LOG` wins.
fn apply_config_verbosity(handle: &FilterHandle, verbose_flag: u8, verbose_setting: bool) {
    if !verbose_setting || verbose_flag > 0 || std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    if let Err(e) = handle.modify(|filter| *filter = EnvFilter::new("info")) {
        tracing::warn!(error = %e, "could not raise log level");
    }
}

async fn run(cli: Cli, filter: &FilterHandle) -> Result<(), CliError> {
    let command = cli.command.unwrap_or(Command::Run);

    // Completions need no configuration
    if let Command::Completions(args) = &command {
        use clap::CommandFactory;
        use clap_complete::generate;

        let mut cmd = Cli::command();
        generate(args.shell, &mut cmd, "imap-alarms", &mut std::io::stdout());
        return Ok(());
    }

    let settings = config::load(&cli.global)?;
    apply_config_verbosity(filter, cli.global.verbose, settings.verbose);

    tracing::debug!(command = ?command, "dispatching command");
    match command {
        Command::Config => commands::config_cmd::handle(&settings),
        Command::Once => commands::once::handle(&settings).await,
        Command::Run => commands::run::handle(&settings).await,
        Command::Completions(_) => Ok(()),
    }
}
