use clap::Parser;
use tracing_subscriber::EnvFilter;

use provider_match::{cli, web};

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("provider_match=debug,info")
    } else {
        EnvFilter::new("provider_match=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Scan(args) => {
            cli::scan::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Rank(args) => {
            cli::rank::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Serve(args) => {
            web::server::run(args)?;
        }
    }

    Ok(())
}
