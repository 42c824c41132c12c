use anyhow::Context;
use clap::{Parser, Subcommand};
use folio_kernel::settings::Settings;

/// Authors and books catalogue service.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply migrations and serve the HTTP API until interrupted
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Print the effective configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().with_context(|| "failed to load folio settings")?;

    match cli.command {
        Command::Config => {
            print_settings(&settings);
            Ok(())
        }
        Command::Migrate => {
            folio_telemetry::init(&settings.telemetry)?;
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            let applied = runtime.block_on(folio_app::migrate(&settings))?;
            tracing::info!(applied, "migrations complete");
            println!("applied {applied} migration(s)");
            Ok(())
        }
        Command::Serve => {
            folio_telemetry::init(&settings.telemetry)?;
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            runtime.block_on(folio_app::run(settings))
        }
    }
}

fn print_settings(settings: &Settings) {
    println!("environment = {}", settings.environment.as_str());
    println!("server.host = {}", settings.server.host);
    println!("server.port = {}", settings.server.port);
    println!("server.api_prefix = {}", settings.server.api_prefix);
    println!("server.request_timeout_ms = {}", settings.server.request_timeout_ms);
    println!(
        "database.uri = {}",
        folio_db::client::sanitize_uri(&settings.database.uri)
    );
    println!("database.namespace = {}", settings.database.namespace);
    println!("database.database = {}", settings.database.database);
    println!("telemetry.log_format = {:?}", settings.telemetry.log_format);
    println!("telemetry.filter = {}", settings.telemetry.filter);
}
