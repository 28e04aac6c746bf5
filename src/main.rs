use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;
mod embeddings;
mod error;
mod images;
mod pipeline;
mod store;
#[cfg(test)]
mod tests;
mod viewer;

use app::AppFactory;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match cli::Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            // help and version are not failures
            std::process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    let config = AppFactory::load_config()?;

    match args.command {
        cli::Command::Ingest { dir } => cli::handle_ingest(&config, dir),
        cli::Command::Search {
            query,
            limit,
            no_open,
            json,
        } => cli::handle_search(&config, query, limit, no_open, json),
        cli::Command::Config {} => cli::handle_config(&config),
    }
}
