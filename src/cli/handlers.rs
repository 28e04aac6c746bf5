use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::{
    app::AppFactory,
    config::Config,
    pipeline::{DirectorySource, IngestEvent, ResolvedHit},
};

pub fn handle_ingest(config: &Config, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| config.images_dir.clone());
    let source = DirectorySource::new(dir);
    let mut pipeline = AppFactory::create_ingestion(config)?;

    let report = pipeline
        .run_with(&source, |event| println!("{}", event_line(&event)))
        .context("Ingestion aborted")?;

    println!(
        "Done: {} indexed, {} failed",
        report.indexed.len(),
        report.failed.len()
    );
    Ok(())
}

pub fn handle_search(
    config: &Config,
    query: Vec<String>,
    limit: Option<usize>,
    no_open: bool,
    json: bool,
) -> Result<()> {
    let query = query.join(" ");
    let limit = limit.unwrap_or(config.search.limit);
    let pipeline = AppFactory::create_search(config)?;

    let results = pipeline
        .search_with_records(&query, limit)
        .context("Search failed")?;

    if json {
        let hits: Vec<_> = results.iter().map(|r| &r.hit).collect();
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        for line in result_lines(&query, &results) {
            println!("{line}");
        }
    }

    if no_open {
        return Ok(());
    }

    let Some(path) = results
        .first()
        .and_then(|top| top.record.as_ref())
        .map(|record| record.metadata.path.clone())
    else {
        return Ok(());
    };

    let viewer = AppFactory::create_viewer(config)?;
    if let Err(err) = viewer.open(Path::new(&path)) {
        log::warn!("could not open best match path={path} err={err}");
    }
    Ok(())
}

pub fn handle_config(config: &Config) -> Result<()> {
    println!("# base: {}", config.base_path().display());
    println!("# store: {}", config.store_path().display());
    print!("{}", config.to_redacted_yaml()?);
    Ok(())
}

fn event_line(event: &IngestEvent) -> String {
    match event {
        IngestEvent::Resized {
            file_name,
            width,
            height,
        } => format!("Resized {file_name} to {width}x{height}"),
        IngestEvent::Indexed { file_name } => format!("Indexed: {file_name}"),
        IngestEvent::Failed { file_name, error } => format!("Failed {file_name}: {error}"),
    }
}

fn result_lines(query: &str, results: &[ResolvedHit]) -> Vec<String> {
    let mut lines = vec![format!("Results for '{query}':")];
    lines.extend(
        results
            .iter()
            .map(|r| format!(" - {} (Score: {:.4})", r.hit.file_name, r.hit.score)),
    );
    lines
}
