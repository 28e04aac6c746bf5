use crate::{
    embeddings::InputType,
    error::{FileError, TransportError},
    images::EncodeLimits,
    pipeline::{DirectorySource, IngestError, IngestEvent, IngestionPipeline},
    store::{FileVectorStore, MemoryVectorStore, StoreError, VectorStore},
};

use super::support::{write_solid, ColorGateway};

fn pipeline(gateway: ColorGateway) -> IngestionPipeline<ColorGateway, MemoryVectorStore> {
    IngestionPipeline::new(gateway, MemoryVectorStore::new(), EncodeLimits::default())
}

#[test]
fn test_corrupt_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_solid(dir.path(), "a.jpg", [200, 20, 20], 64, 48);
    std::fs::write(dir.path().join("b.png"), b"definitely not a png").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let mut pipeline = pipeline(ColorGateway::new());
    let report = pipeline.run(&DirectorySource::new(dir.path())).unwrap();

    assert_eq!(report.indexed, vec!["a.jpg"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "b.png");
    assert!(matches!(report.failed[0].1, FileError::Decode(_)));

    let store = pipeline.store();
    assert_eq!(store.len(), 1);
    let record = store.find("a.jpg").unwrap().unwrap();
    assert!(record.metadata.path.ends_with("a.jpg"));
    assert_eq!(record.embedding.len(), 3);
}

#[test]
fn test_documents_use_document_intent() {
    let dir = tempfile::tempdir().unwrap();
    write_solid(dir.path(), "one.png", [10, 200, 10], 16, 16);
    write_solid(dir.path(), "two.jpeg", [10, 10, 200], 16, 16);

    let mut pipeline = pipeline(ColorGateway::new());
    pipeline.run(&DirectorySource::new(dir.path())).unwrap();

    assert_eq!(
        pipeline.gateway().calls(),
        vec![InputType::Document, InputType::Document]
    );
}

#[test]
fn test_reingest_appends_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    write_solid(dir.path(), "same.jpg", [120, 120, 120], 32, 32);
    let source = DirectorySource::new(dir.path());

    let mut pipeline = pipeline(ColorGateway::new());
    pipeline.run(&source).unwrap();
    pipeline.run(&source).unwrap();

    let store = pipeline.into_store();
    assert_eq!(store.len(), 2);
    assert!(store.records().all(|r| r.file_name == "same.jpg"));
}

#[test]
fn test_gateway_failure_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    write_solid(dir.path(), "a.png", [255, 0, 0], 8, 8);
    write_solid(dir.path(), "b.png", [0, 255, 0], 8, 8);
    write_solid(dir.path(), "c.png", [0, 0, 255], 8, 8);

    let mut pipeline = pipeline(ColorGateway::failing_after(1));
    let result = pipeline.run(&DirectorySource::new(dir.path()));

    assert!(matches!(
        result,
        Err(IngestError::Transport(TransportError::Gateway(_)))
    ));
    // Only the first document made it in, the run stopped at the second
    assert_eq!(pipeline.store().len(), 1);
    assert_eq!(pipeline.gateway().calls().len(), 2);
}

#[test]
fn test_store_failure_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    write_solid(dir.path(), "a.png", [255, 0, 0], 8, 8);
    write_solid(dir.path(), "b.png", [0, 255, 0], 8, 8);
    write_solid(dir.path(), "c.png", [0, 0, 255], 8, 8);

    // the gateway produces 3-dimensional vectors
    let store = MemoryVectorStore::with_dimensions(2);
    let mut pipeline = IngestionPipeline::new(ColorGateway::new(), store, EncodeLimits::default());
    let result = pipeline.run(&DirectorySource::new(dir.path()));

    assert!(matches!(
        result,
        Err(IngestError::Transport(TransportError::Store(
            StoreError::DimensionMismatch { expected: 2, got: 3 }
        )))
    ));
    assert!(pipeline.store().is_empty());
    // the run stops at the first insert, the other files are never embedded
    assert_eq!(pipeline.gateway().calls(), vec![InputType::Document]);
}

#[test]
fn test_missing_directory_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline(ColorGateway::new());

    let result = pipeline.run(&DirectorySource::new(dir.path().join("nope")));
    assert!(matches!(result, Err(IngestError::Source { .. })));
    assert!(pipeline.gateway().calls().is_empty());
}

#[test]
fn test_oversized_image_reports_resize() {
    let dir = tempfile::tempdir().unwrap();
    write_solid(dir.path(), "wide.png", [30, 60, 90], 400, 200);
    write_solid(dir.path(), "small.png", [30, 60, 90], 50, 50);

    let limits = EncodeLimits {
        max_pixels: 20_000,
        max_bytes: 1_000_000,
    };
    let mut pipeline = IngestionPipeline::new(ColorGateway::new(), MemoryVectorStore::new(), limits);

    let mut events = Vec::new();
    pipeline
        .run_with(&DirectorySource::new(dir.path()), |event| match event {
            IngestEvent::Resized {
                file_name,
                width,
                height,
            } => events.push(format!("{file_name} {width}x{height}")),
            IngestEvent::Indexed { file_name } => events.push(format!("{file_name} ok")),
            IngestEvent::Failed { file_name, .. } => events.push(format!("{file_name} failed")),
        })
        .unwrap();

    events.sort();
    assert_eq!(events, vec!["small.png ok", "wide.png 200x100", "wide.png ok"]);
}

#[test]
fn test_file_store_keeps_ingested_records() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    std::fs::create_dir(&images).unwrap();
    write_solid(&images, "red.jpg", [220, 10, 10], 24, 24);
    write_solid(&images, "blue.png", [10, 10, 220], 24, 24);

    let store_path = dir.path().join("records.bin");
    let store = FileVectorStore::open(&store_path).unwrap();
    let mut pipeline = IngestionPipeline::new(ColorGateway::new(), store, EncodeLimits::default());
    let report = pipeline.run(&DirectorySource::new(&images)).unwrap();
    assert_eq!(report.indexed.len(), 2);
    drop(pipeline);

    let reopened = FileVectorStore::open(&store_path).unwrap();
    assert_eq!(reopened.len(), 2);
    assert!(reopened.find("red.jpg").unwrap().is_some());
    assert!(reopened.find("blue.png").unwrap().is_some());
}
