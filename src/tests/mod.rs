mod ingest;
mod support;
