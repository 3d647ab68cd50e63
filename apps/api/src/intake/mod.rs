// Document intake pipeline: upload staging, per-file text extraction,
// batch assembly and the HTTP endpoint that forwards the batch for scoring.

pub mod batch;
pub mod handlers;
pub mod models;
pub mod reader;
pub mod staging;
