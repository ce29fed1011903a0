//! Document Q&A error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocQaError {
    #[error("PDF file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("File must be a PDF: {}", .0.display())]
    NotAPdf(PathBuf),

    #[error("PDF parse error for {path}: {message}")]
    PdfParse { path: String, message: String },

    #[error("No text content extracted from {0}")]
    NoText(String),

    #[error("No PDF content loaded. Please load a PDF first.")]
    NoDocument,

    #[error("Question must not be empty")]
    EmptyQuestion,

    #[error("Could not reach the model server at {endpoint}: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Model server returned {status}: {body}")]
    Inference { status: u16, body: String },

    #[error("Unexpected response from model server: {0}")]
    InvalidResponse(String),

    #[error("Extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DocQaError>;
