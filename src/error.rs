use std::path::PathBuf;

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use thiserror::Error;

/// Failure while loading or storing one of the JSON documents on disk.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("unable to read {path:?}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to parse {path:?}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unexpected layout in {path:?}: {reason}")]
    Shape { path: PathBuf, reason: &'static str },

    #[error("unable to write {path:?}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Outcome of a rejected configuration write.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("no body sent")]
    NoPayload,

    #[error("body is not valid JSON")]
    InvalidPayload { source: serde_json::Error },

    #[error(transparent)]
    Kernel(#[from] DocumentError),
}

impl ResponseError for WriteError {
    fn status_code(&self) -> StatusCode {
        match self {
            WriteError::NoPayload | WriteError::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            WriteError::Kernel(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // File locations stay in the server log.
        let message = match self {
            WriteError::Kernel(_) => "could not update kernel configuration".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "message": message,
        }))
    }
}
