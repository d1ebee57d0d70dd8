use arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use parquet::errors::ParquetError;
use thiserror::Error;
use url::ParseError;

pub mod config;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Object path error: {0}")]
    ObjectPath(#[from] object_store::path::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("DataFusion error: {0}")]
    DataFusion(#[from] DataFusionError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A raw record does not conform to its source contract. Fatal for the
    /// whole extraction.
    #[error("Schema violation in {source_name} file {path}: {message}")]
    SchemaViolation {
        source_name: String,
        path: String,
        message: String,
    },

    /// A table could not be materialized to the sink.
    #[error("Failed to write table {table}: {message}")]
    SinkWrite { table: String, message: String },

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn sink_write(table: &str, err: impl std::fmt::Display) -> Self {
        Error::SinkWrite {
            table: table.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::InvalidInput(format!("URL parse error: {}", err))
    }
}

/// Tags a failure with the pipeline stage it happened in.
pub trait StageContext<T> {
    fn stage(self, stage: &str) -> Result<T>;
}

impl<T, E: Into<Error>> StageContext<T> for std::result::Result<T, E> {
    fn stage(self, stage: &str) -> Result<T> {
        self.map_err(|e| Error::Stage {
            stage: stage.to_string(),
            source: Box::new(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_context_names_the_failing_stage() {
        let failed: std::result::Result<(), Error> =
            Err(Error::sink_write("songs", "disk full"));

        let err = failed.stage("sink").unwrap_err();

        assert_eq!(
            err.to_string(),
            "Stage 'sink' failed: Failed to write table songs: disk full"
        );
    }

    #[test]
    fn schema_violation_message_points_at_the_file() {
        let err = Error::SchemaViolation {
            source_name: "log_data".to_string(),
            path: "log_data/2018/11/events.json".to_string(),
            message: "failed to parse \"abc\" as Int64".to_string(),
        };

        assert!(err.to_string().contains("log_data/2018/11/events.json"));
    }
}
