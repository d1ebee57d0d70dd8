pub mod processor;
pub mod schema;
pub mod storage;
pub mod utils;

use common::Result;
use common::config::Settings;
use processor::{PipelineContext, RunSummary, StarSchemaProcessor};

/// Loads configuration from `config_path` and runs the star schema pipeline
pub async fn run_star_schema_pipeline(config_path: &str) -> Result<RunSummary> {
    let settings = Settings::new(config_path)?;
    run_pipeline(&settings).await
}

/// Runs the pipeline once against already loaded settings.
pub async fn run_pipeline(settings: &Settings) -> Result<RunSummary> {
    let context = PipelineContext::from_settings(settings)?;
    StarSchemaProcessor::new(context).run().await
}
