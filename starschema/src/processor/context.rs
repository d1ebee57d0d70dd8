use super::udf::register_udfs;
use crate::storage::StorageRoot;
use common::Result;
use common::config::{PipelineConfig, Settings};
use datafusion::execution::context::SessionContext;
use tracing::info;
use uuid::Uuid;

/// Everything a run needs, resolved once from configuration.
///
/// Storage credentials live in the object stores built here; nothing is read
/// back from the process environment later in the run.
#[derive(Clone)]
pub struct PipelineContext {
    pub ctx: SessionContext,
    pub input: StorageRoot,
    pub output: StorageRoot,
    pub compression: String,
    pub read_concurrency: usize,
    pub song_prefix: String,
    pub log_prefix: String,
    pub run_id: String,
}

impl PipelineContext {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;

        let input = StorageRoot::resolve(&settings.pipeline.input_data, &settings.aws, false)?;
        let output = StorageRoot::resolve(&settings.pipeline.output_data, &settings.aws, true)?;

        Ok(Self::with_roots(input, output, &settings.pipeline))
    }

    /// Builds a context over already resolved roots. Both stores are
    /// registered with a fresh session.
    pub fn with_roots(input: StorageRoot, output: StorageRoot, pipeline: &PipelineConfig) -> Self {
        let ctx = SessionContext::new();
        register_udfs(&ctx);
        input.register(&ctx);
        output.register(&ctx);

        let run_id = Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            input = %input.prefix(),
            output = %output.prefix(),
            "Pipeline context ready"
        );

        Self {
            ctx,
            input,
            output,
            compression: pipeline.compression.clone(),
            read_concurrency: pipeline.read_concurrency,
            song_prefix: pipeline.song_prefix.clone(),
            log_prefix: pipeline.log_prefix.clone(),
            run_id,
        }
    }
}
