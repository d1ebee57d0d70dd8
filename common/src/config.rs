use config::{Config, ConfigError};
use parquet::basic::Compression;
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub aws: AwsConfig,
    pub pipeline: PipelineConfig,
}

/// Credentials and endpoint for `s3://` roots. Ignored for local roots.
#[derive(Debug, Deserialize, Clone)]
pub struct AwsConfig {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    pub input_data: String,
    pub output_data: String,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_read_concurrency")]
    pub read_concurrency: usize,
    #[serde(default = "default_song_prefix")]
    pub song_prefix: String,
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            region: default_s3_region(),
            endpoint: None,
            allow_http: false,
        }
    }
}

impl AwsConfig {
    pub fn has_credentials(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}

fn default_s3_region() -> String {
    "us-west-2".to_string()
}

fn default_compression() -> String {
    "gzip(6)".to_string()
}

fn default_read_concurrency() -> usize {
    16
}

fn default_song_prefix() -> String {
    "song_data".to_string()
}

fn default_log_prefix() -> String {
    "log_data".to_string()
}

impl PipelineConfig {
    pub fn new(input_data: &str, output_data: &str) -> Self {
        Self {
            input_data: input_data.to_string(),
            output_data: output_data.to_string(),
            compression: default_compression(),
            read_concurrency: default_read_concurrency(),
            song_prefix: default_song_prefix(),
            log_prefix: default_log_prefix(),
        }
    }

    /// Parquet codec for every table written in the run.
    pub fn compression_codec(&self) -> Result<Compression, ConfigError> {
        Compression::from_str(&self.compression).map_err(|e| {
            ConfigError::Message(format!(
                "invalid pipeline.compression '{}': {}",
                self.compression, e
            ))
        })
    }
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let config = builder.build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;

        debug!(
            input_data = %settings.pipeline.input_data,
            output_data = %settings.pipeline.output_data,
            compression = %settings.pipeline.compression,
            "Loaded pipeline configuration"
        );

        Ok(settings)
    }

    /// Local-only settings, mostly for tests and ad-hoc runs.
    pub fn local(input_data: &str, output_data: &str) -> Self {
        Self {
            aws: AwsConfig::default(),
            pipeline: PipelineConfig::new(input_data, output_data),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.compression_codec()?;

        if self.pipeline.read_concurrency == 0 {
            return Err(ConfigError::Message(
                "pipeline.read_concurrency must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_gzip_for_local_runs() {
        let settings = Settings::local("data", "out");

        assert_eq!(settings.pipeline.compression, "gzip(6)");
        assert_eq!(settings.pipeline.song_prefix, "song_data");
        assert_eq!(settings.pipeline.log_prefix, "log_data");
        assert!(!settings.aws.has_credentials());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_codec() {
        let mut settings = Settings::local("data", "out");
        settings.pipeline.compression = "lzma".to_string();

        assert!(settings.validate().is_err());
    }

    #[test]
    fn accepts_snappy() {
        let mut settings = Settings::local("data", "out");
        settings.pipeline.compression = "snappy".to_string();

        assert_eq!(
            settings.pipeline.compression_codec().unwrap(),
            Compression::SNAPPY
        );
    }

    #[test]
    fn rejects_zero_read_concurrency() {
        let mut settings = Settings::local("data", "out");
        settings.pipeline.read_concurrency = 0;

        assert!(settings.validate().is_err());
    }

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(
            &path,
            r#"
[aws]
access_key_id = "AKIA"
secret_access_key = "secret"

[pipeline]
input_data = "s3a://udacity-dend"
output_data = "/tmp/warehouse"
compression = "zstd(3)"
"#,
        )
        .unwrap();

        let settings = Settings::new(path.to_str().unwrap()).unwrap();

        assert_eq!(settings.aws.region, "us-west-2");
        assert!(settings.aws.has_credentials());
        assert_eq!(settings.pipeline.input_data, "s3a://udacity-dend");
        assert_eq!(settings.pipeline.read_concurrency, 16);
    }
}
