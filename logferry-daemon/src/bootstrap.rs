//! Configuration loading and client bootstrap.
//!
//! Turns a [`DaemonCli`] into a validated [`LogferryConfig`], then builds
//! the SQS, S3 and HTTP clients the shipper runs against.
//!
//! # Precedence (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. `logferry.toml`
//! 3. `LOGFERRY_<SECTION>_<FIELD>` environment variables
//! 4. CLI flags (`--log-level`, `--log-format`)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use logferry_core::config::{AwsConfig, LogferryConfig};
use logferry_log_pipeline::{
    HttpDocumentSink, LogShipper, LogShipperBuilder, S3ObjectStore, ShipperConfig,
    SqsQueueClient,
};

use crate::cli::DaemonCli;

/// The shipper wired to the production clients.
pub type AwsLogShipper = LogShipper<SqsQueueClient, S3ObjectStore, HttpDocumentSink>;

/// Load the configuration file and apply environment and CLI overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the
/// final configuration fails validation.
pub async fn load_config(cli: &DaemonCli) -> Result<LogferryConfig> {
    let mut config = LogferryConfig::from_file(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
    config.apply_env_overrides();
    apply_cli_overrides(&mut config, cli);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    Ok(config)
}

/// Apply CLI flag overrides on top of file and environment values.
pub fn apply_cli_overrides(config: &mut LogferryConfig, cli: &DaemonCli) {
    if let Some(level) = &cli.log_level {
        config.general.log_level.clone_from(level);
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format.clone_from(format);
    }
}

/// Build the shipper and its SQS/S3/HTTP clients from a validated config.
///
/// Credentials come from the default AWS provider chain.
pub async fn build_shipper(config: &LogferryConfig) -> Result<AwsLogShipper> {
    let shipper_config = ShipperConfig::from_core(config)
        .map_err(|e| anyhow::anyhow!("invalid pipeline config: {}", e))?;

    let sdk_config = load_sdk_config(&config.aws).await;

    let sqs = aws_sdk_sqs::Client::new(&sdk_config);
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.aws.force_path_style)
        .build();
    let s3 = aws_sdk_s3::Client::from_conf(s3_config);

    let sink = HttpDocumentSink::new(
        &config.sink.endpoint,
        Duration::from_secs(config.sink.request_timeout_secs),
    )
    .map_err(|e| anyhow::anyhow!("failed to create indexing client: {}", e))?;
    let queue = SqsQueueClient::new(sqs, config.queue.url.clone());

    tracing::info!(
        queue_url = %queue.queue_url(),
        endpoint = %sink.endpoint(),
        region = %sdk_config.region().map(|r| r.as_ref()).unwrap_or("<provider default>"),
        "clients initialized"
    );

    LogShipperBuilder::new()
        .config(shipper_config)
        .queue_client(Arc::new(queue))
        .object_store(Arc::new(S3ObjectStore::new(s3)))
        .document_sink(Arc::new(sink))
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build log shipper: {}", e))
}

/// Load the shared AWS SDK config with optional region and endpoint overrides.
async fn load_sdk_config(aws: &AwsConfig) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if !aws.region.is_empty() {
        loader = loader.region(aws_config::Region::new(aws.region.clone()));
    }
    if !aws.endpoint_url.is_empty() {
        loader = loader.endpoint_url(aws.endpoint_url.clone());
    }
    loader.load().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_overrides_take_precedence() {
        let mut config = LogferryConfig::default();
        config.general.log_level = "warn".to_owned();

        let cli = DaemonCli::parse_from([
            "logferry-daemon",
            "--log-level",
            "trace",
            "--log-format",
            "pretty",
        ]);
        apply_cli_overrides(&mut config, &cli);

        assert_eq!(config.general.log_level, "trace");
        assert_eq!(config.general.log_format, "pretty");
    }

    #[test]
    fn absent_flags_keep_config_values() {
        let mut config = LogferryConfig::default();
        config.general.log_level = "warn".to_owned();

        let cli = DaemonCli::parse_from(["logferry-daemon"]);
        apply_cli_overrides(&mut config, &cli);

        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.log_format, "json");
    }
}
