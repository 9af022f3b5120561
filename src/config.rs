use serde::Deserialize;

/// Main configuration for the metadata service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// S3 configuration
    pub s3: S3Config,
    /// DynamoDB configuration
    pub dynamodb: DynamoDbConfig,
    /// SQS configuration for event-driven ingestion
    #[serde(default)]
    pub sqs: SqsConfig,
    /// Inbound event filtering
    #[serde(default)]
    pub events: EventConfig,
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// S3 storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Bucket receiving extracted-metadata JSON documents
    pub json_bucket: String,
    /// Key prefix for JSON documents within the bucket
    #[serde(default = "default_json_prefix")]
    pub json_prefix: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
}

/// DynamoDB index configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DynamoDbConfig {
    /// Table holding the metadata index
    pub table_name: String,
    /// Partition key attribute name
    #[serde(default = "default_key_attribute")]
    pub key_attribute: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for DynamoDB Local, LocalStack)
    pub endpoint_url: Option<String>,
}

/// SQS configuration for the event consumer
#[derive(Debug, Clone, Deserialize)]
pub struct SqsConfig {
    /// Queue receiving S3 blob-creation notifications. Event ingestion is
    /// disabled when unset.
    pub queue_url: Option<String>,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL
    pub endpoint_url: Option<String>,
    /// Long-poll wait time in seconds
    #[serde(default = "default_wait_time_secs")]
    pub wait_time_secs: i32,
    /// Maximum messages per receive
    #[serde(default = "default_max_messages")]
    pub max_messages: i32,
}

/// Inbound-object convention for event-driven ingestion
#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    /// Only object keys under this prefix are ingested
    #[serde(default = "default_inbound_prefix")]
    pub inbound_prefix: String,
    /// Only object keys with this suffix are ingested
    #[serde(default = "default_inbound_suffix")]
    pub inbound_suffix: String,
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,
    /// Allowed CORS origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

// Default value functions
fn default_service_name() -> String {
    "dicom-metadata-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_json_prefix() -> String {
    "json/".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_key_attribute() -> String {
    "Id".to_string()
}

fn default_wait_time_secs() -> i32 {
    20
}

fn default_max_messages() -> i32 {
    10
}

fn default_inbound_prefix() -> String {
    "json/".to_string()
}

fn default_inbound_suffix() -> String {
    ".json".to_string()
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Add config file if present
            .add_source(config::File::with_name("config/dicom-metadata").required(false))
            .add_source(config::File::with_name("/etc/dicom-metadata/config").required(false))
            // Override with environment variables
            // DICOM__S3__JSON_BUCKET -> s3.json_bucket
            .add_source(
                config::Environment::with_prefix("DICOM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for SqsConfig {
    fn default() -> Self {
        Self {
            queue_url: None,
            region: default_region(),
            endpoint_url: None,
            wait_time_secs: default_wait_time_secs(),
            max_messages: default_max_messages(),
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            inbound_prefix: default_inbound_prefix(),
            inbound_suffix: default_inbound_suffix(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_enabled: false,
            cors_origins: Vec::new(),
        }
    }
}
