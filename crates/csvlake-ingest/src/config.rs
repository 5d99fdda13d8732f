//! Ingest settings
//!
//! Read once at startup from the process environment (after an optional `.env`
//! file) and handed explicitly to the pipeline and dispatcher. Logging settings
//! (`LOG_*`, `ENABLE_XRAY`) live in [`csvlake_common::logging::LogConfig`].

use crate::error::ConfigError;
use crate::storage::StorageConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_AWS_REGION: &str = "us-east-1";
pub const DEFAULT_RAW_BUCKET: &str = "my-raw-data-bucket";
pub const DEFAULT_DATA_LAKE_BUCKET: &str = "my-data-lake-bucket";
pub const DEFAULT_PROCESSED_PREFIX: &str = "processed/";
pub const DEFAULT_FAILED_PREFIX: &str = "failed/";
pub const DEFAULT_MAX_FILE_SIZE_MB: usize = 100;
pub const DEFAULT_BATCH_SIZE: usize = crate::encoder::DEFAULT_BATCH_SIZE;
pub const DEFAULT_PARTITION_COLS: &str = "year,month,day";
pub const DEFAULT_DATA_LAKE_DATABASE: &str = "datalake_db";
pub const DEFAULT_TABLE_PREFIX: &str = "csv_";
pub const DEFAULT_CRAWLER_NAME: &str = "csv-data-crawler";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub aws: AwsSettings,
    pub s3: S3Settings,
    pub processing: ProcessingSettings,
    pub catalog: CatalogSettings,
    pub notification: NotificationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsSettings {
    pub region: String,
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Settings {
    pub raw_bucket: String,
    pub data_lake_bucket: String,
    pub processed_prefix: String,
    pub failed_prefix: String,
    /// Endpoint and credentials for the S3 client
    pub connection: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSettings {
    pub max_file_size_mb: usize,
    pub batch_size: usize,
    pub partition_columns: Vec<String>,
}

impl ProcessingSettings {
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Catalog names, carried for downstream tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSettings {
    pub database: String,
    pub table_prefix: String,
    pub crawler_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub topic_arn: Option<String>,
}

fn parse_number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name,
                reason: format!("'{}' is not a number", raw),
            })
        },
        _ => Ok(default),
    }
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build and validate settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());
        let region = var("AWS_REGION", DEFAULT_AWS_REGION);

        let settings = Settings {
            aws: AwsSettings {
                region: region.clone(),
                account_id: var("AWS_ACCOUNT_ID", ""),
            },
            s3: S3Settings {
                raw_bucket: var("RAW_BUCKET_NAME", DEFAULT_RAW_BUCKET),
                data_lake_bucket: var("DATA_LAKE_BUCKET_NAME", DEFAULT_DATA_LAKE_BUCKET),
                processed_prefix: var("PROCESSED_PREFIX", DEFAULT_PROCESSED_PREFIX),
                failed_prefix: var("FAILED_PREFIX", DEFAULT_FAILED_PREFIX),
                connection: StorageConfig::from_lookup(region, &lookup),
            },
            processing: ProcessingSettings {
                max_file_size_mb: parse_number(
                    &lookup,
                    "MAX_FILE_SIZE_MB",
                    DEFAULT_MAX_FILE_SIZE_MB,
                )?,
                batch_size: parse_number(&lookup, "BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
                partition_columns: var("PARTITION_COLS", DEFAULT_PARTITION_COLS)
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            catalog: CatalogSettings {
                database: var("DATA_LAKE_DATABASE", DEFAULT_DATA_LAKE_DATABASE),
                table_prefix: var("DATA_LAKE_TABLE_PREFIX", DEFAULT_TABLE_PREFIX),
                crawler_name: var("GLUE_CRAWLER_NAME", DEFAULT_CRAWLER_NAME),
            },
            notification: NotificationSettings {
                topic_arn: lookup("SNS_TOPIC_ARN").filter(|v| !v.is_empty()),
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Settings for local runs and tests: defaults everywhere, with the given
    /// buckets and a placeholder account id.
    pub fn for_buckets(raw_bucket: impl Into<String>, data_lake_bucket: impl Into<String>) -> Self {
        Settings {
            aws: AwsSettings {
                region: DEFAULT_AWS_REGION.to_string(),
                account_id: "000000000000".to_string(),
            },
            s3: S3Settings {
                raw_bucket: raw_bucket.into(),
                data_lake_bucket: data_lake_bucket.into(),
                processed_prefix: DEFAULT_PROCESSED_PREFIX.to_string(),
                failed_prefix: DEFAULT_FAILED_PREFIX.to_string(),
                connection: StorageConfig::for_aws(DEFAULT_AWS_REGION),
            },
            processing: ProcessingSettings {
                max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
                batch_size: DEFAULT_BATCH_SIZE,
                partition_columns: DEFAULT_PARTITION_COLS
                    .split(',')
                    .map(str::to_string)
                    .collect(),
            },
            catalog: CatalogSettings {
                database: DEFAULT_DATA_LAKE_DATABASE.to_string(),
                table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
                crawler_name: DEFAULT_CRAWLER_NAME.to_string(),
            },
            notification: NotificationSettings { topic_arn: None },
        }
    }

    /// Required values must be non-empty; sizes must be positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("AWS_ACCOUNT_ID", &self.aws.account_id),
            ("RAW_BUCKET_NAME", &self.s3.raw_bucket),
            ("DATA_LAKE_BUCKET_NAME", &self.s3.data_lake_bucket),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(name));
            }
        }

        if self.processing.batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "BATCH_SIZE",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.processing.max_file_size_mb == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_FILE_SIZE_MB",
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup_from(&[("AWS_ACCOUNT_ID", "123456789012")]))
            .unwrap();

        assert_eq!(settings.aws.region, "us-east-1");
        assert_eq!(settings.s3.raw_bucket, DEFAULT_RAW_BUCKET);
        assert_eq!(settings.s3.data_lake_bucket, DEFAULT_DATA_LAKE_BUCKET);
        assert_eq!(settings.s3.processed_prefix, "processed/");
        assert_eq!(settings.processing.max_file_size_mb, 100);
        assert_eq!(settings.processing.batch_size, 1000);
        assert_eq!(
            settings.processing.partition_columns,
            vec!["year", "month", "day"]
        );
        assert_eq!(settings.catalog.crawler_name, "csv-data-crawler");
        assert_eq!(settings.notification.topic_arn, None);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("AWS_ACCOUNT_ID", "123456789012"),
            ("AWS_REGION", "eu-west-1"),
            ("RAW_BUCKET_NAME", "raw"),
            ("BATCH_SIZE", "250"),
            ("PARTITION_COLS", "year, month"),
            ("SNS_TOPIC_ARN", "arn:aws:sns:eu-west-1:123456789012:ingest"),
            ("S3_ENDPOINT", "http://localhost:9000"),
        ]))
        .unwrap();

        assert_eq!(settings.s3.raw_bucket, "raw");
        assert_eq!(settings.processing.batch_size, 250);
        assert_eq!(settings.processing.partition_columns, vec!["year", "month"]);
        assert_eq!(settings.s3.connection.region, "eu-west-1");
        assert_eq!(
            settings.s3.connection.endpoint.as_deref(),
            Some("http://localhost:9000")
        );
        assert!(settings.notification.topic_arn.is_some());
    }

    #[test]
    fn test_missing_account_id() {
        let err = Settings::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("AWS_ACCOUNT_ID"));
    }

    #[test]
    fn test_empty_bucket_is_missing() {
        let err = Settings::from_lookup(lookup_from(&[
            ("AWS_ACCOUNT_ID", "123456789012"),
            ("DATA_LAKE_BUCKET_NAME", ""),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATA_LAKE_BUCKET_NAME"));
    }

    #[test]
    fn test_invalid_numbers() {
        let err = Settings::from_lookup(lookup_from(&[
            ("AWS_ACCOUNT_ID", "123456789012"),
            ("MAX_FILE_SIZE_MB", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "MAX_FILE_SIZE_MB", .. }));

        let err = Settings::from_lookup(lookup_from(&[
            ("AWS_ACCOUNT_ID", "123456789012"),
            ("BATCH_SIZE", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "BATCH_SIZE", .. }));
    }

    #[test]
    fn test_for_buckets_is_valid() {
        let settings = Settings::for_buckets("raw", "lake");
        settings.validate().unwrap();
        assert_eq!(settings.processing.max_file_size_bytes(), 100 * 1024 * 1024);
    }
}
