use serde::{Deserialize, Serialize};

/// How to reach the S3 API.
///
/// Credentials are optional: when absent the default AWS provider chain is used
/// (environment, web identity, container/instance role).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub region: String,
    /// Custom endpoint, e.g. MinIO or LocalStack
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl StorageConfig {
    pub fn from_lookup<F>(region: impl Into<String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            region: region.into(),
            endpoint: lookup("S3_ENDPOINT").filter(|v| !v.is_empty()),
            access_key: lookup("S3_ACCESS_KEY"),
            secret_key: lookup("S3_SECRET_KEY"),
            path_style: lookup("S3_PATH_STYLE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    pub fn for_aws(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }

    pub fn for_minio(endpoint: impl Into<String>) -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: Some(endpoint.into()),
            access_key: Some("minioadmin".to_string()),
            secret_key: Some("minioadmin".to_string()),
            path_style: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_minio() {
        let config = StorageConfig::for_minio("http://localhost:9000");
        assert_eq!(config.endpoint, Some("http://localhost:9000".to_string()));
        assert!(config.path_style);
        assert_eq!(config.access_key.as_deref(), Some("minioadmin"));
    }

    #[test]
    fn test_from_lookup() {
        let config = StorageConfig::from_lookup("sa-east-1", |name| match name {
            "S3_ENDPOINT" => Some("http://localstack:4566".to_string()),
            "S3_PATH_STYLE" => Some("true".to_string()),
            _ => None,
        });

        assert_eq!(config.region, "sa-east-1");
        assert_eq!(config.endpoint.as_deref(), Some("http://localstack:4566"));
        assert!(config.path_style);
        assert_eq!(config.access_key, None);
    }

    #[test]
    fn test_for_aws_uses_provider_chain() {
        let config = StorageConfig::for_aws("us-west-2");
        assert_eq!(config.region, "us-west-2");
        assert!(config.endpoint.is_none());
        assert!(config.access_key.is_none());
        assert!(!config.path_style);
    }
}
