use std::time::Duration;

use logit_core::{AttrValue, Level, LogitError, LogitResult};
use url::Url;

pub const DEFAULT_BATCH_SIZE: usize = 512;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOGS_PATH: &str = "/v1/logs";

/// Configuration for the OTLP/HTTP log exporter.
#[derive(Debug, Clone)]
pub struct OtlpConfig {
    pub endpoint: String,
    pub name: String,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
    pub resource_attributes: Vec<(String, AttrValue)>,
    pub scope_name: String,
    pub scope_version: String,
    pub level: Level,
}

impl OtlpConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            name: "otlp".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            headers: Vec::new(),
            resource_attributes: vec![(
                "service.name".to_string(),
                AttrValue::String("unknown_service".to_string()),
            )],
            scope_name: "logit".to_string(),
            scope_version: env!("CARGO_PKG_VERSION").to_string(),
            level: Level::Info,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds an HTTP header sent with every export request, e.g. an
    /// `Authorization` token for the collector.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_service_name(self, name: impl Into<String>) -> Self {
        self.with_resource_attribute("service.name", AttrValue::String(name.into()))
    }

    pub fn with_resource_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> Self {
        let (key, value) = (key.into(), value.into());
        match self.resource_attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.resource_attributes.push((key, value)),
        }
        self
    }

    pub fn with_scope(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.scope_name = name.into();
        self.scope_version = version.into();
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn validate(&self) -> LogitResult<()> {
        let url = self.parse_endpoint()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(LogitError::InvalidConfig(format!(
                "endpoint scheme must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.batch_size == 0 {
            return Err(LogitError::InvalidConfig(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(LogitError::InvalidConfig(
                "flush_interval must be greater than zero".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(LogitError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The full logs URL. A bare authority gets the standard `/v1/logs`
    /// path appended; an explicit path is kept as-is.
    pub fn endpoint_url(&self) -> LogitResult<Url> {
        let mut url = self.parse_endpoint()?;
        if url.path().is_empty() || url.path() == "/" {
            url.set_path(DEFAULT_LOGS_PATH);
        }
        Ok(url)
    }

    fn parse_endpoint(&self) -> LogitResult<Url> {
        Url::parse(&self.endpoint).map_err(|err| {
            LogitError::InvalidConfig(format!("invalid endpoint '{}': {}", self.endpoint, err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OtlpConfig::new("http://localhost:4318");
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.flush_interval, DEFAULT_FLUSH_INTERVAL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.level, Level::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_service_name() {
        let config = OtlpConfig::new("http://localhost:4318");
        let service = config
            .resource_attributes
            .iter()
            .find(|(k, _)| k == "service.name")
            .map(|(_, v)| v.clone());
        assert_eq!(service, Some(AttrValue::String("unknown_service".to_string())));
    }

    #[test]
    fn test_with_service_name_replaces() {
        let config = OtlpConfig::new("http://localhost:4318").with_service_name("checkout");
        let names: Vec<_> = config
            .resource_attributes
            .iter()
            .filter(|(k, _)| k == "service.name")
            .collect();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].1, AttrValue::String("checkout".to_string()));
    }

    #[test]
    fn test_rejects_bad_endpoints() {
        assert!(OtlpConfig::new("not a url").validate().is_err());
        assert!(OtlpConfig::new("ftp://localhost:4318").validate().is_err());
    }

    #[test]
    fn test_rejects_zero_values() {
        let base = "http://localhost:4318";
        assert!(OtlpConfig::new(base).with_batch_size(0).validate().is_err());
        assert!(OtlpConfig::new(base)
            .with_flush_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(OtlpConfig::new(base)
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_endpoint_url_appends_logs_path() {
        let url = OtlpConfig::new("http://localhost:4318").endpoint_url().unwrap();
        assert_eq!(url.as_str(), "http://localhost:4318/v1/logs");

        let explicit = OtlpConfig::new("http://collector:4318/custom/ingest")
            .endpoint_url()
            .unwrap();
        assert_eq!(explicit.as_str(), "http://collector:4318/custom/ingest");
    }
}
