//! Configuration for segment recording.

use std::time::Duration;

/// Configuration options for Dgraph segments.
///
/// # Example
///
/// ```rust
/// use dgraph_tracing::TracingConfig;
/// use std::time::Duration;
///
/// let config = TracingConfig::default()
///     .with_host("db1")
///     .with_connection_id("9080")
///     .with_database_name("prod")
///     .with_slow_segment_threshold(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Host name recorded on every segment.
    /// Default: `None`
    pub host: Option<String>,

    /// Port, socket path or other connection identifier recorded on every segment.
    /// Default: `None`
    pub connection_id: Option<String>,

    /// Database name recorded on every segment (useful for multi-cluster setups).
    /// Default: `None`
    pub database_name: Option<String>,

    /// Whether to record the DQL query text on query segments.
    /// Default: `true`
    pub log_statements: bool,

    /// Whether to record request parameters (variables, payloads, schema) on segments.
    /// Default: `true`
    pub log_parameters: bool,

    /// Calls taking longer than this are logged at WARN level.
    /// Default: 500ms
    pub slow_segment_threshold: Duration,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            host: None,
            connection_id: None,
            database_name: None,
            log_statements: true,
            log_parameters: true,
            slow_segment_threshold: Duration::from_millis(500),
        }
    }
}

impl TracingConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host name recorded on segments.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the port, path or ID recorded on segments.
    pub fn with_connection_id(mut self, id: impl Into<String>) -> Self {
        self.connection_id = Some(id.into());
        self
    }

    /// Set a database name to include in segments.
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    /// Enable or disable query text recording.
    pub fn with_statement_logging(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    /// Enable or disable parameter recording.
    ///
    /// **Security Warning**: query variables and mutation payloads often carry
    /// user data. Disable when traces leave a trusted environment.
    pub fn with_parameter_logging(mut self, enabled: bool) -> Self {
        self.log_parameters = enabled;
        self
    }

    /// Set the threshold for slow call warnings.
    pub fn with_slow_segment_threshold(mut self, threshold: Duration) -> Self {
        self.slow_segment_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TracingConfig::new();
        assert!(config.host.is_none());
        assert!(config.connection_id.is_none());
        assert!(config.database_name.is_none());
        assert!(config.log_statements);
        assert!(config.log_parameters);
        assert_eq!(config.slow_segment_threshold, Duration::from_millis(500));
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::default()
            .with_database_name("prod")
            .with_connection_id("9080")
            .with_host("db1")
            .with_parameter_logging(false);

        assert_eq!(config.host.as_deref(), Some("db1"));
        assert_eq!(config.connection_id.as_deref(), Some("9080"));
        assert_eq!(config.database_name.as_deref(), Some("prod"));
        assert!(!config.log_parameters);
        assert!(config.log_statements);
    }
}
