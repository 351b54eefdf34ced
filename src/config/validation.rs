use crate::config::types::{
    Config, DiscussionConfig, FetcherConfig, JobConfig, JobKind, SchedulerConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_job_config(&config.job)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_scheduler_config(&config.scheduler)?;

    if let Some(discussion) = &config.discussion {
        validate_discussion_config(discussion)?;
    } else if config.job.kind == JobKind::Discussion {
        return Err(ConfigError::Validation(
            "discussion jobs require a [discussion] section".to_string(),
        ));
    }

    Ok(())
}

/// Validates job paths
fn validate_job_config(config: &JobConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("seed-path", &config.seed_path),
        ("checkpoint-path", &config.checkpoint_path),
        ("output-path", &config.output_path),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.checkpoint_path == config.output_path {
        return Err(ConfigError::Validation(
            "checkpoint-path and output-path must differ".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    validate_origin(&config.base_url, "base-url")?;

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-ms must be greater than 0".to_string(),
        ));
    }

    if config.max_attempts < 1 || config.max_attempts > 50 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 50, got {}",
            config.max_attempts
        )));
    }

    if config.backoff_base_ms > config.backoff_cap_ms {
        return Err(ConfigError::Validation(format!(
            "backoff-base-ms ({}) cannot exceed backoff-cap-ms ({})",
            config.backoff_base_ms, config.backoff_cap_ms
        )));
    }

    if config.network_cooldown_ms <= config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "network-cooldown-ms ({}) must be longer than backoff-base-ms ({})",
            config.network_cooldown_ms, config.backoff_base_ms
        )));
    }

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user-agents cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates scheduler configuration
fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch-size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.launch_delay_min_ms > config.launch_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "launch-delay-min-ms ({}) cannot exceed launch-delay-max-ms ({})",
            config.launch_delay_min_ms, config.launch_delay_max_ms
        )));
    }

    if config.discovery_delay_min_ms > config.discovery_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "discovery-delay-min-ms ({}) cannot exceed discovery-delay-max-ms ({})",
            config.discovery_delay_min_ms, config.discovery_delay_max_ms
        )));
    }

    if config.max_listing_pages < 1 {
        return Err(ConfigError::Validation(
            "max-listing-pages must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates discussion API configuration
fn validate_discussion_config(config: &DiscussionConfig) -> Result<(), ConfigError> {
    validate_origin(&config.api_base_url, "api-base-url")?;
    validate_origin(&config.auth_url, "auth-url")?;

    if config.client_id.is_some() != config.client_secret.is_some() {
        return Err(ConfigError::Validation(
            "client-id and client-secret must be configured together".to_string(),
        ));
    }

    if config.page_limit < 1 || config.page_limit > 100 {
        return Err(ConfigError::Validation(format!(
            "page-limit must be between 1 and 100, got {}",
            config.page_limit
        )));
    }

    Ok(())
}

/// Validates that a URL parses and uses an HTTP(S) scheme
fn validate_origin(value: &str, name: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            name, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            name, value
        )));
    }

    Ok(())
}
