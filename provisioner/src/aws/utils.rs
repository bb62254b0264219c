use aws_config::{retry::RetryConfig, BehaviorVersion, Region, SdkConfig};
use aws_sdk_ec2::error::ProvideErrorMetadata;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Maximum number of polling attempts while waiting on a deletion
pub const MAX_POLL_ATTEMPTS: usize = 60;

/// Interval between polls
pub const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Loads shared SDK configuration, using the default region chain when `region` is `None`
pub async fn load_sdk_config(region: Option<String>) -> SdkConfig {
    let retry = RetryConfig::standard()
        .with_max_attempts(5)
        .with_initial_backoff(Duration::from_millis(500))
        .with_max_backoff(Duration::from_secs(20));
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).retry_config(retry);
    if let Some(region) = region {
        loader = loader.region(Region::new(region));
    }
    loader.load().await
}

/// Returns true if the service error carries one of the not-found `codes`
pub fn is_not_found<E: ProvideErrorMetadata>(err: &E, codes: &[&str]) -> bool {
    err.code().is_some_and(|code| codes.contains(&code))
}

/// Seconds since the unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Static SDK configuration for building (never sending) requests in tests
#[cfg(test)]
pub fn test_sdk_config() -> SdkConfig {
    SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .build()
}
