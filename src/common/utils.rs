//! Utility functions for shardmeta

use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp (seconds)
pub fn timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Parse duration string (e.g., "500ms", "30s", "5m", "1h")
pub fn parse_duration(s: &str) -> crate::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| crate::Error::InvalidConfig(format!("missing duration unit: {}", s)))?;
    let (num_str, unit) = s.split_at(split);

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let duration = match unit {
        "ms" => Duration::from_millis(num),
        "s" => Duration::from_secs(num),
        "m" => Duration::from_secs(num * 60),
        "h" => Duration::from_secs(num * 3600),
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    Ok(duration)
}

/// Retry with exponential backoff.
///
/// Only errors for which [`crate::Error::is_retryable`] holds are retried; the
/// last error is returned once `max_attempts` is exhausted.
pub async fn retry_with_backoff<F, Fut, T>(
    mut f: F,
    max_attempts: usize,
    initial_delay: Duration,
) -> crate::Result<T>
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = crate::Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut delay = initial_delay;

    for attempt in 1..=max_attempts {
        match f(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let jitter = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 4);
                let wait = delay + Duration::from_millis(jitter);
                tracing::warn!(
                    "Retry attempt {} failed: {}, retrying in {:?}",
                    attempt,
                    e,
                    wait
                );
                tokio::time::sleep(wait).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }

    Err(crate::Error::Internal("Max retries exceeded".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let calls = AtomicUsize::new(0);
        let result = retry_with_backoff(
            |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(crate::Error::Io("flaky".into()))
                    } else {
                        Ok(n)
                    }
                }
            },
            5,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let calls = AtomicUsize::new(0);
        let result: crate::Result<()> = retry_with_backoff(
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(crate::Error::InvalidOptions("bad key".into())) }
            },
            5,
            Duration::from_millis(1),
        )
        .await;
        assert!(matches!(result, Err(crate::Error::InvalidOptions(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: crate::Result<()> = retry_with_backoff(
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(crate::Error::Io("down".into())) }
            },
            3,
            Duration::from_millis(1),
        )
        .await;
        assert!(matches!(result, Err(crate::Error::Io(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
