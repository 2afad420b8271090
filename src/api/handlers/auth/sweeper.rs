//! Background sweep of expired security records.
//!
//! Expiry is enforced lazily at query time (`expires_at > NOW()` predicates
//! on every read); this task only keeps the tables from accumulating dead
//! rows. It runs on a fixed cadence and logs failures without stopping.

use sqlx::PgPool;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error};

use super::{attempts, storage};

#[derive(Clone, Copy, Debug)]
pub struct SweeperConfig {
    interval: Duration,
}

impl SweeperConfig {
    /// Default sweep cadence: once a minute.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_interval_seconds(mut self, seconds: u64) -> Self {
        self.interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let interval = if self.interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.interval
        };
        Self { interval }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the periodic sweeper task.
pub fn spawn_sweeper(pool: PgPool, config: SweeperConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.normalize();
        let interval = config.interval();

        loop {
            if let Err(err) = sweep_once(&pool).await {
                error!("expiry sweep failed: {err}");
            }

            sleep(interval).await;
        }
    })
}

async fn sweep_once(pool: &PgPool) -> anyhow::Result<()> {
    let attempts = attempts::purge_expired(pool).await?;
    let sessions = storage::purge_expired_sessions(pool).await?;
    let tokens = storage::purge_expired_token_pairs(pool).await?;

    if attempts + sessions + tokens > 0 {
        debug!(attempts, sessions, tokens, "purged expired records");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::SweeperConfig;
    use std::time::Duration;

    #[test]
    fn default_interval_is_one_minute() {
        assert_eq!(SweeperConfig::new().interval(), Duration::from_secs(60));
    }

    #[test]
    fn normalize_rejects_zero_interval() {
        let config = SweeperConfig::new().with_interval_seconds(0).normalize();
        assert_eq!(config.interval(), Duration::from_secs(1));
    }

    #[test]
    fn with_interval_overrides() {
        let config = SweeperConfig::new().with_interval_seconds(5);
        assert_eq!(config.interval(), Duration::from_secs(5));
    }
}
