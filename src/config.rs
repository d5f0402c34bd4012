use std::env;
use std::time::Duration;
use std::num::NonZeroU32;
use std::str::FromStr;
use governor::Quota;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,

    // External status source
    pub status_api_base: String,
    pub status_timeout_secs: u64,

    // Per-listing poller
    pub poll_retries: u32,
    pub poll_retry_delay_ms: u64,

    // Background sweep
    pub sweep_interval_secs: u64,
    pub offline_warning_days: i64,
    pub offline_deletion_days: i64,

    pub view_dedupe_hours: i64,
    pub session_ttl_hours: i64,
    pub admin_emails: Vec<String>,

    // Rate limiting configs
    pub track_view_period_secs: u64,
    pub track_view_burst_limit: u32,
    pub submit_period_secs: u64,
    pub submit_burst_limit: u32,
    pub chat_period_secs: u64,
    pub chat_burst_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            status_api_base: "https://api.mcsrvstat.us/3".to_string(),
            status_timeout_secs: 10,
            poll_retries: 2,
            poll_retry_delay_ms: 2000,
            sweep_interval_secs: 3600,
            offline_warning_days: 15,
            offline_deletion_days: 30,
            view_dedupe_hours: 24,
            session_ttl_hours: 720,
            admin_emails: Vec::new(),
            track_view_period_secs: 1,
            track_view_burst_limit: 30,
            submit_period_secs: 60,
            submit_burst_limit: 5,
            chat_period_secs: 2,
            chat_burst_limit: 5,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn quota(period_secs: u64, burst: u32) -> Quota {
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(Duration::from_secs(period_secs))
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: env_or("PORT", defaults.port),

            status_api_base: env::var("STATUS_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.status_api_base),
            status_timeout_secs: env_or("STATUS_TIMEOUT_SECS", defaults.status_timeout_secs),

            poll_retries: env_or("POLL_RETRIES", defaults.poll_retries),
            poll_retry_delay_ms: env_or("POLL_RETRY_DELAY_MS", defaults.poll_retry_delay_ms),

            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
            offline_warning_days: env_or("OFFLINE_WARNING_DAYS", defaults.offline_warning_days),
            offline_deletion_days: env_or("OFFLINE_DELETION_DAYS", defaults.offline_deletion_days),

            view_dedupe_hours: env_or("VIEW_DEDUPE_HOURS", defaults.view_dedupe_hours),
            session_ttl_hours: env_or("SESSION_TTL_HOURS", defaults.session_ttl_hours),
            admin_emails: env::var("ADMIN_EMAILS")
                .map(|v| {
                    v.split(',')
                        .map(|e| e.trim().to_lowercase())
                        .filter(|e| !e.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.admin_emails),

            track_view_period_secs: env_or("TRACK_VIEW_PERIOD_SECS", defaults.track_view_period_secs),
            track_view_burst_limit: env_or("TRACK_VIEW_BURST_LIMIT", defaults.track_view_burst_limit),
            submit_period_secs: env_or("SUBMIT_PERIOD_SECS", defaults.submit_period_secs),
            submit_burst_limit: env_or("SUBMIT_BURST_LIMIT", defaults.submit_burst_limit),
            chat_period_secs: env_or("CHAT_PERIOD_SECS", defaults.chat_period_secs),
            chat_burst_limit: env_or("CHAT_BURST_LIMIT", defaults.chat_burst_limit),
        }
    }

    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }

    pub fn poll_retry_delay(&self) -> Duration {
        Duration::from_millis(self.poll_retry_delay_ms)
    }

    pub fn track_view_quota(&self) -> Quota {
        quota(self.track_view_period_secs, self.track_view_burst_limit)
    }

    pub fn submit_quota(&self) -> Quota {
        quota(self.submit_period_secs, self.submit_burst_limit)
    }

    pub fn chat_quota(&self) -> Quota {
        quota(self.chat_period_secs, self.chat_burst_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = Config::default();
        assert_eq!(config.poll_retries, 2);
        assert_eq!(config.poll_retry_delay(), Duration::from_secs(2));
        assert_eq!(config.offline_warning_days, 15);
        assert_eq!(config.offline_deletion_days, 30);
    }

    #[test]
    fn admin_email_match_ignores_case() {
        let config = Config {
            admin_emails: vec!["owner@example.com".to_string()],
            ..Config::default()
        };
        assert!(config.is_admin_email(" Owner@Example.com"));
        assert!(!config.is_admin_email("someone@example.com"));
    }

    #[test]
    fn zero_burst_falls_back_to_one() {
        let q = quota(0, 0);
        assert_eq!(q.burst_size().get(), 1);
    }
}
