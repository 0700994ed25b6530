//! Profile poller.
//!
//! Fetches the current profile from the control plane's status endpoint on a
//! fixed cadence and publishes it into the shared profile cell. A failed fetch
//! only logs: the previous profile stays in effect and the next tick tries
//! again. There is no backoff beyond the cadence itself.
//!
//! The endpoint is expected to answer with a JSON object such as
//! `{"profile": "med", "status_text": "..."}`; only `profile` is read,
//! and it must be exactly one of the four lowercase tags.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::metrics::{CURRENT_PROFILE, PROFILE_FETCH_FAILURES_TOTAL};
use crate::profile::{Profile, ProfilePublisher, UnknownProfile};
use crate::shutdown::Shutdown;

/// Reasons a single fetch produced no update.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("status endpoint returned HTTP {0}")]
    Status(u16),

    #[error("malformed status body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    UnknownProfile(#[from] UnknownProfile),
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    profile: String,
}

/// Poller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub status_url: String,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            status_url: "http://auth-svc:8080/load/status".to_string(),
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(1),
        }
    }
}

/// Sole writer of the shared profile in polled mode.
pub struct ProfilePoller {
    http: Client,
    config: PollerConfig,
    publisher: ProfilePublisher,
}

impl ProfilePoller {
    pub fn new(config: PollerConfig, publisher: ProfilePublisher) -> Result<Self, PollError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            publisher,
        })
    }

    /// Issues one bounded GET against the status endpoint.
    pub async fn fetch_profile(&self) -> Result<Profile, PollError> {
        let response = self.http.get(&self.config.status_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: StatusResponse = serde_json::from_slice(&body)?;
        Ok(Profile::from_tag(&parsed.profile)?)
    }

    /// Fetches once and publishes on success. Never fails.
    pub async fn poll_once(&self) -> Option<Profile> {
        match self.fetch_profile().await {
            Ok(profile) => {
                if let Some(previous) = self.publisher.publish(profile) {
                    info!(
                        from = %previous,
                        to = %profile,
                        "Load profile changed"
                    );
                }
                CURRENT_PROFILE.set(profile.level());
                Some(profile)
            }
            Err(e) => {
                PROFILE_FETCH_FAILURES_TOTAL.inc();
                warn!(
                    url = %self.config.status_url,
                    error = %e,
                    current = %self.publisher.current(),
                    "Failed to fetch load profile; keeping current profile"
                );
                None
            }
        }
    }

    /// Polls until the stop signal fires. The first fetch happens immediately.
    pub async fn run(self, mut shutdown: Shutdown) {
        info!(
            url = %self.config.status_url,
            interval_ms = self.config.interval.as_millis() as u64,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "Profile poller starting"
        );

        let mut ticker = time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.wait() => break,
            }
            if shutdown.is_triggered() {
                break;
            }
            tokio::select! {
                _ = self.poll_once() => {}
                _ = shutdown.wait() => break,
            }
        }

        debug!("Profile poller stopped");
    }
}
