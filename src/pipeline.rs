//! The update cycle orchestrator.
//!
//! One invocation runs one linear cycle with early exit on failure:
//!
//! ```text
//! validate config → load schedule → resolve hour → probe endpoint
//!   → login → read current record → fetch + classify blobs
//!   → merge → conditional write
//! ```
//!
//! Two outcomes are not failures: an hour without a schedule entry ends
//! the cycle before any network call, and an absent current record
//! continues from an empty baseline. A failed *banner* fetch degrades to
//! keeping the prior banner; every other stage failure aborts the cycle
//! with its failure class.

use crate::blob::BlobFetcher;
use crate::config::AppConfig;
use crate::error::{Result, RotationError};
use crate::probe::{EndpointProber, EndpointStatus, normalize_endpoint};
use crate::profile::{BannerUpdate, build_next};
use crate::schedule::{BannerDirective, ContentId, Schedule};
use crate::session::Session;
use chrono::{DateTime, Local, Timelike};
use std::fmt;
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;
use uuid::Uuid;

/// How one update cycle ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The profile record was written.
    Updated {
        /// Hour the schedule entry was keyed on.
        hour: u8,
        /// Avatar blob that was applied.
        avatar: ContentId,
        /// Whether the banner was set or cleared (as opposed to carried over).
        banner_changed: bool,
        /// Whether this was a first-ever unconditional create.
        created: bool,
    },
    /// No schedule entry for this hour; nothing was contacted.
    NoEntry {
        /// The hour that had no entry.
        hour: u8,
    },
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Updated {
                hour,
                avatar,
                banner_changed,
                created,
            } => {
                let verb = if *created { "created" } else { "updated" };
                write!(f, "{verb} profile for hour {hour:02} (avatar {avatar}")?;
                if *banner_changed {
                    write!(f, ", banner changed")?;
                }
                write!(f, ")")
            }
            Self::NoEntry { hour } => write!(f, "no schedule entry for hour {hour:02}"),
        }
    }
}

/// Result of a `--check` preflight: config, schedule and endpoint are
/// all usable, without authenticating or writing anything.
#[derive(Debug, Clone)]
pub struct PreflightReport {
    /// Hours that have a valid schedule entry, ascending.
    pub entry_hours: Vec<u8>,
    /// The normalized endpoint.
    pub endpoint: Url,
    /// Health-check latency in milliseconds.
    pub latency_ms: u64,
}

/// Orchestrates one update cycle.
pub struct RotationPipeline {
    config: AppConfig,
}

impl RotationPipeline {
    /// Create a pipeline over an already-loaded configuration.
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Run one cycle at the current local time.
    pub async fn run(&self) -> Result<CycleOutcome> {
        self.run_at(Local::now()).await
    }

    /// Run one cycle as of `now`. Exposed for deterministic testing.
    pub async fn run_at(&self, now: DateTime<Local>) -> Result<CycleOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!("cycle", run_id = %run_id);
        self.execute(now).instrument(span).await
    }

    /// Validate config, lint the schedule and probe the endpoint without
    /// touching credentials or records.
    pub async fn preflight(&self) -> Result<PreflightReport> {
        self.config.validate()?;
        let schedule = Schedule::load(&self.config.rotation.schedule_path)?;
        info!(
            entries = schedule.len(),
            "schedule loaded: hours {:?}",
            schedule.hours()
        );

        let endpoint = normalize_endpoint(&self.config.service.endpoint)?;
        let prober = EndpointProber::new(endpoint.clone(), self.config.timeout())?;
        match prober.check().await {
            EndpointStatus::Healthy { latency_ms } => {
                info!(endpoint = %endpoint, latency_ms, "endpoint is healthy");
                Ok(PreflightReport {
                    entry_hours: schedule.hours(),
                    endpoint,
                    latency_ms,
                })
            }
            status => Err(RotationError::Liveness(format!(
                "endpoint {endpoint} is {status}"
            ))),
        }
    }

    async fn execute(&self, now: DateTime<Local>) -> Result<CycleOutcome> {
        self.config.validate()?;

        let hour = now.hour() as u8;
        let schedule = Schedule::load(&self.config.rotation.schedule_path)?;
        let Some(selection) = schedule.resolve(now) else {
            info!(hour, "no schedule entry for this hour, nothing to do");
            return Ok(CycleOutcome::NoEntry { hour });
        };
        info!(hour, avatar = %selection.avatar, "resolved schedule entry");

        // Liveness gate: abort before any credential-bearing call.
        let endpoint = normalize_endpoint(&self.config.service.endpoint)?;
        let prober = EndpointProber::new(endpoint.clone(), self.config.timeout())?;
        let status = prober.check().await;
        if !status.is_healthy() {
            return Err(RotationError::Liveness(format!(
                "endpoint {endpoint} is {status}"
            )));
        }
        debug!(endpoint = %endpoint, %status, "endpoint verified");

        let session = Session::login(
            endpoint.clone(),
            &self.config.service.handle,
            &self.config.service.password,
            self.config.timeout(),
        )
        .await?;
        info!(handle = %session.handle, did = %session.did, "authenticated");

        let repo = self
            .config
            .service
            .did
            .clone()
            .unwrap_or_else(|| session.did.clone());

        let current = session.get_profile(&repo).await?;
        match &current {
            Some((record, token)) => {
                info!(
                    version = %token,
                    display_name = record.display_name.as_deref().unwrap_or(&session.handle),
                    "read current profile record"
                );
            }
            None => {
                info!("no existing profile record, starting from an empty baseline");
            }
        }

        let fetcher = BlobFetcher::new(endpoint.clone(), repo.clone(), self.config.timeout())?;
        let avatar_meta = fetcher.fetch_classified(&selection.avatar).await?;
        info!(
            cid = %avatar_meta.cid,
            mime = %avatar_meta.mime_type,
            size = avatar_meta.size,
            "fetched avatar blob"
        );

        let banner_update = if !self.config.rotation.update_banner {
            if selection.banner != BannerDirective::Keep {
                debug!("banner directives are disabled by configuration");
            }
            BannerUpdate::Keep
        } else {
            match &selection.banner {
                BannerDirective::Keep => BannerUpdate::Keep,
                BannerDirective::Clear => {
                    info!("schedule requests clearing the banner");
                    BannerUpdate::Clear
                }
                BannerDirective::Set(cid) => match fetcher.fetch_classified(cid).await {
                    Ok(meta) => {
                        info!(cid = %meta.cid, mime = %meta.mime_type, "fetched banner blob");
                        BannerUpdate::Set(meta)
                    }
                    Err(e) => {
                        // Non-fatal: fall back to the prior banner rather
                        // than clearing it or aborting the avatar update.
                        warn!(cid = %cid, error = %e, "banner fetch failed, keeping previous banner");
                        BannerUpdate::Keep
                    }
                },
            }
        };
        let banner_changed = banner_update != BannerUpdate::Keep;

        let (prior, token) = match current {
            Some((record, token)) => (Some(record), Some(token)),
            None => (None, None),
        };
        let created = token.is_none();
        let next = build_next(prior.as_ref(), &avatar_meta, banner_update);

        session.put_profile(&repo, &next, token.as_ref()).await?;
        let outcome = CycleOutcome::Updated {
            hour,
            avatar: selection.avatar.clone(),
            banner_changed,
            created,
        };
        info!(%outcome, "cycle complete");
        Ok(outcome)
    }
}
