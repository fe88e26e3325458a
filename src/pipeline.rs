use crate::apptweak::types::{AppId, AppMetadata, ChartQuery};
use crate::apptweak::StoreApi;
use crate::catalog::RunParameters;
use crate::config::{ErrorPolicy, MalformedDatePolicy, PipelineConfig};
use crate::pacing::Pacer;
use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

/// One exported game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub title: String,
    pub release_date: NaiveDate,
}

/// Counters for one run. Requests include retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub pages_requested: u32,
    pub pages_skipped: u32,
    pub ids_collected: usize,
    pub batches_requested: u32,
    pub batches_skipped: u32,
    pub missing_metadata: u32,
    pub malformed_dates: u32,
    pub too_old: u32,
    pub kept: usize,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub rows: Vec<ResultRow>,
    pub stats: RunStats,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub elapsed: Duration,
}

/// What became of a single id in Phase 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Keep(ResultRow),
    /// No record, or title/release_date absent or empty.
    Missing,
    Malformed(String),
    TooOld,
}

/// Accepted layouts once a trailing `Z` is gone. `%.f` also matches no fraction.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an AppTweak `release_date`. A trailing UTC marker is dropped and the
/// remainder read as a naive wall-clock time; explicit offsets keep the written
/// wall-clock time.
pub fn parse_release_date(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();
    let naive = trimmed
        .strip_suffix('Z')
        .or_else(|| trimmed.strip_suffix('z'))
        .unwrap_or(trimmed);

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f%:z") {
        return Ok(dt.naive_local());
    }
    if let Some(dt) = NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(dt);
    }
    anyhow::bail!("unrecognised release date {:?}", raw)
}

/// Start of the trailing window.
pub fn cutoff(now: NaiveDateTime, window_days: i64) -> NaiveDateTime {
    now - chrono::Duration::days(window_days)
}

/// Decide whether one metadata record becomes a row.
pub fn evaluate(record: Option<&AppMetadata>, cutoff: NaiveDateTime) -> Verdict {
    let Some(record) = record else {
        return Verdict::Missing;
    };
    let title = record.title.as_deref().filter(|t| !t.is_empty());
    let raw_date = record.release_date.as_deref().filter(|d| !d.is_empty());
    let (Some(title), Some(raw_date)) = (title, raw_date) else {
        return Verdict::Missing;
    };

    match parse_release_date(raw_date) {
        Ok(released) if released >= cutoff => Verdict::Keep(ResultRow {
            title: title.to_string(),
            release_date: released.date(),
        }),
        Ok(_) => Verdict::TooOld,
        Err(_) => Verdict::Malformed(raw_date.to_string()),
    }
}

/// Result of one request under an error policy.
struct Attempted<T> {
    result: Result<T>,
    attempts: u32,
}

/// Issue `request` until it succeeds or the policy's attempts run out, pausing
/// after every attempt.
async fn attempt_with_policy<P, T, F, Fut>(
    pacer: &mut P,
    policy: ErrorPolicy,
    what: &str,
    mut request: F,
) -> Attempted<T>
where
    P: Pacer + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempts = 0;
    loop {
        attempts += 1;
        let result = request().await;
        pacer.pause().await;
        match result {
            Ok(value) => return Attempted { result: Ok(value), attempts },
            Err(e) if attempts >= max_attempts => return Attempted { result: Err(e), attempts },
            Err(e) => {
                tracing::warn!(what, attempt = attempts, error = %e, "request failed, retrying");
            }
        }
    }
}

pub struct Pipeline<A, P> {
    api: A,
    pacer: P,
    config: PipelineConfig,
    device: String,
}

impl<A: StoreApi, P: Pacer> Pipeline<A, P> {
    pub fn new(api: A, pacer: P, config: PipelineConfig, device: impl Into<String>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            api,
            pacer,
            config,
            device: device.into(),
        })
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Run both phases, taking "now" from the local clock when Phase 2 starts.
    pub async fn run(&mut self, params: &RunParameters) -> Result<RunReport> {
        self.execute(params, None).await
    }

    /// Run both phases against a fixed "now".
    pub async fn run_at(&mut self, params: &RunParameters, now: NaiveDateTime) -> Result<RunReport> {
        self.execute(params, Some(now)).await
    }

    async fn execute(&mut self, params: &RunParameters, now: Option<NaiveDateTime>) -> Result<RunReport> {
        let started_at = Local::now();
        let timer = Instant::now();
        let mut stats = RunStats::default();

        tracing::info!(
            country = params.country.code.as_str(),
            category = params.category.name.as_str(),
            "fetching ranked chart"
        );
        let ids = self.collect_ranked_ids(params, &mut stats).await?;
        tracing::info!(
            ids = ids.len(),
            elapsed_s = timer.elapsed().as_secs(),
            "ranked chart collected, fetching metadata"
        );

        let now = now.unwrap_or_else(|| Local::now().naive_local());
        let rows = self.enrich(&ids, params, now, &mut stats).await?;

        let elapsed = timer.elapsed();
        tracing::info!(
            rows = rows.len(),
            skipped_pages = stats.pages_skipped,
            skipped_batches = stats.batches_skipped,
            missing = stats.missing_metadata,
            malformed = stats.malformed_dates,
            too_old = stats.too_old,
            elapsed_s = elapsed.as_secs(),
            "run finished"
        );

        Ok(RunReport {
            rows,
            stats,
            started_at,
            finished_at: Local::now(),
            elapsed,
        })
    }

    /// Phase 1: page through the free top chart until it runs dry or
    /// `max_apps` offsets have been covered. Truncated to `max_apps`.
    pub async fn collect_ranked_ids(
        &mut self,
        params: &RunParameters,
        stats: &mut RunStats,
    ) -> Result<Vec<AppId>> {
        let page_size = self.config.page_size;
        let max_apps = self.config.max_apps;
        let policy = self.config.chart_errors;
        let mut ids: Vec<AppId> = Vec::new();

        let mut offset = 0;
        while offset < max_apps {
            let query = ChartQuery {
                category: params.category.code.clone(),
                country: params.country.code.clone(),
                device: self.device.clone(),
                limit: page_size,
                offset,
            };

            let api = &self.api;
            let outcome = attempt_with_policy(&mut self.pacer, policy, "chart page", || {
                api.top_free_ids(&query)
            })
            .await;
            stats.pages_requested += outcome.attempts;

            match outcome.result {
                Ok(page) if page.is_empty() => {
                    tracing::debug!(offset, "chart exhausted");
                    break;
                }
                Ok(page) => {
                    tracing::debug!(offset, count = page.len(), "chart page");
                    ids.extend(page);
                }
                Err(e) if policy == ErrorPolicy::Abort => {
                    return Err(e.context(format!("chart page at offset {} failed", offset)));
                }
                Err(e) => {
                    tracing::warn!(offset, error = %e, "skipping chart page");
                    stats.pages_skipped += 1;
                }
            }

            offset += page_size;
        }

        ids.truncate(max_apps as usize);
        stats.ids_collected = ids.len();
        Ok(ids)
    }

    /// Phase 2: fetch metadata in fixed-size batches and keep the games
    /// released on or after `now - window_days`, in ranked order.
    pub async fn enrich(
        &mut self,
        ids: &[AppId],
        params: &RunParameters,
        now: NaiveDateTime,
        stats: &mut RunStats,
    ) -> Result<Vec<ResultRow>> {
        let cutoff = cutoff(now, self.config.window_days);
        let policy = self.config.metadata_errors;
        let country = params.country.code.as_str();
        let device = self.device.as_str();
        let mut rows = Vec::new();

        for (index, batch) in ids.chunks(self.config.batch_size).enumerate() {
            let api = &self.api;
            let outcome = attempt_with_policy(&mut self.pacer, policy, "metadata batch", || {
                api.metadata(batch, country, device)
            })
            .await;
            stats.batches_requested += outcome.attempts;

            let records: HashMap<String, AppMetadata> = match outcome.result {
                Ok(records) => records,
                Err(e) if policy == ErrorPolicy::Abort => {
                    return Err(e.context(format!("metadata batch {} failed", index)));
                }
                Err(e) => {
                    tracing::warn!(batch = index, size = batch.len(), error = %e, "skipping metadata batch");
                    stats.batches_skipped += 1;
                    continue;
                }
            };

            for id in batch {
                match evaluate(records.get(id.as_str()), cutoff) {
                    Verdict::Keep(row) => rows.push(row),
                    Verdict::Missing => {
                        tracing::debug!(id = id.as_str(), "title or release date missing");
                        stats.missing_metadata += 1;
                    }
                    Verdict::TooOld => stats.too_old += 1,
                    Verdict::Malformed(raw) => match self.config.malformed_dates {
                        MalformedDatePolicy::Skip => {
                            tracing::warn!(id = id.as_str(), raw = raw.as_str(), "unparsable release date");
                            stats.malformed_dates += 1;
                        }
                        MalformedDatePolicy::Fail => {
                            anyhow::bail!("app {} has an unusable release date {:?}", id, raw);
                        }
                    },
                }
            }
        }

        stats.kept = rows.len();
        Ok(rows)
    }
}
