//! Price board: the single state object behind a price page.
//!
//! Holds the fetched record set and the view derived from it. A refresh
//! replaces everything; only the most recently started refresh may publish
//! its result, and starting a new one aborts the one in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::data::{PriceQuery, PriceSource};
use crate::error::InsufficientDataError;
use crate::prices::comparison::{price_series, PriceSeries};
use crate::prices::{build_view, CompareOptions, MarketView, PriceFilter, PriceRecord};

/// Where the board is in its fetch cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadState {
    Loading,
    Loaded(LoadedPrices),
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadedPrices {
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    /// Every normalized record, before filtering.
    #[serde(skip)]
    pub all_records: Vec<PriceRecord>,
    pub view: MarketView,
}

/// How a refresh ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Published,
    Failed,
    /// A newer refresh started before this one finished.
    Superseded,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardHealth {
    pub status: &'static str,
    pub source: String,
    pub generation: u64,
    pub refreshes_published: u64,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub records: usize,
    pub comparison_available: bool,
}

struct BoardInner {
    state: LoadState,
    filter: PriceFilter,
    query: PriceQuery,
    refreshes_published: u64,
    last_refresh_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct PriceBoard {
    source: Arc<dyn PriceSource>,
    options: CompareOptions,
    inner: Arc<RwLock<BoardInner>>,
    generation: Arc<AtomicU64>,
    in_flight: Arc<Mutex<Option<AbortHandle>>>,
}

impl PriceBoard {
    pub fn new(source: Arc<dyn PriceSource>, options: CompareOptions) -> Self {
        Self {
            source,
            options,
            inner: Arc::new(RwLock::new(BoardInner {
                state: LoadState::Loading,
                filter: PriceFilter::default(),
                query: PriceQuery::default(),
                refreshes_published: 0,
                last_refresh_at: None,
            })),
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Fetch a fresh record set and rebuild the view.
    ///
    /// Clears the current state first. Aborts any refresh still running.
    pub async fn refresh(&self) -> RefreshOutcome {
        // Held until the new task is registered so that generations and
        // abort handles are handed out in the same order.
        let mut in_flight = self.in_flight.lock().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let query = {
            let mut inner = self.inner.write().await;
            inner.state = LoadState::Loading;
            inner.query.clone()
        };

        let board = self.clone();
        let handle = tokio::spawn(async move { board.run_refresh(generation, query).await });

        if let Some(previous) = in_flight.replace(handle.abort_handle()) {
            previous.abort();
        }
        drop(in_flight);

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => RefreshOutcome::Superseded,
            Err(e) => {
                warn!(generation, error = %e, "Refresh task failed");
                self.publish(generation, Err("refresh task failed".to_string()))
                    .await;
                RefreshOutcome::Failed
            }
        }
    }

    async fn run_refresh(&self, generation: u64, query: PriceQuery) -> RefreshOutcome {
        debug!(generation, source = self.source.name(), "Refresh started");

        let fetched = self.source.fetch(&query).await.map_err(|e| {
            warn!(generation, error = %e, "Price fetch failed");
            e.to_string()
        });

        let failed = fetched.is_err();
        if !self.publish(generation, fetched).await {
            return RefreshOutcome::Superseded;
        }
        if failed {
            RefreshOutcome::Failed
        } else {
            RefreshOutcome::Published
        }
    }

    /// Store the outcome of refresh `generation` unless a newer refresh has
    /// started since. The view is built under the same lock so it always
    /// reflects the current filter.
    async fn publish(&self, generation: u64, fetched: Result<Vec<PriceRecord>, String>) -> bool {
        let mut inner = self.inner.write().await;
        let current = self.generation.load(Ordering::SeqCst);
        if generation != current {
            debug!(generation, current, "Discarding stale refresh result");
            return false;
        }

        let state = match fetched {
            Ok(records) => {
                let view = build_view(&records, &inner.filter, &self.options);
                info!(
                    generation,
                    records = records.len(),
                    shown = view.records.len(),
                    comparison = view.comparison.is_available(),
                    "Prices refreshed"
                );
                LoadState::Loaded(LoadedPrices {
                    source: self.source.name().to_string(),
                    fetched_at: Utc::now(),
                    all_records: records,
                    view,
                })
            }
            Err(error) => LoadState::Failed { error },
        };
        inner.state = state;
        inner.refreshes_published += 1;
        inner.last_refresh_at = Some(Utc::now());
        true
    }

    /// Change the client-side filter and recompute from the cached records.
    pub async fn apply_filter(&self, filter: PriceFilter) -> Option<MarketView> {
        let mut inner = self.inner.write().await;
        inner.filter = filter.clone();

        match &mut inner.state {
            LoadState::Loaded(loaded) => {
                loaded.view = build_view(&loaded.all_records, &filter, &self.options);
                Some(loaded.view.clone())
            }
            LoadState::Loading | LoadState::Failed { .. } => None,
        }
    }

    /// Upstream narrowing used by the next refresh.
    pub async fn set_query(&self, query: PriceQuery) {
        debug!(?query, "Upstream query changed");
        self.inner.write().await.query = query;
    }

    pub async fn filter(&self) -> PriceFilter {
        self.inner.read().await.filter.clone()
    }

    pub async fn query(&self) -> PriceQuery {
        self.inner.read().await.query.clone()
    }

    pub async fn state(&self) -> LoadState {
        self.inner.read().await.state.clone()
    }

    /// The view for `filter` without changing the board's own filter.
    pub async fn view_for(&self, filter: &PriceFilter) -> Result<MarketView, LoadState> {
        let inner = self.inner.read().await;
        match &inner.state {
            LoadState::Loaded(loaded) => Ok(build_view(&loaded.all_records, filter, &self.options)),
            other => Err(other.clone()),
        }
    }

    /// Price histories for `filter`. `Ok(Err(_))` means the records loaded
    /// but span fewer than two dates.
    pub async fn series_for(
        &self,
        filter: &PriceFilter,
    ) -> Result<Result<Vec<PriceSeries>, InsufficientDataError>, LoadState> {
        let inner = self.inner.read().await;
        match &inner.state {
            LoadState::Loaded(loaded) => {
                let filtered = filter.apply(&loaded.all_records);
                Ok(price_series(&filtered, self.options.duplicate_policy))
            }
            other => Err(other.clone()),
        }
    }

    pub async fn health(&self) -> BoardHealth {
        let inner = self.inner.read().await;
        let (status, records, comparison_available) = match &inner.state {
            LoadState::Loading => ("loading", 0, false),
            LoadState::Failed { .. } => ("error", 0, false),
            LoadState::Loaded(loaded) => (
                "ok",
                loaded.all_records.len(),
                loaded.view.comparison.is_available(),
            ),
        };

        BoardHealth {
            status,
            source: self.source.name().to_string(),
            generation: self.generation.load(Ordering::SeqCst),
            refreshes_published: inner.refreshes_published,
            last_refresh_at: inner.last_refresh_at,
            records,
            comparison_available,
        }
    }
}
