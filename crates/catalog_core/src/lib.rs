use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use shared::{
    domain::{AppId, AppRecord, SortField},
    protocol::{decode_app, decode_apps_page, decode_categories},
};
use tokio::{
    sync::{broadcast, Mutex, Notify},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod error;
pub mod pagination;
pub mod projection;
pub mod query;
pub mod transport;

pub use error::{FetchError, QueryError, TransportError};
pub use pagination::{PageInfo, PageNav};
pub use projection::{CategoryFacet, DisplayRecord};
pub use query::{CategoryFilter, QueryState, RequestDescriptor};
pub use transport::{CatalogTransport, HttpTransport};

/// Quiet period a search or min-rating edit waits for before it fetches.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    Loading,
    Success,
    Error,
}

/// A successfully fetched page of the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    pub records: Vec<AppRecord>,
    pub total: u64,
    pub total_pages: u32,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchState {
    #[default]
    Idle,
    Loading {
        seq: u64,
    },
    Success(CatalogPage),
    Error(FetchError),
}

impl FetchState {
    pub fn phase(&self) -> FetchPhase {
        match self {
            FetchState::Idle => FetchPhase::Idle,
            FetchState::Loading { .. } => FetchPhase::Loading,
            FetchState::Success(_) => FetchPhase::Success,
            FetchState::Error(_) => FetchPhase::Error,
        }
    }

    /// Records of a successful fetch; empty in every other phase.
    pub fn records(&self) -> &[AppRecord] {
        match self {
            FetchState::Success(page) => &page.records,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchState::Error(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CatalogEvent {
    FetchStarted {
        seq: u64,
        request: RequestDescriptor,
    },
    FetchSettled {
        seq: u64,
        phase: FetchPhase,
    },
    StaleDiscarded {
        seq: u64,
        latest: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewStatus {
    Idle,
    Loading,
    Error(String),
    Empty,
    Ready,
}

/// Everything a front end needs to draw the catalog screen.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogView {
    pub status: ViewStatus,
    pub records: Vec<DisplayRecord>,
    pub facets: Vec<CategoryFacet>,
    pub page: PageInfo,
    pub query: QueryState,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl CatalogView {
    pub fn sort_indicator(&self, field: SortField) -> Option<&'static str> {
        self.query.sort_indicator(field)
    }
}

struct PendingFetch {
    seq: u64,
    request: RequestDescriptor,
    per_page: u32,
    filter_generation: u64,
}

enum Ticket {
    Issue(PendingFetch),
    Joined(u64),
}

impl Ticket {
    fn seq(&self) -> u64 {
        match self {
            Ticket::Issue(pending) => pending.seq,
            Ticket::Joined(seq) => *seq,
        }
    }
}

#[derive(Default)]
struct EngineInner {
    query: QueryState,
    fetch: FetchState,
    total: u64,
    total_pages: u32,
    issued_seq: u64,
    in_flight: Option<(u64, RequestDescriptor)>,
    pending_debounce: Option<JoinHandle<()>>,
    debounce_generation: u64,
    /// Bumped by every change that can alter the result count.
    filter_generation: u64,
    /// `filter_generation` the current `total_pages` was computed for.
    bounds_generation: u64,
}

impl EngineInner {
    fn cancel_debounce(&mut self) {
        if let Some(handle) = self.pending_debounce.take() {
            handle.abort();
        }
        self.debounce_generation += 1;
    }

    fn filters_changed(&mut self) {
        self.filter_generation += 1;
    }

    fn bounds_known(&self) -> bool {
        self.bounds_generation == self.filter_generation
    }

    fn is_settled(&self) -> bool {
        self.pending_debounce.is_none() && self.fetch.phase() != FetchPhase::Loading
    }
}

/// Owns the query state of one catalog screen and keeps its fetch state in
/// step with it. Only the response to the most recently issued request is
/// ever applied.
pub struct CatalogEngine {
    transport: Arc<dyn CatalogTransport>,
    inner: Mutex<EngineInner>,
    events: broadcast::Sender<CatalogEvent>,
    settled: Notify,
    debounce: Duration,
}

impl CatalogEngine {
    pub fn new(transport: Arc<dyn CatalogTransport>) -> Arc<Self> {
        Self::with_options(transport, QueryState::default(), SEARCH_DEBOUNCE)
    }

    pub fn with_options(
        transport: Arc<dyn CatalogTransport>,
        query: QueryState,
        debounce: Duration,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            transport,
            inner: Mutex::new(EngineInner {
                query,
                ..EngineInner::default()
            }),
            events,
            settled: Notify::new(),
            debounce,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    pub async fn query(&self) -> QueryState {
        self.inner.lock().await.query.clone()
    }

    pub async fn fetch_state(&self) -> FetchState {
        self.inner.lock().await.fetch.clone()
    }

    pub async fn page_info(&self) -> PageInfo {
        let inner = self.inner.lock().await;
        PageInfo::new(
            inner.query.page,
            inner.query.per_page,
            inner.total,
            inner.total_pages,
        )
    }

    pub async fn view(&self) -> CatalogView {
        let inner = self.inner.lock().await;
        let records = inner.fetch.records();
        let status = match &inner.fetch {
            FetchState::Idle => ViewStatus::Idle,
            FetchState::Loading { .. } => ViewStatus::Loading,
            FetchState::Error(err) => ViewStatus::Error(err.to_string()),
            FetchState::Success(page) if page.records.is_empty() => ViewStatus::Empty,
            FetchState::Success(_) => ViewStatus::Ready,
        };
        let fetched_at = match &inner.fetch {
            FetchState::Success(page) => Some(page.fetched_at),
            _ => None,
        };
        CatalogView {
            status,
            records: projection::project(records),
            facets: projection::facets(records),
            page: PageInfo::new(
                inner.query.page,
                inner.query.per_page,
                inner.total,
                inner.total_pages,
            ),
            query: inner.query.clone(),
            fetched_at,
        }
    }

    /// Fetches the current query and waits for it, bypassing the task queue.
    pub async fn load(&self) -> FetchState {
        let ticket = {
            let mut inner = self.inner.lock().await;
            inner.cancel_debounce();
            self.begin_fetch(&mut inner)
        };
        if let Ticket::Issue(pending) = ticket {
            self.run_fetch(pending).await;
        }
        self.settled().await
    }

    /// Schedules a fetch of the current query. Returns its sequence number.
    pub async fn refresh(self: &Arc<Self>) -> u64 {
        let mut inner = self.inner.lock().await;
        self.schedule_now(&mut inner)
    }

    pub async fn set_category(self: &Arc<Self>, category: CategoryFilter) -> u64 {
        let mut inner = self.inner.lock().await;
        inner.query = inner.query.category(category);
        inner.filters_changed();
        self.schedule_now(&mut inner)
    }

    pub async fn toggle_sort(self: &Arc<Self>, field: SortField) -> u64 {
        let mut inner = self.inner.lock().await;
        inner.query = inner.query.toggle_sort(field);
        self.schedule_now(&mut inner)
    }

    pub async fn set_page_size(self: &Arc<Self>, per_page: u32) -> Result<u64, QueryError> {
        let mut inner = self.inner.lock().await;
        inner.query = inner.query.page_size(per_page)?;
        inner.filters_changed();
        Ok(self.schedule_now(&mut inner))
    }

    /// Moves to `requested` if it lies within the page bounds of the current
    /// filters and is not the current page. Returns `None` (and fetches
    /// nothing) otherwise, including while the bounds for changed filters are
    /// still unknown.
    pub async fn change_page(self: &Arc<Self>, requested: u32) -> Option<u64> {
        let mut inner = self.inner.lock().await;
        let current = inner.query.page;
        let total_pages = if inner.bounds_known() {
            inner.total_pages
        } else {
            0
        };
        let target = pagination::change_page(current, requested, total_pages);
        if target == current {
            if requested != current {
                debug!(current, requested, total_pages, "page change rejected");
            }
            return None;
        }
        inner.query = inner.query.page(target);
        Some(self.schedule_now(&mut inner))
    }

    pub async fn navigate(self: &Arc<Self>, nav: PageNav) -> Option<u64> {
        let target = {
            let inner = self.inner.lock().await;
            nav.target(inner.query.page, inner.total_pages)
        };
        self.change_page(target).await
    }

    pub async fn set_search(self: &Arc<Self>, search: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.query = inner.query.search(search);
        inner.filters_changed();
        self.schedule_debounced(&mut inner);
    }

    pub async fn set_min_rating(
        self: &Arc<Self>,
        min_rating: Option<f64>,
    ) -> Result<(), QueryError> {
        let mut inner = self.inner.lock().await;
        inner.query = inner.query.min_rating(min_rating)?;
        inner.filters_changed();
        self.schedule_debounced(&mut inner);
        Ok(())
    }

    /// Waits until no debounce timer is pending and the latest fetch has settled.
    pub async fn settled(&self) -> FetchState {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let inner = self.inner.lock().await;
                if inner.is_settled() {
                    return inner.fetch.clone();
                }
            }
            notified.await;
        }
    }

    /// Full category list from the backend, independent of the current page.
    pub async fn fetch_categories(&self) -> Result<Vec<String>, FetchError> {
        let body = self.transport.get(&RequestDescriptor::categories()).await?;
        let categories = decode_categories(&body)?;
        debug!(count = categories.len(), "fetched catalog categories");
        Ok(categories)
    }

    pub async fn fetch_app(&self, id: &AppId) -> Result<AppRecord, FetchError> {
        let body = self.transport.get(&RequestDescriptor::app(id)).await?;
        Ok(decode_app(&body)?)
    }

    fn schedule_now(self: &Arc<Self>, inner: &mut EngineInner) -> u64 {
        inner.cancel_debounce();
        let ticket = self.begin_fetch(inner);
        let seq = ticket.seq();
        if let Ticket::Issue(pending) = ticket {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                engine.run_fetch(pending).await;
            });
        }
        seq
    }

    fn schedule_debounced(self: &Arc<Self>, inner: &mut EngineInner) {
        inner.cancel_debounce();
        let generation = inner.debounce_generation;
        let engine = Arc::clone(self);
        let delay = self.debounce;
        inner.pending_debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.fire_debounced(generation).await;
        }));
    }

    async fn fire_debounced(&self, generation: u64) {
        let ticket = {
            let mut inner = self.inner.lock().await;
            if inner.debounce_generation != generation {
                return;
            }
            // Our own handle; dropping it detaches rather than aborts.
            inner.pending_debounce = None;
            self.begin_fetch(&mut inner)
        };
        match ticket {
            Ticket::Issue(pending) => self.run_fetch(pending).await,
            Ticket::Joined(_) => self.settled.notify_waiters(),
        }
    }

    fn begin_fetch(&self, inner: &mut EngineInner) -> Ticket {
        if inner.total_pages > 0 && inner.query.clamp_page(inner.total_pages) {
            debug!(page = inner.query.page, "clamped page to known bounds");
        }
        let request = query::build(&inner.query);
        if let Some((seq, in_flight)) = &inner.in_flight {
            if *in_flight == request {
                debug!(seq, "identical catalog request already in flight");
                return Ticket::Joined(*seq);
            }
        }

        inner.issued_seq += 1;
        let seq = inner.issued_seq;
        inner.in_flight = Some((seq, request.clone()));
        inner.fetch = FetchState::Loading { seq };
        let _ = self.events.send(CatalogEvent::FetchStarted {
            seq,
            request: request.clone(),
        });
        Ticket::Issue(PendingFetch {
            seq,
            request,
            per_page: inner.query.per_page,
            filter_generation: inner.filter_generation,
        })
    }

    async fn run_fetch(&self, mut pending: PendingFetch) {
        loop {
            let outcome = self.execute(&pending).await;
            match self.complete(&pending, outcome).await {
                Some(next) => pending = next,
                None => break,
            }
        }
    }

    async fn execute(&self, pending: &PendingFetch) -> Result<CatalogPage, FetchError> {
        // Run the transport in its own task so a panicking implementation
        // still ends the cycle in the error phase.
        let transport = Arc::clone(&self.transport);
        let request = pending.request.clone();
        let body = tokio::spawn(async move { transport.get(&request).await })
            .await
            .map_err(|err| FetchError::Transport(format!("transport task failed: {err}")))??;

        let page = decode_apps_page(&body)?;
        let total = page.total.unwrap_or(page.records.len() as u64);
        let total_pages = page
            .total_pages
            .unwrap_or_else(|| pagination::total_pages_for(total, pending.per_page));
        Ok(CatalogPage {
            records: page.records,
            total,
            total_pages,
            fetched_at: Utc::now(),
        })
    }

    /// Applies the outcome of `pending` if it is still the latest request.
    /// Returns a follow-up fetch when the page turned out to lie past the end
    /// of the fresh results.
    async fn complete(
        &self,
        pending: &PendingFetch,
        outcome: Result<CatalogPage, FetchError>,
    ) -> Option<PendingFetch> {
        let seq = pending.seq;
        let phase = {
            let mut inner = self.inner.lock().await;
            if seq != inner.issued_seq {
                info!(seq, latest = inner.issued_seq, "discarding stale catalog response");
                let _ = self.events.send(CatalogEvent::StaleDiscarded {
                    seq,
                    latest: inner.issued_seq,
                });
                return None;
            }

            inner.in_flight = None;
            match outcome {
                Ok(page) => {
                    info!(
                        seq,
                        records = page.records.len(),
                        total = page.total,
                        total_pages = page.total_pages,
                        "catalog page loaded"
                    );
                    inner.total = page.total;
                    inner.total_pages = page.total_pages;
                    inner.bounds_generation = pending.filter_generation;
                    if page.total_pages > 0 && inner.query.page > page.total_pages {
                        info!(
                            seq,
                            page = inner.query.page,
                            total_pages = page.total_pages,
                            "page past the end of the results, refetching"
                        );
                        if let Ticket::Issue(next) = self.begin_fetch(&mut inner) {
                            return Some(next);
                        }
                    }
                    inner.fetch = FetchState::Success(page);
                }
                Err(err) => {
                    warn!(seq, error = %err, "catalog fetch failed");
                    inner.total = 0;
                    inner.total_pages = 0;
                    inner.bounds_generation = pending.filter_generation;
                    inner.fetch = FetchState::Error(err);
                }
            }
            inner.fetch.phase()
        };

        let _ = self.events.send(CatalogEvent::FetchSettled { seq, phase });
        self.settled.notify_waiters();
        None
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
