use std::sync::Arc;

use shared::{
    domain::InterviewId,
    protocol::{
        DashboardSummary, Interview, InterviewCreate, InterviewFilters, InterviewListQuery,
        InterviewMetadata, InterviewUpdate,
    },
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::{error::ClientError, gateway::ApiGateway};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

const FETCH_LIST_FAILED: &str = "Failed to fetch interviews";
const CREATE_FAILED: &str = "Failed to create interview";
const UPDATE_FAILED: &str = "Failed to update interview";
const DELETE_FAILED: &str = "Failed to delete interview";
const FETCH_ONE_FAILED: &str = "Failed to fetch interview";
const DASHBOARD_FAILED: &str = "Failed to fetch dashboard summary";
const METADATA_FAILED: &str = "Failed to fetch interview metadata";

#[derive(Debug, Clone, PartialEq)]
pub struct InterviewState {
    /// Current page in server order.
    pub interviews: Vec<Interview>,
    pub current_interview: Option<Interview>,
    pub dashboard_summary: Option<DashboardSummary>,
    /// Server-reported total for the active filters, not the page length.
    pub total: u64,
    pub filters: InterviewFilters,
    pub current_page: u32,
    pub page_size: u32,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl InterviewState {
    fn new(page_size: u32) -> Self {
        Self {
            interviews: Vec::new(),
            current_interview: None,
            dashboard_summary: None,
            total: 0,
            filters: InterviewFilters::default(),
            current_page: 1,
            page_size: page_size.max(1),
            is_loading: false,
            error: None,
        }
    }

    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.page_size))
    }

    pub fn has_interviews(&self) -> bool {
        !self.interviews.is_empty()
    }

    pub fn has_active_filters(&self) -> bool {
        !self.filters.is_empty()
    }
}

impl Default for InterviewState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterviewEvent {
    Loading(bool),
    ListLoaded { page: u32, total: u64 },
    Created(InterviewId),
    Updated(InterviewId),
    Deleted(InterviewId),
    CurrentLoaded(InterviewId),
    DashboardLoaded,
    FiltersChanged(InterviewFilters),
    PageChanged(u32),
    Failed(String),
}

/// Local cache of the user's interview records.
///
/// Every remote operation marks the store loading on entry and clears it on
/// exit. The state lock is never held across a request, so overlapping
/// operations apply in completion order.
pub struct InterviewStore {
    gateway: Arc<dyn ApiGateway>,
    state: Mutex<InterviewState>,
    events: broadcast::Sender<InterviewEvent>,
}

impl InterviewStore {
    pub fn new(gateway: Arc<dyn ApiGateway>) -> Arc<Self> {
        Self::with_page_size(gateway, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(gateway: Arc<dyn ApiGateway>, page_size: u32) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            gateway,
            state: Mutex::new(InterviewState::new(page_size)),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InterviewEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> InterviewState {
        self.state.lock().await.clone()
    }

    /// Loads `page` (1 when omitted). Without explicit `filters` the last
    /// used filter set applies.
    pub async fn fetch_interviews(
        &self,
        page: Option<u32>,
        filters: Option<InterviewFilters>,
    ) -> Result<Vec<Interview>, ClientError> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(ClientError::validation("page must be at least 1"));
        }

        let query = {
            let state = self.state.lock().await;
            let offset = (page - 1).checked_mul(state.page_size).ok_or_else(|| {
                ClientError::validation(format!("page {page} is out of range"))
            })?;
            InterviewListQuery {
                filters: filters.unwrap_or_else(|| state.filters.clone()),
                limit: state.page_size,
                offset,
            }
        };

        self.begin().await;
        let response = match self.gateway.list_interviews(&query).await {
            Ok(response) => response,
            Err(err) => return Err(self.fail(err, FETCH_LIST_FAILED).await),
        };

        let total = response.total;
        {
            let mut state = self.state.lock().await;
            state.interviews = response.interviews.clone();
            state.total = total;
            state.current_page = page;
            state.filters = query.filters;
            state.is_loading = false;
        }
        debug!(page, total, "interviews: page loaded");
        self.emit(InterviewEvent::Loading(false));
        self.emit(InterviewEvent::ListLoaded { page, total });
        Ok(response.interviews)
    }

    /// Re-fetches the current page with the stored filters.
    pub async fn reload(&self) -> Result<Vec<Interview>, ClientError> {
        let page = self.state.lock().await.current_page;
        self.fetch_interviews(Some(page), None).await
    }

    /// Prepends the created record without re-querying the server.
    pub async fn create_interview(&self, data: InterviewCreate) -> Result<Interview, ClientError> {
        self.begin().await;
        let interview = match self.gateway.create_interview(&data).await {
            Ok(interview) => interview,
            Err(err) => return Err(self.fail(err, CREATE_FAILED).await),
        };

        {
            let mut state = self.state.lock().await;
            state.interviews.insert(0, interview.clone());
            state.total += 1;
            state.is_loading = false;
        }
        self.emit(InterviewEvent::Loading(false));
        self.emit(InterviewEvent::Created(interview.id));
        Ok(interview)
    }

    pub async fn update_interview(
        &self,
        id: InterviewId,
        data: InterviewUpdate,
    ) -> Result<Interview, ClientError> {
        self.begin().await;
        let updated = match self.gateway.update_interview(id, &data).await {
            Ok(updated) => updated,
            Err(err) => return Err(self.fail(err, UPDATE_FAILED).await),
        };

        {
            let mut state = self.state.lock().await;
            for interview in state.interviews.iter_mut().filter(|i| i.id == id) {
                *interview = updated.clone();
            }
            if state.current_interview.as_ref().is_some_and(|i| i.id == id) {
                state.current_interview = Some(updated.clone());
            }
            state.is_loading = false;
        }
        self.emit(InterviewEvent::Loading(false));
        self.emit(InterviewEvent::Updated(id));
        Ok(updated)
    }

    pub async fn delete_interview(&self, id: InterviewId) -> Result<(), ClientError> {
        self.begin().await;
        if let Err(err) = self.gateway.delete_interview(id).await {
            return Err(self.fail(err, DELETE_FAILED).await);
        }

        {
            let mut state = self.state.lock().await;
            state.interviews.retain(|interview| interview.id != id);
            state.total = state.total.saturating_sub(1);
            if state.current_interview.as_ref().is_some_and(|i| i.id == id) {
                state.current_interview = None;
            }
            state.is_loading = false;
        }
        self.emit(InterviewEvent::Loading(false));
        self.emit(InterviewEvent::Deleted(id));
        Ok(())
    }

    pub async fn fetch_interview(&self, id: InterviewId) -> Result<Interview, ClientError> {
        self.begin().await;
        let interview = match self.gateway.get_interview(id).await {
            Ok(interview) => interview,
            Err(err) => return Err(self.fail(err, FETCH_ONE_FAILED).await),
        };

        {
            let mut state = self.state.lock().await;
            state.current_interview = Some(interview.clone());
            state.is_loading = false;
        }
        self.emit(InterviewEvent::Loading(false));
        self.emit(InterviewEvent::CurrentLoaded(id));
        Ok(interview)
    }

    pub async fn fetch_dashboard_summary(&self) -> Result<DashboardSummary, ClientError> {
        self.begin().await;
        let summary = match self.gateway.dashboard_summary().await {
            Ok(summary) => summary,
            Err(err) => return Err(self.fail(err, DASHBOARD_FAILED).await),
        };

        {
            let mut state = self.state.lock().await;
            state.dashboard_summary = Some(summary.clone());
            state.is_loading = false;
        }
        self.emit(InterviewEvent::Loading(false));
        self.emit(InterviewEvent::DashboardLoaded);
        Ok(summary)
    }

    pub async fn fetch_metadata(&self) -> Result<InterviewMetadata, ClientError> {
        self.begin().await;
        let metadata = match self.gateway.interview_metadata().await {
            Ok(metadata) => metadata,
            Err(err) => return Err(self.fail(err, METADATA_FAILED).await),
        };
        self.state.lock().await.is_loading = false;
        self.emit(InterviewEvent::Loading(false));
        Ok(metadata)
    }

    /// Merges the set fields of `partial` and returns to page 1. Does not fetch.
    pub async fn set_filters(&self, partial: InterviewFilters) {
        let filters = {
            let mut state = self.state.lock().await;
            state.filters.merge(partial);
            state.current_page = 1;
            state.filters.clone()
        };
        self.emit(InterviewEvent::FiltersChanged(filters));
    }

    pub async fn clear_filters(&self) {
        {
            let mut state = self.state.lock().await;
            state.filters = InterviewFilters::default();
            state.current_page = 1;
        }
        self.emit(InterviewEvent::FiltersChanged(InterviewFilters::default()));
    }

    /// Does not fetch; pages below 1 are clamped.
    pub async fn set_current_page(&self, page: u32) {
        let page = page.max(1);
        self.state.lock().await.current_page = page;
        self.emit(InterviewEvent::PageChanged(page));
    }

    pub async fn clear_error(&self) {
        self.state.lock().await.error = None;
    }

    async fn begin(&self) {
        {
            let mut state = self.state.lock().await;
            state.is_loading = true;
            state.error = None;
        }
        self.emit(InterviewEvent::Loading(true));
    }

    async fn fail(&self, err: ClientError, fallback: &str) -> ClientError {
        let message = err.user_message(fallback);
        warn!(error = %err, "interviews: {fallback}");
        {
            let mut state = self.state.lock().await;
            state.error = Some(message.clone());
            state.is_loading = false;
        }
        self.emit(InterviewEvent::Loading(false));
        self.emit(InterviewEvent::Failed(message));
        err
    }

    fn emit(&self, event: InterviewEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/interviews_tests.rs"]
mod tests;
