//! View state controller: owns the working set, the view mode and the
//! loading/error flags, and orchestrates every gateway call made on behalf
//! of the article browser.
//!
//! All operations take `&self`. In-process state sits behind async mutexes
//! that are never held across a gateway call, so unrelated actions can be
//! in flight together while the listing/search trigger and per-article
//! locks keep a user from doubling up the same action.

use std::{collections::BTreeSet, sync::Arc};

use shared::{
    domain::{ArticleId, ViewMode},
    protocol::{Article, SearchHit},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::{ClientSettings, SettingsError},
    dialogs::{DialogManager, DismissSignal, OverlayKind},
    error::ClientError,
    form::{ArticleForm, DraftField},
    gateway::{ArticleApi, HttpGateway},
    locks::EntityLocks,
    outcome::{Outcome, SkipReason},
};

/// One row of the working set.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Article(Article),
    Hit(SearchHit),
}

impl Entry {
    pub fn article(&self) -> &Article {
        match self {
            Self::Article(article) => article,
            Self::Hit(hit) => &hit.article,
        }
    }

    pub fn id(&self) -> ArticleId {
        self.article().id
    }

    /// Similarity score for search rows; `None` for listing rows.
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Article(_) => None,
            Self::Hit(hit) => Some(hit.score_or_default()),
        }
    }

    pub fn distance(&self) -> Option<f64> {
        match self {
            Self::Article(_) => None,
            Self::Hit(hit) => Some(hit.distance_or_default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading(ViewMode),
}

/// State owned by the controller. Mutated only through the named transitions below.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    mode: ViewMode,
    query: String,
    items: Vec<Entry>,
    phase: Phase,
    error: Option<String>,
    refresh_pending: bool,
}

impl ViewState {
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn items(&self) -> &[Entry] {
        &self.items
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading(_))
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Enters `Loading(target)` unless a listing or search load is already outstanding.
    pub fn begin_load(&mut self, target: ViewMode) -> bool {
        if self.is_loading() {
            return false;
        }
        self.phase = Phase::Loading(target);
        true
    }

    pub fn finish_listing(&mut self, articles: Vec<Article>) {
        self.items = articles.into_iter().map(Entry::Article).collect();
        self.mode = ViewMode::Listing;
        self.query.clear();
        self.phase = Phase::Idle;
        self.error = None;
    }

    pub fn finish_search(&mut self, query: &str, hits: Vec<SearchHit>) {
        self.items = hits.into_iter().map(Entry::Hit).collect();
        self.mode = ViewMode::Searching;
        self.query = query.to_string();
        self.phase = Phase::Idle;
        self.error = None;
    }

    /// Starts a listing load on behalf of a mutation. When a load is already
    /// outstanding the refresh is queued and that load must honor it.
    pub fn begin_resync(&mut self) -> bool {
        if self.is_loading() {
            self.refresh_pending = true;
            return false;
        }
        self.phase = Phase::Loading(ViewMode::Listing);
        true
    }

    /// Consumes a queued refresh. The outstanding load becomes a listing load
    /// and its own result must be discarded.
    pub fn take_refresh(&mut self) -> bool {
        if !std::mem::take(&mut self.refresh_pending) {
            return false;
        }
        self.phase = Phase::Loading(ViewMode::Listing);
        true
    }

    pub fn refresh_pending(&self) -> bool {
        self.refresh_pending
    }

    /// Ends a load with an error; the previous mode and working set stay.
    pub fn fail_load(&mut self, message: impl Into<String>) {
        self.phase = Phase::Idle;
        self.error = Some(message.into());
    }

    /// Surfaces an error from an action that did not own the loading flag.
    pub fn surface(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn count_label(&self) -> String {
        count_label(self.mode, self.items.len(), self.is_loading())
    }

    pub fn empty_message(&self) -> Option<&'static str> {
        empty_state_message(self.mode, self.items.len(), self.is_loading())
    }
}

pub fn count_label(mode: ViewMode, len: usize, loading: bool) -> String {
    if loading {
        return "Loading...".to_string();
    }
    let noun = match (mode, len) {
        (ViewMode::Listing, 1) => "article",
        (ViewMode::Listing, _) => "articles",
        (ViewMode::Searching, 1) => "result",
        (ViewMode::Searching, _) => "results",
    };
    format!("{len} {noun}")
}

pub fn empty_state_message(mode: ViewMode, len: usize, loading: bool) -> Option<&'static str> {
    if len > 0 {
        return None;
    }
    Some(match (loading, mode) {
        (true, _) => "Loading articles...",
        (false, ViewMode::Listing) => "No articles yet.",
        (false, ViewMode::Searching) => "No articles matched your search.",
    })
}

/// Everything a view needs to render one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub view: ViewState,
    pub busy_ids: BTreeSet<ArticleId>,
    pub detail: Option<Article>,
    pub detail_pending: Option<ArticleId>,
    pub form: Option<ArticleForm>,
    pub form_pending: Option<ArticleId>,
}

pub struct ArticleBrowser {
    api: Arc<dyn ArticleApi>,
    state: Mutex<ViewState>,
    locks: EntityLocks,
    dialogs: Mutex<DialogManager>,
}

impl ArticleBrowser {
    pub fn new(api: Arc<dyn ArticleApi>) -> Self {
        Self {
            api,
            state: Mutex::new(ViewState::default()),
            locks: EntityLocks::new(),
            dialogs: Mutex::new(DialogManager::new()),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, SettingsError> {
        Ok(Self::new(Arc::new(HttpGateway::new(settings)?)))
    }

    pub fn api(&self) -> Arc<dyn ArticleApi> {
        Arc::clone(&self.api)
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        let view = self.state.lock().await.clone();
        let dialogs = self.dialogs.lock().await;
        ViewSnapshot {
            view,
            busy_ids: self.locks.locked_ids(),
            detail: dialogs.selected_article().cloned(),
            detail_pending: dialogs.detail().pending_id(),
            form: dialogs.open_form().cloned(),
            form_pending: dialogs.form().pending_id(),
        }
    }

    pub fn is_locked(&self, id: ArticleId) -> bool {
        self.locks.is_locked(id)
    }

    pub async fn clear_error(&self) {
        self.state.lock().await.clear_error();
    }

    /// Replaces the working set with the first page of the listing.
    pub async fn load_listing(&self) -> Result<Outcome, ClientError> {
        if !self.state.lock().await.begin_load(ViewMode::Listing) {
            debug!("listing load skipped; another load is in flight");
            return Ok(Outcome::Skipped(SkipReason::Busy));
        }
        self.fetch_listing().await
    }

    /// Runs the listing request for a load that already owns the loading flag.
    /// A refresh queued while the request was out makes its result stale, so
    /// the request is issued again.
    async fn fetch_listing(&self) -> Result<Outcome, ClientError> {
        loop {
            let result = self.api.list_articles().await;

            let mut state = self.state.lock().await;
            if state.take_refresh() {
                debug!("listing superseded by a mutation; fetching again");
                continue;
            }
            return match result {
                Ok(articles) => {
                    info!(count = articles.len(), "listing loaded");
                    state.finish_listing(articles);
                    Ok(Outcome::Done(()))
                }
                Err(err) => {
                    warn!(error = %err, "listing load failed");
                    state.fail_load(err.to_string());
                    Err(err.into())
                }
            };
        }
    }

    /// Brings the working set back in line with the service after a mutation.
    /// Never skipped: an in-flight load is told to refetch the listing instead.
    async fn resync_listing(&self) {
        if !self.state.lock().await.begin_resync() {
            debug!("load in flight; listing refresh queued");
            return;
        }
        if let Err(err) = self.fetch_listing().await {
            warn!(error = %err, "listing refresh after mutation failed");
        }
    }

    /// Replaces the working set with ranked hits. Blank queries are ignored.
    pub async fn run_search(&self, query: &str) -> Result<Outcome, ClientError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Outcome::Skipped(SkipReason::EmptyQuery));
        }
        if !self.state.lock().await.begin_load(ViewMode::Searching) {
            debug!(query, "search skipped; another load is in flight");
            return Ok(Outcome::Skipped(SkipReason::Busy));
        }

        let result = self.api.search_articles(query).await;

        let mut state = self.state.lock().await;
        if state.take_refresh() {
            drop(state);
            debug!(query, "search superseded by a mutation; loading the listing");
            return self
                .fetch_listing()
                .await
                .map(|_| Outcome::Skipped(SkipReason::Stale));
        }
        match result {
            Ok(hits) => {
                info!(query, count = hits.len(), "search completed");
                state.finish_search(query, hits);
                Ok(Outcome::Done(()))
            }
            Err(err) => {
                warn!(query, error = %err, "search failed");
                state.fail_load(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Leaves search results by reloading the listing.
    pub async fn clear_search(&self) -> Result<Outcome, ClientError> {
        self.load_listing().await
    }

    /// Deletes `article` after `confirm` approves it, then reloads the listing
    /// rather than splicing the row out locally. A busy article is refused
    /// before `confirm` is asked.
    pub async fn remove_entity(
        &self,
        article: &Article,
        confirm: impl FnOnce(&Article) -> bool,
    ) -> Result<Outcome, ClientError> {
        if self.locks.is_locked(article.id) {
            debug!(article_id = %article.id, "delete skipped; article is busy");
            return Ok(Outcome::Skipped(SkipReason::Busy));
        }
        if !confirm(article) {
            debug!(article_id = %article.id, "delete declined");
            return Ok(Outcome::Skipped(SkipReason::Declined));
        }
        let Some(guard) = self.locks.guard(article.id) else {
            debug!(article_id = %article.id, "delete skipped; article became busy");
            return Ok(Outcome::Skipped(SkipReason::Busy));
        };

        let result = self.api.delete_article(article.id).await;
        drop(guard);

        match result {
            Ok(()) => {
                info!(article_id = %article.id, "article deleted");
                self.resync_listing().await;
                Ok(Outcome::Done(()))
            }
            Err(err) => {
                warn!(article_id = %article.id, error = %err, "delete failed");
                self.state.lock().await.surface(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Fetches the full article and opens the read-only detail overlay.
    pub async fn open_detail(&self, id: ArticleId) -> Result<Outcome, ClientError> {
        self.open_seeded(OverlayKind::Detail, id).await
    }

    /// Fetches the full article and opens the form seeded for editing.
    pub async fn open_edit(&self, id: ArticleId) -> Result<Outcome, ClientError> {
        self.open_seeded(OverlayKind::Form, id).await
    }

    async fn open_seeded(&self, kind: OverlayKind, id: ArticleId) -> Result<Outcome, ClientError> {
        let Some(guard) = self.locks.guard(id) else {
            debug!(article_id = %id, ?kind, "open skipped; article is busy");
            return Ok(Outcome::Skipped(SkipReason::Busy));
        };
        let ticket = self.dialogs.lock().await.request(kind, id);

        let result = self.api.get_article(id).await;
        drop(guard);

        let mut dialogs = self.dialogs.lock().await;
        match result {
            Ok(article) => {
                let outcome = match kind {
                    OverlayKind::Detail => dialogs.resolve_detail(ticket, article),
                    OverlayKind::Form => dialogs.resolve_edit(ticket, &article),
                };
                if !outcome.is_done() {
                    debug!(article_id = %id, ?kind, "discarding fetch for a closed dialog");
                }
                Ok(outcome)
            }
            Err(err) => {
                if !dialogs.abandon(kind, ticket) {
                    debug!(article_id = %id, ?kind, error = %err, "discarding failure for a closed dialog");
                    return Ok(Outcome::Skipped(SkipReason::Stale));
                }
                drop(dialogs);
                warn!(article_id = %id, ?kind, error = %err, "article fetch failed");
                self.state.lock().await.surface(err.to_string());
                Err(err.into())
            }
        }
    }

    pub async fn open_create(&self) {
        self.dialogs.lock().await.open_create();
    }

    pub async fn close(&self, kind: OverlayKind) {
        self.dialogs.lock().await.close(kind);
    }

    pub async fn dismiss(&self, kind: OverlayKind, signal: DismissSignal) -> bool {
        self.dialogs.lock().await.dismiss(kind, signal)
    }

    pub async fn escape(&self) -> Option<OverlayKind> {
        self.dialogs.lock().await.escape()
    }

    /// Writes one field of the open form's draft. Returns false when no form is open.
    pub async fn edit_form(&self, field: DraftField, value: impl Into<String>) -> bool {
        match self.dialogs.lock().await.form_mut() {
            Some((_, form)) => {
                form.set_field(field, value);
                true
            }
            None => false,
        }
    }

    /// Discards the open form. Calling it again is a no-op.
    pub async fn cancel_form(&self) {
        self.close(OverlayKind::Form).await;
    }

    /// Submits the open form. On success the form closes and the listing
    /// reloads; on failure the form stays open with its draft and error.
    pub async fn submit_form(&self) -> Result<Outcome<Article>, ClientError> {
        let (ticket, pending) = {
            let mut dialogs = self.dialogs.lock().await;
            let Some((ticket, form)) = dialogs.form_mut() else {
                return Err(ClientError::validation("no form is open"));
            };
            match form.begin_submit()? {
                Outcome::Done(pending) => (ticket, pending),
                Outcome::Skipped(reason) => return Ok(Outcome::Skipped(reason)),
            }
        };

        let result = pending.send(self.api.as_ref()).await;
        let saved = result.is_ok();

        let outcome = {
            let mut dialogs = self.dialogs.lock().await;
            match dialogs.form_for(ticket) {
                Some(form) => {
                    let outcome = form.complete_submit(result)?;
                    if outcome.is_done() {
                        dialogs.close(OverlayKind::Form);
                    }
                    outcome
                }
                None => {
                    debug!("discarding submit result for a closed form");
                    Outcome::Skipped(SkipReason::Stale)
                }
            }
        };

        if saved {
            self.resync_listing().await;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "tests/browser_tests.rs"]
mod tests;
