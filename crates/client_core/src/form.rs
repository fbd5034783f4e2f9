//! Create/edit form: an editable draft that is only sent on explicit submit.

use shared::{
    domain::ArticleId,
    protocol::{parse_timestamp, Article, ArticleWrite},
};
use tracing::{info, warn};

use crate::{
    error::{ClientError, GatewayError},
    gateway::ArticleApi,
    outcome::{Outcome, SkipReason},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Title,
    Content,
    Author,
    Category,
    PublishedAt,
}

/// Text buffers as the user typed them; optional fields use `""` for absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleDraft {
    pub id: Option<ArticleId>,
    pub title: String,
    pub content: String,
    pub author: String,
    pub category: String,
    pub published_at: String,
}

impl ArticleDraft {
    pub fn from_article(article: &Article) -> Self {
        Self {
            id: Some(article.id),
            title: article.title.clone(),
            content: article.content.clone(),
            author: article.author.clone().unwrap_or_default(),
            category: article.category.clone().unwrap_or_default(),
            published_at: article.published_at.clone().unwrap_or_default(),
        }
    }

    pub fn field(&self, field: DraftField) -> &str {
        match field {
            DraftField::Title => &self.title,
            DraftField::Content => &self.content,
            DraftField::Author => &self.author,
            DraftField::Category => &self.category,
            DraftField::PublishedAt => &self.published_at,
        }
    }

    fn field_mut(&mut self, field: DraftField) -> &mut String {
        match field {
            DraftField::Title => &mut self.title,
            DraftField::Content => &mut self.content,
            DraftField::Author => &mut self.author,
            DraftField::Category => &mut self.category,
            DraftField::PublishedAt => &mut self.published_at,
        }
    }

    /// Validates the draft and builds the full-replacement request body.
    pub fn to_write(&self) -> Result<ArticleWrite, ClientError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ClientError::validation("title is required"));
        }
        if self.content.trim().is_empty() {
            return Err(ClientError::validation("content is required"));
        }

        let published_at = optional_text(&self.published_at);
        if let Some(raw) = &published_at {
            if parse_timestamp(raw).is_none() {
                return Err(ClientError::validation(format!(
                    "published_at '{raw}' is not an ISO-8601 timestamp"
                )));
            }
        }

        Ok(ArticleWrite {
            title: title.to_string(),
            content: self.content.clone(),
            author: optional_text(&self.author),
            category: optional_text(&self.category),
            published_at,
        })
    }
}

/// Blank input is absent; anything else is sent as typed.
fn optional_text(raw: &str) -> Option<String> {
    (!raw.trim().is_empty()).then(|| raw.to_string())
}

/// A validated request ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingSubmit {
    Create(ArticleWrite),
    Update(ArticleId, ArticleWrite),
}

impl PendingSubmit {
    pub async fn send(&self, api: &dyn ArticleApi) -> Result<Article, GatewayError> {
        match self {
            Self::Create(body) => api.create_article(body).await,
            Self::Update(id, body) => api.update_article(*id, body).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleForm {
    mode: FormMode,
    draft: ArticleDraft,
    submitting: bool,
    error: Option<String>,
}

impl ArticleForm {
    pub fn create() -> Self {
        Self::with_draft(FormMode::Create, ArticleDraft::default())
    }

    pub fn edit(article: &Article) -> Self {
        Self::with_draft(FormMode::Edit, ArticleDraft::from_article(article))
    }

    pub fn with_draft(mode: FormMode, draft: ArticleDraft) -> Self {
        Self {
            mode,
            draft,
            submitting: false,
            error: None,
        }
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn draft(&self) -> &ArticleDraft {
        &self.draft
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_field(&mut self, field: DraftField, value: impl Into<String>) {
        *self.draft.field_mut(field) = value.into();
    }

    /// First half of a submit. Marks the form as submitting and hands back
    /// the request to send; a second trigger while submitting is skipped.
    pub fn begin_submit(&mut self) -> Result<Outcome<PendingSubmit>, ClientError> {
        if self.submitting {
            return Ok(Outcome::Skipped(SkipReason::Busy));
        }

        let pending = match self.prepare() {
            Ok(pending) => pending,
            Err(err) => {
                self.error = Some(err.to_string());
                return Err(err);
            }
        };

        self.submitting = true;
        self.error = None;
        Ok(Outcome::Done(pending))
    }

    fn prepare(&self) -> Result<PendingSubmit, ClientError> {
        match self.mode {
            FormMode::Create => Ok(PendingSubmit::Create(self.draft.to_write()?)),
            FormMode::Edit => {
                let id = self
                    .draft
                    .id
                    .ok_or_else(|| ClientError::validation("cannot update an article without an id"))?;
                Ok(PendingSubmit::Update(id, self.draft.to_write()?))
            }
        }
    }

    /// Second half of a submit. On failure the draft stays as typed so the
    /// user can retry; a result for a form that is no longer submitting is stale.
    pub fn complete_submit(
        &mut self,
        result: Result<Article, GatewayError>,
    ) -> Result<Outcome<Article>, ClientError> {
        if !self.submitting {
            return Ok(Outcome::Skipped(SkipReason::Stale));
        }
        self.submitting = false;

        match result {
            Ok(article) => {
                info!(article_id = %article.id, mode = ?self.mode, "article saved");
                Ok(Outcome::Done(article))
            }
            Err(err) => {
                warn!(mode = ?self.mode, error = %err, "article submit failed");
                self.error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    pub async fn submit(&mut self, api: &dyn ArticleApi) -> Result<Outcome<Article>, ClientError> {
        let pending = match self.begin_submit()? {
            Outcome::Done(pending) => pending,
            Outcome::Skipped(reason) => return Ok(Outcome::Skipped(reason)),
        };
        let result = pending.send(api).await;
        self.complete_submit(result)
    }

    /// Discards the draft without confirmation. Repeating it changes nothing.
    pub fn cancel(&mut self) {
        self.draft = ArticleDraft::default();
        self.submitting = false;
        self.error = None;
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
