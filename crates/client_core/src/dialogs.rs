//! Detail and form overlays layered above the main view.
//!
//! The two overlays are independent and may be open together; the form is
//! treated as the upper layer. Each open request gets a ticket, and a
//! seeding fetch that completes after its overlay was closed or re-requested
//! is dropped instead of reopening it.

use shared::{domain::ArticleId, protocol::Article};

use crate::{
    form::ArticleForm,
    outcome::{Outcome, SkipReason},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Detail,
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissSignal {
    CloseButton,
    /// Click on the backdrop outside the dialog.
    Backdrop,
    EscapeKey,
    /// Click inside the dialog body; contained, never dismisses.
    BodyClick,
}

impl DismissSignal {
    pub fn dismisses(self) -> bool {
        !matches!(self, Self::BodyClick)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Overlay<T> {
    Closed,
    Pending { ticket: Ticket, id: ArticleId },
    Open { ticket: Ticket, payload: T },
}

impl<T> Overlay<T> {
    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Open { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn ticket(&self) -> Option<Ticket> {
        match self {
            Self::Closed => None,
            Self::Pending { ticket, .. } | Self::Open { ticket, .. } => Some(*ticket),
        }
    }

    pub fn pending_id(&self) -> Option<ArticleId> {
        match self {
            Self::Pending { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    fn resolve(&mut self, ticket: Ticket, payload: T) -> Outcome {
        if self.ticket() != Some(ticket) || self.pending_id().is_none() {
            return Outcome::Skipped(SkipReason::Stale);
        }
        *self = Self::Open { ticket, payload };
        Outcome::Done(())
    }

    fn abandon(&mut self, ticket: Ticket) -> bool {
        let current = self.ticket() == Some(ticket) && self.pending_id().is_some();
        if current {
            *self = Self::Closed;
        }
        current
    }
}

#[derive(Debug)]
pub struct DialogManager {
    detail: Overlay<Article>,
    form: Overlay<ArticleForm>,
    next_ticket: u64,
}

impl Default for DialogManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogManager {
    pub fn new() -> Self {
        Self {
            detail: Overlay::Closed,
            form: Overlay::Closed,
            next_ticket: 1,
        }
    }

    fn issue(&mut self) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    pub fn detail(&self) -> &Overlay<Article> {
        &self.detail
    }

    pub fn form(&self) -> &Overlay<ArticleForm> {
        &self.form
    }

    pub fn selected_article(&self) -> Option<&Article> {
        self.detail.payload()
    }

    pub fn open_form(&self) -> Option<&ArticleForm> {
        self.form.payload()
    }

    pub fn form_mut(&mut self) -> Option<(Ticket, &mut ArticleForm)> {
        match &mut self.form {
            Overlay::Open { ticket, payload } => Some((*ticket, payload)),
            _ => None,
        }
    }

    /// Form for `ticket`, if that form is still the one on screen.
    pub fn form_for(&mut self, ticket: Ticket) -> Option<&mut ArticleForm> {
        self.form_mut()
            .and_then(|(current, form)| (current == ticket).then_some(form))
    }

    pub fn is_open(&self, kind: OverlayKind) -> bool {
        match kind {
            OverlayKind::Detail => self.detail.is_open(),
            OverlayKind::Form => self.form.is_open(),
        }
    }

    /// Marks `kind` as waiting for the article `id` to be fetched.
    pub fn request(&mut self, kind: OverlayKind, id: ArticleId) -> Ticket {
        let ticket = self.issue();
        match kind {
            OverlayKind::Detail => self.detail = Overlay::Pending { ticket, id },
            OverlayKind::Form => self.form = Overlay::Pending { ticket, id },
        }
        ticket
    }

    pub fn resolve_detail(&mut self, ticket: Ticket, article: Article) -> Outcome {
        self.detail.resolve(ticket, article)
    }

    pub fn resolve_edit(&mut self, ticket: Ticket, article: &Article) -> Outcome {
        self.form.resolve(ticket, ArticleForm::edit(article))
    }

    /// Drops a pending request whose fetch failed. Returns false when the
    /// request had already been closed or superseded.
    pub fn abandon(&mut self, kind: OverlayKind, ticket: Ticket) -> bool {
        match kind {
            OverlayKind::Detail => self.detail.abandon(ticket),
            OverlayKind::Form => self.form.abandon(ticket),
        }
    }

    pub fn open_create(&mut self) -> Ticket {
        let ticket = self.issue();
        self.form = Overlay::Open {
            ticket,
            payload: ArticleForm::create(),
        };
        ticket
    }

    /// Closes `kind` and drops its payload, including a pending request.
    pub fn close(&mut self, kind: OverlayKind) {
        match kind {
            OverlayKind::Detail => self.detail = Overlay::Closed,
            OverlayKind::Form => {
                if let Some((_, form)) = self.form_mut() {
                    form.cancel();
                }
                self.form = Overlay::Closed;
            }
        }
    }

    pub fn dismiss(&mut self, kind: OverlayKind, signal: DismissSignal) -> bool {
        if !signal.dismisses() || self.overlay_ticket(kind).is_none() {
            return false;
        }
        self.close(kind);
        true
    }

    /// Escape with no explicit target closes the topmost overlay.
    pub fn escape(&mut self) -> Option<OverlayKind> {
        let top = [OverlayKind::Form, OverlayKind::Detail]
            .into_iter()
            .find(|kind| self.overlay_ticket(*kind).is_some())?;
        self.close(top);
        Some(top)
    }

    fn overlay_ticket(&self, kind: OverlayKind) -> Option<Ticket> {
        match kind {
            OverlayKind::Detail => self.detail.ticket(),
            OverlayKind::Form => self.form.ticket(),
        }
    }
}
