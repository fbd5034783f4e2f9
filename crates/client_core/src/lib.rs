//! Client core for the article service: transport gateway, per-article
//! locks, and the browser/dialog/form state machines a front-end drives.

pub mod browser;
pub mod config;
pub mod dialogs;
pub mod error;
pub mod form;
pub mod gateway;
pub mod locks;
pub mod outcome;

pub use browser::{ArticleBrowser, Entry, Phase, ViewSnapshot, ViewState};
pub use config::{load_settings, ClientSettings, SettingsError};
pub use dialogs::{DialogManager, DismissSignal, OverlayKind};
pub use error::{ClientError, GatewayError};
pub use form::{ArticleDraft, ArticleForm, DraftField, FormMode};
pub use gateway::{ArticleApi, HttpGateway, Reply};
pub use locks::EntityLocks;
pub use outcome::{Outcome, SkipReason};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
