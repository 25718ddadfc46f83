//! Sanitize, deduplicate and persist widget content.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::config::Environment;
use crate::error::{BoxError, SaveError};
use crate::host::{HostBridge, HostEvent};
use crate::sanitize::{replace_widget_instances, sanitize};

/// The widget's own persisted record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetData {
    pub id: SmolStr,
    #[serde(default)]
    pub html: String,
}

impl WidgetData {
    pub fn new(id: impl Into<SmolStr>, html: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            html: html.into(),
        }
    }
}

/// Body of the persistence call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetUpdate {
    pub html: String,
}

/// Keyed persistence call.
pub trait Transport {
    fn update_widget(
        &self,
        widget_id: &str,
        update: WidgetUpdate,
    ) -> impl Future<Output = Result<(), BoxError>>;
}

/// What a before-save hook produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutput {
    Single(String),
    /// Several candidates; the last one is authoritative.
    Sequence(Vec<String>),
}

impl HookOutput {
    pub fn into_last(self) -> Option<String> {
        match self {
            HookOutput::Single(html) => Some(html),
            HookOutput::Sequence(values) => values.into_iter().last(),
        }
    }
}

/// Content transform run before every save.
pub trait ContentHook {
    fn before_save(&self, html: &str) -> impl Future<Output = Result<HookOutput, BoxError>>;
}

/// Hook that returns its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl ContentHook for NoopHook {
    async fn before_save(&self, html: &str) -> Result<HookOutput, BoxError> {
        Ok(HookOutput::Single(html.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Preview mode, nothing done.
    Preview,
    /// First content seen since load, recorded as already saved.
    Baseline,
    /// Same as the last saved content.
    Unchanged,
    /// New content. `persisted` is false in development, where the
    /// transport is skipped.
    Saved { persisted: bool },
}

/// A save in flight. Not `Send`: it runs on the UI thread.
pub type SaveTask = Pin<Box<dyn Future<Output = Result<SaveOutcome, SaveError>>>>;

#[derive(Debug)]
struct SaveState {
    widget: WidgetData,
    last_saved: Option<String>,
}

/// Runs saves for one widget. Clones share state.
pub struct SaveCoordinator<T, K> {
    state: Rc<RefCell<SaveState>>,
    transport: Rc<T>,
    hook: Rc<K>,
    host: Rc<dyn HostBridge>,
    env: Environment,
}

impl<T, K> Clone for SaveCoordinator<T, K> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            transport: Rc::clone(&self.transport),
            hook: Rc::clone(&self.hook),
            host: Rc::clone(&self.host),
            env: self.env,
        }
    }
}

impl<T, K> SaveCoordinator<T, K>
where
    T: Transport + 'static,
    K: ContentHook + 'static,
{
    pub fn new(
        widget: WidgetData,
        env: Environment,
        transport: Rc<T>,
        hook: Rc<K>,
        host: Rc<dyn HostBridge>,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(SaveState {
                widget,
                last_saved: None,
            })),
            transport,
            hook,
            host,
            env,
        }
    }

    pub fn widget(&self) -> WidgetData {
        self.state.borrow().widget.clone()
    }

    pub fn widget_id(&self) -> SmolStr {
        self.state.borrow().widget.id.clone()
    }

    pub fn last_saved(&self) -> Option<String> {
        self.state.borrow().last_saved.clone()
    }

    /// Package a save of `content` as a task the host can run.
    ///
    /// `None` means the engine produced nothing, and the last known widget
    /// html is used. `Some("")` is a real, empty document.
    pub fn save_now(&self, content: Option<String>) -> SaveTask {
        let this = self.clone();
        Box::pin(async move { this.run(content).await })
    }

    pub async fn run(&self, content: Option<String>) -> Result<SaveOutcome, SaveError> {
        if self.env.is_preview() {
            return Ok(SaveOutcome::Preview);
        }

        let raw = content.unwrap_or_else(|| self.state.borrow().widget.html.clone());
        let candidate = replace_widget_instances(&sanitize(&raw));

        let hooked = self
            .hook
            .before_save(&candidate)
            .await
            .map_err(|err| {
                tracing::warn!(%err, "before-save hook failed");
                SaveError::Hook(err)
            })?;
        let html = hooked
            .into_last()
            .filter(|h| !h.is_empty())
            .unwrap_or(candidate);

        {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let skipped = match state.last_saved.as_deref() {
                None => Some(SaveOutcome::Baseline),
                Some(last) if last == html => Some(SaveOutcome::Unchanged),
                Some(_) => None,
            };
            if let Some(outcome) = skipped {
                if outcome == SaveOutcome::Baseline {
                    tracing::debug!("first content observed, recording as saved");
                    state.last_saved = Some(html.clone());
                } else {
                    tracing::debug!("content unchanged, skipping save");
                }
                state.widget.html = html;
                return Ok(outcome);
            }
        }

        let widget_id = self.widget_id();
        let persisted = !self.env.development;
        if persisted {
            let update = WidgetUpdate { html: html.clone() };
            self.transport
                .update_widget(&widget_id, update)
                .await
                .map_err(|err| {
                    tracing::warn!(%err, widget = %widget_id, "widget update failed");
                    SaveError::Transport(err)
                })?;
        }

        {
            let mut state = self.state.borrow_mut();
            state.last_saved = Some(html.clone());
            state.widget.html = html;
        }
        self.host.emit(HostEvent::PageChanged);
        self.host.emit(HostEvent::ComponentRendered {
            widget_id: widget_id.clone(),
        });
        tracing::debug!(widget = %widget_id, persisted, "content saved");
        Ok(SaveOutcome::Saved { persisted })
    }
}
