//! One widget's editing session.
//!
//! The session owns the engine once attached and turns the host's DOM events
//! into calls on the tracker, the script normalizer, the mirror builder and
//! the save coordinator. It never sleeps: deferred work is parked in
//! [`FrameSlot`]s, [`Deadline`]s and a [`Debouncer`], and run when the host
//! calls [`Session::tick`] or [`Session::on_animation_frame`].

use std::rc::Rc;

use smol_str::SmolStr;
use web_time::Instant;

use crate::config::{Environment, WidgetConfig};
use crate::engine::{DomPoint, EditingEngine, NodeChangeEvent, transact};
use crate::error::SessionError;
use crate::format::{DefaultStyle, FormatTracker, StickyFormat};
use crate::guard::ReentrancyFlag;
use crate::host::{HostBridge, HostCommand, HostEnvelope, HostEvent};
use crate::intent::{CaretIntent, CaretIntentSlot};
use crate::mirror::build_mirror;
use crate::registry::EditorRegistry;
use crate::save::{ContentHook, SaveCoordinator, SaveTask, Transport, WidgetData};
use crate::schedule::{Deadline, Debouncer, FrameSlot};
use crate::script::{ScriptFormat, ScriptNormalizer, script_intent_of};

/// Content given to an empty widget on focus.
pub const EMPTY_PARAGRAPH: &str = "<p><br></p>";

/// Root with a caret helper, so a format applied to an empty widget has
/// somewhere to land.
pub const CARET_HOLDER_PARAGRAPH: &str =
    "<p><span data-fl-caret-holder=\"1\">\u{200B}</span></p>";

/// Keys whose key-up moves the caret.
const NAV_KEYS: &[&str] = &[
    "ArrowLeft",
    "ArrowRight",
    "ArrowUp",
    "ArrowDown",
    "Home",
    "End",
    "PageUp",
    "PageDown",
];

/// `""`, `<p></p>` and `<p><br></p>` all count as no content.
pub fn is_effectively_empty(html: &str) -> bool {
    matches!(html.trim(), "" | "<p></p>" | "<p><br></p>")
}

pub struct Session<E, T, K> {
    widget_id: SmolStr,
    config: WidgetConfig,
    env: Environment,
    host: Rc<dyn HostBridge>,
    saver: SaveCoordinator<T, K>,
    engine: Option<E>,

    formats: FormatTracker,
    scripts: ScriptNormalizer,
    intent: CaretIntentSlot,
    syncing: ReentrancyFlag,

    highlight: FrameSlot<Option<SmolStr>>,
    node_change: FrameSlot<NodeChangeEvent>,
    blur_disable: Deadline,
    focus_resync: Deadline,
    deferred_sync: bool,
    deferred_sticky: bool,
    save_debounce: Debouncer,
    save_requests: Vec<SaveTask>,

    initialized: bool,
    focused: bool,
    blur_pending: bool,
}

impl<E, T, K> Session<E, T, K>
where
    E: EditingEngine,
    T: Transport + 'static,
    K: ContentHook + 'static,
{
    /// Mount a widget. Tells the host whether to show the empty placeholder.
    pub fn new(
        widget: WidgetData,
        config: WidgetConfig,
        env: Environment,
        host: Rc<dyn HostBridge>,
        transport: Rc<T>,
        hook: Rc<K>,
    ) -> Self {
        let widget_id = widget.id.clone();
        host.emit(HostEvent::EmptyState(widget.html.trim().is_empty()));
        tracing::debug!(
            widget = %widget_id,
            mode = env.effective_mode().as_str(),
            editable = env.is_editable(),
            "widget mounted"
        );

        let saver = SaveCoordinator::new(widget, env, transport, hook, Rc::clone(&host));
        Self {
            widget_id,
            intent: CaretIntentSlot::new(config.caret_intent_ttl()),
            save_debounce: Debouncer::new(config.save_debounce()),
            config,
            env,
            host,
            saver,
            engine: None,
            formats: FormatTracker::default(),
            scripts: ScriptNormalizer::new(),
            syncing: ReentrancyFlag::new(),
            highlight: FrameSlot::new(),
            node_change: FrameSlot::new(),
            blur_disable: Deadline::default(),
            focus_resync: Deadline::default(),
            deferred_sync: false,
            deferred_sticky: false,
            save_requests: Vec::new(),
            initialized: false,
            focused: false,
            blur_pending: false,
        }
    }

    /// Take ownership of a ready engine.
    pub fn attach(&mut self, mut engine: E, registry: &mut EditorRegistry) -> Result<(), SessionError> {
        if self.engine.is_some() {
            return Err(SessionError::AlreadyAttached);
        }
        if !self.env.is_editable() {
            return Err(SessionError::NotEditable(self.env.effective_mode().as_str()));
        }

        if let Some(previous) = registry.register(self.widget_id.clone(), engine.handle().clone()) {
            tracing::debug!(widget = %self.widget_id, %previous, "replacing registered editor");
        }
        self.formats = FormatTracker::new(DefaultStyle::capture(&engine));
        self.highlight.request(None);
        engine.hide();
        tracing::debug!(
            widget = %self.widget_id,
            editor = %engine.handle(),
            defaults = ?self.formats.defaults(),
            "editor attached"
        );
        self.engine = Some(engine);
        self.initialized = true;
        Ok(())
    }

    /// Release the engine and forget its handle.
    pub fn teardown(mut self, registry: &mut EditorRegistry) -> Option<E> {
        registry.unregister(&self.widget_id);
        self.engine.take()
    }

    pub fn widget_id(&self) -> &str {
        &self.widget_id
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    pub fn saver(&self) -> &SaveCoordinator<T, K> {
        &self.saver
    }

    pub fn sticky(&self) -> &StickyFormat {
        self.formats.sticky()
    }

    pub fn script_intent(&self) -> Option<ScriptFormat> {
        self.scripts.intent()
    }

    pub fn caret_intent(&self, now: Instant) -> Option<CaretIntent> {
        self.intent.get(now)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_blur_pending(&self) -> bool {
        self.blur_pending
    }

    /// Saves requested since the last call. The host runs them off the UI
    /// path; each one resolves on its own.
    pub fn take_save_requests(&mut self) -> Vec<SaveTask> {
        std::mem::take(&mut self.save_requests)
    }

    fn with_engine<R>(&mut self, f: impl FnOnce(&mut Self, &mut E) -> R) -> Option<R> {
        let mut engine = self.engine.take()?;
        let result = f(self, &mut engine);
        self.engine = Some(engine);
        Some(result)
    }

    fn request_sync(&mut self) {
        self.node_change.request(NodeChangeEvent::default());
    }

    fn push_save(&mut self) {
        let content = self.engine.as_ref().and_then(|e| e.content());
        tracing::trace!(widget = %self.widget_id, "save requested");
        self.save_requests.push(self.saver.save_now(content));
    }

    /// Debounced save of the current content.
    pub fn schedule_save(&mut self, now: Instant) {
        if self.env.is_preview() {
            return;
        }
        if self.save_debounce.call(now) {
            self.push_save();
        }
    }

    // === DOM triggers ===

    pub fn on_widget_click(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        engine.show();
        if !engine.has_selected_object() {
            self.highlight.request(Some(self.widget_id.clone()));
        }
        self.request_sync();
    }

    pub fn on_editor_click(&mut self, now: Instant) {
        self.intent.record(CaretIntent::Click, now);
        self.request_sync();
    }

    pub fn on_touch_end(&mut self, now: Instant) {
        self.intent.record(CaretIntent::Click, now);
        self.request_sync();
    }

    /// Enter lands the caret in a fresh block; sticky formatting is put back
    /// once the engine has built it.
    pub fn on_key_down(&mut self, key: &str, now: Instant) {
        if key == "Enter" {
            self.intent.record(CaretIntent::Enter, now);
            self.deferred_sticky = true;
        }
    }

    pub fn on_key_up(&mut self, key: &str) {
        if NAV_KEYS.contains(&key) {
            self.request_sync();
        }
    }

    pub fn on_mouse_up(&mut self, now: Instant) {
        self.intent.record(CaretIntent::Click, now);
        self.request_sync();
        self.deferred_sync = true;
        self.deferred_sticky = true;
    }

    pub fn on_content_change(&mut self, now: Instant) {
        self.highlight.request(Some(self.widget_id.clone()));
        self.schedule_save(now);
    }

    pub fn on_focus(&mut self, now: Instant) {
        self.focused = true;
        self.blur_pending = false;
        self.blur_disable.cancel();

        let widget_empty = self.saver.widget().html.is_empty();
        if let Some(engine) = self.engine.as_mut() {
            let content_empty = engine.content().is_some_and(|html| is_effectively_empty(&html));
            if widget_empty || content_empty {
                engine.set_content(EMPTY_PARAGRAPH);
                let body = engine.body();
                if let Some(first) = engine.surface().children(body).first().copied() {
                    engine.set_cursor(DomPoint::new(first, 0));
                }
                self.host.emit(HostEvent::EmptyState(false));
            }
        }

        self.host.emit(HostEvent::Draggable(false));
        self.host.emit(HostEvent::ShowToolbar(true));
        self.host.emit(HostEvent::WysiwygStatus(true));
        self.request_sync();
        self.focus_resync.arm(now, self.config.focus_resync_delay());
    }

    pub fn on_blur(&mut self, now: Instant) {
        self.focused = false;
        if let Some(engine) = self.engine.as_ref() {
            let empty = engine.content().is_some_and(|html| html.is_empty());
            self.host.emit(HostEvent::EmptyState(empty));
        }
        self.blur_pending = true;
        self.host.emit(HostEvent::Draggable(true));
        self.blur_disable.arm(now, self.config.blur_disable_delay());

        if !self.initialized {
            return;
        }
        self.schedule_save(now);
    }

    /// Save right away, bypassing the debouncer.
    pub fn on_before_unload(&mut self) {
        if self.env.is_preview() {
            return;
        }
        self.push_save();
    }

    /// The caret moved or the content around it changed.
    pub fn on_node_change(&mut self, event: NodeChangeEvent, now: Instant) {
        let Some(_guard) = self.syncing.try_enter() else {
            tracing::trace!("node change while syncing, ignored");
            return;
        };
        if self
            .with_engine(|session, engine| session.sync_caret_state(engine, &event))
            .is_none()
        {
            return;
        }
        self.schedule_save(now);
    }

    fn sync_caret_state(&mut self, engine: &mut E, event: &NodeChangeEvent) {
        self.formats.sync_from_caret(engine);
        if let Some(kept) = self.scripts.normalize(engine) {
            tracing::debug!(kept = kept.format_name(), "script formats normalized");
        }
        self.highlight.request(Some(self.widget_id.clone()));

        match build_mirror(engine, self.formats.defaults(), event) {
            Some(snapshot) => {
                if self.config.debug {
                    tracing::debug!(
                        editor = %engine.handle(),
                        sticky = ?self.formats.sticky(),
                        html = %snapshot.html,
                        "node change"
                    );
                } else {
                    tracing::trace!(editor = %engine.handle(), "node change");
                }
                self.host.emit(HostEvent::MirrorUpdate {
                    editor: engine.handle().clone(),
                    html: snapshot.html,
                    style_block: snapshot.style_block,
                });
            }
            None => tracing::trace!("no caret to mirror"),
        }

        self.formats.apply_if_needed(engine);
    }

    // === Host commands ===

    /// Route a toolbar command. Returns whether this session took it.
    pub fn handle_host_command(&mut self, envelope: HostEnvelope, now: Instant) -> bool {
        let Some(handle) = self.engine.as_ref().map(|e| e.handle().clone()) else {
            return false;
        };
        let accepted = match &envelope.target {
            Some(target) => *target == handle,
            None => self.focused,
        };
        if !accepted {
            tracing::trace!(editor = %handle, target = ?envelope.target, "host command not for this editor");
            return false;
        }

        let command = envelope.command;
        if command == HostCommand::Cancel {
            if self.blur_pending {
                if let Some(engine) = self.engine.as_mut() {
                    engine.hide();
                }
            }
            return true;
        }

        // The toolbar click blurred the editor first; it is still in use.
        self.blur_disable.cancel();
        self.host.emit(HostEvent::WysiwygStatus(true));

        self.with_engine(|session, engine| {
            transact(engine, |engine| {
                engine.focus();
                if !matches!(command, HostCommand::RemoveFormat { .. }) {
                    session.ensure_editable_root(engine);
                }
                session.run_command(engine, &command);
                engine.node_changed();
                if let Some(_guard) = session.syncing.try_enter() {
                    session.sync_caret_state(engine, &NodeChangeEvent::default());
                }
            });
        });
        self.schedule_save(now);
        true
    }

    fn ensure_editable_root(&mut self, engine: &mut E) {
        if !engine.content().is_some_and(|html| is_effectively_empty(&html)) {
            return;
        }
        engine.set_content(CARET_HOLDER_PARAGRAPH);
        let doc = engine.surface();
        let helper_text = doc
            .descendants(engine.body())
            .into_iter()
            .find(|n| doc.is_text(*n));
        if let Some(text) = helper_text {
            engine.set_cursor(DomPoint::new(text, 0));
        }
        self.host.emit(HostEvent::EmptyState(false));
    }

    fn run_command(&mut self, engine: &mut E, command: &HostCommand) {
        if let Some(format) = script_intent_of(command) {
            self.scripts.toggle(engine, format);
            return;
        }
        let result = match command {
            HostCommand::ExecCommand { cmd, ui, value } => {
                engine.exec_command(cmd, *ui, value.as_deref())
            }
            HostCommand::ApplyFormat { format, value } => {
                engine.apply_format(format, value.as_deref())
            }
            HostCommand::RemoveFormat { format } => engine.remove_format(format),
            HostCommand::Cancel => Ok(()),
        };
        if let Err(err) = result {
            tracing::debug!(%err, ?command, "host command failed");
        }
    }

    // === Clock ===

    /// Run everything that is due at `now`.
    pub fn tick(&mut self, now: Instant) {
        if self.blur_disable.fire(now) {
            self.host.emit(HostEvent::WysiwygStatus(false));
        }
        if self.intent.expire(now) {
            tracing::trace!("caret intent expired");
        }
        if self.focus_resync.fire(now) {
            self.request_sync();
        }

        let sync = std::mem::take(&mut self.deferred_sync);
        let sticky = std::mem::take(&mut self.deferred_sticky);
        if sync || sticky {
            self.with_engine(|session, engine| {
                if sync {
                    session.formats.sync_from_caret(engine);
                }
                if sticky && session.formats.apply_if_needed(engine) {
                    session.request_sync();
                }
            });
        }

        if !self.env.is_preview() && self.save_debounce.poll(now) {
            self.push_save();
        }
    }

    /// Run coalesced frame work: at most one highlight refresh and one
    /// node-change sync per frame.
    pub fn on_animation_frame(&mut self, now: Instant) {
        if let Some(widget_id) = self.highlight.take() {
            self.host.emit(HostEvent::HighlightRefresh { widget_id });
        }
        if let Some(event) = self.node_change.take() {
            if let Some(engine) = self.engine.as_mut() {
                engine.node_changed();
            }
            self.on_node_change(event, now);
        }
    }
}
