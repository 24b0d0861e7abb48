//! The edit-session coordinator
//!
//! One `EditCoordinator` instance synchronizes a logic-thread-owned text
//! model with a native widget owned by the host UI thread. It drives the
//! session state machine (requesting → visible ⇄ hidden → completing),
//! marshals every widget call onto the host UI thread, debounces the
//! framework's own initialization write, buffers keystrokes while the widget
//! is hidden or resynchronizing, and releases the completion barrier or
//! callback when the session drains.
//!
//! Instances are created per display/window context and passed explicitly;
//! there is no process-wide singleton.
//!
//! Locking rules:
//! - the coordinator's state mutex is never held across a backend call, a
//!   model lock, a listener call, or a sink callback (backends report
//!   programmatic writes synchronously, which would re-enter);
//! - models are only ever locked from the logic thread;
//! - the change log has its own mutex and may be touched under the state
//!   lock.

use std::sync::{Arc, Mutex};

use caret_core::change_log::{self, ChangeLog, TextChange};
use caret_core::input::{ActionHint, KeyCode};
use caret_core::keyboard::KeyboardVisibility;
use caret_core::model::{ModelId, SharedEditable, Surface};
use caret_core::snapshot::EditSnapshot;
use caret_platform::dispatcher::{BlockingDispatcher, Dispatcher};
use caret_platform::widget::{WidgetBackend, WidgetEvent, WidgetEventSink, WidgetId};
use smallvec::SmallVec;

use crate::focus;
use crate::gate::CompletionGate;
use crate::session::{Completion, EditMode, EditOptions, EditSession, EndReason, PendingEdit, Phase};

#[derive(Default)]
struct CoordinatorState {
    /// The single live session, if any
    session: Option<EditSession>,
    /// Single-slot queue of the request superseding the live session;
    /// last write wins
    pending: Option<PendingEdit>,
    /// A supersede tear-down has been posted and not yet run
    closing: bool,
    last_end_reason: EndReason,
}

#[derive(Default)]
struct Listeners {
    /// Observes every session completion (model, final text)
    completion: Option<Arc<dyn Fn(ModelId, &str) + Send + Sync>>,
    /// Observes committing IME actions (done/search/send/go)
    done: Option<Arc<dyn Fn(ModelId) + Send + Sync>>,
    /// Observes virtual-keyboard show/hide requests
    keyboard: Option<Arc<dyn Fn(bool) + Send + Sync>>,
}

/// Cross-thread synchronizer for native in-place text editing
pub struct EditCoordinator {
    logic: Arc<dyn BlockingDispatcher>,
    host: Arc<dyn Dispatcher>,
    backend: Arc<dyn WidgetBackend>,
    surface: Arc<dyn Surface>,
    keyboard: KeyboardVisibility,
    state: Mutex<CoordinatorState>,
    listeners: Mutex<Listeners>,
}

enum RequestDecision {
    /// No live session; a fresh one was installed
    Fresh,
    /// Same model as the live session: resynchronize, no new barrier
    Reopen { hidden: bool, completion: Completion },
    /// Different model: queued behind the live session's tear-down
    Supersede {
        displaced: Option<PendingEdit>,
        close: bool,
    },
}

impl EditCoordinator {
    /// Create a coordinator for one display/window context
    pub fn new(
        logic: Arc<dyn BlockingDispatcher>,
        host: Arc<dyn Dispatcher>,
        backend: Arc<dyn WidgetBackend>,
        surface: Arc<dyn Surface>,
    ) -> Arc<Self> {
        Arc::new(Self {
            logic,
            host,
            backend,
            surface,
            keyboard: KeyboardVisibility::new(),
            state: Mutex::new(CoordinatorState::default()),
            listeners: Mutex::new(Listeners::default()),
        })
    }

    // ────────────────────────────────────────────────────────────────────
    // Requests
    // ────────────────────────────────────────────────────────────────────

    /// Edit `model`, blocking until the session reaches idle
    ///
    /// Must be called on the logic thread. The thread is not parked: its
    /// scheduler keeps pumping coordinator callbacks until the user (or a
    /// programmatic [`end_edit`](Self::end_edit)) finishes the session.
    /// Returns the final text; if this request reopens or supersedes an
    /// active session it resolves as described in [`Self::edit_async`].
    pub fn edit_sync(self: &Arc<Self>, model: SharedEditable, options: EditOptions) -> String {
        assert!(
            self.logic.is_current(),
            "edit_sync must be called on the logic thread"
        );
        let gate = Arc::new(CompletionGate::new());
        self.begin_edit(
            model,
            options,
            EditMode::Sync,
            Completion::Gate(Arc::clone(&gate)),
        );
        let opened = Arc::clone(&gate);
        self.logic.pump_until(&move || opened.is_open());
        gate.take_text().unwrap_or_default()
    }

    /// Edit `model`, returning immediately
    ///
    /// Must be called on the logic thread. `on_complete` runs on the logic
    /// thread when the session reaches idle. A request for the model already
    /// being edited resynchronizes the live widget and completes immediately
    /// with the model's current text; a request for a different model is
    /// queued (single slot, last write wins) while the live session is
    /// forced to complete, and starts once that session reaches idle.
    pub fn edit_async(
        self: &Arc<Self>,
        model: SharedEditable,
        options: EditOptions,
        on_complete: impl FnOnce(String) + Send + 'static,
    ) {
        assert!(
            self.logic.is_current(),
            "edit_async must be called on the logic thread"
        );
        self.begin_edit(
            model,
            options,
            EditMode::Async,
            Completion::Callback(Box::new(on_complete)),
        );
    }

    pub(crate) fn begin_edit(
        self: &Arc<Self>,
        model: SharedEditable,
        options: EditOptions,
        mode: EditMode,
        completion: Completion,
    ) {
        debug_assert!(
            self.logic.is_current(),
            "edit requests originate on the logic thread"
        );

        // Capture everything needed from the model up front; the state lock
        // is never held across a model lock.
        let (model_id, current_text, snapshot, initial_text) = {
            let guard = model.lock().unwrap();
            let mut snapshot = EditSnapshot::capture(&*guard, self.surface.as_ref());
            if let Some(max) = options.max_length {
                snapshot.max_length = max;
            }
            if let Some(constraint) = options.constraint {
                snapshot.constraint = constraint;
            }
            let current = guard.text();
            let initial = options.initial_text.clone().unwrap_or_else(|| current.clone());
            (guard.id(), current, snapshot, initial)
        };

        enum Live {
            None,
            SameModel { hidden: bool },
            OtherModel { completing: bool },
        }

        let decision = {
            let mut state = self.state.lock().unwrap();
            let live = match state.session.as_ref() {
                Some(session)
                    if session.model_id == model_id && session.phase != Phase::Completing =>
                {
                    Live::SameModel {
                        hidden: session.phase == Phase::Hidden,
                    }
                }
                Some(session) => Live::OtherModel {
                    completing: session.phase == Phase::Completing,
                },
                None => Live::None,
            };
            match live {
                Live::SameModel { hidden } => RequestDecision::Reopen { hidden, completion },
                Live::OtherModel { completing } => {
                    let close = !state.closing && !completing;
                    if close {
                        state.closing = true;
                    }
                    let displaced = state.pending.replace(PendingEdit {
                        model: Arc::clone(&model),
                        options,
                        mode,
                        completion,
                    });
                    RequestDecision::Supersede { displaced, close }
                }
                Live::None => {
                    state.closing = false;
                    state.session = Some(EditSession::new(
                        Arc::clone(&model),
                        model_id,
                        snapshot,
                        mode,
                        initial_text,
                        completion,
                    ));
                    RequestDecision::Fresh
                }
            }
        };

        match decision {
            RequestDecision::Fresh => {
                tracing::debug!(model = ?model_id, ?mode, "edit session requested");
                self.surface.request_focus(model_id);
                self.surface.repaint(model_id);
                let this = Arc::clone(self);
                self.host.post(Box::new(move || this.construct_widget()));
            }
            RequestDecision::Reopen { hidden, completion } => {
                tracing::debug!(model = ?model_id, "request for the model already edited, reopening");
                if hidden {
                    self.show_widget_again();
                }
                // The active session keeps running; no new barrier.
                self.deliver(completion, model_id, &current_text);
            }
            RequestDecision::Supersede { displaced, close } => {
                tracing::debug!(model = ?model_id, "queueing request, superseding active session");
                if let Some(displaced) = displaced {
                    // Last write wins; the displaced request resolves with
                    // its model's current text instead of hanging.
                    let (displaced_id, text) = {
                        let guard = displaced.model.lock().unwrap();
                        (guard.id(), guard.text())
                    };
                    self.deliver(displaced.completion, displaced_id, &text);
                }
                if close {
                    let this = Arc::clone(self);
                    self.host.post(Box::new(move || {
                        this.finish_session(EndReason::Undefined, None, true, false);
                    }));
                }
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Construction (host UI thread)
    // ────────────────────────────────────────────────────────────────────

    fn construct_widget(self: &Arc<Self>) {
        let (snapshot, initial_text) = {
            let state = self.state.lock().unwrap();
            match state.session.as_ref() {
                Some(session) if session.phase == Phase::Requesting => {
                    (session.snapshot.clone(), session.initial_text.clone())
                }
                _ => return,
            }
        };

        let weak = Arc::downgrade(self);
        let sink: WidgetEventSink = Arc::new(move |id, event| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.on_widget_event(id, event);
            }
        });

        let widget = match self.backend.create(&snapshot, sink) {
            Ok(widget) => widget,
            Err(err) => {
                tracing::warn!(%err, "widget construction failed, session ends with text unchanged");
                self.fail_construction();
                return;
            }
        };

        let installed = {
            let mut state = self.state.lock().unwrap();
            match state.session.as_mut() {
                Some(session) => {
                    session.widget = Some(widget);
                    true
                }
                None => false,
            }
        };
        if !installed {
            self.backend.destroy(widget);
            return;
        }

        // The initialization write; the change observer recognizes it via
        // the started flag and does not echo it into the model.
        self.backend.set_text(widget, &initial_text);
        let end = initial_text.chars().count();
        self.backend.set_selection(widget, end, end);

        let deferred_end = {
            let mut state = self.state.lock().unwrap();
            let Some(session) = state.session.as_mut() else {
                return;
            };
            session.selection = (end, end);
            session.phase = Phase::Visible;
            session.end_requested
        };
        tracing::debug!(?widget, "native widget visible");

        if deferred_end {
            // endEdit arrived while construction was in flight; the session
            // must exist before it can be destroyed.
            self.finish_session(EndReason::Undefined, None, false, false);
        } else {
            self.request_keyboard(true);
        }
    }

    fn fail_construction(self: &Arc<Self>) {
        let (session, pending) = {
            let mut state = self.state.lock().unwrap();
            state.closing = false;
            (state.session.take(), state.pending.take())
        };
        let Some(mut session) = session else { return };

        let completion = session.completion.take().unwrap_or(Completion::Detached);
        let model_id = session.model_id;
        let initial_text = session.initial_text.clone();
        let this = Arc::clone(self);
        self.logic.post(Box::new(move || {
            this.surface.repaint(model_id);
            this.deliver(completion, model_id, &initial_text);
            if let Some(pending) = pending {
                this.begin_edit(pending.model, pending.options, pending.mode, pending.completion);
            }
        }));
    }

    // ────────────────────────────────────────────────────────────────────
    // Widget events (host UI thread)
    // ────────────────────────────────────────────────────────────────────

    fn on_widget_event(self: &Arc<Self>, id: WidgetId, event: WidgetEvent) {
        match event {
            WidgetEvent::TextChanged {
                text,
                at,
                removed,
                inserted,
            } => self.on_text_changed(id, text, at, removed, inserted),
            WidgetEvent::EditorAction(action) => self.on_editor_action(id, action),
            WidgetEvent::KeyDown { key } => self.on_key_down(id, key),
            WidgetEvent::KeyUp { key } => self.on_key_up(id, key),
        }
    }

    fn on_text_changed(
        self: &Arc<Self>,
        id: WidgetId,
        text: String,
        at: usize,
        removed: usize,
        inserted: usize,
    ) {
        enum Route {
            Ignore,
            Buffered { wake: bool },
            Forward { model: SharedEditable },
        }

        let route = {
            let mut state = self.state.lock().unwrap();
            let Some(session) = state.session.as_mut() else {
                return;
            };
            if session.widget != Some(id) || session.phase == Phase::Completing {
                Route::Ignore
            } else if !session.started {
                if text == session.known_model_text {
                    session.started = true;
                    tracing::debug!(model = ?session.model_id, "widget text converged, live sync on");
                }
                Route::Ignore
            } else if let Some(log) = session.change_log.as_ref() {
                if removed > 0 {
                    log.push(TextChange::delete(at, removed));
                }
                if inserted > 0 {
                    let chunk: String = text.chars().skip(at).take(inserted).collect();
                    log.push(TextChange::insert(at, chunk));
                }
                Route::Buffered {
                    wake: session.phase == Phase::Hidden,
                }
            } else {
                session.known_model_text = text.clone();
                Route::Forward {
                    model: Arc::clone(&session.model),
                }
            }
        };

        match route {
            Route::Ignore => {}
            Route::Buffered { wake } => {
                // Typing wakes a hidden widget; the buffered change replays
                // during the resynchronization this triggers.
                if wake {
                    self.show_widget_again();
                }
            }
            Route::Forward { model } => {
                self.logic.post(Box::new(move || {
                    let mut guard = model.lock().unwrap();
                    if guard.text() != text {
                        guard.set_text(&text);
                    }
                }));
            }
        }
    }

    fn on_editor_action(self: &Arc<Self>, id: WidgetId, action: ActionHint) {
        {
            let state = self.state.lock().unwrap();
            match state.session.as_ref() {
                Some(session) if session.widget == Some(id) => {}
                _ => return,
            }
        }
        self.finish_session(EndReason::ImeAction, Some(action), false, false);
    }

    fn on_key_down(self: &Arc<Self>, id: WidgetId, key: KeyCode) {
        let forward = {
            let mut state = self.state.lock().unwrap();
            let Some(session) = state.session.as_mut() else {
                return;
            };
            if session.widget != Some(id) {
                return;
            }
            if session.pressed_key == Some(key) {
                // Host auto-repeat; the first press already reported it.
                return;
            }
            session.pressed_key = Some(key);
            if key.is_system() {
                None
            } else {
                Some(Arc::clone(&session.model))
            }
        };

        match forward {
            None => self.finish_session(EndReason::SystemKey, None, false, true),
            Some(model) => {
                self.logic
                    .post(Box::new(move || model.lock().unwrap().key_event(key)));
            }
        }
    }

    fn on_key_up(&self, id: WidgetId, key: KeyCode) {
        let mut state = self.state.lock().unwrap();
        if let Some(session) = state.session.as_mut() {
            if session.widget == Some(id) && session.pressed_key == Some(key) {
                session.pressed_key = None;
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Hide / show / resynchronize
    // ────────────────────────────────────────────────────────────────────

    /// Move the native widget off-screen without ending the session
    ///
    /// Async mode only. The widget keeps keyboard focus; keystrokes buffer
    /// into the change log until [`Self::show_widget_again`].
    pub fn hide_widget(self: &Arc<Self>) {
        let (widget, model, model_id) = {
            let mut state = self.state.lock().unwrap();
            let Some(session) = state.session.as_mut() else {
                return;
            };
            if session.mode != EditMode::Async || session.phase != Phase::Visible {
                return;
            }
            let Some(widget) = session.widget else { return };
            session.phase = Phase::Hidden;
            session.change_log = Some(Arc::new(ChangeLog::new()));
            (widget, Arc::clone(&session.model), session.model_id)
        };
        tracing::debug!(model = ?model_id, "widget hidden, keystrokes buffering");

        let this = Arc::clone(self);
        self.host.post(Box::new(move || {
            this.backend.set_widget_hidden(widget, true);
            let (cursor, _) = this.backend.selection(widget);
            {
                let mut state = this.state.lock().unwrap();
                if let Some(session) = state.session.as_mut() {
                    if session.widget == Some(widget) {
                        session.selection = (cursor, cursor);
                    }
                }
            }
            // The lightweight field paints the caret now; hand it the
            // native cursor.
            let inner = Arc::clone(&this);
            this.logic.post(Box::new(move || {
                model.lock().unwrap().set_cursor(cursor);
                inner.surface.repaint(model_id);
            }));
        }));
    }

    /// Bring a hidden widget back on screen
    ///
    /// Fetches the model's current text on the logic thread, replays every
    /// buffered change against it on the host UI thread, then resumes live
    /// syncing. Also triggered by the first keystroke while hidden.
    pub fn show_widget_again(self: &Arc<Self>) {
        let (widget, model, model_id) = {
            let mut state = self.state.lock().unwrap();
            let Some(session) = state.session.as_mut() else {
                return;
            };
            if session.phase != Phase::Hidden {
                return;
            }
            let Some(widget) = session.widget else { return };
            session.phase = Phase::Visible;
            if session.change_log.is_none() {
                session.change_log = Some(Arc::new(ChangeLog::new()));
            }
            (widget, Arc::clone(&session.model), session.model_id)
        };
        tracing::debug!(model = ?model_id, "widget showing again, resynchronizing");

        let this = Arc::clone(self);
        self.logic.post(Box::new(move || {
            let (text, cursor) = {
                let guard = model.lock().unwrap();
                (guard.text(), guard.cursor())
            };
            let inner = Arc::clone(&this);
            this.host.post(Box::new(move || {
                inner.apply_resync(model_id, widget, text, cursor);
            }));
            this.surface.request_focus(model_id);
            this.surface.repaint(model_id);
        }));
        self.relayout();
    }

    fn apply_resync(
        self: &Arc<Self>,
        model_id: ModelId,
        widget: WidgetId,
        text: String,
        cursor: usize,
    ) {
        let changes: SmallVec<[TextChange; 8]> = {
            let mut state = self.state.lock().unwrap();
            let session = match state.session.as_mut() {
                Some(s)
                    if s.model_id == model_id
                        && s.widget == Some(widget)
                        && s.phase == Phase::Visible =>
                {
                    s
                }
                _ => {
                    tracing::debug!("session changed during resynchronization, dropping");
                    return;
                }
            };
            // Closing the log flips the change observer back to live
            // forwarding; everything buffered so far replays below.
            match session.change_log.take() {
                Some(log) => log.drain(),
                None => SmallVec::new(),
            }
        };

        let (new_text, caret) = change_log::replay(&text, cursor, changes);
        self.backend.set_widget_hidden(widget, false);
        self.backend.set_text(widget, &new_text);
        self.backend.set_selection(widget, caret, caret);

        let mut state = self.state.lock().unwrap();
        if let Some(session) = state.session.as_mut() {
            if session.widget == Some(widget) {
                session.selection = (caret, caret);
            }
        }
    }

    /// Whether the native widget is currently off-screen
    ///
    /// True when no widget exists at all; only a visible session reports
    /// false.
    pub fn is_widget_hidden(&self) -> bool {
        let state = self.state.lock().unwrap();
        match state.session.as_ref() {
            Some(session) => session.phase == Phase::Hidden,
            None => true,
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Geometry and pointer routing
    // ────────────────────────────────────────────────────────────────────

    /// Re-position the native widget after a layout change
    ///
    /// Fetches geometry on the logic thread and pushes it to the host UI
    /// thread only when it differs from the last placement. No-op while the
    /// widget is hidden.
    pub fn relayout(self: &Arc<Self>) {
        let model_id = {
            let state = self.state.lock().unwrap();
            match state.session.as_ref() {
                Some(s) if s.phase == Phase::Visible && s.widget.is_some() => s.model_id,
                _ => return,
            }
        };

        let this = Arc::clone(self);
        self.logic.post(Box::new(move || {
            let (ax, ay) = this.surface.absolute_position(model_id);
            let (sx, sy) = this.surface.scroll_offset(model_id);
            let (width, height) = this.surface.size(model_id);
            let placement = (ax + sx, ay + sy, width, height);

            let widget = {
                let mut state = this.state.lock().unwrap();
                match state.session.as_mut() {
                    Some(s) if s.model_id == model_id && s.phase == Phase::Visible => {
                        if s.last_placement == placement {
                            return;
                        }
                        s.last_placement = placement;
                        s.widget
                    }
                    // The edited field changed in between; moving the widget
                    // now would place it over the old field.
                    _ => return,
                }
            };
            let Some(widget) = widget else { return };

            let inner = Arc::clone(&this);
            this.host.post(Box::new(move || {
                inner
                    .backend
                    .set_position(widget, placement.0, placement.1, placement.2, placement.3);
            }));
        }));
    }

    /// Route a pointer press that was not consumed by the native widget
    ///
    /// Sync mode: any such press ends the session (reason touch-outside),
    /// leaving the keyboard open when the press landed on another editable.
    /// Async mode: a press outside the edited field's bounds hides the
    /// widget, a press inside (boundary included) shows it again.
    pub fn pointer_pressed(self: &Arc<Self>, x: i32, y: i32) {
        let (mode, model_id) = {
            let state = self.state.lock().unwrap();
            match state.session.as_ref() {
                Some(s) if matches!(s.phase, Phase::Visible | Phase::Hidden) => {
                    (s.mode, s.model_id)
                }
                _ => return,
            }
        };

        let this = Arc::clone(self);
        match mode {
            EditMode::Sync => {
                self.logic.post(Box::new(move || {
                    let keep_keyboard = this.surface.editable_at(x, y);
                    let inner = Arc::clone(&this);
                    this.host.post(Box::new(move || {
                        inner.finish_session(EndReason::TouchOutside, None, keep_keyboard, false);
                    }));
                }));
            }
            EditMode::Async => {
                self.logic.post(Box::new(move || {
                    let (ax, ay) = this.surface.absolute_position(model_id);
                    let (sx, sy) = this.surface.scroll_offset(model_id);
                    let (width, height) = this.surface.size(model_id);
                    let (fx, fy) = (ax + sx, ay + sy);
                    let inside = x >= fx
                        && y >= fy
                        && x <= fx + width as i32
                        && y <= fy + height as i32;
                    if inside {
                        this.show_widget_again();
                    } else {
                        this.hide_widget();
                    }
                }));
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Completion
    // ────────────────────────────────────────────────────────────────────

    /// End the active session programmatically
    ///
    /// A no-op when no session is active; safe to call repeatedly.
    pub fn end_edit(self: &Arc<Self>) {
        self.end_edit_with(false);
    }

    /// End the active session, optionally forcing the keyboard closed
    pub fn end_edit_with(self: &Arc<Self>, force_keyboard_closed: bool) {
        let this = Arc::clone(self);
        self.host.post(Box::new(move || {
            this.finish_session(EndReason::Undefined, None, false, force_keyboard_closed);
        }));
    }

    /// Drive the session to idle; host UI thread only
    ///
    /// `action` is the IME action that triggered the end, when there was
    /// one; the keyboard-keep-open rule reads the *configured* action while
    /// the focus chain reads the *triggering* one.
    fn finish_session(
        self: &Arc<Self>,
        reason: EndReason,
        action: Option<ActionHint>,
        force_keyboard_open: bool,
        force_keyboard_close: bool,
    ) {
        debug_assert!(self.host.is_current(), "sessions finish on the host UI thread");

        let (mode, configured_action, widget, model_id) = {
            let mut state = self.state.lock().unwrap();
            let Some(session) = state.session.as_mut() else {
                // Idle already; ending nothing is a no-op.
                return;
            };
            match session.phase {
                Phase::Requesting => {
                    // The widget does not exist yet; defer until it does.
                    session.end_requested = true;
                    return;
                }
                Phase::Completing => return,
                Phase::Visible | Phase::Hidden => {}
            }
            session.phase = Phase::Completing;
            session.end_reason = reason;
            let gathered = (
                session.mode,
                session.snapshot.action,
                session.widget,
                session.model_id,
            );
            state.last_end_reason = reason;
            gathered
        };
        tracing::debug!(?reason, model = ?model_id, "session completing");

        let keep_keyboard = !force_keyboard_close
            && (mode == EditMode::Async
                || (reason == EndReason::ImeAction && configured_action == ActionHint::Next)
                || force_keyboard_open);
        if !keep_keyboard {
            self.request_keyboard(false);
        }

        if reason == EndReason::ImeAction && configured_action.is_commit() {
            let done = self.listeners.lock().unwrap().done.clone();
            if let Some(done) = done {
                self.request_keyboard(false);
                self.logic.post(Box::new(move || done(model_id)));
            }
        }

        let final_text = widget.map(|w| self.backend.text(w));
        if let Some(widget) = widget {
            self.backend.destroy(widget);
        }

        let (model, completion, final_text, next, pending, mode) = {
            let mut state = self.state.lock().unwrap();
            let Some(mut session) = state.session.take() else {
                return;
            };
            state.closing = false;
            let pending = state.pending.take();
            let next = if session.end_reason == EndReason::ImeAction
                && action == Some(ActionHint::Next)
            {
                session.snapshot.next_focus.clone()
            } else {
                None
            };
            (
                Arc::clone(&session.model),
                session.completion.take().unwrap_or(Completion::Detached),
                final_text.unwrap_or_else(|| session.known_model_text.clone()),
                next,
                pending,
                session.mode,
            )
        };

        let this = Arc::clone(self);
        self.logic.post(Box::new(move || {
            {
                let mut guard = model.lock().unwrap();
                if guard.text() != final_text {
                    guard.set_text(&final_text);
                }
            }
            this.surface.repaint(model_id);
            this.deliver(completion, model_id, &final_text);

            // A queued supersede request takes priority over focus chaining.
            if let Some(pending) = pending {
                this.begin_edit(pending.model, pending.options, pending.mode, pending.completion);
            } else if let Some(next) = next {
                focus::dispatch_next(&this, next, mode);
            }
        }));
    }

    /// Deliver a session result on the logic thread
    fn deliver(self: &Arc<Self>, completion: Completion, model_id: ModelId, text: &str) {
        debug_assert!(self.logic.is_current());
        let listener = self.listeners.lock().unwrap().completion.clone();
        if let Some(listener) = listener {
            listener(model_id, text);
        }
        match completion {
            Completion::Gate(gate) => gate.open(text),
            Completion::Callback(callback) => callback(text.to_string()),
            Completion::Detached => {}
        }
    }

    fn request_keyboard(self: &Arc<Self>, show: bool) {
        self.keyboard.set_requested(show);
        self.backend.show_keyboard(show);
        let listener = self.listeners.lock().unwrap().keyboard.clone();
        if let Some(listener) = listener {
            self.logic.post(Box::new(move || listener(show)));
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Queries and listeners
    // ────────────────────────────────────────────────────────────────────

    /// Whether a session is live (any phase before idle)
    pub fn is_editing(&self) -> bool {
        self.state.lock().unwrap().session.is_some()
    }

    /// Last known selection of the native widget, while a session is live
    ///
    /// The lightweight painter uses this to keep the caret in place while
    /// the widget is hidden.
    pub fn native_selection(&self) -> Option<(usize, usize)> {
        let state = self.state.lock().unwrap();
        state.session.as_ref().map(|session| session.selection)
    }

    /// Why the last session ended
    pub fn last_end_reason(&self) -> EndReason {
        self.state.lock().unwrap().last_end_reason
    }

    /// Best-effort estimate of virtual-keyboard visibility
    pub fn is_keyboard_likely_visible(&self) -> bool {
        self.keyboard.is_likely_visible()
    }

    /// The underlying visibility tracker (exposes the fake-clock entry point)
    pub fn keyboard(&self) -> &KeyboardVisibility {
        &self.keyboard
    }

    /// Observe every session completion
    pub fn set_completion_listener(&self, listener: impl Fn(ModelId, &str) + Send + Sync + 'static) {
        self.listeners.lock().unwrap().completion = Some(Arc::new(listener));
    }

    /// Observe committing IME actions (done/search/send/go)
    pub fn set_done_listener(&self, listener: impl Fn(ModelId) + Send + Sync + 'static) {
        self.listeners.lock().unwrap().done = Some(Arc::new(listener));
    }

    /// Observe virtual-keyboard show/hide requests
    pub fn set_keyboard_listener(&self, listener: impl Fn(bool) + Send + Sync + 'static) {
        self.listeners.lock().unwrap().keyboard = Some(Arc::new(listener));
    }
}
