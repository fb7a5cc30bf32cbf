//! One client connection's event narrative
//!
//! A session is `Open` until its `done` event is written, its deadline
//! passes, the peer goes away, or it is closed explicitly. Every one of those
//! exits runs through the same finalizer, which drops the [`SessionTimers`]
//! guard, cancels the session token, unregisters from the
//! [`StreamRegistry`] and ends the transport. Emits after that are no-ops.
//!
//! Frames are written under the session lock, so events reach the transport
//! in the order the handler produced them even while the heartbeat task is
//! writing too.

use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use parking_lot::Mutex;
use relaygate_common::error::{categorize, ErrorCategory, ErrorSeverity, FailureSignal};
use relaygate_domain::constants::SESSION_TIMEOUT_MESSAGE;
use relaygate_domain::{DoneStatus, Event, StreamConfig, StreamEvent};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::encoder::{EncodeError, FrameEncoder};
use super::registry::StreamRegistry;

/// Per-session timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Gap between keep-alive comments; zero disables them
    pub heartbeat_interval: Duration,
    /// Wall-clock bound on the whole session
    pub timeout: Duration,
    /// Reconnect hint attached to retryable error events
    pub retry_hint: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(300),
            retry_hint: Some(Duration::from_secs(3)),
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &StreamConfig) -> Self {
        let retry_hint = config.retry_hint();
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            timeout: config.session_timeout(),
            retry_hint: (!retry_hint.is_zero()).then_some(retry_hint),
        }
    }

    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_retry_hint(mut self, hint: Option<Duration>) -> Self {
        self.retry_hint = hint;
        self
    }
}

/// Transport facts recorded alongside the session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetadata {
    pub endpoint: String,
    pub owner_id: Option<String>,
}

impl SessionMetadata {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), owner_id: None }
    }

    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Completed,
    Failed,
    TimedOut,
    PeerDisconnected,
    Closed,
}

impl CloseReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::PeerDisconnected => "peer_disconnected",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to one open (or finished) stream session
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct StreamSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: String,
    started_at: DateTime<Utc>,
    started: Instant,
    metadata: SessionMetadata,
    options: SessionOptions,
    encoder: FrameEncoder,
    next_seq: AtomicU64,
    events_emitted: AtomicU64,
    lifecycle: Mutex<Lifecycle>,
    cancel: CancellationToken,
    registry: Arc<StreamRegistry>,
}

enum Lifecycle {
    Open { sink: mpsc::UnboundedSender<Bytes>, timers: Option<SessionTimers> },
    Closed,
}

impl StreamSession {
    /// Open a session, register it and start its timers
    ///
    /// Must be called inside a tokio runtime. The returned body yields the
    /// encoded frames; dropping it counts as the peer disconnecting.
    pub fn open(
        metadata: SessionMetadata,
        options: SessionOptions,
        registry: Arc<StreamRegistry>,
    ) -> (Self, SessionBody) {
        let (sink, frames) = mpsc::unbounded_channel();
        let session = Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4().to_string(),
                started_at: Utc::now(),
                started: Instant::now(),
                metadata,
                options,
                encoder: FrameEncoder::new(),
                next_seq: AtomicU64::new(0),
                events_emitted: AtomicU64::new(0),
                lifecycle: Mutex::new(Lifecycle::Open { sink, timers: None }),
                cancel: CancellationToken::new(),
                registry,
            }),
        };

        session.inner.registry.register(&session);
        let timers = SessionTimers::start(&session);
        if let Lifecycle::Open { timers: slot, .. } = &mut *session.inner.lifecycle.lock() {
            *slot = Some(timers);
        }

        info!(
            session_id = %session.id(),
            endpoint = %session.endpoint(),
            timeout_ms = duration_ms(session.inner.options.timeout),
            "Stream session opened"
        );

        let body = SessionBody { frames, session: session.clone() };
        (session, body)
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.metadata.endpoint
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.inner.metadata.owner_id.as_deref()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// Semantic events written so far; heartbeats are not counted
    pub fn events_emitted(&self) -> u64 {
        self.inner.events_emitted.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.started.elapsed()
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.inner.lifecycle.lock(), Lifecycle::Closed)
    }

    /// Resolves once the session has closed for any reason
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.cancel.cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Write an event. A `done` event closes the session.
    ///
    /// Returns `false` when the session was already closed or the peer has
    /// gone away.
    pub fn emit(&self, event: impl Into<Event>) -> bool {
        self.dispatch([event.into()])
    }

    pub fn emit_status(&self, message: impl Into<String>) -> bool {
        self.emit(StreamEvent::status(message))
    }

    pub fn emit_answer(&self, payload: Value) -> bool {
        self.emit(StreamEvent::answer(payload))
    }

    pub fn emit_error(
        &self,
        message: impl Into<String>,
        category: ErrorCategory,
        retryable: bool,
    ) -> bool {
        self.emit(self.error_event(message, category, retryable))
    }

    /// Write the terminal `done` event and close
    ///
    /// `elapsed` defaults to the time since the session opened.
    pub fn emit_done(&self, status: DoneStatus, elapsed: Option<Duration>) -> bool {
        self.emit(self.done_event(status, elapsed))
    }

    /// Report a failure as `error` then `done(error)`, and close
    ///
    /// The client sees the category's user-facing sentence; the error
    /// itself only goes to the log.
    pub fn fail<E>(&self, error: &E) -> bool
    where
        E: FailureSignal + fmt::Display + ?Sized,
    {
        if self.is_closed() {
            debug!(session_id = %self.id(), error = %error, "Failure after close ignored");
            return false;
        }

        let category = categorize(error);
        match category.severity() {
            ErrorSeverity::Info => {
                info!(
                    session_id = %self.id(),
                    category = %category,
                    error = %error,
                    "Stream session failed"
                );
            }
            ErrorSeverity::Warning => {
                warn!(
                    session_id = %self.id(),
                    category = %category,
                    error = %error,
                    "Stream session failed"
                );
            }
            ErrorSeverity::Error | ErrorSeverity::Critical => {
                error!(
                    session_id = %self.id(),
                    category = %category,
                    error = %error,
                    "Stream session failed"
                );
            }
        }
        self.dispatch([
            self.error_event(category.user_message(), category, category.is_transient()),
            self.done_event(DoneStatus::Error, None),
        ])
    }

    /// Close without writing anything further. Idempotent.
    pub fn close(&self) {
        self.close_with(CloseReason::Closed);
    }

    pub(crate) fn close_with(&self, reason: CloseReason) {
        let previous = std::mem::replace(&mut *self.inner.lifecycle.lock(), Lifecycle::Closed);
        self.finalize(previous, reason);
    }

    fn error_event(
        &self,
        message: impl Into<String>,
        category: ErrorCategory,
        retryable: bool,
    ) -> Event {
        let event = Event::new(StreamEvent::error(message, category, retryable));
        match self.inner.options.retry_hint {
            Some(hint) if retryable => event.with_retry_hint(duration_ms(hint)),
            _ => event,
        }
    }

    fn done_event(&self, status: DoneStatus, elapsed: Option<Duration>) -> Event {
        let elapsed = elapsed.unwrap_or_else(|| self.elapsed());
        Event::new(StreamEvent::done(status, duration_ms(elapsed)))
    }

    fn dispatch(&self, events: impl IntoIterator<Item = Event>) -> bool {
        self.write(events, None)
    }

    /// Write events under one lock hold; a `done` among them closes the
    /// session, recorded as `reason` when given
    fn write(&self, events: impl IntoIterator<Item = Event>, reason: Option<CloseReason>) -> bool {
        let mut lifecycle = self.inner.lifecycle.lock();
        let Lifecycle::Open { sink, .. } = &*lifecycle else {
            return false;
        };

        let mut closing = None;
        for event in events {
            let done = match &event.body {
                StreamEvent::Done(payload) => Some(payload.status),
                _ => None,
            };
            let semantic = !matches!(event.body, StreamEvent::Heartbeat(_));

            if sink.send(self.frame(event, semantic)).is_err() {
                closing = Some(CloseReason::PeerDisconnected);
                break;
            }
            if semantic {
                let count = self.inner.events_emitted.fetch_add(1, Ordering::Relaxed) + 1;
                self.inner.registry.record_activity(&self.inner.id, count);
            }
            if let Some(status) = done {
                closing = Some(reason.unwrap_or(match status {
                    DoneStatus::Success => CloseReason::Completed,
                    DoneStatus::Error => CloseReason::Failed,
                }));
                break;
            }
        }

        let delivered = closing != Some(CloseReason::PeerDisconnected);
        if let Some(reason) = closing {
            let previous = std::mem::replace(&mut *lifecycle, Lifecycle::Closed);
            drop(lifecycle);
            self.finalize(previous, reason);
        }
        delivered
    }

    fn frame(&self, mut event: Event, semantic: bool) -> Bytes {
        if semantic && event.id.is_none() {
            let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
            event.id = Some(seq.to_string());
        }

        match self.inner.encoder.encode(&event) {
            Ok(frame) => frame,
            Err(err) => self.unencodable_frame(event.id, &err),
        }
    }

    /// Stand-in for an event whose payload would not serialize; keeps its id
    /// so the sequence stays gap-free
    fn unencodable_frame(&self, id: Option<String>, err: &EncodeError) -> Bytes {
        warn!(session_id = %self.id(), error = %err, "Event could not be encoded");
        let category = ErrorCategory::ParsingError;
        let fallback = Event {
            id,
            retry_hint: None,
            body: StreamEvent::error(category.user_message(), category, false),
        };
        self.inner.encoder.encode(&fallback).unwrap_or_default()
    }

    fn heartbeat(&self) -> bool {
        self.dispatch([Event::new(StreamEvent::Heartbeat(Utc::now()))])
    }

    fn expire(&self) {
        if self.is_closed() {
            return;
        }
        warn!(
            session_id = %self.id(),
            timeout_ms = duration_ms(self.inner.options.timeout),
            "Stream session timed out"
        );

        self.write(
            [
                self.error_event(SESSION_TIMEOUT_MESSAGE, ErrorCategory::Timeout, true),
                self.done_event(DoneStatus::Error, None),
            ],
            Some(CloseReason::TimedOut),
        );
    }

    fn finalize(&self, previous: Lifecycle, reason: CloseReason) {
        let Lifecycle::Open { sink, timers } = previous else {
            return;
        };

        drop(timers);
        self.inner.cancel.cancel();
        self.inner.registry.unregister(&self.inner.id);
        drop(sink);

        info!(
            session_id = %self.id(),
            reason = %reason,
            events = self.events_emitted(),
            elapsed_ms = duration_ms(self.elapsed()),
            "Stream session closed"
        );
    }
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.inner.id)
            .field("endpoint", &self.inner.metadata.endpoint)
            .field("events_emitted", &self.events_emitted())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Heartbeat and deadline tasks for one session
///
/// Dropping the guard stops both. The tasks only hold a weak reference, so
/// they never keep a session alive on their own.
struct SessionTimers {
    stop: CancellationToken,
    heartbeat: Option<JoinHandle<()>>,
    deadline: JoinHandle<()>,
}

impl SessionTimers {
    fn start(session: &StreamSession) -> Self {
        let stop = session.inner.cancel.child_token();
        let options = &session.inner.options;
        let weak = Arc::downgrade(&session.inner);

        let heartbeat = (!options.heartbeat_interval.is_zero()).then(|| {
            tokio::spawn(heartbeat_loop(weak.clone(), options.heartbeat_interval, stop.clone()))
        });
        let deadline = tokio::spawn(deadline_watch(weak, options.timeout, stop.clone()));

        Self { stop, heartbeat, deadline }
    }
}

impl Drop for SessionTimers {
    fn drop(&mut self) {
        self.stop.cancel();
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.abort();
        }
        self.deadline.abort();
    }
}

async fn heartbeat_loop(session: Weak<SessionInner>, every: Duration, stop: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = session.upgrade() else { break };
                if !(StreamSession { inner }).heartbeat() {
                    break;
                }
            }
        }
    }
}

async fn deadline_watch(session: Weak<SessionInner>, after: Duration, stop: CancellationToken) {
    tokio::select! {
        () = stop.cancelled() => {}
        () = tokio::time::sleep(after) => {
            if let Some(inner) = session.upgrade() {
                StreamSession { inner }.expire();
            }
        }
    }
}

/// Frames of one session, in emit order, ready for a streaming response
///
/// Dropping the body before the session finished is treated as the peer
/// disconnecting: the session closes immediately and its timers stop.
pub struct SessionBody {
    frames: mpsc::UnboundedReceiver<Bytes>,
    session: StreamSession,
}

impl SessionBody {
    pub fn session(&self) -> &StreamSession {
        &self.session
    }
}

impl Stream for SessionBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.frames.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}

impl Drop for SessionBody {
    fn drop(&mut self) {
        self.session.close_with(CloseReason::PeerDisconnected);
    }
}

impl fmt::Debug for SessionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBody").field("session", &self.session).finish()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
