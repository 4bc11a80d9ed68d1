//! Callback registration for a client.
//!
//! Push callbacks ([`SessionCallbacks`]) are invoked by the session worker
//! thread whenever it has something to report. Pull callbacks
//! ([`StateProvider`]) are invoked synchronously by the worker when it needs
//! fresh sensor readings from the host.

use crate::types::{LocationMeasurements, MotionMeasurements, ScapeMeasurements, SessionError};
use crate::{Result, ScapeError};
use crossbeam_channel::{Receiver, Sender};
use std::time::Duration;

type RequestedFn = Box<dyn Fn(i32) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&SessionError) + Send + Sync>;
type UpdatedFn = Box<dyn Fn(ScapeMeasurements) + Send + Sync>;

/// The three asynchronous session notifications.
///
/// Each one runs on the session thread, never on the thread that
/// requested the measurement.
#[derive(Default)]
pub struct SessionCallbacks {
    measurements_requested: Option<RequestedFn>,
    session_error: Option<ErrorFn>,
    measurements_updated: Option<UpdatedFn>,
}

impl SessionCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when a measurement cycle starts, with the Unix time in seconds.
    pub fn on_measurements_requested(mut self, f: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.measurements_requested = Some(Box::new(f));
        self
    }

    pub fn on_session_error(mut self, f: impl Fn(&SessionError) + Send + Sync + 'static) -> Self {
        self.session_error = Some(Box::new(f));
        self
    }

    pub fn on_measurements_updated(
        mut self,
        f: impl Fn(ScapeMeasurements) + Send + Sync + 'static,
    ) -> Self {
        self.measurements_updated = Some(Box::new(f));
        self
    }

    /// Callbacks that forward every notification into a bounded channel,
    /// for hosts that consume events on their own thread.
    pub fn channel(capacity: usize) -> (SessionCallbacks, SessionEvents) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        let requested = sender.clone();
        let error = sender.clone();
        let callbacks = SessionCallbacks::new()
            .on_measurements_requested(move |ts| {
                forward(&requested, SessionEvent::MeasurementsRequested(ts))
            })
            .on_session_error(move |err| forward(&error, SessionEvent::SessionError(err.clone())))
            .on_measurements_updated(move |m| {
                forward(&sender, SessionEvent::MeasurementsUpdated(m))
            });
        (callbacks, SessionEvents { receiver })
    }

    pub(crate) fn measurements_requested(&self, timestamp: i32) {
        if let Some(f) = &self.measurements_requested {
            f(timestamp);
        }
    }

    /// Returns false if no error callback is registered.
    pub(crate) fn session_error(&self, err: &SessionError) -> bool {
        match &self.session_error {
            Some(f) => {
                f(err);
                true
            }
            None => false,
        }
    }

    /// Returns false if no update callback is registered.
    pub(crate) fn measurements_updated(&self, m: ScapeMeasurements) -> bool {
        match &self.measurements_updated {
            Some(f) => {
                f(m);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("measurements_requested", &self.measurements_requested.is_some())
            .field("session_error", &self.session_error.is_some())
            .field("measurements_updated", &self.measurements_updated.is_some())
            .finish()
    }
}

fn forward(sender: &Sender<SessionEvent>, event: SessionEvent) {
    if let Err(e) = sender.try_send(event) {
        match e {
            crossbeam_channel::TrySendError::Full(ev) => {
                log::warn!("Session event channel full, dropping {:?}", ev);
            }
            crossbeam_channel::TrySendError::Disconnected(_) => {
                log::trace!("Session event receiver dropped");
            }
        }
    }
}

/// A session notification, as delivered by [`SessionCallbacks::channel`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MeasurementsRequested(i32),
    SessionError(SessionError),
    MeasurementsUpdated(ScapeMeasurements),
}

/// Receiving end of [`SessionCallbacks::channel`].
pub struct SessionEvents {
    receiver: Receiver<SessionEvent>,
}

impl SessionEvents {
    /// Receive the next event (blocks until available).
    pub fn recv(&self) -> Result<SessionEvent> {
        self.receiver.recv().map_err(|_| ScapeError::SessionStopped)
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<SessionEvent> {
        self.receiver.try_recv().ok()
    }

    /// Receive an event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<SessionEvent> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => ScapeError::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => ScapeError::SessionStopped,
        })
    }

    /// Drain every event currently queued, oldest first.
    pub fn drain(&self) -> Vec<SessionEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Source of sensor snapshots, pulled by the session when it needs them.
///
/// Implementations must answer promptly: the session thread waits on the call.
pub trait StateProvider: Send + Sync {
    fn motion(&self) -> MotionMeasurements;
    fn location(&self) -> LocationMeasurements;
}

/// A [`StateProvider`] built from two closures.
pub struct FnStateProvider<M, L> {
    motion: M,
    location: L,
}

impl<M, L> FnStateProvider<M, L>
where
    M: Fn() -> MotionMeasurements + Send + Sync,
    L: Fn() -> LocationMeasurements + Send + Sync,
{
    pub fn new(motion: M, location: L) -> Self {
        Self { motion, location }
    }
}

impl<M, L> StateProvider for FnStateProvider<M, L>
where
    M: Fn() -> MotionMeasurements + Send + Sync,
    L: Fn() -> LocationMeasurements + Send + Sync,
{
    fn motion(&self) -> MotionMeasurements {
        (self.motion)()
    }

    fn location(&self) -> LocationMeasurements {
        (self.location)()
    }
}
