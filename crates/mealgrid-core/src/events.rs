//! Side-channel notifications from the planner.
//!
//! Events are informational: the grid and the tracker already hold the
//! outcome of every operation. Front ends use them for transient messages
//! ("couldn't generate breakfast") and to know when to redraw.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::grid::SlotKey;
use crate::week::WeekKey;

/// Something observable happened in the planner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlannerEvent {
    SlotGenerating {
        week: WeekKey,
        key: SlotKey,
        regenerating: bool,
    },
    SlotFilled {
        week: WeekKey,
        key: SlotKey,
        recipe_id: String,
        title: String,
    },
    GenerationFailed {
        week: WeekKey,
        key: SlotKey,
        message: String,
    },
    /// The meal is shown locally but could not be saved.
    PersistFailed {
        week: WeekKey,
        key: SlotKey,
        message: String,
    },
    SlotRemoved {
        week: WeekKey,
        key: SlotKey,
    },
    /// The session fell back to local-only planning.
    GuestModeEntered,
    WeekLoaded {
        week: WeekKey,
        /// `false` when the backend had no plan, or for guests.
        from_backend: bool,
        meals: usize,
    },
}

pub type EventSender = mpsc::UnboundedSender<PlannerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PlannerEvent>;

/// Fire-and-forget emitter; a closed receiver is not an error.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<EventSender>,
}

impl EventSink {
    /// A sink paired with its receiver.
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: PlannerEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
