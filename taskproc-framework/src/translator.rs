/// Status update translation
///
/// A [`StatusTranslator`] is the pure function from an opaque cluster
/// status update to an [`Event`]. The framework calls it exactly once
/// per accepted update and never interprets the raw payload otherwise,
/// so alternate clusters plug in by substituting the translator.
///
/// [`DefaultTranslator`] implements the standard state-string mapping:
/// `TASK_FINISHED` is the successful terminal state, `TASK_FAILED`,
/// `TASK_KILLED`, `TASK_LOST` and `TASK_ERROR` are unsuccessful
/// terminals, and everything else is a non-terminal transition.
use taskproc_shared::models::event::Event;
use taskproc_shared::models::task_state;

use crate::driver::StatusUpdate;

/// Pure translation from cluster status to event
pub trait StatusTranslator: Send + Sync {
    fn translate(&self, update: &StatusUpdate) -> Event;
}

/// Whether a cluster state string ends the task's lifecycle
pub fn is_terminal_state(state: &str) -> bool {
    matches!(
        state,
        task_state::TASK_FINISHED
            | task_state::TASK_FAILED
            | task_state::TASK_KILLED
            | task_state::TASK_LOST
            | task_state::TASK_ERROR
    )
}

/// Whether a terminal state string reports success
pub fn is_successful_state(state: &str) -> bool {
    state == task_state::TASK_FINISHED
}

/// Standard cluster state translation
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTranslator;

impl StatusTranslator for DefaultTranslator {
    fn translate(&self, update: &StatusUpdate) -> Event {
        let raw = serde_json::to_value(update).unwrap_or(serde_json::Value::Null);

        Event::task(&update.task_id, &update.state)
            .with_outcome(is_terminal_state(&update.state), is_successful_state(&update.state))
            .with_raw(raw)
    }
}
