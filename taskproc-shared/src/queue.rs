/// Concurrent event FIFO
///
/// [`EventQueue`] is the unbounded queue carrying [`Event`]s from an
/// executor to whoever drains it. Handles are cheap clones of one shared
/// queue, so a producer (the status-update path) and any number of
/// consumers (a runner, a retrying executor) can hold it at once.
///
/// Unlike a plain channel, consumers may also *publish back*: the sync
/// runner re-enqueues events that belong to somebody else's task, and
/// wrapping executors republish rewritten events onto their own queue.
///
/// # Blocking behavior
///
/// `try_pop` never waits; `pop` parks on a [`Notify`] until an event
/// arrives. Ordering is strict FIFO per queue.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::models::event::Event;

#[derive(Debug, Default)]
struct Inner {
    items: Mutex<VecDeque<Event>>,
    notify: Notify,
}

/// Cloneable handle to a shared unbounded event FIFO
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    inner: Arc<Inner>,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue::default()
    }

    /// Appends an event and wakes one waiting consumer
    pub fn push(&self, event: Event) {
        self.inner
            .items
            .lock()
            .expect("event queue lock poisoned")
            .push_back(event);
        self.inner.notify.notify_one();
    }

    /// Removes and returns the oldest event, if any
    pub fn try_pop(&self) -> Option<Event> {
        self.inner
            .items
            .lock()
            .expect("event queue lock poisoned")
            .pop_front()
    }

    /// Waits until an event is available and returns it
    pub async fn pop(&self) -> Event {
        loop {
            // Register for wakeup before checking, so a push between the
            // check and the await is not lost.
            let notified = self.inner.notify.notified();
            if let Some(event) = self.try_pop() {
                return event;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .items
            .lock()
            .expect("event queue lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
