//! Typed publish/subscribe with RAII subscription tokens.
//!
//! [`Event<T>`] is a single channel. [`TypedEventCenter`] routes events by
//! their Rust type and is what pipelines expose for viewport resizes and
//! swapchain changes.
//!
//! # Dispatch rules
//!
//! - Handlers run in subscription order.
//! - A handler subscribed while a publish is running is first invoked on the
//!   *next* publish.
//! - A handler unsubscribed while a publish is running is skipped if it has not
//!   been visited yet.
//! - A handler is never re-entered by a nested publish from inside itself.
//!   Re-entrancy is tracked per thread: a publish on another thread waits
//!   for a busy handler instead of skipping it.
//! - Every handler is attempted; failures are collected and returned together
//!   as [`LumenError::EventDispatch`].

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::errors::{HandlerError, LumenError, Result};
use crate::logging::targets;

/// Return type of every event handler.
pub type HandlerResult = std::result::Result<(), HandlerError>;

type Callback<T> = Arc<Mutex<Box<dyn FnMut(&T) -> HandlerResult + Send>>>;

thread_local! {
    // Callbacks currently running on this thread, by address.
    static RUNNING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

// Marks a callback as running on this thread until dropped.
struct RunningGuard(usize);

impl RunningGuard {
    fn enter(address: usize) -> Option<Self> {
        RUNNING.with_borrow_mut(|running| {
            if running.contains(&address) {
                None
            } else {
                running.push(address);
                Some(Self(address))
            }
        })
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        RUNNING.with_borrow_mut(|running| {
            if let Some(index) = running.iter().rposition(|&address| address == self.0) {
                running.swap_remove(index);
            }
        });
    }
}

struct Slot<T> {
    id: u64,
    alive: Arc<AtomicBool>,
    callback: Callback<T>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            alive: Arc::clone(&self.alive),
            callback: Arc::clone(&self.callback),
        }
    }
}

struct Channel<T> {
    next_id: u64,
    slots: Vec<Slot<T>>,
}

/// A single typed event channel.
///
/// Cloning an `Event` yields another handle to the same channel.
pub struct Event<T: 'static> {
    channel: Arc<Mutex<Channel<T>>>,
}

impl<T: 'static> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
        }
    }
}

impl<T: 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Event<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            channel: Arc::new(Mutex::new(Channel {
                next_id: 1,
                slots: Vec::new(),
            })),
        }
    }

    /// Registers `handler` and returns the token that owns the subscription.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionToken
    where
        F: FnMut(&T) -> HandlerResult + Send + 'static,
    {
        let alive = Arc::new(AtomicBool::new(true));
        let id = {
            let mut channel = self.channel.lock();
            let id = channel.next_id;
            channel.next_id += 1;
            channel.slots.push(Slot {
                id,
                alive: Arc::clone(&alive),
                callback: Arc::new(Mutex::new(Box::new(handler))),
            });
            id
        };

        let weak: Weak<Mutex<Channel<T>>> = Arc::downgrade(&self.channel);
        SubscriptionToken::new(move || {
            alive.store(false, Ordering::Release);
            if let Some(channel) = weak.upgrade() {
                // The removed slot may own other tokens; drop it after unlocking.
                let removed = {
                    let mut guard = channel.lock();
                    guard
                        .slots
                        .iter()
                        .position(|slot| slot.id == id)
                        .map(|index| guard.slots.remove(index))
                };
                drop(removed);
            }
        })
    }

    /// Invokes every registered handler with `args`.
    pub fn publish(&self, args: &T) -> Result<()> {
        let snapshot: Vec<Slot<T>> = self.channel.lock().slots.clone();
        let mut errors: Vec<HandlerError> = Vec::new();

        for slot in &snapshot {
            if !slot.alive.load(Ordering::Acquire) {
                continue;
            }
            let address = Arc::as_ptr(&slot.callback).cast::<()>() as usize;
            let Some(_running) = RunningGuard::enter(address) else {
                log::trace!(target: targets::EVENT, "Skipping re-entrant handler #{}", slot.id);
                continue;
            };
            let mut callback = slot.callback.lock();
            let handler = &mut *callback;
            if let Err(err) = handler(args) {
                log::debug!(target: targets::EVENT, "Handler #{} failed: {err}", slot.id);
                errors.push(err);
            }
        }
        drop(snapshot);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LumenError::EventDispatch(errors))
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.channel
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.alive.load(Ordering::Acquire))
            .count()
    }

    /// Drops every subscription. Outstanding tokens become no-ops.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut self.channel.lock().slots);
        for slot in &removed {
            slot.alive.store(false, Ordering::Release);
        }
        drop(removed);
    }
}

/// Owns one subscription. Dropping or resetting it unsubscribes exactly once.
///
/// Tokens may outlive their channel, in which case reset is a no-op.
#[must_use = "dropping the token immediately unsubscribes the handler"]
pub struct SubscriptionToken {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Default for SubscriptionToken {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for SubscriptionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionToken")
            .field("active", &self.is_active())
            .finish()
    }
}

impl SubscriptionToken {
    fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A token that owns nothing.
    pub fn empty() -> Self {
        Self { unsubscribe: None }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }

    pub fn reset(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for SubscriptionToken {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Routes events to per-type [`Event`] channels.
#[derive(Default)]
pub struct TypedEventCenter {
    channels: Mutex<FxHashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl TypedEventCenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn channel<E: 'static>(&self) -> Event<E> {
        let mut channels = self.channels.lock();
        let slot = channels
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Event::<E>::new()));
        if let Some(event) = slot.downcast_ref::<Event<E>>() {
            return event.clone();
        }
        let event = Event::<E>::new();
        *slot = Box::new(event.clone());
        event
    }

    fn existing<E: 'static>(&self) -> Option<Event<E>> {
        self.channels
            .lock()
            .get(&TypeId::of::<E>())
            .and_then(|slot| slot.downcast_ref::<Event<E>>())
            .cloned()
    }

    pub fn subscribe<E, F>(&self, handler: F) -> SubscriptionToken
    where
        E: 'static,
        F: FnMut(&E) -> HandlerResult + Send + 'static,
    {
        self.channel::<E>().subscribe(handler)
    }

    /// Publishes `event` to the handlers of its type. No handlers is not an error.
    pub fn publish<E: 'static>(&self, event: &E) -> Result<()> {
        match self.existing::<E>() {
            Some(channel) => channel.publish(event),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn action_count<E: 'static>(&self) -> usize {
        self.existing::<E>().map_or(0, |channel| channel.handler_count())
    }

    /// Forgets every channel. Outstanding tokens become no-ops.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.channels.lock());
        drop(removed);
    }
}
