use crate::{
    dto::read::ReadResult,
    ids::ResourceKey,
    policy::reconcile::{Decision, Reconciler, TrustState},
};
use candid::CandidType;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

///
/// StoreEntry
/// The accepted value for a key, tagged with its trust level.
///

#[derive(CandidType, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StoreEntry<T> {
    pub value: T,
    pub certified: bool,
}

impl<T> StoreEntry<T> {
    #[must_use]
    pub const fn trust(&self) -> TrustState {
        TrustState::from_certified(self.certified)
    }
}

///
/// StoreEvent
/// Pushed to subscribers after each state change.
///

#[derive(Debug)]
pub enum StoreEvent<'a, T> {
    Set {
        key: &'a ResourceKey,
        entry: &'a StoreEntry<T>,
    },
    Cleared {
        key: &'a ResourceKey,
    },
    Reset,
}

///
/// SubscriptionId
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SubscriptionId(u64);

type Listener<T> = Arc<dyn Fn(&StoreEvent<'_, T>) + Send + Sync>;

struct StoreState<T> {
    entries: BTreeMap<ResourceKey, StoreEntry<T>>,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
    next_subscription: u64,
    next_ticket: u64,
}

// A change waiting to be delivered. Tickets are handed out under the state
// lock, so ticket order is write order.
struct Dispatch<T> {
    ticket: u64,
    listeners: Vec<Listener<T>>,
}

// Held while one change is being delivered; passes the turn on when dropped,
// including when a listener panics.
struct DeliveryTurn<'a> {
    served: &'a Mutex<u64>,
    turn: &'a Condvar,
}

impl Drop for DeliveryTurn<'_> {
    fn drop(&mut self) {
        let mut served = self.served.lock().unwrap_or_else(PoisonError::into_inner);
        *served = served.wrapping_add(1);
        self.turn.notify_all();
    }
}

///
/// Store
///
/// Keyed observable state. Every write goes through the reconciler while the
/// state lock is held, so concurrent writers cannot interleave a
/// read-decide-write on the same key. Subscribers run after the lock is
/// released and may read the store from inside their callback, but must not
/// write to it. Changes reach subscribers in the order they were written,
/// even when writers race on different threads.
///

pub struct Store<T> {
    state: Mutex<StoreState<T>>,
    served: Mutex<u64>,
    turn: Condvar,
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Store")
            .field("entries", &state.entries.len())
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl<T> Store<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                entries: BTreeMap::new(),
                listeners: Vec::new(),
                next_subscription: 0,
                next_ticket: 0,
            }),
            served: Mutex::new(0),
            turn: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Must be called with the state lock held. `None` when nobody listens.
    fn dispatch(state: &mut StoreState<T>) -> Option<Dispatch<T>> {
        if state.listeners.is_empty() {
            return None;
        }

        let ticket = state.next_ticket;
        state.next_ticket = state.next_ticket.wrapping_add(1);

        Some(Dispatch {
            ticket,
            listeners: state
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect(),
        })
    }

    // Must be called after the state lock is released.
    fn deliver(&self, dispatch: Dispatch<T>, event: &StoreEvent<'_, T>) {
        let _turn = self.wait_turn(dispatch.ticket);

        for listener in &dispatch.listeners {
            listener(event);
        }
    }

    fn wait_turn(&self, ticket: u64) -> DeliveryTurn<'_> {
        let mut served = self.served.lock().unwrap_or_else(PoisonError::into_inner);
        while *served != ticket {
            served = self
                .turn
                .wait(served)
                .unwrap_or_else(PoisonError::into_inner);
        }

        DeliveryTurn {
            served: &self.served,
            turn: &self.turn,
        }
    }

    #[must_use]
    pub fn state(&self, key: &ResourceKey) -> TrustState {
        self.lock()
            .entries
            .get(key)
            .map_or(TrustState::Unproven, StoreEntry::trust)
    }

    #[must_use]
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Drop every entry, whatever its trust level (logout).
    /// Calling it again on an empty store leaves it empty.
    pub fn reset(&self) {
        let dispatch = {
            let mut state = self.lock();
            state.entries.clear();
            Self::dispatch(&mut state)
        };

        if let Some(dispatch) = dispatch {
            self.deliver(dispatch, &StoreEvent::Reset);
        }
    }

    /// Drop one key, whatever its trust level (scope change).
    /// Returns whether an entry was present.
    pub fn reset_key(&self, key: &ResourceKey) -> bool {
        let (removed, dispatch) = {
            let mut state = self.lock();
            let removed = state.entries.remove(key).is_some();
            let dispatch = if removed {
                Self::dispatch(&mut state)
            } else {
                None
            };
            (removed, dispatch)
        };

        if let Some(dispatch) = dispatch {
            self.deliver(dispatch, &StoreEvent::Cleared { key });
        }

        removed
    }

    /// Register a listener; it sees every change until unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent<'_, T>) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription = state.next_subscription.saturating_add(1);
        state.listeners.push((id, Arc::new(listener)));

        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(sid, _)| *sid != id);

        state.listeners.len() != before
    }
}

impl<T: Clone> Store<T> {
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<StoreEntry<T>> {
        self.lock().entries.get(key).cloned()
    }

    #[must_use]
    pub fn value(&self, key: &ResourceKey) -> Option<T> {
        self.lock().entries.get(key).map(|entry| entry.value.clone())
    }

    /// Point-in-time copy of all entries, ordered by key.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(ResourceKey, StoreEntry<T>)> {
        self.lock()
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Offer a successful value; the reconciler decides whether it lands.
    pub fn set(&self, key: &ResourceKey, value: T, certified: bool) -> Decision {
        self.apply(key, &ReadResult::ok(value, certified))
    }

    /// Offer a delivered result for `key` and apply the reconciler's decision.
    pub fn apply(&self, key: &ResourceKey, result: &ReadResult<T>) -> Decision {
        // (dispatch, Some(entry)) for a set, (dispatch, None) for a clear
        let (decision, change) = {
            let mut state = self.lock();
            let current = state
                .entries
                .get(key)
                .map_or(TrustState::Unproven, StoreEntry::trust);
            let decision = Reconciler::decide(current, result);

            let change = match (decision, &result.outcome) {
                (Decision::Accept, Ok(value)) => {
                    let entry = StoreEntry {
                        value: value.clone(),
                        certified: result.certified,
                    };
                    let change = Self::dispatch(&mut state).map(|d| (d, Some(entry.clone())));
                    state.entries.insert(key.clone(), entry);
                    change
                }
                (Decision::Clear, _) => {
                    if state.entries.remove(key).is_some() {
                        Self::dispatch(&mut state).map(|d| (d, None))
                    } else {
                        None
                    }
                }
                _ => None,
            };

            (decision, change)
        };

        match change {
            Some((dispatch, Some(entry))) => {
                self.deliver(dispatch, &StoreEvent::Set { key, entry: &entry });
            }
            Some((dispatch, None)) => self.deliver(dispatch, &StoreEvent::Cleared { key }),
            None => {}
        }

        decision
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::read::ReadError;
    use candid::Principal;
    use std::sync::{
        Barrier,
        atomic::{AtomicUsize, Ordering},
    };

    fn key(id: u8) -> ResourceKey {
        ResourceKey::Canister(Principal::from_slice(&[id; 29]))
    }

    fn failed(certified: bool) -> ReadResult<u64> {
        ReadResult::err(ReadError::transport("unreachable"), certified)
    }

    #[test]
    fn uncertified_never_replaces_certified() {
        let store = Store::new();
        let k = key(1);

        assert_eq!(store.set(&k, 5, false), Decision::Accept);
        assert_eq!(store.set(&k, 7, true), Decision::Accept);
        assert_eq!(store.set(&k, 9, false), Decision::Reject);

        assert_eq!(
            store.get(&k),
            Some(StoreEntry {
                value: 7,
                certified: true
            })
        );
        assert_eq!(store.state(&k), TrustState::Proven);
    }

    #[test]
    fn certified_overwrites_certified() {
        let store = Store::new();
        let k = key(1);

        store.set(&k, 7, true);
        assert_eq!(store.set(&k, 8, true), Decision::Accept);
        assert_eq!(store.value(&k), Some(8));
    }

    #[test]
    fn last_uncertified_write_wins() {
        let store = Store::new();
        let k = key(1);

        store.set(&k, 1, false);
        store.set(&k, 2, false);

        assert_eq!(
            store.get(&k),
            Some(StoreEntry {
                value: 2,
                certified: false
            })
        );
    }

    #[test]
    fn certified_failure_clears_even_proven_value() {
        let store = Store::new();
        let k = key(1);

        store.set(&k, 7, true);
        assert_eq!(store.apply(&k, &failed(true)), Decision::Clear);

        assert_eq!(store.get(&k), None);
        assert_eq!(store.state(&k), TrustState::Unproven);

        // the key accepts unproven data again afterwards
        assert_eq!(store.set(&k, 3, false), Decision::Accept);
    }

    #[test]
    fn uncertified_failure_keeps_existing_value() {
        let store = Store::new();
        let k = key(1);

        assert_eq!(store.apply(&k, &failed(false)), Decision::Ignore);
        assert!(!store.contains(&k));

        store.set(&k, 5, false);
        assert_eq!(store.apply(&k, &failed(false)), Decision::Ignore);
        assert_eq!(store.value(&k), Some(5));
    }

    #[test]
    fn reset_is_idempotent_and_unconditional() {
        let store = Store::new();
        store.set(&key(1), 7, true);
        store.set(&key(2), 1, false);

        store.reset();
        let once = store.snapshot();
        store.reset();
        store.reset();

        assert!(once.is_empty());
        assert_eq!(store.snapshot(), once);
        assert_eq!(store.state(&key(1)), TrustState::Unproven);
        assert_eq!(store.set(&key(1), 4, false), Decision::Accept);
    }

    #[test]
    fn reset_key_only_touches_that_key() {
        let store = Store::new();
        store.set(&key(1), 7, true);
        store.set(&key(2), 8, true);

        assert!(store.reset_key(&key(1)));
        assert!(!store.reset_key(&key(1)));

        assert_eq!(store.len(), 1);
        assert_eq!(store.value(&key(2)), Some(8));
    }

    #[test]
    fn subscribers_see_changes_but_not_rejections() {
        let store = Arc::new(Store::new());
        let sets = Arc::new(AtomicUsize::new(0));
        let clears = Arc::new(AtomicUsize::new(0));
        let resets = Arc::new(AtomicUsize::new(0));

        let id = {
            let (sets, clears, resets) = (sets.clone(), clears.clone(), resets.clone());
            store.subscribe(move |event: &StoreEvent<'_, u64>| match event {
                StoreEvent::Set { .. } => {
                    sets.fetch_add(1, Ordering::SeqCst);
                }
                StoreEvent::Cleared { .. } => {
                    clears.fetch_add(1, Ordering::SeqCst);
                }
                StoreEvent::Reset => {
                    resets.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let k = key(1);
        store.set(&k, 7, true);
        store.set(&k, 1, false); // rejected
        store.apply(&k, &failed(false)); // ignored
        store.apply(&k, &failed(true));
        store.apply(&k, &failed(true)); // nothing left to clear
        store.reset();

        assert_eq!(sets.load(Ordering::SeqCst), 1);
        assert_eq!(clears.load(Ordering::SeqCst), 1);
        assert_eq!(resets.load(Ordering::SeqCst), 1);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.set(&k, 2, false);
        assert_eq!(sets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_can_read_store_during_notification() {
        let store = Arc::new(Store::<u64>::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        {
            let reader = Arc::clone(&store);
            let seen = Arc::clone(&seen);
            store.subscribe(move |event| {
                if let StoreEvent::Set { key, .. } = event {
                    seen.lock().unwrap().push(reader.get(key));
                }
            });
        }

        store.set(&key(3), 11, true);

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[Some(StoreEntry {
                value: 11,
                certified: true
            })]
        );
    }

    #[test]
    fn racing_writers_notify_in_write_order() {
        let store = Arc::new(Store::<u64>::new());
        let k = key(4);
        let mirror = Arc::new(Mutex::new(None));
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));

        {
            let (mirror, entered, release) =
                (Arc::clone(&mirror), Arc::clone(&entered), Arc::clone(&release));
            store.subscribe(move |event: &StoreEvent<'_, u64>| {
                if let StoreEvent::Set { entry, .. } = event {
                    // hold the first delivery until the certified write has landed
                    if !entry.certified {
                        entered.wait();
                        release.wait();
                    }
                    *mirror.lock().unwrap() = Some((entry.value, entry.certified));
                }
            });
        }

        let slow = {
            let (store, k) = (Arc::clone(&store), k.clone());
            std::thread::spawn(move || store.set(&k, 5, false))
        };
        entered.wait();

        let fast = {
            let (store, k) = (Arc::clone(&store), k.clone());
            std::thread::spawn(move || store.set(&k, 7, true))
        };
        while store.value(&k) != Some(7) {
            std::thread::yield_now();
        }
        release.wait();

        assert_eq!(slow.join().unwrap(), Decision::Accept);
        assert_eq!(fast.join().unwrap(), Decision::Accept);

        let stored = store.get(&k).map(|e| (e.value, e.certified));
        assert_eq!(stored, Some((7, true)));
        assert_eq!(*mirror.lock().unwrap(), stored);
    }

    #[test]
    fn concurrent_writers_keep_certified_value() {
        let store = Arc::new(Store::new());
        let k = key(9);
        store.set(&k, 1_000, true);

        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let store = Arc::clone(&store);
                let k = k.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        store.set(&k, i * 100 + j, false);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.get(&k),
            Some(StoreEntry {
                value: 1_000,
                certified: true
            })
        );
    }
}
