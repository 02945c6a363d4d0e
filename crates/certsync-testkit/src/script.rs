use async_trait::async_trait;
use certsync_core::{
    dto::read::{Channel, ReadError, ReadRequest},
    ops::reader::ReadSource,
};
use futures::channel::oneshot;
use std::{
    collections::VecDeque,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

type Reply<T> = Result<T, ReadError>;

fn locked<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

///
/// Responder
/// Completes exactly one scripted read.
///

#[derive(Debug)]
pub struct Responder<T> {
    tx: oneshot::Sender<Reply<T>>,
}

impl<T> Responder<T> {
    /// Resolve the read with `value`. Returns false if the read was abandoned.
    pub fn resolve(self, value: T) -> bool {
        self.tx.send(Ok(value)).is_ok()
    }

    /// Fail the read with `error`. Returns false if the read was abandoned.
    pub fn reject(self, error: ReadError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

///
/// ScriptedSource
///
/// A `ReadSource` whose reads block until the test completes them.
///
/// Each call to [`ScriptedSource::expect`] queues one reply slot for a
/// channel; reads consume slots in FIFO order. A read with no slot queued
/// fails immediately with a transport error, and a read whose responder is
/// dropped fails the same way.
///

#[derive(Debug)]
pub struct ScriptedSource<T> {
    query: Mutex<VecDeque<oneshot::Receiver<Reply<T>>>>,
    update: Mutex<VecDeque<oneshot::Receiver<Reply<T>>>>,
    query_calls: AtomicUsize,
    update_calls: AtomicUsize,
    requests: Mutex<Vec<(Channel, ReadRequest)>>,
}

impl<T> Default for ScriptedSource<T> {
    fn default() -> Self {
        Self {
            query: Mutex::new(VecDeque::new()),
            update: Mutex::new(VecDeque::new()),
            query_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl<T> ScriptedSource<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn slots(&self, channel: Channel) -> &Mutex<VecDeque<oneshot::Receiver<Reply<T>>>> {
        match channel {
            Channel::Query => &self.query,
            Channel::Update => &self.update,
        }
    }

    const fn counter(&self, channel: Channel) -> &AtomicUsize {
        match channel {
            Channel::Query => &self.query_calls,
            Channel::Update => &self.update_calls,
        }
    }

    /// Queue one reply slot for `channel` and return its responder.
    #[must_use]
    pub fn expect(&self, channel: Channel) -> Responder<T> {
        let (tx, rx) = oneshot::channel();
        locked(self.slots(channel)).push_back(rx);

        Responder { tx }
    }

    /// How many reads were issued on `channel`.
    #[must_use]
    pub fn calls(&self, channel: Channel) -> usize {
        self.counter(channel).load(Ordering::SeqCst)
    }

    /// Every read issued so far, in issue order.
    #[must_use]
    pub fn requests(&self) -> Vec<(Channel, ReadRequest)> {
        locked(&self.requests).clone()
    }
}

#[async_trait]
impl<T> ReadSource for ScriptedSource<T>
where
    T: Send + 'static,
{
    type Value = T;

    async fn read(&self, request: &ReadRequest, channel: Channel) -> Result<T, ReadError> {
        self.counter(channel).fetch_add(1, Ordering::SeqCst);
        locked(&self.requests).push((channel, request.clone()));

        let slot = locked(self.slots(channel)).pop_front();
        let Some(rx) = slot else {
            return Err(ReadError::transport(format!(
                "no scripted {channel} reply for {}",
                request.key()
            )));
        };

        rx.await
            .unwrap_or_else(|_| Err(ReadError::transport("scripted responder dropped")))
    }
}

///
/// TESTS
///
