use crate::{
    Error,
    dto::read::{CallStrategy, Channel, ReadError, ReadRequest, ReadResult},
    log,
    log::Topic,
};
use async_trait::async_trait;
use futures::{
    FutureExt, Stream, StreamExt,
    future::BoxFuture,
    stream::FuturesUnordered,
};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

///
/// ReadSource
///
/// Backend seam: one async read per channel.
///
/// Contract:
/// - `Channel::Query` must not go through consensus; `Channel::Update` must
///   return certified data or fail.
/// - No retries; a failure is reported once and left to the caller.
///

#[async_trait]
pub trait ReadSource: Send + Sync {
    type Value: Send + 'static;

    async fn read(&self, request: &ReadRequest, channel: Channel)
    -> Result<Self::Value, ReadError>;
}

#[async_trait]
impl<S> ReadSource for Arc<S>
where
    S: ReadSource + ?Sized,
{
    type Value = S::Value;

    async fn read(
        &self,
        request: &ReadRequest,
        channel: Channel,
    ) -> Result<Self::Value, ReadError> {
        (**self).read(request, channel).await
    }
}

///
/// ReadFns
/// Adapts a `fast_read` / `trusted_read` closure pair into a `ReadSource`.
///

pub struct ReadFns<Q, U> {
    fast_read: Q,
    trusted_read: U,
}

impl<Q, U> ReadFns<Q, U> {
    pub const fn new(fast_read: Q, trusted_read: U) -> Self {
        Self {
            fast_read,
            trusted_read,
        }
    }
}

#[async_trait]
impl<Q, U, QF, UF, T> ReadSource for ReadFns<Q, U>
where
    Q: Fn(ReadRequest) -> QF + Send + Sync,
    U: Fn(ReadRequest) -> UF + Send + Sync,
    QF: Future<Output = Result<T, ReadError>> + Send + 'static,
    UF: Future<Output = Result<T, ReadError>> + Send + 'static,
    T: Send + 'static,
{
    type Value = T;

    async fn read(&self, request: &ReadRequest, channel: Channel) -> Result<T, ReadError> {
        match channel {
            Channel::Query => (self.fast_read)(request.clone()).await,
            Channel::Update => (self.trusted_read)(request.clone()).await,
        }
    }
}

///
/// ReadStream
/// Yields each issued read as soon as it completes, in completion order.
///

pub struct ReadStream<'a, T> {
    reads: FuturesUnordered<BoxFuture<'a, ReadResult<T>>>,
}

impl<T> ReadStream<'_, T> {
    /// Reads issued but not yet delivered.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.reads.len()
    }
}

impl<T> Stream for ReadStream<'_, T> {
    type Item = ReadResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.reads.poll_next_unpin(cx)
    }
}

///
/// DualReader
///
/// Issues the reads a `CallStrategy` asks for. With `QueryAndUpdate` both
/// reads are in flight at once and neither waits for the other; a failed
/// query does not cancel the update.
///

pub struct DualReader<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S> DualReader<'a, S>
where
    S: ReadSource + ?Sized,
{
    pub const fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// One tagged read on a single channel.
    pub async fn read(&self, request: &ReadRequest, channel: Channel) -> ReadResult<S::Value> {
        ReadResult::new(channel, self.source.read(request, channel).await)
    }

    /// One untagged read for callers that bypass the store.
    pub async fn fetch(&self, request: &ReadRequest, channel: Channel) -> Result<S::Value, Error> {
        self.source.read(request, channel).await.map_err(Error::from)
    }

    #[must_use]
    pub fn stream(&self, request: &'a ReadRequest, strategy: CallStrategy) -> ReadStream<'a, S::Value> {
        let source = self.source;

        let reads = strategy
            .channels()
            .iter()
            .map(move |&channel| {
                log!(Topic::Read, Debug, "{channel} read issued for {}", request.key());

                async move { ReadResult::new(channel, source.read(request, channel).await) }.boxed()
            })
            .collect();

        ReadStream { reads }
    }

    /// Drive every issued read, handing each result to `on_result` as it lands.
    pub async fn run<F>(&self, request: &'a ReadRequest, strategy: CallStrategy, mut on_result: F)
    where
        F: FnMut(ReadResult<S::Value>),
    {
        let mut stream = self.stream(request, strategy);

        while let Some(result) = stream.next().await {
            on_result(result);
        }
    }
}

///
/// TESTS
///
