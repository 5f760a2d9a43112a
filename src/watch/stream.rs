use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::ready;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::DropGuard;

use super::StateMessage;
use super::WatchMessage;
use crate::model::Observation;
use crate::state::ConsulState;
use crate::Result;
use crate::WatchError;

/// Observations of a single watched item.
///
/// Yields `Err` at most once, as the last item, when the watch hits a fatal
/// error. Dropping the stream stops the watcher.
pub struct WatchStream<T> {
    inner: UnboundedReceiverStream<WatchMessage>,
    _guard: DropGuard,
    _marker: PhantomData<fn() -> T>,
}

impl<T> WatchStream<T> {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<WatchMessage>,
        guard: DropGuard,
    ) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
            _guard: guard,
            _marker: PhantomData,
        }
    }
}

impl<T> Stream for WatchStream<T>
where
    T: TryFrom<Observation, Error = Observation>,
{
    type Item = std::result::Result<T, WatchError>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(observation)) => {
                    // A watcher only produces observations of its own kind.
                    if let Ok(typed) = T::try_from(observation) {
                        return Poll::Ready(Some(Ok(typed)));
                    }
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => return Poll::Ready(None),
            }
        }
    }
}

/// Published snapshots of a dependency session.
///
/// Ends after yielding a fatal error, or once every watcher has stopped.
/// Dropping the stream cancels the whole session.
pub struct StateStream {
    inner: ReceiverStream<StateMessage>,
    _guard: DropGuard,
}

impl StateStream {
    pub(crate) fn new(
        rx: mpsc::Receiver<StateMessage>,
        guard: DropGuard,
    ) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
            _guard: guard,
        }
    }
}

impl Stream for StateStream {
    type Item = Result<Arc<ConsulState>>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
