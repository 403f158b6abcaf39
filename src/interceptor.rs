use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{stream, Stream};
use tokio::time::{Instant, Sleep};

use crate::{InterceptError, LoadingBar};

/// One lifecycle signal from the underlying transport.
///
/// A transport stream yields any number of `Progress` signals followed by at
/// most one terminal `Response`, then ends. Errors terminate the stream via
/// an `Err` item instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent<T> {
    /// Intermediate signal (request sent, upload/download notification).
    Progress,
    /// Terminal response payload.
    Response(T),
}

/// Per-request metadata read once by the interceptor.
///
/// The only field today is the opt-out marker: a request carrying it is
/// passed through untouched, with no loading-bar interaction at all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    ignore_loading_bar: bool,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks this request as invisible to the loading bar.
    pub fn ignore_loading_bar(mut self, ignore: bool) -> Self {
        self.ignore_loading_bar = ignore;
        self
    }

    pub fn is_ignored(&self) -> bool {
        self.ignore_loading_bar
    }
}

/// Wraps a transport stream so its lifecycle drives the loading bar.
///
/// The returned stream re-yields every inner item. Bookkeeping per request:
/// the first event reports `start_loading` (once), a timeout reports
/// `complete_loading` plus `increment_retry_count`, any other failure
/// reports `increment_retry_count` only, and finalization — stream end,
/// terminal error, or dropping the stream mid-flight — reports
/// `complete_loading` exactly once if the request ever started. A request
/// cancelled before producing any event touches the bar not at all.
///
/// The timeout comes from the bar's configuration and bounds the gap until
/// the next event; a configured value of 0 disables it.
pub fn intercept<S>(bar: &LoadingBar, context: &RequestContext, next: S) -> Intercepted<S> {
    let bypass = context.is_ignored();
    Intercepted {
        inner: next,
        bar: bar.clone(),
        bypass,
        timeout: if bypass { None } else { bar.timeout() },
        deadline: None,
        has_started: false,
        finalized: false,
        done: false,
    }
}

/// Adapts a one-shot transport future into a transport stream.
///
/// Convenient for clients like `reqwest` where the whole exchange is a
/// single future resolving to the response.
pub fn single_response<F, T, E>(
    future: F,
) -> Pin<Box<dyn Stream<Item = Result<TransportEvent<T>, E>> + Send>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    Box::pin(stream::once(async move {
        future.await.map(TransportEvent::Response)
    }))
}

/// Stream returned by [`intercept`]. See there for the reporting contract.
pub struct Intercepted<S> {
    inner: S,
    bar: LoadingBar,
    bypass: bool,
    timeout: Option<Duration>,
    deadline: Option<Pin<Box<Sleep>>>,
    has_started: bool,
    finalized: bool,
    done: bool,
}

impl<S> Intercepted<S> {
    /// Runs the finalization step at most once.
    fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        if self.has_started {
            self.bar.complete_loading();
        }
    }

    /// Restarts the timeout window after an observed event.
    fn rearm_deadline(&mut self) {
        if let (Some(timeout), Some(deadline)) = (self.timeout, self.deadline.as_mut()) {
            deadline.as_mut().reset(Instant::now() + timeout);
        }
    }
}

impl<S, T, E> Stream for Intercepted<S>
where
    S: Stream<Item = Result<TransportEvent<T>, E>> + Unpin,
{
    type Item = Result<TransportEvent<T>, InterceptError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if this.bypass {
            return Pin::new(&mut this.inner)
                .poll_next(cx)
                .map(|item| item.map(|result| result.map_err(InterceptError::Transport)));
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(event))) => {
                if !this.has_started {
                    this.has_started = true;
                    this.bar.start_loading();
                }
                this.rearm_deadline();
                Poll::Ready(Some(Ok(event)))
            }
            Poll::Ready(Some(Err(error))) => {
                this.done = true;
                this.bar.increment_retry_count();
                this.finalize();
                Poll::Ready(Some(Err(InterceptError::Transport(error))))
            }
            Poll::Ready(None) => {
                this.done = true;
                this.finalize();
                Poll::Ready(None)
            }
            Poll::Pending => {
                let Some(timeout) = this.timeout else {
                    return Poll::Pending;
                };
                let deadline = this
                    .deadline
                    .get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
                if deadline.as_mut().poll(cx).is_pending() {
                    return Poll::Pending;
                }

                let timeout_ms = timeout.as_millis() as u64;
                #[cfg(feature = "tracing")]
                tracing::warn!(timeout_ms, "request timed out");

                this.done = true;
                // The request will produce no further events, so the
                // in-flight unit is released here; finalize still runs for a
                // started request, matching the timeout double-decrement.
                this.bar.complete_loading();
                this.bar.increment_retry_count();
                this.finalize();
                Poll::Ready(Some(Err(InterceptError::Timeout { timeout_ms })))
            }
        }
    }
}

impl<S> Drop for Intercepted<S> {
    fn drop(&mut self) {
        // Caller abandoned the request; release its in-flight unit if it
        // ever started.
        self.finalize();
    }
}
