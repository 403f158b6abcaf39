/// Error type yielded by an intercepted request stream.
///
/// `E` is whatever error the underlying transport produces; the interceptor
/// never transforms it, only wraps it so the timeout case stays
/// distinguishable.
#[derive(Debug, thiserror::Error)]
pub enum InterceptError<E> {
    /// The transport produced no event within the configured timeout.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// Failure from the underlying transport, passed through unchanged.
    #[error("transport error: {0}")]
    Transport(E),
}

impl<E> InterceptError<E> {
    /// Returns true for the timeout variant.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns the underlying transport error, if this is one.
    pub fn into_transport(self) -> Option<E> {
        match self {
            Self::Transport(error) => Some(error),
            Self::Timeout { .. } => None,
        }
    }
}
