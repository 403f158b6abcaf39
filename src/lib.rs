//! `http-loading-bar` tracks in-flight HTTP requests and synthesizes the
//! progress value behind a client-side loading bar.
//!
//! Two pieces work together:
//! - [`LoadingBar`] — the loading-state machine: counts concurrent requests,
//!   advances a synthetic 0–100 progress curve on a 250 ms tick while
//!   anything is loading, and exposes the derived `is_loading` /
//!   `current_progress` reads a presentation layer renders from.
//! - [`intercept`] — the request-interception policy: wraps a transport's
//!   event stream, applies the configured timeout, and reports
//!   start/complete/retry lifecycle to the bar. Individual requests opt out
//!   via [`RequestContext`].
//!
//! The crate estimates progress; it does not measure bytes, schedule work,
//! or re-issue failed requests.
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use http_loading_bar::{
//!     intercept, single_response, LoadingBar, LoadingBarConfig, RequestContext,
//! };
//!
//! # async fn run() {
//! let bar = LoadingBar::new(LoadingBarConfig::default());
//!
//! // Any transport works; here a one-shot future stands in for an HTTP call.
//! let transport = single_response(async { Ok::<_, std::io::Error>("body") });
//! let mut response = intercept(&bar, &RequestContext::new(), transport);
//!
//! while let Some(event) = response.next().await {
//!     // Render bar.current_progress() somewhere while events arrive.
//!     let _ = event;
//! }
//! # }
//! ```

mod bar;
mod config;
mod error;
mod interceptor;
mod progress;

pub use bar::LoadingBar;
pub use config::LoadingBarConfig;
pub use error::InterceptError;
pub use interceptor::{intercept, single_response, Intercepted, RequestContext, TransportEvent};
