pub mod probe;
pub mod result;
pub mod retry;

pub mod prelude {
    pub use super::probe::{LatencyProber, normalize_http_url};
    pub use super::result::{FetchedPage, TimedResponse};
    pub use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
    pub use crate::error::{ProbeError, Result};
}

use std::fmt::Write;

/// Renders an error together with its chain of sources.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, ": {}", src);
        err = src;
    }
    s
}
