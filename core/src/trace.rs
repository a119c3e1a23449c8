//! Logging macros. Forwarded to `tracing` if the feature is on, swallowed otherwise.
//!
//! `warn` is exported as `warning`, since a local `warn` macro would clash with the
//! built-in `#[warn]` attribute.

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, info, warn as warning};

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! info {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! warning {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use info;
#[cfg(not(feature = "tracing"))]
pub(crate) use warning;
