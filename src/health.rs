// Copyright (c) The runguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Boolean check of whether the host process is in a state unsafe for
/// continued testing.
///
/// Implementations are expected to be fast and non-blocking: the check runs
/// on the driver thread before every invocation and is never cached.
pub trait HealthCheck {
    /// Returns true if the host process is unhealthy.
    fn is_host_unhealthy(&self) -> bool;
}

/// Adapts a closure into a [`HealthCheck`].
#[derive(Copy, Clone, Debug)]
pub struct HealthCheckFn<F>(pub F);

impl<F: Fn() -> bool> HealthCheck for HealthCheckFn<F> {
    fn is_host_unhealthy(&self) -> bool {
        (self.0)()
    }
}

/// A health check that always reports the host as healthy.
///
/// Use this to run without health gating.
#[derive(Copy, Clone, Debug, Default)]
pub struct AlwaysHealthy;

impl HealthCheck for AlwaysHealthy {
    fn is_host_unhealthy(&self) -> bool {
        false
    }
}

/// Tracks whether the host process has recorded a fatal error.
///
/// Clones share the same underlying flag: hand one clone to the host's error
/// handler and another to the run guard. Once a fatal error is recorded the
/// sentinel reports unhealthy until [`reset`](Self::reset) is called.
#[derive(Clone, Debug, Default)]
pub struct FatalErrorSentinel {
    fatal: Arc<AtomicBool>,
}

impl FatalErrorSentinel {
    /// Creates a new sentinel with no fatal error recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a fatal error has occurred in the host process.
    pub fn record_fatal_error(&self) {
        self.fatal.store(true, Ordering::Release);
    }

    /// Clears the fatal error flag.
    pub fn reset(&self) {
        self.fatal.store(false, Ordering::Release);
    }
}

impl HealthCheck for FatalErrorSentinel {
    fn is_host_unhealthy(&self) -> bool {
        self.fatal.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_clones_share_the_flag() {
        let sentinel = FatalErrorSentinel::new();
        let observer = sentinel.clone();
        assert!(!observer.is_host_unhealthy());

        sentinel.record_fatal_error();
        assert!(observer.is_host_unhealthy());

        sentinel.reset();
        assert!(!observer.is_host_unhealthy());
    }

    #[test]
    fn closures_adapt_into_health_checks() {
        let check = HealthCheckFn(|| true);
        assert!(check.is_host_unhealthy());
        assert!(!AlwaysHealthy.is_host_unhealthy());
    }
}
