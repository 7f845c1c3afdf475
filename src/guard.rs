// Copyright (c) The runguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{health::HealthCheck, test_list::TestInvocation};
use tracing::error;

/// Per-run reporting and control capability, supplied by the run driver.
///
/// The guard only ever calls into this; it never constructs one. Both methods
/// are advisory from the guard's point of view: what the driver does with an
/// ignored report or a stop request is its own business.
pub trait RunNotifier {
    /// Reports an invocation as ignored, identified by its description.
    fn report_ignored(&mut self, description: &str);

    /// Requests that the driver stop scheduling further invocations after
    /// the current one. This does not raise an error or terminate anything.
    fn request_stop(&mut self);
}

/// Gates execution of each test invocation on the health of the host process.
///
/// The health check is injected at construction time and queried freshly for
/// every invocation; the guard holds no other state. The default execution
/// path is passed into [`run_child`](Self::run_child) as an explicit
/// delegate rather than inherited, so the guard composes with any driver.
#[derive(Clone, Debug)]
pub struct RunGuard<H> {
    health: H,
}

impl<H: HealthCheck> RunGuard<H> {
    /// Creates a new guard around the given health check.
    pub fn new(health: H) -> Self {
        Self { health }
    }

    /// Runs a single invocation through the guard.
    ///
    /// If the host is unhealthy, the invocation is reported as ignored, a
    /// diagnostic naming the test is logged at error level, and a stop is
    /// requested; the delegate is never called. Otherwise the delegate runs
    /// exactly once and its outcome flows through the normal reporting
    /// channel untouched.
    pub fn run_child<'a, N, D>(&self, invocation: TestInvocation<'a>, notifier: &mut N, delegate: D)
    where
        N: RunNotifier,
        D: FnOnce(TestInvocation<'a>),
    {
        if self.health.is_host_unhealthy() {
            notifier.report_ignored(&invocation.description());
            error!("{}", skip_message(invocation.name));
            notifier.request_stop();
        } else {
            delegate(invocation);
        }
    }
}

/// The diagnostic emitted when an invocation is skipped due to host health.
pub fn skip_message(test_name: &str) -> String {
    format!(
        "Skipping test '{}': a fatal error has occurred in the host process.",
        test_name
    )
}
