// Copyright (c) The runguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    guard::{RunGuard, RunNotifier},
    health::HealthCheck,
    reporter::{SkipReason, StopReason, TestEvent},
    test_filter::FilterMatch,
    test_list::{TestInvocation, TestList},
};
use clap::Args;
use std::{
    any::Any,
    convert::Infallible,
    fmt,
    marker::PhantomData,
    panic::{self, AssertUnwindSafe},
    time::{Duration, Instant},
};

/// Test runner options.
#[derive(Debug, Default, Args)]
pub struct TestRunnerOpts {
    /// Stop scheduling further tests after the first failure
    #[arg(long)]
    pub fail_fast: bool,
}

impl TestRunnerOpts {
    /// Creates a new test runner over the given list, gated on the given
    /// health check.
    pub fn build<'list, H: HealthCheck>(
        self,
        test_list: &'list TestList,
        health: H,
    ) -> TestRunner<'list, H> {
        TestRunner {
            opts: self,
            test_list,
            guard: RunGuard::new(health),
        }
    }
}

/// Context for running tests.
///
/// Invocations are executed one at a time, in scheduling order, on the
/// calling thread. Each invocation is routed through the health guard; an
/// advisory stop (from the guard or from `--fail-fast`) takes effect before
/// the next invocation is scheduled, so already-started work always finishes.
pub struct TestRunner<'list, H> {
    opts: TestRunnerOpts,
    test_list: &'list TestList,
    guard: RunGuard<H>,
}

impl<'list, H: HealthCheck> TestRunner<'list, H> {
    /// Executes the listed tests.
    ///
    /// The callback is called with an event for everything that happens
    /// during the run.
    pub fn execute<F>(&self, mut callback: F) -> RunStats
    where
        F: FnMut(TestEvent<'list>),
    {
        self.try_execute::<Infallible, _>(|event| {
            callback(event);
            Ok(())
        })
        .expect("Err branch is infallible")
    }

    /// Executes the listed tests.
    ///
    /// Accepts a callback that is called with run events. If the callback
    /// returns an error, the run stops and the first error is propagated.
    pub fn try_execute<E, F>(&self, callback: F) -> Result<RunStats, E>
    where
        F: FnMut(TestEvent<'list>) -> Result<(), E>,
    {
        let mut ctx = CallbackContext::new(callback, self.test_list.run_count());
        ctx.run_started(self.test_list)?;

        // Stores the first error that occurred. This error is propagated up.
        let mut first_error = None;
        let mut stop_requested = false;

        for invocation in self.test_list.iter_tests() {
            if stop_requested {
                // The stop signal is advisory: it takes effect here, before
                // the next invocation would be scheduled.
                break;
            }

            if let FilterMatch::Mismatch { reason } = invocation.info.filter_match {
                if let Err(err) = ctx.test_skipped(invocation, SkipReason::FilterMismatch { reason }) {
                    ctx.error_stop();
                    first_error = Some(err);
                    break;
                }
                continue;
            }

            let mut child = ChildNotifier::default();
            let mut delegate_error = None;
            let mut failed = false;
            self.guard.run_child(invocation, &mut child, |inv| {
                if let Err(err) = ctx.test_started(inv) {
                    delegate_error = Some(err);
                    return;
                }
                let run_status = run_test(inv);
                failed = !run_status.status.is_success();
                if let Err(err) = ctx.test_finished(inv, run_status) {
                    delegate_error = Some(err);
                }
            });

            if let Some(err) = delegate_error {
                ctx.error_stop();
                first_error = Some(err);
                break;
            }

            if child.ignored.is_some() {
                if let Err(err) = ctx.test_skipped(invocation, SkipReason::HostUnhealthy) {
                    ctx.error_stop();
                    first_error = Some(err);
                    break;
                }
            }
            if child.stop_requested {
                stop_requested = true;
                if let Err(err) = ctx.run_begin_stop(StopReason::HostUnhealthy) {
                    first_error = Some(err);
                    break;
                }
            }
            if failed && self.opts.fail_fast && !stop_requested {
                stop_requested = true;
                if let Err(err) = ctx.run_begin_stop(StopReason::Failure) {
                    first_error = Some(err);
                    break;
                }
            }
        }

        match ctx.run_finished() {
            Ok(()) => {}
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            None => Ok(ctx.run_stats),
            Some(err) => Err(err),
        }
    }
}

/// Runs a single test body on the calling thread, converting errors and
/// panics into a failed status.
fn run_test(invocation: TestInvocation<'_>) -> TestRunStatus {
    let start_time = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| invocation.run_body()));
    let time_taken = start_time.elapsed();

    let (status, message) = match result {
        Ok(Ok(())) => (TestStatus::Pass, None),
        Ok(Err(err)) => (TestStatus::Fail, Some(format!("{:#}", err))),
        Err(payload) => (TestStatus::Fail, Some(panic_message(payload.as_ref()))),
    };
    TestRunStatus {
        status,
        time_taken,
        message,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "test panicked".to_owned()
    }
}

/// Information about a test that finished running.
#[derive(Clone, Debug)]
pub struct TestRunStatus {
    /// Whether the test passed or failed.
    pub status: TestStatus,

    /// How long the test took.
    pub time_taken: Duration,

    /// The failure message, if any. Captured from the returned error or the
    /// panic payload.
    pub message: Option<String>,
}

/// Statistics for a test run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The total number of tests that were expected to be run at the beginning.
    ///
    /// If the run stops early, this will be more than `final_run_count`.
    pub initial_run_count: usize,

    /// The total number of tests that were actually run.
    pub final_run_count: usize,

    /// The number of tests that passed.
    pub passed: usize,

    /// The number of tests that failed.
    pub failed: usize,

    /// The number of tests that were skipped, whether by the filter or by
    /// the health guard.
    pub skipped: usize,
}

impl RunStats {
    /// Returns true if this run is considered a success.
    ///
    /// A run is marked as failed if any of the following are true:
    /// * the run stopped early: the initial run count is greater than the
    ///   final run count (this covers health-guard skips and advisory stops)
    /// * any tests failed
    pub fn is_success(&self) -> bool {
        if self.initial_run_count > self.final_run_count {
            return false;
        }
        if self.failed > 0 {
            return false;
        }
        true
    }
}

/// Per-invocation notifier handed to the guard. Effects are drained by the
/// run loop after `run_child` returns.
#[derive(Debug, Default)]
struct ChildNotifier {
    ignored: Option<String>,
    stop_requested: bool,
}

impl RunNotifier for ChildNotifier {
    fn report_ignored(&mut self, description: &str) {
        self.ignored = Some(description.to_owned());
    }

    fn request_stop(&mut self) {
        self.stop_requested = true;
    }
}

struct CallbackContext<F, E> {
    callback: F,
    start_time: Instant,
    run_stats: RunStats,
    phantom: PhantomData<E>,
}

impl<'list, F, E> CallbackContext<F, E>
where
    F: FnMut(TestEvent<'list>) -> Result<(), E>,
{
    fn new(callback: F, initial_run_count: usize) -> Self {
        Self {
            callback,
            start_time: Instant::now(),
            run_stats: RunStats {
                initial_run_count,
                ..RunStats::default()
            },
            phantom: PhantomData,
        }
    }

    fn run_started(&mut self, test_list: &'list TestList) -> Result<(), E> {
        (self.callback)(TestEvent::RunStarted { test_list })
    }

    fn test_started(&mut self, invocation: TestInvocation<'list>) -> Result<(), E> {
        (self.callback)(TestEvent::TestStarted { invocation })
    }

    fn test_finished(
        &mut self,
        invocation: TestInvocation<'list>,
        run_status: TestRunStatus,
    ) -> Result<(), E> {
        self.run_stats.final_run_count += 1;
        match run_status.status {
            TestStatus::Pass => self.run_stats.passed += 1,
            TestStatus::Fail => self.run_stats.failed += 1,
        }
        (self.callback)(TestEvent::TestFinished {
            invocation,
            run_status,
        })
    }

    fn test_skipped(
        &mut self,
        invocation: TestInvocation<'list>,
        reason: SkipReason,
    ) -> Result<(), E> {
        self.run_stats.skipped += 1;
        (self.callback)(TestEvent::TestSkipped { invocation, reason })
    }

    fn run_begin_stop(&mut self, reason: StopReason) -> Result<(), E> {
        (self.callback)(TestEvent::RunBeginStop { reason })
    }

    /// Best-effort stop notice after a callback error. Failures while
    /// reporting the error stop are ignored.
    fn error_stop(&mut self) {
        let _ = self.run_begin_stop(StopReason::ReportError);
    }

    fn run_finished(&mut self) -> Result<(), E> {
        (self.callback)(TestEvent::RunFinished {
            start_time: self.start_time,
            run_stats: self.run_stats,
        })
    }
}

/// Whether a single test passed or failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TestStatus {
    Pass,
    Fail,
}

impl TestStatus {
    /// Returns true if the test was successful.
    pub fn is_success(self) -> bool {
        match self {
            TestStatus::Pass => true,
            TestStatus::Fail => false,
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Pass => f.pad("PASS"),
            TestStatus::Fail => f.pad("FAIL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_success() {
        assert!(RunStats::default().is_success(), "empty run => success");
        assert!(
            RunStats {
                initial_run_count: 42,
                final_run_count: 42,
                ..RunStats::default()
            }
            .is_success(),
            "initial run count = final run count => success"
        );
        assert!(
            !RunStats {
                initial_run_count: 42,
                final_run_count: 41,
                ..RunStats::default()
            }
            .is_success(),
            "initial run count > final run count => failure"
        );
        assert!(
            !RunStats {
                initial_run_count: 42,
                final_run_count: 42,
                failed: 1,
                ..RunStats::default()
            }
            .is_success(),
            "failed => failure"
        );
        assert!(
            RunStats {
                initial_run_count: 42,
                final_run_count: 42,
                skipped: 1,
                ..RunStats::default()
            }
            .is_success(),
            "filter skips alone => not considered a failure"
        );
    }

    #[test]
    fn panic_messages_are_extracted() {
        let static_payload: Box<dyn Any + Send> = Box::new("assertion failed");
        assert_eq!(panic_message(static_payload.as_ref()), "assertion failed");

        let string_payload: Box<dyn Any + Send> = Box::new("index out of bounds".to_owned());
        assert_eq!(panic_message(string_payload.as_ref()), "index out of bounds");

        let opaque_payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(opaque_payload.as_ref()), "test panicked");
    }
}
