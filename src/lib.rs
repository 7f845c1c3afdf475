// Copyright (c) The runguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A test runner that gates execution on host-process health.
//!
//! Long-running hosts (IDEs, daemons, simulators) can enter a fatal error
//! state in which continuing to drive tests against them produces nothing but
//! noise. This crate wraps per-test execution in a [`RunGuard`]: before each
//! invocation the guard queries an injected [`HealthCheck`]; if the host is
//! unhealthy the test is reported as ignored, a diagnostic is logged, and an
//! advisory stop is requested for the remainder of the run. Healthy hosts see
//! the default execution path, unchanged.
//!
//! The surrounding machinery — test suites registered as in-process closures,
//! name/ignored filtering, a sequential run driver, an event stream and a
//! colored console reporter — lives in the other modules.
//!
//! [`RunGuard`]: crate::guard::RunGuard
//! [`HealthCheck`]: crate::health::HealthCheck

pub mod guard;
pub mod health;
pub mod output;
pub mod reporter;
pub mod runner;
pub mod test_filter;
pub mod test_list;
