// Copyright (c) The runguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    runner::{RunStats, TestRunStatus, TestStatus},
    test_filter::MismatchReason,
    test_list::{suite_spec, test_name_spec, TestInvocation, TestList},
};
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::{fmt, io, io::Write, time::Instant};
use termcolor::{BufferWriter, ColorChoice, ColorSpec, NoColor, WriteColor};

/// When to color console output.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum Color {
    Always,
    #[default]
    Auto,
    Never,
}

impl Color {
    pub(crate) fn color_choice(self, stream: supports_color::Stream) -> ColorChoice {
        match self {
            Color::Always => ColorChoice::Always,
            Color::Auto => {
                if supports_color::on(stream).is_some() {
                    ColorChoice::Auto
                } else {
                    ColorChoice::Never
                }
            }
            Color::Never => ColorChoice::Never,
        }
    }
}

/// When to print failure messages.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum FailureOutput {
    /// Print the message as soon as the test finishes.
    #[default]
    Immediate,

    /// Never print failure messages.
    Never,
}

impl fmt::Display for FailureOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureOutput::Immediate => write!(f, "immediate"),
            FailureOutput::Never => write!(f, "never"),
        }
    }
}

/// Reporter options.
#[derive(Debug, Default, Args)]
pub struct ReporterOpts {
    /// Print failure messages on test failures
    #[arg(long, value_enum, default_value_t)]
    pub failure_output: FailureOutput,
}

/// Reports run events to standard output.
pub struct TestReporter {
    stdout: BufferWriter,
    opts: ReporterOpts,
    suite_width: usize,
}

impl TestReporter {
    /// Creates a new instance with the given color choice.
    pub fn new(test_list: &TestList, color: Color, opts: ReporterOpts) -> Self {
        let stdout = BufferWriter::stdout(color.color_choice(supports_color::Stream::Stdout));
        let suite_width = test_list
            .iter()
            .map(|(suite_name, _)| suite_name.len())
            .max()
            .unwrap_or_default();
        Self {
            stdout,
            opts,
            suite_width,
        }
    }

    /// Report a test event.
    pub fn report_event(&self, event: TestEvent<'_>) -> Result<()> {
        let mut buffer = self.stdout.buffer();
        self.write_event(event, &mut buffer)?;
        self.stdout.print(&buffer).context("error writing output")
    }

    // ---
    // Helper methods
    // ---

    fn write_event(&self, event: TestEvent<'_>, mut writer: impl WriteColor) -> io::Result<()> {
        match event {
            TestEvent::RunStarted { test_list } => {
                writer.set_color(&Self::pass_spec())?;
                write!(writer, "{:>12} ", "Starting")?;
                writer.reset()?;

                let count_spec = Self::count_spec();

                writer.set_color(&count_spec)?;
                write!(writer, "{}", test_list.run_count())?;
                writer.reset()?;
                write!(writer, " tests across ")?;
                writer.set_color(&count_spec)?;
                write!(writer, "{}", test_list.suite_count())?;
                writer.reset()?;
                write!(writer, " suites")?;

                let skip_count = test_list.skip_count();
                if skip_count > 0 {
                    write!(writer, " (")?;
                    writer.set_color(&count_spec)?;
                    write!(writer, "{}", skip_count)?;
                    writer.reset()?;
                    write!(writer, " skipped)")?;
                }

                writeln!(writer)?;
            }
            TestEvent::TestStarted { .. } => {
                // Nothing to report until the test finishes.
            }
            TestEvent::TestFinished {
                invocation,
                run_status,
            } => {
                match run_status.status {
                    TestStatus::Pass => {
                        writer.set_color(&Self::pass_spec())?;
                    }
                    TestStatus::Fail => {
                        writer.set_color(&Self::fail_spec())?;
                    }
                }

                write!(writer, "{:>12} ", run_status.status)?;
                writer.reset()?;

                write!(writer, "[{:>8.3?}s] ", run_status.time_taken.as_secs_f64())?;

                self.write_invocation(invocation, &mut writer)?;
                writeln!(writer)?;

                if !run_status.status.is_success()
                    && self.opts.failure_output == FailureOutput::Immediate
                {
                    if let Some(message) = &run_status.message {
                        writer.set_color(&Self::fail_spec())?;
                        write!(writer, "\n--- MESSAGE: ")?;
                        self.write_invocation(invocation, NoColor::new(&mut writer))?;
                        writeln!(writer, " ---")?;

                        writer.set_color(&Self::fail_output_spec())?;
                        writeln!(NoColor::new(&mut writer), "{}", message)?;

                        writer.reset()?;
                        writeln!(writer)?;
                    }
                }
            }
            TestEvent::TestSkipped { invocation, reason } => {
                writer.set_color(&Self::skip_spec())?;
                write!(writer, "{:>12} ", "SKIP")?;
                writer.reset()?;
                // same spacing as [   0.034s]
                write!(writer, "[         ] ")?;

                self.write_invocation(invocation, &mut writer)?;
                write!(writer, " (")?;
                match reason {
                    SkipReason::HostUnhealthy => write!(writer, "host reported a fatal error")?,
                    SkipReason::FilterMismatch { reason } => write!(writer, "{}", reason)?,
                }
                writeln!(writer, ")")?;
            }
            TestEvent::RunBeginStop { reason } => {
                writer.set_color(&Self::fail_spec())?;
                write!(writer, "{:>12} ", "Stopping")?;
                writer.reset()?;
                write!(writer, "due to ")?;

                writer.set_color(&Self::count_spec())?;
                match reason {
                    StopReason::HostUnhealthy => write!(writer, "a fatal error in the host")?,
                    StopReason::Failure => write!(writer, "a test failure")?,
                    StopReason::ReportError => write!(writer, "a reporting error")?,
                }
                writer.reset()?;
                writeln!(writer, ": no further tests will be scheduled")?;
            }
            TestEvent::RunFinished {
                start_time,
                run_stats:
                    RunStats {
                        initial_run_count,
                        final_run_count,
                        passed,
                        failed,
                        skipped,
                    },
            } => {
                let summary_spec = if failed > 0 || final_run_count < initial_run_count {
                    Self::fail_spec()
                } else {
                    Self::pass_spec()
                };
                writer.set_color(&summary_spec)?;
                write!(writer, "{:>12} ", "Summary")?;
                writer.reset()?;

                write!(writer, "[{:>8.3?}s] ", start_time.elapsed().as_secs_f64())?;

                let count_spec = Self::count_spec();

                writer.set_color(&count_spec)?;
                write!(writer, "{}", final_run_count)?;
                if final_run_count != initial_run_count {
                    write!(writer, "/{}", initial_run_count)?;
                }
                writer.reset()?;
                write!(writer, " tests run: ")?;

                writer.set_color(&count_spec)?;
                write!(writer, "{}", passed)?;
                writer.set_color(&Self::pass_spec())?;
                write!(writer, " passed")?;
                writer.reset()?;
                write!(writer, ", ")?;

                if failed > 0 {
                    writer.set_color(&count_spec)?;
                    write!(writer, "{}", failed)?;
                    writer.set_color(&Self::fail_spec())?;
                    write!(writer, " failed")?;
                    writer.reset()?;
                    write!(writer, ", ")?;
                }

                writer.set_color(&count_spec)?;
                write!(writer, "{}", skipped)?;
                writer.set_color(&Self::skip_spec())?;
                write!(writer, " skipped")?;
                writer.reset()?;

                writeln!(writer)?;
            }
        }
        Ok(())
    }

    fn write_invocation(
        &self,
        invocation: TestInvocation<'_>,
        mut writer: impl WriteColor,
    ) -> io::Result<()> {
        writer.set_color(&suite_spec())?;
        write!(
            writer,
            "{:>width$}",
            invocation.suite,
            width = self.suite_width
        )?;
        writer.reset()?;
        write!(writer, "  ")?;

        writer.set_color(&test_name_spec())?;
        write!(writer, "{}", invocation.name)?;
        writer.reset()?;

        Ok(())
    }

    fn count_spec() -> ColorSpec {
        let mut color_spec = ColorSpec::new();
        color_spec.set_bold(true);
        color_spec
    }

    fn pass_spec() -> ColorSpec {
        let mut color_spec = ColorSpec::new();
        color_spec
            .set_fg(Some(termcolor::Color::Green))
            .set_bold(true);
        color_spec
    }

    fn fail_spec() -> ColorSpec {
        let mut color_spec = ColorSpec::new();
        color_spec
            .set_fg(Some(termcolor::Color::Red))
            .set_bold(true);
        color_spec
    }

    fn fail_output_spec() -> ColorSpec {
        let mut color_spec = ColorSpec::new();
        color_spec.set_fg(Some(termcolor::Color::Red));
        color_spec
    }

    fn skip_spec() -> ColorSpec {
        let mut color_spec = ColorSpec::new();
        color_spec
            .set_fg(Some(termcolor::Color::Yellow))
            .set_bold(true);
        color_spec
    }
}

impl fmt::Debug for TestReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestReporter")
            .field("stdout", &"BufferWriter { .. }")
            .field("suite_width", &self.suite_width)
            .finish()
    }
}

/// An event that occurred during a test run.
#[derive(Clone, Debug)]
pub enum TestEvent<'a> {
    /// The test run started.
    RunStarted {
        /// The list of tests that will be run.
        test_list: &'a TestList,
    },

    /// A test started running.
    TestStarted {
        /// The invocation that was started.
        invocation: TestInvocation<'a>,
    },

    /// A test finished running.
    TestFinished {
        /// The invocation that finished running.
        invocation: TestInvocation<'a>,

        /// Information about how this test was run.
        run_status: TestRunStatus,
    },

    /// A test was skipped.
    TestSkipped {
        /// The invocation that was skipped.
        invocation: TestInvocation<'a>,

        /// Why this test was skipped.
        reason: SkipReason,
    },

    /// An advisory stop was requested: no further tests will be scheduled
    /// after the current one.
    RunBeginStop {
        /// The reason the stop was requested.
        reason: StopReason,
    },

    /// The test run finished.
    RunFinished {
        /// The time at which the run was started.
        start_time: Instant,

        /// Statistics for the run.
        run_stats: RunStats,
    },
}

/// The reason a test was skipped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The test didn't match the run's filter.
    FilterMismatch { reason: MismatchReason },

    /// The health guard reported the host process as unhealthy.
    HostUnhealthy,
}

/// The reason an advisory stop was requested.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StopReason {
    /// The health guard reported the host process as unhealthy.
    HostUnhealthy,

    /// A test failed and fail-fast was requested.
    Failure,

    /// An error occurred while reporting results.
    ReportError,
}
