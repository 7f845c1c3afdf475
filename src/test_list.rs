// Copyright (c) The runguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    output::OutputFormat,
    test_filter::{FilterMatch, TestFilter},
};
use anyhow::{bail, Context, Result};
use debug_ignore::DebugIgnore;
use serde::Serialize;
use std::{collections::BTreeMap, io};
use termcolor::{ColorSpec, NoColor, WriteColor};

/// An in-process test body.
///
/// A body that returns an error, or panics, counts as a failure; anything
/// else counts as a pass.
pub type TestBody = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// A named collection of test cases, registered as in-process bodies.
///
/// Accepted as input to `TestList::new`. The suite name plays the role a
/// declaring test class plays in class-based frameworks.
pub struct TestSuite {
    name: String,
    tests: Vec<(String, RegisteredTest)>,
}

struct RegisteredTest {
    body: TestBody,
    ignored: bool,
}

impl TestSuite {
    /// Creates a new, empty suite with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
        }
    }

    /// Registers a test case.
    pub fn test(
        mut self,
        name: impl Into<String>,
        body: impl Fn() -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.tests.push((
            name.into(),
            RegisteredTest {
                body: Box::new(body),
                ignored: false,
            },
        ));
        self
    }

    /// Registers a test case marked ignored.
    ///
    /// Ignored tests are filtered out by default; see `RunIgnored`.
    pub fn ignored_test(
        mut self,
        name: impl Into<String>,
        body: impl Fn() -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.tests.push((
            name.into(),
            RegisteredTest {
                body: Box::new(body),
                ignored: true,
            },
        ));
        self
    }

    /// Returns the suite's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// List of tests across all registered suites, with each test's filter
/// status computed up front.
#[derive(Debug)]
pub struct TestList {
    test_count: usize,
    skip_count: usize,
    suites: BTreeMap<String, SuiteInfo>,
}

/// Information about the tests in a single suite.
#[derive(Debug)]
pub struct SuiteInfo {
    /// Test names and other information.
    pub tests: BTreeMap<String, TestInfo>,
}

/// Information about a single test.
#[derive(Debug)]
pub struct TestInfo {
    /// Whether the test matches the provided test filter.
    ///
    /// Only tests that match the filter are run.
    pub filter_match: FilterMatch,

    /// Whether the test was registered as ignored.
    pub ignored: bool,

    body: DebugIgnore<TestBody>,
}

impl TestInfo {
    #[cfg(test)]
    pub(crate) fn for_tests(filter_match: FilterMatch, ignored: bool) -> Self {
        Self {
            filter_match,
            ignored,
            body: DebugIgnore(Box::new(|| Ok(()))),
        }
    }
}

impl TestList {
    /// Creates a new test list from the given suites, applying the specified
    /// filter to every test.
    ///
    /// Fails if two suites share a name or a suite registers the same test
    /// name twice.
    pub fn new(suites: impl IntoIterator<Item = TestSuite>, filter: &TestFilter) -> Result<Self> {
        let mut test_count = 0;
        let mut suite_map = BTreeMap::new();

        for suite in suites {
            let TestSuite { name, tests } = suite;
            let mut test_map = BTreeMap::new();
            for (test_name, registered) in tests {
                let info = TestInfo {
                    filter_match: filter.filter_match(&test_name, registered.ignored),
                    ignored: registered.ignored,
                    body: DebugIgnore(registered.body),
                };
                if test_map.insert(test_name.clone(), info).is_some() {
                    bail!("duplicate test '{}' in suite '{}'", test_name, name);
                }
            }
            test_count += test_map.len();
            if suite_map
                .insert(name.clone(), SuiteInfo { tests: test_map })
                .is_some()
            {
                bail!("duplicate suite '{}'", name);
            }
        }

        let skip_count = suite_map
            .values()
            .flat_map(|suite| suite.tests.values())
            .filter(|info| !info.filter_match.is_match())
            .count();

        Ok(Self {
            test_count,
            skip_count,
            suites: suite_map,
        })
    }

    /// Returns the total number of tests across all suites.
    pub fn test_count(&self) -> usize {
        self.test_count
    }

    /// Returns the number of tests skipped by the filter.
    pub fn skip_count(&self) -> usize {
        self.skip_count
    }

    /// Returns the number of tests that will be run.
    ///
    /// It is always the case that `run_count + skip_count == test_count`.
    pub fn run_count(&self) -> usize {
        self.test_count - self.skip_count
    }

    /// Returns the number of suites.
    pub fn suite_count(&self) -> usize {
        self.suites.len()
    }

    /// Returns the tests for a given suite, or `None` if there is no suite
    /// with that name.
    pub fn get(&self, suite_name: &str) -> Option<&SuiteInfo> {
        self.suites.get(suite_name)
    }

    /// Iterates over all the suites.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SuiteInfo)> + '_ {
        self.suites.iter().map(|(name, info)| (name.as_str(), info))
    }

    /// Iterates over the list of tests in scheduling order.
    pub fn iter_tests(&self) -> impl Iterator<Item = TestInvocation<'_>> + '_ {
        self.suites.iter().flat_map(|(suite_name, suite_info)| {
            suite_info
                .tests
                .iter()
                .map(move |(name, info)| TestInvocation::new(suite_name, name, info))
        })
    }

    /// Outputs this list to the given writer.
    pub fn write(&self, output_format: OutputFormat, writer: impl WriteColor) -> Result<()> {
        match output_format {
            OutputFormat::Plain => self.write_plain(writer).context("error writing test list"),
            OutputFormat::Serializable(format) => format.to_writer(&self.summary(), writer),
        }
    }

    /// Outputs this list as a string with the given format.
    pub fn to_string(&self, output_format: OutputFormat) -> Result<String> {
        let mut buf = NoColor::new(vec![]);
        self.write(output_format, &mut buf)?;
        String::from_utf8(buf.into_inner()).context("test list output is invalid UTF-8")
    }

    // ---
    // Helper methods
    // ---

    fn summary(&self) -> TestListSummary<'_> {
        let suites = self
            .suites
            .iter()
            .map(|(name, info)| {
                let tests = info
                    .tests
                    .iter()
                    .map(|(test_name, test_info)| {
                        (
                            test_name.as_str(),
                            TestSummary {
                                filter_match: test_info.filter_match,
                                ignored: test_info.ignored,
                            },
                        )
                    })
                    .collect();
                (name.as_str(), SuiteSummary { tests })
            })
            .collect();
        TestListSummary {
            test_count: self.test_count,
            suites,
        }
    }

    fn write_plain(&self, mut writer: impl WriteColor) -> io::Result<()> {
        let suite_spec = suite_spec();
        let test_name_spec = test_name_spec();

        for (suite_name, info) in &self.suites {
            writer.set_color(&suite_spec)?;
            write!(writer, "{}", suite_name)?;
            writer.reset()?;
            writeln!(writer, ":")?;

            for (name, info) in &info.tests {
                writer.set_color(&test_name_spec)?;
                write!(writer, "    {}", name)?;
                writer.reset()?;

                if !info.filter_match.is_match() {
                    write!(writer, " (skipped)")?;
                }
                writeln!(writer)?;
            }
            writer.reset()?;
        }
        Ok(())
    }
}

/// Serializable view of a `TestList`, used for the non-plain output formats.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct TestListSummary<'a> {
    test_count: usize,
    suites: BTreeMap<&'a str, SuiteSummary<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct SuiteSummary<'a> {
    tests: BTreeMap<&'a str, TestSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct TestSummary {
    filter_match: FilterMatch,
    ignored: bool,
}

/// A single test method execution request: one test with its declaring
/// suite. Immutable for the duration of a run.
#[derive(Clone, Copy, Debug)]
pub struct TestInvocation<'a> {
    /// The name of the declaring suite.
    pub suite: &'a str,

    /// The name of the test method.
    pub name: &'a str,

    /// Information about the test.
    pub info: &'a TestInfo,
}

impl<'a> TestInvocation<'a> {
    pub(crate) fn new(suite: &'a str, name: &'a str, info: &'a TestInfo) -> Self {
        Self { suite, name, info }
    }

    /// The description string used for reporting.
    pub fn description(&self) -> String {
        format!("{}::{}", self.suite, self.name)
    }

    pub(crate) fn run_body(&self) -> Result<()> {
        (self.info.body.0)()
    }
}

pub(super) fn suite_spec() -> ColorSpec {
    let mut color_spec = ColorSpec::new();
    color_spec
        .set_fg(Some(termcolor::Color::Magenta))
        .set_bold(true);
    color_spec
}

pub(super) fn test_name_spec() -> ColorSpec {
    let mut color_spec = ColorSpec::new();
    color_spec
        .set_fg(Some(termcolor::Color::Blue))
        .set_bold(true);
    color_spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        output::{OutputFormat, SerializableFormat},
        test_filter::{MismatchReason, RunIgnored},
    };
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn fixture_suites() -> Vec<TestSuite> {
        vec![
            TestSuite::new("ProjectSuite")
                .test("testOpenProject", || Ok(()))
                .ignored_test("testSlowSync", || Ok(())),
            TestSuite::new("EditorSuite").test("testTyping", || Ok(())),
        ]
    }

    #[test]
    fn counts_and_filter_status() {
        let filter = TestFilter::any(RunIgnored::Default);
        let test_list = TestList::new(fixture_suites(), &filter).expect("valid suites");

        assert_eq!(test_list.test_count(), 3);
        assert_eq!(test_list.skip_count(), 1);
        assert_eq!(test_list.run_count(), 2);
        assert_eq!(test_list.suite_count(), 2);

        let project = test_list.get("ProjectSuite").expect("suite exists");
        assert_eq!(
            project.tests["testOpenProject"].filter_match,
            FilterMatch::Matches
        );
        assert_eq!(
            project.tests["testSlowSync"].filter_match,
            FilterMatch::Mismatch {
                reason: MismatchReason::Ignored
            }
        );
    }

    #[test]
    fn descriptions_reference_the_method() {
        let filter = TestFilter::any(RunIgnored::Default);
        let test_list = TestList::new(fixture_suites(), &filter).expect("valid suites");
        let descriptions: Vec<_> = test_list
            .iter_tests()
            .map(|invocation| invocation.description())
            .collect();
        assert_eq!(
            descriptions,
            vec![
                "EditorSuite::testTyping",
                "ProjectSuite::testOpenProject",
                "ProjectSuite::testSlowSync",
            ]
        );
    }

    #[test]
    fn duplicate_suites_are_rejected() {
        let filter = TestFilter::any(RunIgnored::Default);
        let suites = vec![
            TestSuite::new("ProjectSuite").test("testOpenProject", || Ok(())),
            TestSuite::new("ProjectSuite").test("testCloseProject", || Ok(())),
        ];
        let err = TestList::new(suites, &filter).expect_err("duplicate suite");
        assert_eq!(err.to_string(), "duplicate suite 'ProjectSuite'");
    }

    #[test]
    fn duplicate_tests_are_rejected() {
        let filter = TestFilter::any(RunIgnored::Default);
        let suites = vec![TestSuite::new("ProjectSuite")
            .test("testOpenProject", || Ok(()))
            .test("testOpenProject", || Ok(()))];
        let err = TestList::new(suites, &filter).expect_err("duplicate test");
        assert_eq!(
            err.to_string(),
            "duplicate test 'testOpenProject' in suite 'ProjectSuite'"
        );
    }

    #[test]
    fn list_output_formats() {
        let filter = TestFilter::any(RunIgnored::Default);
        let test_list = TestList::new(fixture_suites(), &filter).expect("valid suites");

        static EXPECTED_PLAIN: &str = indoc! {"
            EditorSuite:
                testTyping
            ProjectSuite:
                testOpenProject
                testSlowSync (skipped)
        "};
        assert_eq!(
            test_list
                .to_string(OutputFormat::Plain)
                .expect("plain succeeded"),
            EXPECTED_PLAIN
        );

        static EXPECTED_JSON_PRETTY: &str = indoc! {r#"
            {
              "test-count": 3,
              "suites": {
                "EditorSuite": {
                  "tests": {
                    "testTyping": {
                      "filter-match": {
                        "status": "matches"
                      },
                      "ignored": false
                    }
                  }
                },
                "ProjectSuite": {
                  "tests": {
                    "testOpenProject": {
                      "filter-match": {
                        "status": "matches"
                      },
                      "ignored": false
                    },
                    "testSlowSync": {
                      "filter-match": {
                        "status": "mismatch",
                        "reason": "ignored"
                      },
                      "ignored": true
                    }
                  }
                }
              }
            }"#};
        assert_eq!(
            test_list
                .to_string(OutputFormat::Serializable(SerializableFormat::JsonPretty))
                .expect("json-pretty succeeded"),
            EXPECTED_JSON_PRETTY
        );
    }
}
