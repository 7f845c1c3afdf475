// Copyright (c) The runguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use aho_corasick::AhoCorasick;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether to run ignored tests.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum RunIgnored {
    /// Only run tests that aren't marked ignored.
    #[default]
    Default,

    /// Only run tests that are marked ignored.
    IgnoredOnly,

    /// Run both ignored and non-ignored tests.
    All,
}

/// A filter for test invocations, combining an ignored-status policy with an
/// optional set of name substring patterns.
#[derive(Clone, Debug)]
pub struct TestFilter {
    run_ignored: RunIgnored,
    name_match: NameMatch,
}

#[derive(Clone, Debug)]
enum NameMatch {
    MatchAll,
    MatchSet(Box<AhoCorasick>),
}

impl TestFilter {
    /// Creates a new `TestFilter` from the given substring patterns.
    ///
    /// An empty pattern slice matches every test name.
    pub fn new(run_ignored: RunIgnored, patterns: &[impl AsRef<[u8]>]) -> Result<Self> {
        let name_match = if patterns.is_empty() {
            NameMatch::MatchAll
        } else {
            let set = AhoCorasick::new(patterns).context("error building name filter")?;
            NameMatch::MatchSet(Box::new(set))
        };
        Ok(Self {
            run_ignored,
            name_match,
        })
    }

    /// Creates a `TestFilter` that matches every name.
    pub fn any(run_ignored: RunIgnored) -> Self {
        Self {
            run_ignored,
            name_match: NameMatch::MatchAll,
        }
    }

    /// Computes the match status of a single test against this filter.
    pub fn filter_match(&self, test_name: &str, ignored: bool) -> FilterMatch {
        let ignored_ok = match self.run_ignored {
            RunIgnored::Default => !ignored,
            RunIgnored::IgnoredOnly => ignored,
            RunIgnored::All => true,
        };
        if !ignored_ok {
            return FilterMatch::Mismatch {
                reason: MismatchReason::Ignored,
            };
        }

        let name_ok = match &self.name_match {
            NameMatch::MatchAll => true,
            NameMatch::MatchSet(set) => set.is_match(test_name),
        };
        if name_ok {
            FilterMatch::Matches
        } else {
            FilterMatch::Mismatch {
                reason: MismatchReason::String,
            }
        }
    }
}

/// Whether a test matches a filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum FilterMatch {
    /// This test matches the filter and will be run.
    Matches,

    /// This test does not match the filter, for the contained reason.
    Mismatch { reason: MismatchReason },
}

impl FilterMatch {
    /// Returns true if the filter matches.
    pub fn is_match(&self) -> bool {
        matches!(self, FilterMatch::Matches)
    }
}

/// The reason a test doesn't match a filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MismatchReason {
    /// The test's ignored status doesn't match the run-ignored policy.
    Ignored,

    /// The test name doesn't match any of the provided patterns.
    String,
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::Ignored => write!(f, "does not match the run-ignored policy"),
            MismatchReason::String => write!(f, "does not match the provided name patterns"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::{collection::vec, prelude::*};

    #[test]
    fn ignored_policy() {
        let filter = TestFilter::any(RunIgnored::Default);
        assert!(filter.filter_match("test_foo", false).is_match());
        assert_eq!(
            filter.filter_match("test_foo", true),
            FilterMatch::Mismatch {
                reason: MismatchReason::Ignored
            }
        );

        let filter = TestFilter::any(RunIgnored::IgnoredOnly);
        assert!(filter.filter_match("test_foo", true).is_match());
        assert!(!filter.filter_match("test_foo", false).is_match());

        let filter = TestFilter::any(RunIgnored::All);
        assert!(filter.filter_match("test_foo", false).is_match());
        assert!(filter.filter_match("test_foo", true).is_match());
    }

    proptest! {
        #[test]
        fn proptest_empty(test_names in vec(any::<String>(), 0..16)) {
            let patterns: &[String] = &[];
            let filter = TestFilter::new(RunIgnored::Default, patterns).expect("empty patterns are valid");
            for test_name in test_names {
                prop_assert!(filter.filter_match(&test_name, false).is_match());
            }
        }

        // Exact names match.
        #[test]
        fn proptest_exact(test_names in vec(any::<String>(), 1..16)) {
            let filter = TestFilter::new(RunIgnored::Default, &test_names).expect("patterns are valid");
            for test_name in test_names {
                prop_assert!(filter.filter_match(&test_name, false).is_match());
            }
        }

        // Substrings match.
        #[test]
        fn proptest_substring(
            substring_prefix_suffixes in vec([any::<String>(); 3], 1..16),
        ) {
            let mut patterns = Vec::with_capacity(substring_prefix_suffixes.len());
            let mut test_names = Vec::with_capacity(substring_prefix_suffixes.len());
            for [substring, prefix, suffix] in substring_prefix_suffixes {
                test_names.push(prefix + &substring + &suffix);
                patterns.push(substring);
            }

            let filter = TestFilter::new(RunIgnored::Default, &patterns).expect("patterns are valid");
            for test_name in test_names {
                prop_assert!(filter.filter_match(&test_name, false).is_match());
            }
        }

        // A proper substring of a pattern doesn't match.
        #[test]
        fn proptest_no_match(
            substring in any::<String>(),
            prefix in any::<String>(),
            suffix in any::<String>(),
        ) {
            prop_assume!(!substring.is_empty() && !(prefix.is_empty() && suffix.is_empty()));
            let pattern = prefix + &substring + &suffix;
            let filter = TestFilter::new(RunIgnored::Default, &[&pattern]).expect("pattern is valid");
            prop_assert!(!filter.filter_match(&substring, false).is_match());
        }
    }
}
