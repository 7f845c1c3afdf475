// Copyright (c) The runguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::{fmt, io, str::FromStr};

/// Output format for the test list.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    /// A human-readable colored listing.
    #[default]
    Plain,

    /// A machine-readable serialization.
    Serializable(SerializableFormat),
}

impl OutputFormat {
    /// The accepted string representations, in parse order.
    pub fn variants() -> [&'static str; 5] {
        ["plain", "json", "json-pretty", "toml", "toml-pretty"]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Serializable(SerializableFormat::Json) => write!(f, "json"),
            OutputFormat::Serializable(SerializableFormat::JsonPretty) => write!(f, "json-pretty"),
            OutputFormat::Serializable(SerializableFormat::Toml) => write!(f, "toml"),
            OutputFormat::Serializable(SerializableFormat::TomlPretty) => write!(f, "toml-pretty"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let val = match s {
            "plain" => OutputFormat::Plain,
            "json" => OutputFormat::Serializable(SerializableFormat::Json),
            "json-pretty" => OutputFormat::Serializable(SerializableFormat::JsonPretty),
            "toml" => OutputFormat::Serializable(SerializableFormat::Toml),
            "toml-pretty" => OutputFormat::Serializable(SerializableFormat::TomlPretty),
            other => bail!("unrecognized format: {}", other),
        };
        Ok(val)
    }
}

/// A machine-readable output format.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SerializableFormat {
    Json,
    JsonPretty,
    Toml,
    TomlPretty,
}

impl SerializableFormat {
    /// Write this data in the given format to the writer.
    pub fn to_writer(self, value: &impl Serialize, mut writer: impl io::Write) -> Result<()> {
        match self {
            SerializableFormat::Json => {
                serde_json::to_writer(writer, value).context("error serializing to JSON")
            }
            SerializableFormat::JsonPretty => {
                serde_json::to_writer_pretty(writer, value).context("error serializing to JSON")
            }
            SerializableFormat::Toml => {
                let s = toml::to_string(value).context("error serializing to TOML")?;
                write!(writer, "{}", s).context("error writing output")
            }
            SerializableFormat::TomlPretty => {
                let s = toml::to_string_pretty(value).context("error serializing to TOML")?;
                write!(writer, "{}", s).context("error writing output")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_variants_parse() {
        for &variant in &OutputFormat::variants() {
            variant.parse::<OutputFormat>().expect("variant is valid");
        }
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn output_format_display_roundtrips() {
        let formats = [
            OutputFormat::Plain,
            OutputFormat::Serializable(SerializableFormat::Json),
            OutputFormat::Serializable(SerializableFormat::JsonPretty),
            OutputFormat::Serializable(SerializableFormat::Toml),
            OutputFormat::Serializable(SerializableFormat::TomlPretty),
        ];
        for format in formats {
            let displayed = format!("{}", format);
            let parsed = displayed
                .parse::<OutputFormat>()
                .expect("Display output is valid");
            assert_eq!(format, parsed, "Display -> FromStr roundtrips");
        }
    }
}
