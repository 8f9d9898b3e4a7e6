//! Common functionality.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub mod rng;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// The version of the `epinet` package.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A wall-clock time span parsed from the CLI.
///
/// Accepts an optional suffix `s`, `m`, `h`, or `d`; a bare number is
/// interpreted as minutes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpan(pub std::time::Duration);

impl TimeSpan {
    pub fn as_duration(&self) -> std::time::Duration {
        self.0
    }
}

impl std::str::FromStr for TimeSpan {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (number, factor) = match s.chars().last() {
            Some('s') => (&s[..s.len() - 1], 1.0),
            Some('m') => (&s[..s.len() - 1], 60.0),
            Some('h') => (&s[..s.len() - 1], 3600.0),
            Some('d') => (&s[..s.len() - 1], 86400.0),
            Some(c) if c.is_ascii_digit() || c == '.' => (s, 60.0),
            _ => anyhow::bail!("invalid time span: {:?}", s),
        };
        let value: f64 = number
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid time span {:?}: {}", s, e))?;
        if value < 0.0 {
            anyhow::bail!("time span must not be negative: {:?}", s);
        }
        Ok(TimeSpan(std::time::Duration::from_secs_f64(value * factor)))
    }
}

/// Sanitize a name so it can be used as an SQLite or CSV column identifier.
///
/// Keeps `[A-Za-z0-9_-]` and replaces everything else with `_`.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Join items with a separator after `to_string` conversion.
pub fn join<T: std::fmt::Display>(items: impl IntoIterator<Item = T>, sep: &str) -> String {
    itertools::Itertools::join(&mut items.into_iter(), sep)
}

/// Format a floating point value the way the result tables expect it.
///
/// Uses enough digits to round-trip but drops the trailing `.0` of integral
/// values, so attribute aggregation over written tables stays stable.
pub fn format_number(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
