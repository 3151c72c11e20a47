//! Opaque sample values recorded by instrumented code.

use std::fmt;
use std::time::Duration;

/// A single recorded value.
///
/// Aggregators decide which kinds they accept: counters and gauges take any
/// numeric kind, histograms take integers, floats and durations, and labels
/// take everything through its textual form.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sample {
    /// A boolean, counted as 1.0 when true.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A duration, measured in seconds.
    Duration(Duration),
    /// A line of text.
    Text(String),
    /// Words joined by a single space when used as text.
    Texts(Vec<String>),
}

impl Sample {
    /// Numeric view of the sample.
    ///
    /// Booleans map to `0.0`/`1.0` and durations to seconds. Text has no
    /// numeric view.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Sample::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Sample::Int(i) => Some(*i as f64),
            Sample::Float(f) => Some(*f),
            Sample::Duration(d) => Some(d.as_secs_f64()),
            Sample::Text(_) | Sample::Texts(_) => None,
        }
    }

    /// Textual view of the sample.
    pub fn to_text(&self) -> String {
        match self {
            Sample::Text(s) => s.clone(),
            Sample::Texts(words) => words.join(" "),
            other => other.to_string(),
        }
    }

    /// Short name of the sample kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Sample::Bool(_) => "bool",
            Sample::Int(_) => "int",
            Sample::Float(_) => "float",
            Sample::Duration(_) => "duration",
            Sample::Text(_) => "text",
            Sample::Texts(_) => "texts",
        }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sample::Bool(b) => write!(f, "{}", b),
            Sample::Int(i) => write!(f, "{}", i),
            Sample::Float(x) => write!(f, "{}", x),
            Sample::Duration(d) => write!(f, "{:?}", d),
            Sample::Text(s) => f.write_str(s),
            Sample::Texts(words) => f.write_str(&words.join(" ")),
        }
    }
}

impl From<bool> for Sample {
    fn from(value: bool) -> Self {
        Sample::Bool(value)
    }
}

// Unsigned values beyond `i64::MAX` become floats rather than wrapping.
macro_rules! from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Sample {
                fn from(value: $t) -> Self {
                    i64::try_from(value)
                        .map(Sample::Int)
                        .unwrap_or_else(|_| Sample::Float(value as f64))
                }
            }
        )*
    };
}

from_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<f32> for Sample {
    fn from(value: f32) -> Self {
        Sample::Float(value as f64)
    }
}

impl From<f64> for Sample {
    fn from(value: f64) -> Self {
        Sample::Float(value)
    }
}

impl From<Duration> for Sample {
    fn from(value: Duration) -> Self {
        Sample::Duration(value)
    }
}

impl From<&str> for Sample {
    fn from(value: &str) -> Self {
        Sample::Text(value.to_string())
    }
}

impl From<String> for Sample {
    fn from(value: String) -> Self {
        Sample::Text(value)
    }
}

impl From<Vec<String>> for Sample {
    fn from(value: Vec<String>) -> Self {
        Sample::Texts(value)
    }
}
