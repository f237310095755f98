//! Core data types for the analysis pipeline

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of trends a tool call may return
pub const MAX_TRENDS: usize = 3;

/// Maximum length of a validated symbol
pub const MAX_SYMBOL_LEN: usize = 5;

/// A validated request identifier (ticker-like token)
///
/// A `Symbol` can only be constructed through [`Symbol::parse`], which
/// enforces the `^[A-Z]{1,5}$` format. Anything else is rejected before
/// any tool, memory, or monitoring interaction occurs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Parse and validate a raw input string into a `Symbol`
    pub fn parse(input: &str) -> Result<Self> {
        let valid = !input.is_empty()
            && input.len() <= MAX_SYMBOL_LEN
            && input.chars().all(|c| c.is_ascii_uppercase());

        if valid {
            Ok(Self(input.to_string()))
        } else {
            Err(PipelineError::InvalidSymbol(input.to_string()))
        }
    }

    /// Get the symbol as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

/// Importance tier of an extracted trend
///
/// Ordered so that `High > Moderate > Low`, which drives report section
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Importance {
    Low,
    Moderate,
    High,
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("Low"),
            Self::Moderate => f.write_str("Moderate"),
            Self::High => f.write_str("High"),
        }
    }
}

/// One extracted data point: a titled development with an importance tier,
/// a narrative impact, and a confidence level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub title: String,
    pub importance: Importance,
    pub impact: String,
    /// Confidence in the trend, in `[0, 1]`
    pub confidence: f64,
}

impl Trend {
    pub fn new(
        title: impl Into<String>,
        importance: Importance,
        impact: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            title: title.into(),
            importance,
            impact: impact.into(),
            confidence,
        }
    }
}

/// A validated, ordered sequence of 1 to [`MAX_TRENDS`] trends
///
/// Invariants: non-empty, at most [`MAX_TRENDS`] entries, every title
/// non-empty, every confidence within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Trend>", into = "Vec<Trend>")]
pub struct TrendSet(Vec<Trend>);

impl TrendSet {
    /// Build a trend set, enforcing its invariants
    pub fn new(trends: Vec<Trend>) -> Result<Self> {
        if trends.is_empty() {
            return Err(PipelineError::InvalidTrendSet(
                "trend set must not be empty".to_string(),
            ));
        }
        if trends.len() > MAX_TRENDS {
            return Err(PipelineError::InvalidTrendSet(format!(
                "trend set holds {} entries, at most {} allowed",
                trends.len(),
                MAX_TRENDS
            )));
        }
        for trend in &trends {
            if trend.title.trim().is_empty() {
                return Err(PipelineError::InvalidTrendSet(
                    "trend title must not be empty".to_string(),
                ));
            }
            if !(0.0..=1.0).contains(&trend.confidence) {
                return Err(PipelineError::InvalidTrendSet(format!(
                    "confidence {} out of bounds for '{}'",
                    trend.confidence, trend.title
                )));
            }
        }
        Ok(Self(trends))
    }

    /// Iterate over the trends in original order
    pub fn iter(&self) -> std::slice::Iter<'_, Trend> {
        self.0.iter()
    }

    /// Access the trends as a slice
    pub fn as_slice(&self) -> &[Trend] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The highest-importance trend, breaking ties by original order
    pub fn most_important(&self) -> &Trend {
        // Invariant: the set is non-empty
        let mut best = &self.0[0];
        for trend in &self.0[1..] {
            if trend.importance > best.importance {
                best = trend;
            }
        }
        best
    }

    /// Trends sorted by descending importance, stable on ties
    pub fn by_importance(&self) -> Vec<&Trend> {
        let mut sorted: Vec<&Trend> = self.0.iter().collect();
        sorted.sort_by(|a, b| b.importance.cmp(&a.importance));
        sorted
    }
}

impl TryFrom<Vec<Trend>> for TrendSet {
    type Error = PipelineError;

    fn try_from(trends: Vec<Trend>) -> Result<Self> {
        Self::new(trends)
    }
}

impl From<TrendSet> for Vec<Trend> {
    fn from(set: TrendSet) -> Self {
        set.0
    }
}

impl<'a> IntoIterator for &'a TrendSet {
    type Item = &'a Trend;
    type IntoIter = std::slice::Iter<'a, Trend>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One heading/bullet block of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub bullets: Vec<String>,
}

impl Section {
    pub fn new(heading: impl Into<String>, bullets: Vec<String>) -> Self {
        Self {
            heading: heading.into(),
            bullets,
        }
    }
}

/// The final output of a pipeline run
///
/// `limitations` is populated only on the degraded/fallback path and never
/// co-occurs with a confident summary framing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub symbol: String,
    pub summary: String,
    pub sections: Vec<Section>,
    pub limitations: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    pub fn new(symbol: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            summary: summary.into(),
            sections: Vec::new(),
            limitations: None,
            generated_at: Utc::now(),
        }
    }

    pub fn with_sections(mut self, sections: Vec<Section>) -> Self {
        self.sections = sections;
        self
    }

    pub fn with_limitations(mut self, limitations: impl Into<String>) -> Self {
        self.limitations = Some(limitations.into());
        self
    }

    /// Whether this report was produced on the degraded path
    pub fn is_degraded(&self) -> bool {
        self.limitations.is_some()
    }

    /// Render the report as Markdown
    pub fn to_markdown(&self) -> String {
        let mut md = format!("# Strategic Analysis: {}\n\n", self.symbol);
        md.push_str(&format!(
            "*Generated {} UTC*\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));
        md.push_str(&self.summary);
        md.push_str("\n\n");

        for section in &self.sections {
            md.push_str(&format!("## {}\n\n", section.heading));
            for bullet in &section.bullets {
                md.push_str(&format!("- {bullet}\n"));
            }
            md.push('\n');
        }

        if let Some(limitations) = &self.limitations {
            md.push_str(&format!("## Data Limitations\n\n{limitations}\n"));
        }

        md
    }
}
