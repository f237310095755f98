//! The two pipeline stages: extraction and synthesis
//!
//! Extraction wraps the retrying tool invoker; synthesis deterministically
//! turns a trend set into a report. New stages plug in by implementing
//! [`Stage`], not by subclassing anything.

use crate::invoker::{ToolInvoker, ToolOutcome};
use async_trait::async_trait;
use trend_core::{
    Importance, PipelineError, Report, Result, Section, Stage, Symbol, Trend, TrendSet,
};

/// First stage: fetch trend data through the retrying invoker
///
/// Never errors: retry exhaustion is expressed in the returned
/// [`ToolOutcome`], leaving the degradation decision to the orchestrator.
pub struct ExtractionStage {
    invoker: ToolInvoker,
}

impl ExtractionStage {
    pub fn new(invoker: ToolInvoker) -> Self {
        Self { invoker }
    }

    pub fn max_attempts(&self) -> u32 {
        self.invoker.max_attempts()
    }
}

#[async_trait]
impl Stage for ExtractionStage {
    type Input = Symbol;
    type Output = ToolOutcome;

    async fn execute(&self, input: Symbol) -> Result<ToolOutcome> {
        Ok(self.invoker.fetch(&input).await)
    }

    fn name(&self) -> &str {
        "extraction"
    }
}

/// Input to the synthesis stage: the symbol plus its extracted trends
pub struct SynthesisInput {
    pub symbol: Symbol,
    pub trends: TrendSet,
}

/// Second stage: compose the final report from extracted trends
///
/// Deterministic, no external dependency. Sections are ordered by
/// descending importance, stable on ties; the summary leads with the
/// highest-importance trend.
pub struct SynthesisStage;

impl SynthesisStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SynthesisStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for SynthesisStage {
    type Input = SynthesisInput;
    type Output = Report;

    async fn execute(&self, input: SynthesisInput) -> Result<Report> {
        if input.trends.is_empty() {
            // TrendSet guarantees non-emptiness; guard the contract anyway
            return Err(PipelineError::Synthesis(
                "no trends available for synthesis".to_string(),
            ));
        }

        let lead = input.trends.most_important();
        let summary = format!(
            "Primary development for {}: {}. {}",
            input.symbol, lead.title, lead.impact
        );

        let sections = input
            .trends
            .by_importance()
            .into_iter()
            .map(section_for)
            .collect();

        Ok(Report::new(input.symbol.as_str(), summary).with_sections(sections))
    }

    fn name(&self) -> &str {
        "synthesis"
    }
}

fn section_for(trend: &Trend) -> Section {
    Section::new(
        trend.title.clone(),
        vec![
            trend.impact.clone(),
            format!(
                "Assessed {} importance with {:.0}% confidence.",
                trend.importance,
                trend.confidence * 100.0
            ),
        ],
    )
}

/// The clearly-labeled placeholder trends used when live data is unavailable
///
/// All entries carry `Low` importance and impact text stating that data
/// could not be retrieved, so the degraded report is never mistaken for a
/// live analysis.
pub fn placeholder_trends(symbol: &Symbol) -> Vec<Trend> {
    let unavailable = format!("No current market data could be retrieved for {symbol}.");
    vec![
        Trend::new(
            "Live market data unavailable",
            Importance::Low,
            unavailable.clone(),
            0.0,
        ),
        Trend::new(
            "Retry the analysis later",
            Importance::Low,
            format!("{unavailable} The data source may recover shortly."),
            0.0,
        ),
        Trend::new(
            "Verify the symbol is actively traded",
            Importance::Low,
            format!("{unavailable} An inactive or delisted symbol returns no data."),
            0.0,
        ),
    ]
}

/// Build the degraded report returned when extraction exhausts its retries
pub fn degraded_report(symbol: &Symbol, attempts: u32) -> Report {
    let sections = placeholder_trends(symbol).iter().map(section_for).collect();
    Report::new(
        symbol.as_str(),
        format!(
            "Analysis for {symbol} is limited: live market data was unavailable."
        ),
    )
    .with_sections(sections)
    .with_limitations(format!(
        "Live data retrieval for {symbol} failed after {attempts} attempts. \
         The sections below are placeholders and do not reflect current market data."
    ))
}
