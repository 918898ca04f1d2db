//! Context budget manager: fits one generation call into the model's window.
//!
//! A prompt is the system text plus a list of [`ContextComponent`]s, each
//! with a priority (1 = the task itself, never truncated) and a floor below
//! which truncating it is pointless. Packing walks the components in
//! priority order:
//!
//! 1. System text and every priority-1 component are always included whole.
//!    If they alone exceed the usable ceiling, packing fails.
//! 2. Each remaining component is included whole when it fits.
//! 3. Otherwise it is truncated to the remaining budget minus a buffer for
//!    the truncation marker, as long as that still meets its floor.
//! 4. Anything that cannot meet its floor is dropped.
//!
//! # Determinism
//!
//! Packing is a pure function of its inputs and the token counter: identical
//! inputs always produce identical output and report.

use crate::context::token::{CharEstimator, TokenCounter, count_or_estimate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use weekforge_config::ContextConfig;
use weekforge_core::error::BudgetError;

/// Appended to any component that was cut short.
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated due to length...]";

/// Default tokens held back for the truncation marker.
pub const DEFAULT_TRUNCATION_BUFFER: usize = 50;

const SEPARATOR: &str = "\n\n";

/// Natural cut points, best first.
const BOUNDARIES: [&str; 5] = ["\n\n", "\n", ". ", "? ", "! "];

/// Texts shorter than this are never cut further.
const MIN_TRUNCATED_CHARS: usize = 100;

// ── Model limits ──────────────────────────────────────────────────────────

/// Context window of a model and how much of it prompts may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLimits {
    pub total_tokens: usize,
    pub safety_margin: usize,
    pub reserved_for_response: usize,
}

impl ModelLimits {
    pub const fn new(total_tokens: usize, safety_margin: usize, reserved_for_response: usize) -> Self {
        Self {
            total_tokens,
            safety_margin,
            reserved_for_response,
        }
    }

    /// Built-in limits for a model name; unknown models get a conservative default.
    pub fn for_model(model: &str) -> Self {
        match model {
            "gpt-4o" => Self::new(128_000, 5_000, 32_000),
            "gpt-4o-mini" | "gpt-4.1" | "gpt-4.1-mini" | "gpt-5-mini" => {
                Self::new(128_000, 3_000, 32_000)
            }
            "gpt-4" => Self::new(8_192, 1_000, 1_000),
            _ => Self::new(64_000, 3_000, 32_000),
        }
    }

    /// Table limits for `model` with any explicit overrides from config applied.
    pub fn resolve(model: &str, config: &ContextConfig) -> Self {
        let base = Self::for_model(model);
        Self {
            total_tokens: config.total_tokens.unwrap_or(base.total_tokens),
            safety_margin: config.safety_margin.unwrap_or(base.safety_margin),
            reserved_for_response: config
                .reserved_for_response
                .unwrap_or(base.reserved_for_response),
        }
    }

    /// Tokens available to system text and components together.
    pub fn usable(&self) -> usize {
        self.total_tokens
            .saturating_sub(self.safety_margin)
            .saturating_sub(self.reserved_for_response)
    }
}

// ── Components and report ─────────────────────────────────────────────────

/// A named text fragment competing for space in one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextComponent {
    pub name: String,
    /// Line rendered above the content, e.g. `**Key Guidelines:**`
    pub heading: Option<String>,
    pub content: String,
    /// 1 is never truncated; larger numbers give way first
    pub priority: u8,
    /// Minimum tokens worth keeping; `None` means any amount is useful
    pub floor: Option<usize>,
}

impl ContextComponent {
    pub fn new(name: impl Into<String>, content: impl Into<String>, priority: u8) -> Self {
        Self {
            name: name.into(),
            heading: None,
            content: content.into(),
            priority,
            floor: None,
        }
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }

    pub fn with_floor(mut self, floor: usize) -> Self {
        self.floor = Some(floor);
        self
    }

    pub fn is_required(&self) -> bool {
        self.priority <= 1
    }

    fn render(&self, body: &str) -> String {
        match &self.heading {
            Some(heading) => format!("{heading}\n{body}{SEPARATOR}"),
            None => format!("{body}{SEPARATOR}"),
        }
    }
}

/// What packing did to one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ComponentOutcome {
    Included,
    Truncated { from: usize, to: usize },
    Dropped { tokens: usize },
}

/// Token accounting for one packed prompt. Totals include the system text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetReport {
    pub limit: usize,
    pub system_tokens: usize,
    pub original_total: usize,
    pub final_total: usize,
    pub truncation_applied: bool,
    pub tokens_saved: usize,
    pub remaining_headroom: usize,
    /// Component name → outcome, in priority order
    pub outcomes: Vec<(String, ComponentOutcome)>,
}

impl BudgetReport {
    pub fn outcome(&self, name: &str) -> Option<ComponentOutcome> {
        self.outcomes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| *o)
    }
}

/// A prompt that fits the ceiling.
#[derive(Debug, Clone)]
pub struct PackedContext {
    pub system: String,
    pub user: String,
    pub report: BudgetReport,
    /// Components as they ended up in `user`, truncated ones with their marker
    pub kept: Vec<ContextComponent>,
}

// ── Manager ───────────────────────────────────────────────────────────────

/// Packs prompts for one model. Stateless; create one and reuse it.
#[derive(Clone)]
pub struct ContextBudgetManager {
    limits: ModelLimits,
    truncation_buffer: usize,
    counter: Arc<dyn TokenCounter>,
}

impl std::fmt::Debug for ContextBudgetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBudgetManager")
            .field("limits", &self.limits)
            .field("truncation_buffer", &self.truncation_buffer)
            .finish()
    }
}

impl ContextBudgetManager {
    pub fn new(limits: ModelLimits) -> Self {
        Self {
            limits,
            truncation_buffer: DEFAULT_TRUNCATION_BUFFER,
            counter: Arc::new(CharEstimator),
        }
    }

    /// Manager for `model`, honouring `[context]` overrides.
    pub fn from_config(model: &str, config: &ContextConfig) -> Self {
        Self::new(ModelLimits::resolve(model, config))
            .with_truncation_buffer(config.truncation_buffer)
    }

    pub fn with_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_truncation_buffer(mut self, buffer: usize) -> Self {
        self.truncation_buffer = buffer;
        self
    }

    pub fn limits(&self) -> ModelLimits {
        self.limits
    }

    pub fn count(&self, text: &str) -> usize {
        count_or_estimate(self.counter.as_ref(), text)
    }

    fn cost(&self, component: &ContextComponent, body: &str) -> usize {
        self.count(&component.render(body))
    }

    /// Pack `components` under the usable ceiling.
    ///
    /// The system text is returned unchanged. Fails only when the system text
    /// plus the priority-1 components do not fit on their own.
    pub fn pack(
        &self,
        system: &str,
        mut components: Vec<ContextComponent>,
    ) -> Result<PackedContext, BudgetError> {
        let limit = self.limits.usable();
        let system_tokens = self.count(system);

        components.sort_by_key(|c| c.priority);
        let costs: Vec<usize> = components
            .iter()
            .map(|c| self.cost(c, &c.content))
            .collect();

        let required = system_tokens
            + components
                .iter()
                .zip(&costs)
                .filter(|(c, _)| c.is_required())
                .map(|(_, cost)| cost)
                .sum::<usize>();
        if required > limit {
            return Err(BudgetError::Overflow { required, limit });
        }

        let original_total = system_tokens + self.count(&render_all(&components));
        let mut kept: Vec<(ContextComponent, usize)> = Vec::with_capacity(components.len());
        let mut outcomes = Vec::with_capacity(components.len());

        if original_total <= limit {
            for (component, cost) in components.into_iter().zip(costs) {
                outcomes.push((component.name.clone(), ComponentOutcome::Included));
                kept.push((component, cost));
            }
        } else {
            let mut remaining = limit - required;
            for (component, cost) in components.into_iter().zip(costs) {
                let outcome = if component.is_required() || cost <= remaining {
                    if !component.is_required() {
                        remaining -= cost;
                    }
                    kept.push((component.clone(), cost));
                    ComponentOutcome::Included
                } else {
                    match self.truncate_component(&component, remaining) {
                        Some((truncated, to)) => {
                            remaining -= to;
                            kept.push((truncated, to));
                            ComponentOutcome::Truncated { from: cost, to }
                        }
                        None => ComponentOutcome::Dropped { tokens: cost },
                    }
                };
                debug!(component = %component.name, priority = component.priority, ?outcome, "Packed component");
                outcomes.push((component.name, outcome));
            }
        }

        let mut user = render_all(kept.iter().map(|(c, _)| c));
        let mut final_total = system_tokens + self.count(&user);

        // Counters that are not additive over concatenation can still overshoot.
        while final_total > limit {
            let Some(index) = kept.iter().rposition(|(c, _)| !c.is_required()) else {
                break;
            };
            let (dropped, cost) = kept.remove(index);
            if let Some(entry) = outcomes.iter_mut().find(|(n, _)| *n == dropped.name) {
                entry.1 = ComponentOutcome::Dropped { tokens: cost };
            }
            user = render_all(kept.iter().map(|(c, _)| c));
            final_total = system_tokens + self.count(&user);
        }

        let truncation_applied = outcomes
            .iter()
            .any(|(_, o)| !matches!(o, ComponentOutcome::Included));

        let report = BudgetReport {
            limit,
            system_tokens,
            original_total,
            final_total,
            truncation_applied,
            tokens_saved: original_total.saturating_sub(final_total),
            remaining_headroom: limit.saturating_sub(final_total),
            outcomes,
        };

        debug!(
            limit,
            original = report.original_total,
            packed = report.final_total,
            truncated = report.truncation_applied,
            "Context packed"
        );

        Ok(PackedContext {
            system: system.to_string(),
            user,
            report,
            kept: kept.into_iter().map(|(c, _)| c).collect(),
        })
    }

    /// Cut `component` down to fit `remaining`, or `None` if that would go
    /// below its floor.
    fn truncate_component(
        &self,
        component: &ContextComponent,
        remaining: usize,
    ) -> Option<(ContextComponent, usize)> {
        let floor = component.floor.unwrap_or(0);
        let mut target = remaining.saturating_sub(self.truncation_buffer);

        loop {
            if target == 0 || target < floor {
                return None;
            }
            let body = format!(
                "{}{}",
                self.truncate_text(&component.content, target),
                TRUNCATION_MARKER
            );
            let to = self.cost(component, &body);
            if to <= remaining {
                let mut truncated = component.clone();
                truncated.content = body;
                return Some((truncated, to));
            }
            let overshoot = to - remaining;
            target = target.saturating_sub(overshoot.max(target / 10).max(1));
        }
    }

    /// Shorten `text` to roughly `max_tokens`, preferring a natural boundary.
    ///
    /// Never cuts below 80% of the estimated cut point. Texts that would end
    /// up under 100 characters keep their first 100 characters plus `...`.
    pub fn truncate_text(&self, text: &str, max_tokens: usize) -> String {
        let current = self.count(text);
        if current <= max_tokens {
            return text.to_string();
        }

        let chars = text.chars().count();
        let keep = (chars as f64 * (max_tokens as f64 / current as f64) * 0.9) as usize;
        if keep < MIN_TRUNCATED_CHARS {
            return format!("{}...", take_chars(text, MIN_TRUNCATED_CHARS));
        }

        let truncated = take_chars(text, keep);
        let min_keep = keep * 8 / 10;
        for boundary in BOUNDARIES {
            if let Some(pos) = truncated.rfind(boundary)
                && truncated[..pos].chars().count() > min_keep
            {
                return truncated[..pos + boundary.len()].to_string();
            }
        }
        truncated.to_string()
    }
}

fn render_all<'a>(components: impl IntoIterator<Item = &'a ContextComponent>) -> String {
    let mut out: String = components
        .into_iter()
        .map(|c| c.render(&c.content))
        .collect();
    out.truncate(out.trim_end().len());
    out
}

fn take_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::token::{TokenizeError, estimate_tokens};

    /// Text of exactly `tokens` tokens once the separator is appended.
    fn body(tokens: usize) -> String {
        "x".repeat(tokens * 4 - SEPARATOR.len())
    }

    fn prose(paragraphs: usize) -> String {
        (0..paragraphs)
            .map(|i| format!("Paragraph {i} explains one idea. It has a second sentence too."))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn manager(limit: usize) -> ContextBudgetManager {
        ContextBudgetManager::new(ModelLimits::new(limit, 0, 0))
    }

    #[test]
    fn model_table_lookup() {
        assert_eq!(ModelLimits::for_model("gpt-4o").usable(), 91_000);
        assert_eq!(ModelLimits::for_model("gpt-4o-mini").usable(), 93_000);
        assert_eq!(ModelLimits::for_model("gpt-4").usable(), 6_192);
        assert_eq!(ModelLimits::for_model("something-else").usable(), 29_000);
    }

    #[test]
    fn config_overrides_table() {
        let config = ContextConfig {
            total_tokens: Some(10_000),
            reserved_for_response: Some(2_000),
            ..ContextConfig::default()
        };
        let limits = ModelLimits::resolve("gpt-4o", &config);
        assert_eq!(limits.total_tokens, 10_000);
        assert_eq!(limits.safety_margin, 5_000);
        assert_eq!(limits.usable(), 3_000);
    }

    #[test]
    fn usable_saturates() {
        assert_eq!(ModelLimits::new(100, 80, 80).usable(), 0);
    }

    #[test]
    fn everything_fits_untouched() {
        let packed = manager(1_000)
            .pack(
                "sys",
                vec![
                    ContextComponent::new("task", "Write the intro.", 1),
                    ContextComponent::new("syllabus", "WLO1: explain", 5).with_heading("**Syllabus Context:**"),
                ],
            )
            .unwrap();
        assert!(!packed.report.truncation_applied);
        assert_eq!(packed.report.tokens_saved, 0);
        assert_eq!(packed.report.original_total, packed.report.final_total);
        assert_eq!(
            packed.user,
            "Write the intro.\n\n**Syllabus Context:**\nWLO1: explain"
        );
    }

    #[test]
    fn components_rendered_in_priority_order() {
        let packed = manager(1_000)
            .pack(
                "",
                vec![
                    ContextComponent::new("template", "T", 6),
                    ContextComponent::new("task", "A", 1),
                    ContextComponent::new("guidelines", "G", 4),
                ],
            )
            .unwrap();
        assert_eq!(packed.user, "A\n\nG\n\nT");
        let names: Vec<_> = packed.report.outcomes.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["task", "guidelines", "template"]);
    }

    #[test]
    fn component_below_floor_is_dropped() {
        // 500 usable; task takes 300, leaving 200. Truncating the 400-token
        // component would leave 150 after the marker buffer, under its floor.
        let packed = manager(500)
            .pack(
                "",
                vec![
                    ContextComponent::new("task", body(300), 1),
                    ContextComponent::new("previous_sections", body(400), 2).with_floor(200),
                ],
            )
            .unwrap();

        let report = &packed.report;
        assert!(report.truncation_applied);
        assert_eq!(report.original_total, 700);
        assert_eq!(report.final_total, 300);
        assert_eq!(report.tokens_saved, 400);
        assert_eq!(report.remaining_headroom, 200);
        assert_eq!(
            report.outcome("previous_sections"),
            Some(ComponentOutcome::Dropped { tokens: 400 })
        );
        assert_eq!(packed.user, body(300));
    }

    #[test]
    fn component_truncated_when_floor_met() {
        let packed = manager(1_000)
            .pack(
                "",
                vec![
                    ContextComponent::new("task", body(300), 1),
                    ContextComponent::new("guidelines", prose(200), 4).with_floor(100),
                ],
            )
            .unwrap();

        match packed.report.outcome("guidelines") {
            Some(ComponentOutcome::Truncated { from, to }) => {
                assert!(to < from);
                assert!(to <= 700);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
        assert!(packed.user.ends_with(TRUNCATION_MARKER.trim_end()));
        assert!(packed.report.final_total <= 1_000);
    }

    #[test]
    fn output_never_exceeds_limit() {
        for limit in [120, 300, 450, 800, 2_000] {
            let packed = manager(limit)
                .pack(
                    "You are a careful writer.",
                    vec![
                        ContextComponent::new("task", "Write section two.", 1),
                        ContextComponent::new("previous_sections", prose(40), 2).with_floor(20),
                        ContextComponent::new("web_results", prose(30), 3),
                        ContextComponent::new("guidelines", prose(60), 4).with_floor(50),
                        ContextComponent::new("template", prose(10), 6).with_heading("**Template:**"),
                    ],
                )
                .unwrap();
            assert!(packed.report.final_total <= limit, "limit {limit}");
            assert!(packed.user.starts_with("Write section two."));
            assert_eq!(
                packed.report.final_total,
                packed.report.system_tokens + estimate_tokens(&packed.user)
            );
        }
    }

    #[test]
    fn repacking_is_a_fixed_point() {
        let budget = manager(400);
        let components = vec![
            ContextComponent::new("task", "Write the summary section.", 1),
            ContextComponent::new("previous_sections", prose(30), 2).with_floor(40),
            ContextComponent::new("guidelines", prose(50), 4),
        ];
        let first = budget.pack("system", components).unwrap();
        assert!(first.report.truncation_applied);

        let second = budget.pack("system", first.kept.clone()).unwrap();
        assert!(!second.report.truncation_applied);
        assert_eq!(second.report.final_total, first.report.final_total);
        assert_eq!(second.user, first.user);
    }

    #[test]
    fn required_overflow_is_an_error() {
        let err = manager(100)
            .pack("", vec![ContextComponent::new("task", body(150), 1)])
            .unwrap_err();
        assert_eq!(
            err,
            BudgetError::Overflow {
                required: 150,
                limit: 100
            }
        );
    }

    #[test]
    fn system_text_counts_against_limit() {
        let err = manager(100)
            .pack(&"s".repeat(300), vec![ContextComponent::new("task", body(30), 1)])
            .unwrap_err();
        assert!(matches!(err, BudgetError::Overflow { required: 105, .. }));
    }

    #[test]
    fn truncate_prefers_paragraph_break() {
        let text = prose(50);
        let out = manager(10_000).truncate_text(&text, 200);
        assert!(out.ends_with("\n\n"));
        assert!(estimate_tokens(&out) <= 200);
        assert!(text.starts_with(&out));
    }

    #[test]
    fn truncate_keeps_at_least_eighty_percent() {
        // One early paragraph break, then a long unbroken run.
        let text = format!("Intro.\n\n{}", "y".repeat(4_000));
        let out = manager(10_000).truncate_text(&text, 500);
        let keep = (text.chars().count() as f64 * (500.0 / estimate_tokens(&text) as f64) * 0.9)
            as usize;
        assert_eq!(out.chars().count(), keep);
    }

    #[test]
    fn short_result_keeps_hundred_chars_with_ellipsis() {
        let text = "z".repeat(400);
        let out = manager(10_000).truncate_text(&text, 10);
        assert_eq!(out, format!("{}...", "z".repeat(100)));
    }

    #[test]
    fn text_within_limit_is_unchanged() {
        assert_eq!(manager(10).truncate_text("short", 10), "short");
    }

    #[test]
    fn failing_counter_uses_estimate() {
        struct Broken;
        impl TokenCounter for Broken {
            fn count(&self, _text: &str) -> Result<usize, TokenizeError> {
                Err(TokenizeError("nope".into()))
            }
        }

        let packed = manager(1_000)
            .with_counter(Arc::new(Broken))
            .pack("abcd", vec![ContextComponent::new("task", "efgh", 1)])
            .unwrap();
        assert_eq!(packed.report.system_tokens, 1);
        assert_eq!(packed.report.final_total, 2);
    }
}
