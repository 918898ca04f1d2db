//! Configuration loading, validation, and management for weekforge.
//!
//! Loads configuration from `./weekforge.toml` with environment variable
//! overrides, and the week's section list from `sections.toml`. Validates all
//! settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use weekforge_core::section::{SectionConstraints, SectionSpec};

/// Default config file name, resolved against the working directory.
pub const CONFIG_FILE: &str = "weekforge.toml";

/// Default section list file name.
pub const SECTIONS_FILE: &str = "sections.toml";

/// The root configuration structure.
///
/// Maps directly to `weekforge.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the generation service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Azure deployment settings; when present they take precedence over `api_url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureConfig>,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub roles: RolesConfig,

    #[serde(default)]
    pub verification: VerificationConfig,

    #[serde(default)]
    pub freshness: FreshnessConfig,

    /// Key for the web search service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_api_key: Option<String>,

    #[serde(default)]
    pub paths: PathsConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("azure", &self.azure)
            .field("pipeline", &self.pipeline)
            .field("context", &self.context)
            .field("roles", &self.roles)
            .field("verification", &self.verification)
            .field("freshness", &self.freshness)
            .field("search_api_key", &redact(&self.search_api_key))
            .field("paths", &self.paths)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    pub endpoint: String,
    pub deployment: String,
    #[serde(default = "default_azure_api_version")]
    pub api_version: String,
}

fn default_azure_api_version() -> String {
    "2024-08-01-preview".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Write/review cycles required before a section may be accepted
    #[serde(default = "default_min_iterations")]
    pub min_iterations: u32,

    /// Revision count at which a section is force-accepted
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,

    /// Whole-document coherence review passes
    #[serde(default = "default_coherence_passes")]
    pub coherence_passes: u32,

    /// Dimension scores at or above this are marked "preserve"
    #[serde(default = "default_preserve_threshold")]
    pub preserve_score_threshold: f32,

    /// Drop in combined score tolerated before rolling back
    #[serde(default = "default_regression_tolerance")]
    pub regression_tolerance: f32,
}

fn default_min_iterations() -> u32 {
    3
}
fn default_max_revisions() -> u32 {
    5
}
fn default_coherence_passes() -> u32 {
    2
}
fn default_preserve_threshold() -> f32 {
    7.0
}
fn default_regression_tolerance() -> f32 {
    0.5
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_iterations: default_min_iterations(),
            max_revisions: default_max_revisions(),
            coherence_passes: default_coherence_passes(),
            preserve_score_threshold: default_preserve_threshold(),
            regression_tolerance: default_regression_tolerance(),
        }
    }
}

/// Context window overrides. Unset limits come from the model table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_margin: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_for_response: Option<usize>,

    /// Tokens held back for the truncation marker
    #[serde(default = "default_truncation_buffer")]
    pub truncation_buffer: usize,
}

fn default_truncation_buffer() -> usize {
    50
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            total_tokens: None,
            safety_margin: None,
            reserved_for_response: None,
            truncation_buffer: default_truncation_buffer(),
        }
    }
}

/// Sampling settings for one generation role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl RoleConfig {
    pub const fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesConfig {
    #[serde(default = "default_writer_role")]
    pub writer: RoleConfig,
    #[serde(default = "default_compliance_role")]
    pub compliance: RoleConfig,
    #[serde(default = "default_learner_role")]
    pub learner: RoleConfig,
    #[serde(default = "default_coherence_role")]
    pub coherence: RoleConfig,
}

fn default_writer_role() -> RoleConfig {
    RoleConfig::new(0.7, 4000)
}
fn default_compliance_role() -> RoleConfig {
    RoleConfig::new(0.3, 2000)
}
fn default_learner_role() -> RoleConfig {
    RoleConfig::new(0.5, 2000)
}
fn default_coherence_role() -> RoleConfig {
    RoleConfig::new(0.3, 2000)
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            writer: default_writer_role(),
            compliance: default_compliance_role(),
            learner: default_learner_role(),
            coherence: default_coherence_role(),
        }
    }
}

impl RolesConfig {
    fn iter(&self) -> impl Iterator<Item = (&'static str, &RoleConfig)> {
        [
            ("writer", &self.writer),
            ("compliance", &self.compliance),
            ("learner", &self.learner),
            ("coherence", &self.coherence),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Run link and dataset checks before the learner review
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Independent rounds a link must pass
    #[serde(default = "default_link_rounds")]
    pub link_rounds: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Domains where HTTP 403 still counts as a working link
    #[serde(default = "default_paywalled_domains")]
    pub paywalled_domains: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_link_rounds() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_paywalled_domains() -> Vec<String> {
    [
        "ieee.org",
        "acm.org",
        "springer.com",
        "sciencedirect.com",
        "jstor.org",
        "wiley.com",
        "nature.com",
        "science.org",
        "arxiv.org",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            link_rounds: default_link_rounds(),
            timeout_secs: default_timeout_secs(),
            paywalled_domains: default_paywalled_domains(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessConfig {
    /// Words in a section description that trigger a web search
    #[serde(default = "default_freshness_keywords")]
    pub keywords: Vec<String>,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_freshness_keywords() -> Vec<String> {
    [
        "latest",
        "current",
        "recent",
        "trends",
        "state-of-the-art",
        "emerging",
        "new developments",
        "2024",
        "2025",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_top_k() -> usize {
    3
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            keywords: default_freshness_keywords(),
            top_k: default_top_k(),
        }
    }
}

impl FreshnessConfig {
    /// Whether a section description asks for up-to-date material.
    pub fn wants_search(&self, description: &str) -> bool {
        let lower = description.to_lowercase();
        self.keywords
            .iter()
            .any(|k| lower.contains(&k.to_lowercase()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Syllabus, template, and guidelines
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_run_logs_dir")]
    pub run_logs_dir: PathBuf,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_run_logs_dir() -> PathBuf {
    PathBuf::from("run_logs")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            run_logs_dir: default_run_logs_dir(),
        }
    }
}

impl PathsConfig {
    pub fn syllabus(&self) -> PathBuf {
        self.input_dir.join("syllabus.md")
    }

    pub fn template(&self) -> PathBuf {
        self.input_dir.join("template.md")
    }

    pub fn guidelines(&self) -> PathBuf {
        self.input_dir.join("guidelines.md")
    }

    pub fn sections_dir(&self) -> PathBuf {
        self.output_dir.join("sections")
    }

    pub fn weekly_dir(&self) -> PathBuf {
        self.output_dir.join("weekly")
    }
}

impl AppConfig {
    /// Load configuration from `./weekforge.toml`.
    ///
    /// Also checks environment variables:
    /// - `WEEKFORGE_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `WEEKFORGE_MODEL`
    /// - `WEEKFORGE_API_URL`
    /// - `TAVILY_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(Path::new(CONFIG_FILE))
    }

    /// Load from `path` and apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if let Ok(key) = std::env::var("WEEKFORGE_API_KEY") {
            config.api_key = Some(key);
        } else if config.api_key.is_none() {
            config.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        if let Ok(model) = std::env::var("WEEKFORGE_MODEL") {
            config.default_model = model;
        }

        if let Ok(url) = std::env::var("WEEKFORGE_API_URL") {
            config.api_url = url;
        }

        if config.search_api_key.is_none() {
            config.search_api_key = std::env::var("TAVILY_API_KEY").ok();
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, role) in self.roles.iter() {
            if !(0.0..=2.0).contains(&role.temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "roles.{name}.temperature must be between 0.0 and 2.0"
                )));
            }
        }

        if self.pipeline.max_revisions == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_revisions must be >= 1".into(),
            ));
        }

        if self.pipeline.min_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.min_iterations must be >= 1".into(),
            ));
        }

        if self.verification.link_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "verification.link_rounds must be >= 1".into(),
            ));
        }

        if let Some(total) = self.context.total_tokens {
            let margin = self.context.safety_margin.unwrap_or(0);
            let reserved = self.context.reserved_for_response.unwrap_or(0);
            if total <= margin + reserved {
                return Err(ConfigError::ValidationError(
                    "context.total_tokens must exceed safety_margin + reserved_for_response".into(),
                ));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            default_model: default_model(),
            azure: None,
            pipeline: PipelineConfig::default(),
            context: ContextConfig::default(),
            roles: RolesConfig::default(),
            verification: VerificationConfig::default(),
            freshness: FreshnessConfig::default(),
            search_api_key: None,
            paths: PathsConfig::default(),
        }
    }
}

// ── Section list ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SectionsFile {
    #[serde(default)]
    sections: Vec<SectionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SectionEntry {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    constraints: SectionConstraints,
}

/// Load the ordered section list. Ordinals follow file order, starting at 1.
///
/// A missing file yields [`default_sections`].
pub fn load_sections(path: &Path) -> Result<Vec<SectionSpec>, ConfigError> {
    if !path.exists() {
        tracing::info!(
            "No section list at {}, using the default eight sections",
            path.display()
        );
        return Ok(default_sections());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    parse_sections(&content).map_err(|reason| ConfigError::ParseError {
        path: path.to_path_buf(),
        reason,
    })
}

fn parse_sections(content: &str) -> Result<Vec<SectionSpec>, String> {
    let file: SectionsFile = toml::from_str(content).map_err(|e| e.to_string())?;

    let mut seen = std::collections::HashSet::new();
    for entry in &file.sections {
        if !seen.insert(entry.id.as_str()) {
            return Err(format!("duplicate section id '{}'", entry.id));
        }
    }

    Ok(file
        .sections
        .into_iter()
        .enumerate()
        .map(|(i, e)| SectionSpec {
            id: e.id,
            title: e.title,
            description: e.description,
            ordinal: i + 1,
            constraints: e.constraints,
        })
        .collect())
}

/// The built-in week layout.
pub fn default_sections() -> Vec<SectionSpec> {
    [
        ("01-introduction", "Introduction", "Course overview and context"),
        (
            "02-learning-objectives",
            "Weekly Learning Objectives",
            "Learning outcomes",
        ),
        ("03-required-reading", "Required Reading", "Essential materials"),
        ("04-lecture-notes", "Lecture Notes", "Core content"),
        ("05-learning-activities", "Learning Activities", "Exercises"),
        (
            "06-assessment-rubric",
            "Assessment & Rubric",
            "Evaluation criteria",
        ),
        (
            "07-further-reading",
            "Further Reading & Links",
            "Additional resources",
        ),
        ("08-summary", "Summary & Next Steps", "Week recap"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (id, title, description))| {
        SectionSpec::new(id, title)
            .with_description(description)
            .with_ordinal(i + 1)
    })
    .collect()
}

/// TOML for the default section list (for the `init` command).
pub fn default_sections_toml() -> String {
    let file = SectionsFile {
        sections: default_sections()
            .into_iter()
            .map(|s| SectionEntry {
                id: s.id,
                title: s.title,
                description: s.description,
                constraints: s.constraints,
            })
            .collect(),
    };
    toml::to_string_pretty(&file).unwrap_or_default()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
