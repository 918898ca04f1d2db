//! Loading the config, section list, and course files shared by commands.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use weekforge_agent::CourseInputs;
use weekforge_config::{AppConfig, CONFIG_FILE, ConfigError, PathsConfig, SECTIONS_FILE};
use weekforge_core::section::SectionSpec;

pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(|| PathBuf::from(CONFIG_FILE), Path::to_path_buf)
}

/// Load `--config` (or `./weekforge.toml`) with environment overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    AppConfig::load_with_env(&config_path(explicit))
}

pub fn load_sections(explicit: Option<&Path>) -> Result<Vec<SectionSpec>, ConfigError> {
    let path = explicit.map_or_else(|| PathBuf::from(SECTIONS_FILE), Path::to_path_buf);
    weekforge_config::load_sections(&path)
}

/// Read a UTF-8 input file. A missing or unreadable file is empty.
pub fn read_input(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            debug!(path = %path.display(), bytes = text.len(), "Read input");
            text
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Input unavailable, continuing without it");
            String::new()
        }
    }
}

pub fn course_inputs(paths: &PathsConfig) -> CourseInputs {
    CourseInputs {
        syllabus: read_input(&paths.syllabus()),
        template: read_input(&paths.template()),
        guidelines: read_input(&paths.guidelines()),
    }
}

/// Title from a `### Week N: Title` heading, if the block starts with one.
pub fn week_title(block: &str) -> Option<String> {
    let heading = block.lines().next()?.trim_start_matches('#').trim();
    let (_, title) = heading.split_once(':')?;
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}
