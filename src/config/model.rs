// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::artifact::{ArtifactLocation, DEFAULT_DOWNLOAD_URL, RunnerSettings, default_local_path};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [artifact]
/// local_path = "/tmp/stub-runner.jar"
/// download_url = "https://repo1.maven.org/..."
///
/// [runner]
/// java = "java"
/// show_output = false
/// ready_timeout = "120s"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub artifact: RawArtifactSection,

    #[serde(default)]
    pub runner: RawRunnerSection,
}

/// `[artifact]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawArtifactSection {
    /// Where the jar is cached. Defaults to `<temp_dir>/stub-runner.jar`.
    #[serde(default)]
    pub local_path: Option<PathBuf>,

    /// Where the jar is downloaded from when it is not cached.
    #[serde(default)]
    pub download_url: Option<String>,
}

/// `[runner]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawRunnerSection {
    /// Java binary; `"java"` if unset.
    #[serde(default)]
    pub java: Option<String>,

    /// Echo the stub runner's stdout.
    #[serde(default)]
    pub show_output: bool,

    /// Duration string (e.g. `"90s"`, `"2m"`). Unset means wait forever.
    #[serde(default)]
    pub ready_timeout: Option<String>,
}

/// Validated configuration. Build it through `ConfigFile::try_from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub artifact: ArtifactSection,
    pub runner: RunnerSection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSection {
    pub local_path: PathBuf,
    pub download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSection {
    pub java: String,
    pub show_output: bool,
    pub ready_timeout: Option<Duration>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(artifact: ArtifactSection, runner: RunnerSection) -> Self {
        Self { artifact, runner }
    }

    pub fn location(&self) -> ArtifactLocation {
        ArtifactLocation::new(self.artifact.local_path.clone(), self.artifact.download_url.clone())
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            location: self.location(),
            java: self.runner.java.clone(),
        }
    }
}

impl Default for ArtifactSection {
    fn default() -> Self {
        Self {
            local_path: default_local_path(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
        }
    }
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            java: "java".to_string(),
            show_output: false,
            ready_timeout: None,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(ArtifactSection::default(), RunnerSection::default())
    }
}
