// src/config/validate.rs

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::config::model::{
    ArtifactSection, ConfigFile, RawArtifactSection, RawConfigFile, RawRunnerSection,
    RunnerSection,
};
use crate::errors::{Result, StubRunnerError};

/// Characters allowed in a stub id list. The ids are interpolated into a
/// shell command unquoted.
const STUB_IDS_PATTERN: &str = r"^[A-Za-z0-9_.:+\-,]+$";

static STUB_IDS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(STUB_IDS_PATTERN).ok());

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::StubRunnerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let artifact = validate_artifact(raw.artifact)?;
        let runner = validate_runner(raw.runner)?;
        Ok(ConfigFile::new_unchecked(artifact, runner))
    }
}

fn validate_artifact(raw: RawArtifactSection) -> Result<ArtifactSection> {
    let defaults = ArtifactSection::default();

    let local_path = match raw.local_path {
        Some(path) if path.as_os_str().is_empty() => {
            return Err(StubRunnerError::ConfigError(
                "[artifact].local_path must not be empty".to_string(),
            ));
        }
        Some(path) => path,
        None => defaults.local_path,
    };

    let download_url = match raw.download_url {
        Some(url) => {
            validate_download_url(&url)?;
            url
        }
        None => defaults.download_url,
    };

    Ok(ArtifactSection {
        local_path,
        download_url,
    })
}

fn validate_runner(raw: RawRunnerSection) -> Result<RunnerSection> {
    let java = raw.java.unwrap_or_else(|| "java".to_string());
    if java.trim().is_empty() {
        return Err(StubRunnerError::ConfigError(
            "[runner].java must not be empty".to_string(),
        ));
    }

    let ready_timeout = raw
        .ready_timeout
        .as_deref()
        .map(|s| {
            parse_duration(s).map_err(|e| {
                StubRunnerError::ConfigError(format!("[runner].ready_timeout: {e}"))
            })
        })
        .transpose()?;

    Ok(RunnerSection {
        java,
        show_output: raw.show_output,
        ready_timeout,
    })
}

/// Only absolute `http`/`https` URLs can be downloaded.
pub fn validate_download_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| StubRunnerError::ConfigError(format!("invalid download url '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(StubRunnerError::ConfigError(format!(
            "download url '{url}' has unsupported scheme '{other}' (expected http or https)"
        ))),
    }
}

/// Reject stub id lists that are empty or could break out of the command line.
pub fn validate_stub_ids(ids: &str) -> Result<()> {
    let re = STUB_IDS_RE.as_ref().ok_or_else(|| {
        StubRunnerError::Other(anyhow::anyhow!("invalid stub id pattern {STUB_IDS_PATTERN}"))
    })?;
    if re.is_match(ids) {
        Ok(())
    } else {
        Err(StubRunnerError::InvalidRequest(format!(
            "stub ids '{ids}' must be non-empty and contain only letters, digits and _ . : + - ,"
        )))
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let seconds_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration too large: '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_with_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn durations_without_unit_or_number_are_rejected() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        assert!(parse_duration("6000000000000000000h").is_err());
        assert!(parse_duration("400000000000000000m").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s"),
            Ok(Duration::from_secs(u64::MAX))
        );
        assert!(parse_duration("18446744073709551616s").is_err());
    }

    #[test]
    fn stub_id_pattern_compiles() {
        assert!(STUB_IDS_RE.is_some());
    }

    #[test]
    fn stub_ids_are_restricted_to_coordinates() {
        assert!(validate_stub_ids("com.example:demo:+:stubs").is_ok());
        assert!(validate_stub_ids("a:b:1.0.0-SNAPSHOT:stubs:8080,c:d:+:stubs").is_ok());
        assert!(validate_stub_ids("").is_err());
        assert!(validate_stub_ids("a:b; rm -rf /").is_err());
        assert!(validate_stub_ids("a b").is_err());
    }

    #[test]
    fn download_url_must_be_http() {
        assert!(validate_download_url("https://example.com/runner.jar").is_ok());
        assert!(validate_download_url("http://localhost:8080/x.jar").is_ok());
        assert!(validate_download_url("ftp://example.com/x.jar").is_err());
        assert!(validate_download_url("not a url").is_err());
    }
}
