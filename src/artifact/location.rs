// src/artifact/location.rs

use std::ffi::OsString;
use std::path::PathBuf;

/// Maven Central location of the Spring Cloud Contract stub runner jar.
pub const DEFAULT_DOWNLOAD_URL: &str = "https://repo1.maven.org/maven2/org/springframework/cloud/spring-cloud-contract-stub-runner-boot/2.0.0.RELEASE/spring-cloud-contract-stub-runner-boot-2.0.0.RELEASE.jar";

/// File name used for the cached jar in the temp directory.
pub const DEFAULT_JAR_NAME: &str = "stub-runner.jar";

/// `<temp_dir>/stub-runner.jar`
pub fn default_local_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_JAR_NAME)
}

/// Where an artifact should live locally and where to fetch it from.
///
/// A file at `local_path` is trusted as-is; there is no checksum or version
/// check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub local_path: PathBuf,
    pub remote_url: String,
}

impl ArtifactLocation {
    pub fn new(local_path: impl Into<PathBuf>, remote_url: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            remote_url: remote_url.into(),
        }
    }

    /// Sibling path the download is streamed into before being renamed.
    pub fn partial_path(&self) -> PathBuf {
        let mut name = self
            .local_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from(DEFAULT_JAR_NAME));
        name.push(".part");
        self.local_path.with_file_name(name)
    }
}

impl Default for ArtifactLocation {
    fn default() -> Self {
        Self::new(default_local_path(), DEFAULT_DOWNLOAD_URL)
    }
}
