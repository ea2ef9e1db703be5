// src/artifact/mod.rs

//! Locally cached artifacts and the stub runner built on top of them.
//!
//! - [`location`] describes where a jar lives and where it comes from.
//! - [`fetch`] provides the `ArtifactFetcher` trait and the `reqwest`-based
//!   `HttpFetcher`.
//! - [`runner`] is the `ArtifactRunner`: check cache, download if missing,
//!   launch and wait for readiness.

pub mod fetch;
pub mod location;
pub mod runner;

pub use fetch::{ArtifactFetcher, DownloadError, DownloadErrorKind, HttpFetcher};
pub use location::{ArtifactLocation, DEFAULT_DOWNLOAD_URL, default_local_path};
pub use runner::{ArtifactRunner, READY_MARKER, RunnerSettings, build_command};
