// src/fs/mod.rs

use std::fmt::Debug;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use anyhow::{Context, Result};
use tokio::io::AsyncWrite;

pub mod mock;

/// Writable stream handed out by [`FileSystem::open_write`].
pub type WriteStream = Box<dyn AsyncWrite + Send + Unpin>;

/// Boxed future returned by the async [`FileSystem`] operations.
pub type FsFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Abstract filesystem interface used by the artifact cache.
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;

    fn create_dir_all<'a>(&'a self, path: &'a Path) -> FsFuture<'a, ()>;

    /// Create (or truncate) `path` and return a stream writing into it.
    fn open_write<'a>(&'a self, path: &'a Path) -> FsFuture<'a, WriteStream>;

    fn rename<'a>(&'a self, from: &'a Path, to: &'a Path) -> FsFuture<'a, ()>;

    fn remove_file<'a>(&'a self, path: &'a Path) -> FsFuture<'a, ()>;
}

/// Implementation that uses `tokio::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all<'a>(&'a self, path: &'a Path) -> FsFuture<'a, ()> {
        Box::pin(async move {
            tokio::fs::create_dir_all(path)
                .await
                .with_context(|| format!("creating dir {:?}", path))
        })
    }

    fn open_write<'a>(&'a self, path: &'a Path) -> FsFuture<'a, WriteStream> {
        Box::pin(async move {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating file {:?}", path))?;
            Ok(Box::new(file) as WriteStream)
        })
    }

    fn rename<'a>(&'a self, from: &'a Path, to: &'a Path) -> FsFuture<'a, ()> {
        Box::pin(async move {
            tokio::fs::rename(from, to)
                .await
                .with_context(|| format!("renaming {:?} to {:?}", from, to))
        })
    }

    fn remove_file<'a>(&'a self, path: &'a Path) -> FsFuture<'a, ()> {
        Box::pin(async move {
            tokio::fs::remove_file(path)
                .await
                .with_context(|| format!("removing file {:?}", path))
        })
    }
}
