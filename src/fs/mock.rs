// src/fs/mock.rs

use super::{FileSystem, FsFuture, WriteStream};
use anyhow::anyhow;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir,
}

type Entries = Arc<Mutex<HashMap<PathBuf, MockEntry>>>;

/// In-memory filesystem. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Entries,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut files = lock(&self.files);
        if let Some(parent) = path.parent() {
            ensure_dir_entry(&mut files, parent);
        }
        files.insert(path, MockEntry::File(content.into()));
    }

    /// Contents of the file at `path`, if it is a file.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match lock(&self.files).get(path.as_ref()) {
            Some(MockEntry::File(content)) => Some(content.clone()),
            _ => None,
        }
    }
}

fn lock(files: &Entries) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
    match files.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if path.as_os_str().is_empty() || files.contains_key(path) {
        return;
    }
    files.insert(path.to_path_buf(), MockEntry::Dir);
    if let Some(parent) = path.parent() {
        ensure_dir_entry(files, parent);
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path)
    }

    fn create_dir_all<'a>(&'a self, path: &'a Path) -> FsFuture<'a, ()> {
        Box::pin(async move {
            let mut files = lock(&self.files);
            if let Some(MockEntry::File(_)) = files.get(path) {
                return Err(anyhow!("Is a file: {:?}", path));
            }
            ensure_dir_entry(&mut files, path);
            Ok(())
        })
    }

    fn open_write<'a>(&'a self, path: &'a Path) -> FsFuture<'a, WriteStream> {
        Box::pin(async move {
            if let Some(MockEntry::Dir) = lock(&self.files).get(path) {
                return Err(anyhow!("Is a directory: {:?}", path));
            }
            self.add_file(path, Vec::new());
            Ok(Box::new(MockWriter {
                path: path.to_path_buf(),
                files: Arc::clone(&self.files),
            }) as WriteStream)
        })
    }

    fn rename<'a>(&'a self, from: &'a Path, to: &'a Path) -> FsFuture<'a, ()> {
        Box::pin(async move {
            let mut files = lock(&self.files);
            let entry = files
                .remove(from)
                .ok_or_else(|| anyhow!("File not found: {:?}", from))?;
            files.insert(to.to_path_buf(), entry);
            Ok(())
        })
    }

    fn remove_file<'a>(&'a self, path: &'a Path) -> FsFuture<'a, ()> {
        Box::pin(async move {
            let mut files = lock(&self.files);
            match files.get(path) {
                Some(MockEntry::File(_)) => {
                    files.remove(path);
                    Ok(())
                }
                Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
                None => Err(anyhow!("File not found: {:?}", path)),
            }
        })
    }
}

/// Appends every write to the backing entry, so partial writes are visible.
struct MockWriter {
    path: PathBuf,
    files: Entries,
}

impl AsyncWrite for MockWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut files = lock(&self.files);
        match files.get_mut(&self.path) {
            Some(MockEntry::File(content)) => {
                content.extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
            _ => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file vanished while writing: {:?}", self.path),
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn writes_are_visible_and_rename_moves_them() {
        let fs = MockFileSystem::new();
        let part = PathBuf::from("/cache/stub-runner.jar.part");
        let dest = PathBuf::from("/cache/stub-runner.jar");

        let mut writer = fs.open_write(&part).await.unwrap();
        writer.write_all(b"fake ").await.unwrap();
        writer.write_all(b"jar").await.unwrap();
        writer.shutdown().await.unwrap();

        assert!(fs.exists(Path::new("/cache")));
        assert_eq!(fs.contents(&part).unwrap(), b"fake jar");

        fs.rename(&part, &dest).await.unwrap();
        assert!(!fs.exists(&part));
        assert_eq!(fs.contents(&dest).unwrap(), b"fake jar");
    }

    #[tokio::test]
    async fn remove_missing_file_fails() {
        let fs = MockFileSystem::new();
        assert!(fs.remove_file(Path::new("nope")).await.is_err());
    }
}
