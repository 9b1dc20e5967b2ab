//! File-backed secret store.

use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;

use super::{SecretError, SecretResult, SecretStore, strip_trailing_newline};
use crate::provider::BoxFuture;

/// Stores each secret in its own file under a root directory.
///
/// Secret names are treated as relative paths, so `/calendar/token` lives
/// at `<root>/calendar/token`. Each write goes to its own temp file in the
/// target directory and is renamed into place, so concurrent writers never
/// clobber each other and readers see either the old or the new value.
/// Files get `0600` permissions on Unix.
///
/// Reads drop one trailing newline, matching [`super::PassSecretStore`], so
/// a value written with `echo` compares equal to the bare string.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    root: PathBuf,
}

impl FileSecretStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a secret name to its file, refusing names that escape the root.
    pub fn path_for(&self, name: &str) -> SecretResult<PathBuf> {
        let relative = Path::new(name.trim_start_matches('/'));
        let mut path = self.root.clone();
        let mut depth = 0;

        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(SecretError::access_denied(
                        name,
                        "secret name escapes the store root",
                    ));
                }
            }
        }

        if depth == 0 {
            return Err(SecretError::not_found(name));
        }
        Ok(path)
    }

    async fn read(&self, name: &str) -> SecretResult<String> {
        let path = self.path_for(name)?;
        match fs::read_to_string(&path).await {
            Ok(value) => {
                debug!("read secret {} from {:?}", name, path);
                Ok(strip_trailing_newline(value))
            }
            Err(e) => Err(map_io_error(name, e)),
        }
    }

    async fn write(&self, name: &str, value: &str) -> SecretResult<()> {
        let path = self.path_for(name)?;
        let dir = path
            .parent()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| map_io_error(name, e))?;

        let target = path.clone();
        let contents = value.to_owned();
        tokio::task::spawn_blocking(move || replace_file(&dir, &target, contents.as_bytes()))
            .await
            .map_err(|e| SecretError::io(name, io::Error::other(e)))?
            .map_err(|e| map_io_error(name, e))?;

        debug!("saved secret {} to {:?}", name, path);
        Ok(())
    }
}

/// Writes `contents` to a fresh temp file in `dir`, then renames it over
/// `target`.
fn replace_file(dir: &Path, target: &Path, contents: &[u8]) -> io::Result<()> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    restrict_permissions(temp.path())?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

impl SecretStore for FileSecretStore {
    fn get<'a>(&'a self, name: &'a str) -> BoxFuture<'a, SecretResult<String>> {
        Box::pin(self.read(name))
    }

    fn put<'a>(&'a self, name: &'a str, value: &'a str) -> BoxFuture<'a, SecretResult<()>> {
        Box::pin(self.write(name, value))
    }
}

fn map_io_error(name: &str, err: io::Error) -> SecretError {
    match err.kind() {
        io::ErrorKind::NotFound => SecretError::not_found(name),
        io::ErrorKind::PermissionDenied => SecretError::access_denied(name, err.to_string()),
        _ => SecretError::io(name, err),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}
