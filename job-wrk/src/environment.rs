//! Scoped, ephemeral installation of a task's declared package environment.
//!
//! The installed location is released on every exit path: it lives in a
//! [`tempfile::TempDir`], whose `Drop` implementation removes it regardless
//! of whether the caller returns normally, via `?`, or unwinds.

use std::process::Stdio;

use log::debug;
use tempfile::TempDir;
use tokio::process::Command;

use specifications::task::TaskEnvironment;

use crate::errors::WrkError;

const DEFAULT_INSTALL_BIN: &str = "pip";


/***** LIBRARY *****/
/// A task's installed environment: the directory packages were installed
/// into, kept alive for as long as the task runs. Dropping this removes the
/// directory.
pub struct EnvGuard {
    dir: TempDir,
}

impl EnvGuard {
    /// The directory executables and importable packages should be found
    /// under; callers extend their search path (`PATH`/`PYTHONPATH`-alike)
    /// with this before invoking the entrypoint.
    pub fn path(&self) -> &std::path::Path { self.dir.path() }
}

/// Installs `environment`'s declared packages into a fresh scratch
/// directory. An environment with no packages still gets a (trivially
/// empty) directory, so the caller's logic does not need a special case.
/// `install_bin` overrides the package-install binary, e.g. from
/// `JOB_WRK_INSTALL_BIN`.
pub async fn install(environment: &TaskEnvironment, install_bin: Option<&str>) -> Result<EnvGuard, WrkError> {
    let dir = TempDir::new().map_err(|e| WrkError::Resource(format!("creating environment scratch dir: {e}")))?;

    if !environment.packages.is_empty() {
        let bin = install_bin.unwrap_or(DEFAULT_INSTALL_BIN);
        debug!("installing {} package(s) via '{bin}' into {}", environment.packages.len(), dir.path().display());

        let status = Command::new(bin)
            .arg("install")
            .arg("--target")
            .arg(dir.path())
            .args(&environment.packages)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .status()
            .await
            .map_err(|e| WrkError::Resource(format!("spawning '{bin}': {e}")))?;

        if !status.success() {
            return Err(WrkError::Resource(format!("'{bin}' exited with {status} installing {:?}", environment.packages)));
        }
    }

    Ok(EnvGuard { dir })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_environment_still_yields_a_usable_directory() {
        let env = TaskEnvironment::default();
        let guard = install(&env, None).await.unwrap();
        assert!(guard.path().is_dir());
    }
}
