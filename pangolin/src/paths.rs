use std::path::PathBuf;
#[cfg(test)]
use std::sync::{Mutex, MutexGuard, OnceLock};

pub const HOME_ENV: &str = "PANGOLIN_HOME";

/// Get Pangolin's home directory.
///
/// `PANGOLIN_HOME` wins when set; otherwise `~/.pangolin`.
pub fn pangolin_home_dir() -> Result<PathBuf, std::io::Error> {
    if let Ok(v) = std::env::var(HOME_ENV)
        && !v.trim().is_empty()
    {
        return Ok(PathBuf::from(v));
    }

    let home = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        )
    })?;

    Ok(home.join(".pangolin"))
}

/// `~/.pangolin/config.toml`
pub fn config_path() -> Result<PathBuf, std::io::Error> {
    Ok(pangolin_home_dir()?.join("config.toml"))
}

/// Directory holding the active client log and its rotated siblings.
pub fn logs_dir() -> Result<PathBuf, std::io::Error> {
    Ok(pangolin_home_dir()?.join("logs"))
}

/// Log file used by a detached client when `--log-file` is not given.
pub fn default_client_log_path() -> Result<PathBuf, std::io::Error> {
    Ok(logs_dir()?.join("client.log"))
}

#[cfg(test)]
pub(crate) fn test_home_env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
