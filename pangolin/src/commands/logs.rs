use std::fs::{self, File};
use std::future::Future;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::supervisor::read_tail;
use crate::tunnel::shutdown_signal;

const FOLLOW_INTERVAL: Duration = Duration::from_millis(250);

pub fn run(
    log_file: Option<&PathBuf>,
    lines: usize,
    follow: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::client_log_path(log_file)?;
    if !path.exists() {
        return Err(format!(
            "Log file not found: {} (start a client with 'pangolin up client -d')",
            path.display()
        )
        .into());
    }

    for line in read_tail(&path, lines) {
        println!("{line}");
    }

    if follow {
        let rt = tokio::runtime::Runtime::new()?;
        let mut stdout = std::io::stdout();
        rt.block_on(follow_file(&path, &mut stdout, FOLLOW_INTERVAL, shutdown_signal()))?;
    }
    Ok(())
}

/// Identity of the file currently at a path, to notice rotation.
#[cfg(unix)]
fn file_identity(meta: &fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn file_identity(_meta: &fs::Metadata) -> Option<(u64, u64)> {
    None
}

/// Tails a log file that may be rotated or truncated underneath us.
struct Follower {
    path: PathBuf,
    file: Option<File>,
    identity: Option<(u64, u64)>,
    pos: u64,
}

impl Follower {
    /// Start at the current end of `path`, if it exists.
    fn at_end(path: &Path) -> std::io::Result<Self> {
        let mut follower = Self {
            path: path.to_path_buf(),
            file: None,
            identity: None,
            pos: 0,
        };
        if let Ok(mut file) = File::open(path) {
            follower.pos = file.seek(SeekFrom::End(0))?;
            follower.identity = file.metadata().ok().as_ref().and_then(file_identity);
            follower.file = Some(file);
        }
        Ok(follower)
    }

    fn poll(&mut self, out: &mut impl Write) -> std::io::Result<()> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let identity = file_identity(&meta);
        if self.file.is_none() || identity != self.identity {
            // Finish whatever was appended to the old file before switching.
            self.drain(out)?;
            self.file = Some(File::open(&self.path)?);
            self.identity = identity;
            self.pos = 0;
        } else if meta.len() < self.pos {
            tracing::debug!(path = %self.path.display(), "log file truncated");
            self.pos = 0;
        }
        self.drain(out)
    }

    fn drain(&mut self, out: &mut impl Write) -> std::io::Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        file.seek(SeekFrom::Start(self.pos))?;
        let mut buf = Vec::new();
        self.pos += file.read_to_end(&mut buf)? as u64;
        if !buf.is_empty() {
            out.write_all(&buf)?;
            out.flush()?;
        }
        Ok(())
    }
}

/// Copy new data appended to `path` into `out` until `cancel` resolves.
pub async fn follow_file<W, F>(
    path: &Path,
    out: &mut W,
    interval: Duration,
    cancel: F,
) -> std::io::Result<()>
where
    W: Write,
    F: Future<Output = ()>,
{
    let mut follower = Follower::at_end(path)?;
    let mut cancel = std::pin::pin!(cancel);
    loop {
        tokio::select! {
            biased;
            _ = &mut cancel => return Ok(()),
            _ = tokio::time::sleep(interval) => follower.poll(&mut *out)?,
        }
    }
}
