use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::CaptureError;
use crate::matcher::Frame;

/// On-demand frame supplier. `Ok(None)` means the stream is exhausted and
/// the verification loop should wind down.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}

/// Consumes frames an external capture daemon drops into a spool directory.
/// Files are taken oldest-name-first and removed once read, so each frame is
/// sampled at most once.
pub struct FrameSpool {
    dir: PathBuf,
    idle_timeout: Duration,
}

impl FrameSpool {
    /// `idle_timeout` bounds how long an empty spool is polled before the
    /// stream counts as ended. The loop's stop flag is only checked between
    /// frames, so this must stay finite.
    pub fn new(dir: &Path, idle_timeout: Duration) -> Self {
        Self {
            dir: dir.to_path_buf(),
            idle_timeout,
        }
    }

    fn oldest_file(&self) -> Result<Option<PathBuf>, CaptureError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| CaptureError::Spool {
            path: self.dir.clone(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        Ok(files.into_iter().next())
    }
}

impl FrameSource for FrameSpool {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let deadline = Instant::now() + self.idle_timeout;
        loop {
            let Some(path) = self.oldest_file()? else {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                std::thread::sleep(Duration::from_millis(100));
                continue;
            };
            match image::open(&path) {
                Ok(img) => {
                    std::fs::remove_file(&path).map_err(|source| CaptureError::Spool {
                        path: path.clone(),
                        source,
                    })?;
                    debug!("sampled frame {}", path.display());
                    return Ok(Some(img.to_rgb8()));
                }
                // An undecodable file must not wedge the spool: drop it and
                // move on to the next frame.
                Err(e) => {
                    warn!("dropping undecodable frame {}: {e}", path.display());
                    std::fs::remove_file(&path).map_err(|source| CaptureError::Spool {
                        path: path.clone(),
                        source,
                    })?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_spool_oldest_first_then_reports_exhaustion() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["0002.png", "0001.png"] {
            let img = Frame::from_pixel(2, 2, image::Rgb([name.as_bytes()[3], 0, 0]));
            img.save(dir.path().join(name)).unwrap();
        }
        let mut spool = FrameSpool::new(dir.path(), Duration::ZERO);
        let first = spool.next_frame().unwrap().unwrap();
        assert_eq!(first.get_pixel(0, 0).0[0], b'1');
        assert!(spool.next_frame().unwrap().is_some());
        assert!(spool.next_frame().unwrap().is_none());
    }

    #[test]
    fn undecodable_file_is_dropped_and_the_spool_keeps_flowing() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["0001.png", "0003.png"] {
            Frame::new(2, 2).save(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("0002.png"), b"not an image").unwrap();

        let mut spool = FrameSpool::new(dir.path(), Duration::ZERO);
        assert!(spool.next_frame().unwrap().is_some());
        assert!(spool.next_frame().unwrap().is_some());
        assert!(spool.next_frame().unwrap().is_none());
        // The garbage file was consumed, not left to poison a restart.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_spool_dir_is_a_capture_error() {
        let mut spool = FrameSpool::new(Path::new("/nonexistent/facegate-spool"), Duration::ZERO);
        assert!(spool.next_frame().is_err());
    }
}
