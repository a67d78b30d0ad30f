use std::path::PathBuf;
use std::process::Command;

use image::RgbImage;
use log::debug;

use crate::config::Config;
use crate::error::MatcherError;
use crate::policy::CandidateResult;

pub type Frame = RgbImage;

/// External face-matching service, one query per frame. Returns the
/// top-ranked candidate, or `None` when nothing in the gallery is close.
pub trait MatchingService {
    fn find_candidate(&mut self, frame: &Frame) -> Result<Option<CandidateResult>, MatcherError>;
}

/// Shells out to a recognizer executable: the frame goes in as a PNG file,
/// a ranked JSON array of candidates comes back on stdout. Model and
/// backend identifiers are passed through without interpretation.
pub struct CommandMatcher {
    command: String,
    model: String,
    detector_backend: String,
    work_dir: PathBuf,
}

impl CommandMatcher {
    pub fn new(cfg: &Config) -> Self {
        Self {
            command: cfg.matcher_command.clone(),
            model: cfg.model.clone(),
            detector_backend: cfg.detector_backend.clone(),
            work_dir: std::env::temp_dir(),
        }
    }

    fn parse_candidates(stdout: &[u8]) -> Result<Vec<CandidateResult>, MatcherError> {
        let candidates: Vec<CandidateResult> = serde_json::from_slice(stdout)?;
        for c in &candidates {
            if let Some(d) = c.distance {
                if !(d >= 0.0) {
                    return Err(MatcherError::InvalidCandidate(format!(
                        "negative or NaN distance {d}"
                    )));
                }
            }
        }
        Ok(candidates)
    }
}

impl MatchingService for CommandMatcher {
    fn find_candidate(&mut self, frame: &Frame) -> Result<Option<CandidateResult>, MatcherError> {
        let frame_path = self
            .work_dir
            .join(format!("facegate-{}.png", uuid::Uuid::new_v4()));
        frame.save(&frame_path)?;

        let output = Command::new(&self.command)
            .arg("--model")
            .arg(&self.model)
            .arg("--detector-backend")
            .arg(&self.detector_backend)
            .arg(&frame_path)
            .output();
        // Best-effort cleanup.
        let _ = std::fs::remove_file(&frame_path);

        let output = output.map_err(|source| MatcherError::Spawn {
            command: self.command.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(MatcherError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let candidates = Self::parse_candidates(&output.stdout)?;
        debug!("recognizer returned {} candidate(s)", candidates.len());
        Ok(candidates.into_iter().next())
    }
}
