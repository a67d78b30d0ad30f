use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Face bounding box in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Default for Region {
    // Overlay position used when the matcher reports no box.
    fn default() -> Self {
        Self {
            x: 50,
            y: 50,
            w: 200,
            h: 200,
        }
    }
}

/// Top-ranked match reported by the external recognizer for one frame.
/// Lives for a single loop iteration; never persisted as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateResult {
    pub identity: Option<String>,
    pub distance: Option<f64>,
    pub threshold: Option<f64>,
    #[serde(default)]
    pub region: Option<Region>,
}

/// Outcome of the threshold rule, plus what the audit trail needs.
/// The identity is carried only on a match; a rejected candidate stays
/// anonymous in the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub matched: bool,
    pub identity: Option<String>,
    pub distance: Option<f64>,
}

impl Decision {
    fn unmatched(distance: Option<f64>) -> Self {
        Self {
            matched: false,
            identity: None,
            distance,
        }
    }
}

/// Accept or reject a candidate. Pure: no I/O, no hidden state.
///
/// Rule order: the candidate's own threshold when present and
/// `use_source_threshold` is set, else the configured fallback, else
/// unmatched. Comparison is inclusive at the boundary so an
/// exact-threshold match is accepted.
pub fn decide(candidate: Option<&CandidateResult>, cfg: &Config) -> Decision {
    let Some(candidate) = candidate else {
        return Decision::unmatched(None);
    };
    let identity = match &candidate.identity {
        Some(id) if !id.is_empty() => id.clone(),
        _ => return Decision::unmatched(candidate.distance),
    };
    let Some(distance) = candidate.distance else {
        return Decision::unmatched(None);
    };
    let threshold = match candidate.threshold {
        Some(t) if cfg.use_source_threshold => t,
        _ => cfg.fallback_threshold,
    };
    if distance <= threshold {
        Decision {
            matched: true,
            identity: Some(identity),
            distance: Some(distance),
        }
    } else {
        Decision::unmatched(Some(distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(use_source: bool, fallback: f64) -> Config {
        Config {
            use_source_threshold: use_source,
            fallback_threshold: fallback,
            ..Config::default()
        }
    }

    fn candidate(distance: Option<f64>, threshold: Option<f64>) -> CandidateResult {
        CandidateResult {
            identity: Some("alice".to_string()),
            distance,
            threshold,
            region: None,
        }
    }

    #[test]
    fn no_candidate_is_unmatched() {
        let d = decide(None, &cfg(true, 0.45));
        assert!(!d.matched);
        assert_eq!(d.identity, None);
        assert_eq!(d.distance, None);
    }

    #[test]
    fn missing_identity_is_unmatched_even_when_close() {
        let c = CandidateResult {
            identity: None,
            distance: Some(0.01),
            threshold: Some(0.45),
            region: None,
        };
        assert!(!decide(Some(&c), &cfg(true, 0.45)).matched);
    }

    #[test]
    fn boundary_is_inclusive_for_source_threshold() {
        let c = candidate(Some(0.45), Some(0.45));
        assert!(decide(Some(&c), &cfg(true, 0.0)).matched);
        let c = candidate(Some(0.45 + 1e-9), Some(0.45));
        assert!(!decide(Some(&c), &cfg(true, 0.0)).matched);
    }

    #[test]
    fn boundary_is_inclusive_for_fallback_threshold() {
        let c = candidate(Some(0.45), None);
        assert!(decide(Some(&c), &cfg(true, 0.45)).matched);
        let c = candidate(Some(0.45 + 1e-9), None);
        assert!(!decide(Some(&c), &cfg(true, 0.45)).matched);
    }

    #[test]
    fn source_threshold_wins_when_enabled() {
        // fallback alone would reject
        let c = candidate(Some(0.40), Some(0.45));
        let d = decide(Some(&c), &cfg(true, 0.30));
        assert!(d.matched);
        assert_eq!(d.distance, Some(0.40));
    }

    #[test]
    fn source_threshold_ignored_when_disabled() {
        let c = candidate(Some(0.50), Some(0.45));
        let d = decide(Some(&c), &cfg(false, 0.45));
        assert!(!d.matched);
        assert_eq!(d.distance, Some(0.50));
    }

    #[test]
    fn missing_distance_is_unmatched() {
        let c = candidate(None, Some(0.45));
        let d = decide(Some(&c), &cfg(true, 0.45));
        assert!(!d.matched);
        assert_eq!(d.identity, None);
        assert_eq!(d.distance, None);
    }

    #[test]
    fn distance_carried_through_on_rejection() {
        let c = candidate(Some(0.9), None);
        let d = decide(Some(&c), &cfg(true, 0.45));
        assert!(!d.matched);
        assert_eq!(d.distance, Some(0.9));
    }

    #[test]
    fn rejected_candidate_stays_anonymous() {
        let c = candidate(Some(0.50), Some(0.45));
        let d = decide(Some(&c), &cfg(true, 0.45));
        assert!(!d.matched);
        assert_eq!(d.identity, None);
        assert_eq!(d.distance, Some(0.50));
    }
}
