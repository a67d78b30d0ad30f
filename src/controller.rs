use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};
use serde::Serialize;

use crate::capture::FrameSource;
use crate::config::Config;
use crate::error::CaptureError;
use crate::ledger::AccessLedger;
use crate::matcher::{Frame, MatchingService};
use crate::policy::{self, CandidateResult, Decision, Region};
use crate::registry::{Profile, ProfileRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorClass {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cue {
    Success,
    Failure,
}

/// Rendering/audio instruction handed to the external presentation layer.
/// The core never draws or plays anything itself.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackDirective {
    pub lines: Vec<String>,
    pub color: ColorClass,
    pub region: Region,
    pub cue: Cue,
}

pub trait FeedbackSink {
    fn emit(&mut self, directive: &FeedbackDirective);
}

/// Runs the per-frame verification pipeline: match, decide, resolve, log,
/// emit. Owns the registry and ledger connections for the process lifetime.
/// Single-threaded; every frame yields exactly one ledger entry.
pub struct Verifier<'a, M: MatchingService> {
    cfg: &'a Config,
    matcher: M,
    registry: ProfileRegistry,
    ledger: AccessLedger,
}

impl<'a, M: MatchingService> Verifier<'a, M> {
    pub fn new(
        cfg: &'a Config,
        matcher: M,
        registry: ProfileRegistry,
        ledger: AccessLedger,
    ) -> Self {
        Self {
            cfg,
            matcher,
            registry,
            ledger,
        }
    }

    /// One iteration. Never fails: matcher errors degrade to "no candidate"
    /// and ledger write failures are logged; the access point stays up.
    pub fn verify_frame(&mut self, frame: &Frame) -> FeedbackDirective {
        let (candidate, degraded) = match self.matcher.find_candidate(frame) {
            Ok(candidate) => (candidate, false),
            Err(e) => {
                warn!("matching service failed, treating as no candidate: {e}");
                (None, true)
            }
        };

        let decision = policy::decide(candidate.as_ref(), self.cfg);

        let profile = self.resolve(&decision);

        match self.ledger.append(&decision, profile.as_ref()) {
            Ok(entry) => info!(
                "access {} for {} (distance {:?})",
                if entry.matched { "granted" } else { "denied" },
                entry.display_name,
                entry.distance
            ),
            Err(e) => error!("ledger write failed, continuing: {e}"),
        }

        feedback(&decision, profile.as_ref(), candidate.as_ref(), degraded)
    }

    /// Resolves a matched identity to its profile. A registry miss (or a
    /// lookup failure) synthesizes a profile from the raw key rather than
    /// failing the iteration.
    fn resolve(&self, decision: &Decision) -> Option<Profile> {
        if !decision.matched {
            return None;
        }
        let identity = decision.identity.as_ref()?;
        match self.registry.lookup(identity) {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                warn!("matched identity '{identity}' not in registry");
                Some(synthesized(identity))
            }
            Err(e) => {
                warn!("registry lookup for '{identity}' failed: {e}");
                Some(synthesized(identity))
            }
        }
    }

    /// Drives iterations until the frame source is exhausted or `stop` is
    /// raised. The stop flag is checked between iterations, not mid-frame.
    pub fn run<S: FrameSource>(
        &mut self,
        frames: &mut S,
        sink: &mut dyn FeedbackSink,
        stop: &AtomicBool,
    ) -> Result<(), CaptureError> {
        let mut iterations: u64 = 0;
        while !stop.load(Ordering::Relaxed) {
            let Some(frame) = frames.next_frame()? else {
                info!("frame source exhausted after {iterations} iteration(s)");
                break;
            };
            let directive = self.verify_frame(&frame);
            sink.emit(&directive);
            iterations += 1;
        }
        if stop.load(Ordering::Relaxed) {
            info!("stop requested, shutting down after {iterations} iteration(s)");
        }
        Ok(())
    }

    pub fn ledger(&self) -> &AccessLedger {
        &self.ledger
    }
}

fn synthesized(identity: &str) -> Profile {
    Profile {
        identity: identity.to_string(),
        display_name: identity.to_string(),
        group: String::new(),
    }
}

fn feedback(
    decision: &Decision,
    profile: Option<&Profile>,
    candidate: Option<&CandidateResult>,
    degraded: bool,
) -> FeedbackDirective {
    let region = candidate.and_then(|c| c.region).unwrap_or_default();
    if decision.matched {
        let (name, group) = match profile {
            Some(p) => (p.display_name.as_str(), p.group.as_str()),
            None => (decision.identity.as_deref().unwrap_or_default(), ""),
        };
        FeedbackDirective {
            lines: vec![format!("Name: {name}"), format!("Group: {group}")],
            color: ColorClass::Positive,
            region,
            cue: Cue::Success,
        }
    } else if degraded {
        // Distinguish a broken recognizer from a confident rejection so
        // operators notice the degradation.
        FeedbackDirective {
            lines: vec!["Recognizer unavailable".to_string()],
            color: ColorClass::Negative,
            region,
            cue: Cue::Failure,
        }
    } else {
        let mut lines = vec!["Not recognized".to_string()];
        if let Some(d) = decision.distance {
            lines.push(format!("Distance: {d:.3}"));
        }
        FeedbackDirective {
            lines,
            color: ColorClass::Negative,
            region,
            cue: Cue::Failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::AtomicBool;

    use crate::error::MatcherError;

    struct ScriptedMatcher {
        script: VecDeque<Result<Option<CandidateResult>, MatcherError>>,
    }

    impl MatchingService for ScriptedMatcher {
        fn find_candidate(
            &mut self,
            _frame: &Frame,
        ) -> Result<Option<CandidateResult>, MatcherError> {
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    struct BlankFrames {
        left: usize,
    }

    impl FrameSource for BlankFrames {
        fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            if self.left == 0 {
                return Ok(None);
            }
            self.left -= 1;
            Ok(Some(Frame::new(2, 2)))
        }
    }

    struct CollectingSink {
        directives: Vec<FeedbackDirective>,
    }

    impl FeedbackSink for CollectingSink {
        fn emit(&mut self, directive: &FeedbackDirective) {
            self.directives.push(directive.clone());
        }
    }

    fn verifier(
        cfg: &Config,
        script: Vec<Result<Option<CandidateResult>, MatcherError>>,
    ) -> Verifier<'_, ScriptedMatcher> {
        let registry = ProfileRegistry::open(Path::new(":memory:")).unwrap();
        let ledger = AccessLedger::open(Path::new(":memory:")).unwrap();
        Verifier::new(
            cfg,
            ScriptedMatcher {
                script: script.into(),
            },
            registry,
            ledger,
        )
    }

    #[test]
    fn ledger_write_failure_does_not_stop_the_loop() {
        let cfg = Config::default();
        let candidate = CandidateResult {
            identity: Some("alice".to_string()),
            distance: Some(0.10),
            threshold: Some(0.45),
            region: None,
        };
        let mut v = verifier(&cfg, vec![Ok(Some(candidate)), Ok(None)]);
        v.ledger.break_storage();

        let mut frames = BlankFrames { left: 2 };
        let mut sink = CollectingSink {
            directives: Vec::new(),
        };
        let stop = AtomicBool::new(false);
        v.run(&mut frames, &mut sink, &stop).unwrap();

        // Both iterations still produced feedback despite every append failing.
        assert_eq!(sink.directives.len(), 2);
        assert_eq!(sink.directives[0].cue, Cue::Success);
        assert_eq!(sink.directives[1].cue, Cue::Failure);
    }

    #[test]
    fn stop_flag_prevents_further_iterations() {
        let cfg = Config::default();
        let mut v = verifier(&cfg, vec![]);
        let mut frames = BlankFrames { left: 5 };
        let mut sink = CollectingSink {
            directives: Vec::new(),
        };
        let stop = AtomicBool::new(true);
        v.run(&mut frames, &mut sink, &stop).unwrap();
        assert!(sink.directives.is_empty());
        assert_eq!(v.ledger().count().unwrap(), 0);
    }
}
