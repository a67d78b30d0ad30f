pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod ledger;
pub mod matcher;
pub mod policy;
pub mod registry;

pub use capture::{FrameSource, FrameSpool};
pub use controller::{ColorClass, Cue, FeedbackDirective, FeedbackSink, Verifier};
pub use error::{CaptureError, MatcherError, StoreError};
pub use ledger::{AccessLedger, AccessLogEntry};
pub use matcher::{CommandMatcher, Frame, MatchingService};
pub use policy::{decide, CandidateResult, Decision, Region};
pub use registry::{Profile, ProfileRegistry, ProfileSeed, SeedMapping};
