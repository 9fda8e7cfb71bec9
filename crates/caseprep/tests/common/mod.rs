//! Shared test infrastructure for the caseprep integration tests.

pub mod builders;
pub mod harness;

#[allow(unused_imports)]
pub use builders::{jpeg_10x10, CaseBuilder};
#[allow(unused_imports)]
pub use harness::{
    RecordingIndex, RecordingProvisioner, StubEmbedder, StubVision, TestHarness,
    BROKEN_IMAGE_PREFIX,
};
