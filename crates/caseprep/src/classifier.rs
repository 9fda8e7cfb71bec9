//! Mould status classification from generated descriptions.
//!
//! The vision prompt instructs the model to end every description with one
//! of two literal marker phrases. Matching is case-insensitive and the
//! positive marker is checked first.

pub const MOULD_DETECTED_MARKER: &str = "MOULD DETECTED";
pub const MOULD_NOT_DETECTED_MARKER: &str = "MOULD NOT DETECTED";

/// Which marker, if any, a description carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouldStatus {
    Detected,
    NotDetected,
    /// Neither marker present. Treated as "not detected".
    Unmarked,
}

impl MouldStatus {
    pub fn is_detected(self) -> bool {
        matches!(self, MouldStatus::Detected)
    }
}

pub fn classify(description: &str) -> MouldStatus {
    let upper = description.to_uppercase();
    if upper.contains(MOULD_DETECTED_MARKER) {
        MouldStatus::Detected
    } else if upper.contains(MOULD_NOT_DETECTED_MARKER) {
        MouldStatus::NotDetected
    } else {
        MouldStatus::Unmarked
    }
}

/// Shorthand for `classify(description).is_detected()`.
pub fn mould_detected(description: &str) -> bool {
    classify(description).is_detected()
}
