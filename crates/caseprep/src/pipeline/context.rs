use std::time::Instant;

use crate::case::MaintenanceCase;

use super::error::{EnrichmentWarning, Stage};

pub struct EnrichmentContext {
    // Input
    pub case: MaintenanceCase,

    // Current step; reported on failure
    pub stage: Stage,

    // Non-fatal warnings
    pub warnings: Vec<EnrichmentWarning>,

    pub started: Instant,
}

impl EnrichmentContext {
    pub fn new(case: MaintenanceCase) -> Self {
        Self {
            case,
            stage: Stage::Fetching,
            warnings: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn enter(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub fn warn(&mut self, warning: EnrichmentWarning) {
        self.warnings.push(warning);
    }
}
