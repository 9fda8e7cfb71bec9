//! Random attributes for demo cases.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::case::{JobAssigned, MaintenanceCase};

pub const CUSTOMER_ID_RANGE: RangeInclusive<u32> = 1000..=9999;
pub const CASE_ID_RANGE: RangeInclusive<u32> = 100_000..=999_999;
/// Cases are opened at most this many days before generation time.
pub const MAX_CASE_AGE_DAYS: i64 = 180;

/// Generates plausible case rows. Case ids are unique per generator.
pub struct DummyCaseGenerator<R> {
    rng: R,
    now: DateTime<Utc>,
    used_case_ids: HashSet<u32>,
}

impl DummyCaseGenerator<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy(), Utc::now())
    }
}

impl<R: Rng> DummyCaseGenerator<R> {
    pub fn new(rng: R, now: DateTime<Utc>) -> Self {
        Self {
            rng,
            now,
            used_case_ids: HashSet::new(),
        }
    }

    pub fn customer_id(&mut self) -> String {
        self.rng.gen_range(CUSTOMER_ID_RANGE).to_string()
    }

    /// Draws until an id not handed out before comes up. The id space is far
    /// larger than any demo data folder.
    pub fn case_id(&mut self) -> String {
        loop {
            let id = self.rng.gen_range(CASE_ID_RANGE);
            if self.used_case_ids.insert(id) {
                return id.to_string();
            }
        }
    }

    pub fn date_opened(&mut self) -> DateTime<Utc> {
        let window_ms = Duration::days(MAX_CASE_AGE_DAYS).num_milliseconds();
        let offset = self.rng.gen_range(0..=window_ms);
        (self.now - Duration::milliseconds(offset)).trunc_subsecs(3)
    }

    pub fn job_assigned(&mut self) -> JobAssigned {
        if self.rng.gen_bool(0.5) {
            JobAssigned::Yes
        } else {
            JobAssigned::No
        }
    }

    /// A pending case for one uploaded image.
    pub fn case_for(&mut self, image_url: String, file_name: String) -> MaintenanceCase {
        MaintenanceCase::new_pending(
            self.customer_id(),
            self.case_id(),
            image_url,
            file_name,
            self.date_opened(),
            self.job_assigned(),
        )
    }
}
