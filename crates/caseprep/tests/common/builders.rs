//! Builders for test cases and image fixtures.

#![allow(dead_code)]

use std::io::Cursor;

use chrono::{DateTime, TimeZone, Utc};
use image::{ImageFormat, Rgb, RgbImage};

use caseprep::case::{JobAssigned, MaintenanceCase};

/// Encodes a valid 10x10 JPEG.
pub fn jpeg_10x10() -> Vec<u8> {
    let img = RgbImage::from_pixel(10, 10, Rgb([90, 110, 70]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg)
        .expect("encode jpeg fixture");
    buf.into_inner()
}

/// Builder for pending `MaintenanceCase` rows.
pub struct CaseBuilder {
    case_id: String,
    customer_id: String,
    file_name: String,
    date_opened: DateTime<Utc>,
    job_assigned: JobAssigned,
}

impl CaseBuilder {
    /// A case with the given id and `{case_id}.jpg` as its file name.
    pub fn new(case_id: &str) -> Self {
        Self {
            case_id: case_id.to_string(),
            customer_id: "1234".to_string(),
            file_name: format!("{case_id}.jpg"),
            date_opened: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            job_assigned: JobAssigned::No,
        }
    }

    pub fn customer_id(mut self, customer_id: &str) -> Self {
        self.customer_id = customer_id.to_string();
        self
    }

    pub fn file_name(mut self, file_name: &str) -> Self {
        self.file_name = file_name.to_string();
        self
    }

    pub fn job_assigned(mut self, job_assigned: JobAssigned) -> Self {
        self.job_assigned = job_assigned;
        self
    }

    pub fn file_name_ref(&self) -> &str {
        &self.file_name
    }

    /// Builds the case with `image_url` pointing at its blob.
    pub fn build(self, image_url: String) -> MaintenanceCase {
        MaintenanceCase::new_pending(
            self.customer_id,
            self.case_id,
            image_url,
            self.file_name,
            self.date_opened,
            self.job_assigned,
        )
    }
}
