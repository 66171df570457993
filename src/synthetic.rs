//! Synthetic cost table generator.
//!
//! Writes one row per gender, region, visit type and age (0 to 100) in the
//! column layout the warehouse agents query.

use crate::models::{GENDERS, REGIONS, VISIT_TYPES};
use rand::rngs::ThreadRng;
use rand::Rng;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_OUTPUT: &str = "robust_healthcare_costs.csv";

const SERVICE_DATE: &str = "2024-05-01";
const DIAGNOSIS_CODE: &str = "E11.9";
const MAX_GENERATED_AGE: u32 = 100;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One row of the cost table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostRecord {
    pub member_id: String,
    pub age: u32,
    pub gender: &'static str,
    pub region: &'static str,
    pub visit_type: &'static str,
    pub service_date: &'static str,
    pub cost: f64,
    pub diagnosis_code: &'static str,
    pub insurance_paid: f64,
    pub member_paid: f64,
}

/// Source of uniform samples in `[0, 1)` and member ids.
pub trait Sampler {
    fn unit(&mut self) -> f64;

    fn member_id(&mut self) -> String;
}

/// Uniform samples from the thread-local RNG; member ids are v4 UUIDs.
#[derive(Debug, Default)]
pub struct ThreadRngSampler {
    rng: ThreadRng,
}

impl ThreadRngSampler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sampler for ThreadRngSampler {
    fn unit(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }

    fn member_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

fn uniform(sampler: &mut dyn Sampler, low: f64, high: f64) -> f64 {
    low + (high - low) * sampler.unit()
}

fn cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Generate every record in table order.
pub fn generate_records(sampler: &mut dyn Sampler) -> Vec<CostRecord> {
    let capacity =
        GENDERS.len() * REGIONS.len() * VISIT_TYPES.len() * (MAX_GENERATED_AGE as usize + 1);
    let mut records = Vec::with_capacity(capacity);

    for gender in GENDERS {
        for region in REGIONS {
            for visit_type in VISIT_TYPES {
                for age in 0..=MAX_GENERATED_AGE {
                    let cost = cents(uniform(sampler, 100.0, 5000.0));
                    records.push(CostRecord {
                        member_id: sampler.member_id(),
                        age,
                        gender,
                        region,
                        visit_type,
                        service_date: SERVICE_DATE,
                        cost,
                        diagnosis_code: DIAGNOSIS_CODE,
                        insurance_paid: cents(cost * uniform(sampler, 0.6, 1.0)),
                        member_paid: cents(cost * uniform(sampler, 0.0, 0.4)),
                    });
                }
            }
        }
    }

    records
}

/// Write records as CSV with a header row.
pub fn write_csv<W: Write>(records: &[CostRecord], writer: W) -> Result<(), GenerateError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush().map_err(|e| GenerateError::Io {
        path: "<writer>".to_string(),
        source: e,
    })?;
    Ok(())
}

/// Generate the full table into `path`. Returns the number of rows.
pub fn generate_to_file(path: &Path, sampler: &mut dyn Sampler) -> Result<usize, GenerateError> {
    let records = generate_records(sampler);
    let file = std::fs::File::create(path).map_err(|e| GenerateError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    write_csv(&records, file)?;

    info!("Wrote {} synthetic rows to {}", records.len(), path.display());
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cycles through fixed samples and numbers the ids.
    struct FixedSampler {
        samples: Vec<f64>,
        next: usize,
        ids: usize,
    }

    impl FixedSampler {
        fn new(samples: &[f64]) -> Self {
            Self {
                samples: samples.to_vec(),
                next: 0,
                ids: 0,
            }
        }
    }

    impl Sampler for FixedSampler {
        fn unit(&mut self) -> f64 {
            let value = self.samples[self.next % self.samples.len()];
            self.next += 1;
            value
        }

        fn member_id(&mut self) -> String {
            self.ids += 1;
            format!("member-{}", self.ids)
        }
    }

    #[test]
    fn test_record_count_and_order() {
        let records = generate_records(&mut FixedSampler::new(&[0.5]));
        assert_eq!(records.len(), 3 * 4 * 4 * 101);

        let first = &records[0];
        assert_eq!(
            (first.gender, first.region, first.visit_type, first.age),
            ("Male", "Northeast", "Emergency", 0)
        );
        assert_eq!(records[100].age, 100);
        assert_eq!(records[101].visit_type, "Primary Care");
        assert_eq!(records.last().map(|r| r.gender), Some("Other"));
    }

    #[test]
    fn test_amounts_follow_samples() {
        // cost, insurance share, member share
        let records = generate_records(&mut FixedSampler::new(&[0.5, 0.5, 0.25]));
        let first = &records[0];
        assert_eq!(first.cost, 2550.0);
        assert_eq!(first.insurance_paid, 2040.0);
        assert_eq!(first.member_paid, 255.0);
        assert_eq!(first.service_date, "2024-05-01");
        assert_eq!(first.diagnosis_code, "E11.9");
    }

    #[test]
    fn test_thread_rng_sampler_range() {
        let mut sampler = ThreadRngSampler::new();
        for _ in 0..1000 {
            let value = sampler.unit();
            assert!((0.0..1.0).contains(&value));
        }
        assert_eq!(sampler.member_id().len(), 36);
    }

    #[test]
    fn test_thread_rng_sampler_spreads_samples() {
        let mut sampler = ThreadRngSampler::new();
        let samples: Vec<f64> = (0..2000).map(|_| sampler.unit()).collect();
        let low = samples.iter().filter(|v| **v < 0.5).count();
        // Loose bound; a uniform source lands near 1000.
        assert!((700..=1300).contains(&low), "low half count {}", low);
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((0.4..0.6).contains(&mean), "mean {}", mean);
    }

    #[test]
    fn test_amounts_stay_in_bounds() {
        for record in generate_records(&mut ThreadRngSampler::new()) {
            assert!((100.0..=5000.0).contains(&record.cost));
            assert!(record.insurance_paid >= cents(record.cost * 0.6) - 0.01);
            assert!(record.insurance_paid <= record.cost);
            assert!(record.member_paid <= cents(record.cost * 0.4) + 0.01);
        }
    }

    #[test]
    fn test_write_csv_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("costs.csv");

        let rows = generate_to_file(&path, &mut FixedSampler::new(&[0.0])).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();

        assert_eq!(
            lines.next(),
            Some("member_id,age,gender,region,visit_type,service_date,cost,diagnosis_code,insurance_paid,member_paid")
        );
        assert_eq!(
            lines.next(),
            Some("member-1,0,Male,Northeast,Emergency,2024-05-01,100.0,E11.9,60.0,0.0")
        );
        assert_eq!(content.lines().count(), rows + 1);
    }
}
