//! Prompt samples read from a JSON-lines file.

use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;

use crate::error::{BenchError, Result};
use crate::models::openai::ChatMessage;

/// One prompt sample. Immutable once loaded and shared read-only by every request that
/// replays it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub messages: Vec<ChatMessage>,
    /// Declared input length, stored as `length` in the samples file
    #[serde(rename = "length")]
    pub input_length: u64,
}

/// Read at most `limit` samples from a JSON-lines file.
pub fn load_samples(path: &Path, limit: usize) -> Result<Vec<Sample>> {
    let file = std::fs::File::open(path)?;
    read_samples(std::io::BufReader::new(file), limit)
}

/// Read at most `limit` samples from any buffered reader. Blank lines are skipped and
/// do not count towards the limit.
pub fn read_samples<R: BufRead>(reader: R, limit: usize) -> Result<Vec<Sample>> {
    let mut samples = Vec::with_capacity(limit.min(1024));

    for (idx, line) in reader.lines().enumerate() {
        if samples.len() >= limit {
            break;
        }

        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let sample: Sample =
            serde_json::from_str(trimmed).map_err(|e| BenchError::InvalidSample {
                line: idx + 1,
                message: e.to_string(),
            })?;
        samples.push(sample);
    }

    tracing::debug!(count = samples.len(), limit, "Loaded samples");
    Ok(samples)
}

/// Synthetic samples for standalone runs without a samples file.
pub fn synthetic_samples(count: usize) -> Vec<Sample> {
    (0..count)
        .map(|i| {
            let prompt = format!("Write a short paragraph about load testing, variant {}.", i);
            Sample {
                input_length: prompt.chars().count() as u64,
                messages: vec![ChatMessage::new("user", prompt)],
            }
        })
        .collect()
}
