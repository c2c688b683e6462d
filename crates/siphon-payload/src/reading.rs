use serde::{Deserialize, Serialize};

/// One decoded sensor measurement.
///
/// Every field is individually optional on the wire. A `None` value together
/// with a present recovery batch marks the primary reading as a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Seconds since the Unix epoch.
    pub timestamp: Option<i64>,
    pub value: Option<f64>,
    pub sequence: Option<i64>,
}

/// Historical readings a sensor buffered while disconnected.
///
/// The three arrays are co-indexed; entry `i` of each describes one reading.
/// The codec never produces an all-null batch: that shape is normalized to
/// "no recovery event" before it reaches callers.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryBatch {
    pub timestamps: Vec<Option<i64>>,
    pub values: Vec<Option<f64>>,
    pub sequences: Vec<Option<i64>>,
}

impl RecoveryBatch {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Iterate the batch as one `Reading` per index.
    pub fn readings(&self) -> impl Iterator<Item = Reading> + '_ {
        (0..self.len()).map(|i| Reading {
            timestamp: self.timestamps[i],
            value: self.values[i],
            sequence: self.sequences[i],
        })
    }
}

/// Result of decoding one broker message.
///
/// Callers pattern-match on `recovery` instead of null-checking fields: the
/// batch is either meaningfully present or `None`, never "empty but present".
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    pub reading: Reading,
    pub recovery: Option<RecoveryBatch>,
}
