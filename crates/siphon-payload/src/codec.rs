use serde::Deserialize;

use crate::error::{PayloadError, Result};
use crate::reading::{DecodedPayload, Reading, RecoveryBatch};

/// A JSON number that may arrive stringified.
///
/// Some producers serialize every value as a string ("21.3" instead of 21.3);
/// the codec accepts both encodings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Number(serde_json::Number),
    Text(String),
}

impl WireNumber {
    fn as_f64(&self, field: &'static str) -> Result<f64> {
        match self {
            WireNumber::Number(n) => n.as_f64().ok_or_else(|| PayloadError::InvalidNumber {
                field,
                value: n.to_string(),
            }),
            WireNumber::Text(s) => {
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| PayloadError::InvalidNumber {
                        field,
                        value: s.clone(),
                    })
            }
        }
    }

    fn as_i64(&self, field: &'static str) -> Result<i64> {
        match self {
            WireNumber::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Ok(i);
                }
                // Producers occasionally send integral values as floats.
                n.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| f as i64)
                    .ok_or_else(|| PayloadError::InvalidNumber {
                        field,
                        value: n.to_string(),
                    })
            }
            WireNumber::Text(s) => {
                s.trim()
                    .parse::<i64>()
                    .map_err(|_| PayloadError::InvalidNumber {
                        field,
                        value: s.clone(),
                    })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(default)]
    timestamp: Option<WireNumber>,
    #[serde(default)]
    value: Option<WireNumber>,
    #[serde(default)]
    sequence: Option<WireNumber>,
    #[serde(default)]
    meta: Option<WireMeta>,
}

#[derive(Debug, Deserialize)]
struct WireMeta {
    #[serde(default)]
    t: Vec<Option<WireNumber>>,
    #[serde(default)]
    v: Vec<Option<WireNumber>>,
    #[serde(default)]
    s: Vec<Option<WireNumber>>,
}

/// Decode one broker message into a primary reading plus an optional
/// recovery batch.
///
/// A recovery batch whose entries are all null (or whose arrays are empty)
/// decodes to `None`, so downstream logic has a single falsy representation.
pub fn decode(bytes: &[u8]) -> Result<DecodedPayload> {
    let wire: WirePayload = serde_json::from_slice(bytes)?;

    let reading = Reading {
        timestamp: wire
            .timestamp
            .map(|n| n.as_i64("timestamp"))
            .transpose()?,
        value: wire.value.map(|n| n.as_f64("value")).transpose()?,
        sequence: wire.sequence.map(|n| n.as_i64("sequence")).transpose()?,
    };

    let recovery = wire.meta.map(decode_recovery).transpose()?.flatten();

    Ok(DecodedPayload { reading, recovery })
}

fn decode_recovery(meta: WireMeta) -> Result<Option<RecoveryBatch>> {
    let (t_len, v_len, s_len) = (meta.t.len(), meta.v.len(), meta.s.len());
    if t_len != v_len || t_len != s_len {
        return Err(PayloadError::MismatchedRecoveryArrays {
            t: t_len,
            v: v_len,
            s: s_len,
        });
    }

    let timestamps = meta
        .t
        .into_iter()
        .map(|n| n.map(|n| n.as_i64("meta.t")).transpose())
        .collect::<Result<Vec<_>>>()?;
    let values = meta
        .v
        .into_iter()
        .map(|n| n.map(|n| n.as_f64("meta.v")).transpose())
        .collect::<Result<Vec<_>>>()?;
    let sequences = meta
        .s
        .into_iter()
        .map(|n| n.map(|n| n.as_i64("meta.s")).transpose())
        .collect::<Result<Vec<_>>>()?;

    // "List of nothing" normalizes to absent: empty arrays or arrays where
    // every position is null carry no recovery event.
    let all_null = timestamps.iter().all(Option::is_none)
        && values.iter().all(Option::is_none)
        && sequences.iter().all(Option::is_none);
    if all_null {
        return Ok(None);
    }

    Ok(Some(RecoveryBatch {
        timestamps,
        values,
        sequences,
    }))
}
