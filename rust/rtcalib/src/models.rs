use crate::errors::{
    Result,
    RtCalibError,
};
use serde::{
    Deserialize,
    Serialize,
};

/// One observed (peptide, retention time) pair.
///
/// Retention times are normally non-negative; `allow_negative` relaxes that
/// for values already on an iRT-like scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawMeasuredPoint")]
pub struct MeasuredPoint {
    sequence: String,
    retention_time: f64,
    #[serde(default)]
    allow_negative: bool,
}

#[derive(Deserialize)]
struct RawMeasuredPoint {
    sequence: String,
    retention_time: f64,
    #[serde(default)]
    allow_negative: bool,
}

impl TryFrom<RawMeasuredPoint> for MeasuredPoint {
    type Error = RtCalibError;

    fn try_from(raw: RawMeasuredPoint) -> Result<Self> {
        if raw.allow_negative {
            Self::new_allow_negative(raw.sequence, raw.retention_time)
        } else {
            Self::new(raw.sequence, raw.retention_time)
        }
    }
}

impl MeasuredPoint {
    pub fn new(sequence: impl Into<String>, retention_time: f64) -> Result<Self> {
        Self::build(sequence.into(), retention_time, false)
    }

    pub fn new_allow_negative(sequence: impl Into<String>, retention_time: f64) -> Result<Self> {
        Self::build(sequence.into(), retention_time, true)
    }

    fn build(sequence: String, retention_time: f64, allow_negative: bool) -> Result<Self> {
        let reason = if sequence.is_empty() {
            Some("empty peptide sequence")
        } else if !retention_time.is_finite() {
            Some("retention time must be finite")
        } else if retention_time < 0.0 && !allow_negative {
            Some("retention time must not be negative")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(RtCalibError::InvalidMeasurement {
                sequence,
                retention_time,
                reason,
            }),
            None => Ok(Self {
                sequence,
                retention_time,
                allow_negative,
            }),
        }
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn retention_time(&self) -> f64 {
        self.retention_time
    }

    pub fn allow_negative(&self) -> bool {
        self.allow_negative
    }
}

impl PartialEq for MeasuredPoint {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence && self.retention_time == other.retention_time
    }
}

/// A peptide with a known reference score (iRT value) used as a calibration anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePeptide {
    pub sequence: String,
    pub score: f64,
}

impl ReferencePeptide {
    pub fn new(sequence: impl Into<String>, score: f64) -> Self {
        Self {
            sequence: sequence.into(),
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_time_rejected() {
        assert!(MeasuredPoint::new("PEPTIDE", -1.0).is_err());
        let point = MeasuredPoint::new_allow_negative("PEPTIDE", -1.0).unwrap();
        assert_eq!(point.retention_time(), -1.0);
        assert!(point.allow_negative());
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(MeasuredPoint::new("", 1.0).is_err());
        assert!(MeasuredPoint::new("PEPTIDE", f64::NAN).is_err());
        assert!(MeasuredPoint::new_allow_negative("PEPTIDE", f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_equality_ignores_negative_flag() {
        let a = MeasuredPoint::new("PEPTIDE", 1.5).unwrap();
        let b = MeasuredPoint::new_allow_negative("PEPTIDE", 1.5).unwrap();
        let c = MeasuredPoint::new("PEPTIDE", 1.6).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: MeasuredPoint =
            serde_json::from_str(r#"{"sequence": "ELVISK", "retention_time": 12.5}"#).unwrap();
        assert_eq!(ok.sequence(), "ELVISK");
        let bad: std::result::Result<MeasuredPoint, _> =
            serde_json::from_str(r#"{"sequence": "ELVISK", "retention_time": -2.0}"#);
        assert!(bad.is_err());
        let negative: MeasuredPoint = serde_json::from_str(
            r#"{"sequence": "ELVISK", "retention_time": -2.0, "allow_negative": true}"#,
        )
        .unwrap();
        assert_eq!(negative.retention_time(), -2.0);
    }
}
