//! Scan verdict types.
//!
//! A [`ScanVerdict`] is the interpreted outcome of a multi-engine reputation
//! query. The gateway consumes verdicts at two points in a job's life:
//! - **Pre-scan**: advisory. A flagged input is still sanitized; the verdict
//!   detail travels with the delivery as a threat warning.
//! - **Post-scan**: a flagged output is destroyed and the job fails.
//!
//! Indeterminate verdicts (no credential, transport failure, analysis
//! timeout) are fail-open at both points: the pixel reconstruction pass is
//! the disarm of record, reputation is defense-in-depth.

use serde::{Deserialize, Serialize};

/// Engines flagging a sample as suspicious are tolerated up to this count.
///
/// Cross-engine false positives on heuristic detections are common; a lone
/// engine (or three) crying wolf does not flag the sample.
pub const SUSPICIOUS_TOLERANCE: u64 = 3;

/// Per-engine tallies reported by the reputation service for one analysis.
///
/// Both the hash-lookup report (`last_analysis_stats`) and the freshly
/// polled analysis (`stats`) deserialize into this shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Engines that flagged the sample as malicious.
    #[serde(default)]
    pub malicious: u64,

    /// Engines that flagged the sample as suspicious.
    #[serde(default)]
    pub suspicious: u64,

    /// Engines that explicitly marked the sample harmless.
    #[serde(default)]
    pub harmless: u64,

    /// Engines that produced no detection.
    #[serde(default)]
    pub undetected: u64,
}

impl AnalysisStats {
    /// Total engines that rendered a non-detection opinion.
    pub fn engines_total(&self) -> u64 {
        self.harmless + self.undetected
    }
}

/// The interpreted outcome of a reputation query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanVerdict {
    /// No engine flagged the sample (within tolerance).
    Clean {
        /// Engines that rendered an opinion.
        engines_total: u64,
    },

    /// More than [`SUSPICIOUS_TOLERANCE`] engines flagged the sample as
    /// suspicious, none as malicious.
    Suspicious {
        /// Engines that flagged the sample.
        count: u64,
        /// Engines that rendered an opinion.
        engines_total: u64,
    },

    /// At least one engine flagged the sample as malicious.
    Malicious {
        /// Engines that flagged the sample.
        count: u64,
    },

    /// No verdict could be obtained.
    Indeterminate {
        /// Why the scan could not complete.
        reason: String,
    },
}

impl ScanVerdict {
    /// Interpret raw engine tallies into a verdict.
    ///
    /// `malicious >= 1` dominates; otherwise `suspicious` above the
    /// tolerance flags the sample; otherwise the sample is clean.
    pub fn from_stats(stats: &AnalysisStats) -> Self {
        if stats.malicious >= 1 {
            Self::Malicious {
                count: stats.malicious,
            }
        } else if stats.suspicious > SUSPICIOUS_TOLERANCE {
            Self::Suspicious {
                count: stats.suspicious,
                engines_total: stats.engines_total(),
            }
        } else {
            Self::Clean {
                engines_total: stats.engines_total(),
            }
        }
    }

    /// Create an Indeterminate verdict with the given reason.
    pub fn indeterminate(reason: impl Into<String>) -> Self {
        Self::Indeterminate {
            reason: reason.into(),
        }
    }

    /// Returns true if the verdict flags the sample (malicious or suspicious).
    pub fn is_flagged(&self) -> bool {
        matches!(self, Self::Malicious { .. } | Self::Suspicious { .. })
    }

    /// Returns true for a clean verdict.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean { .. })
    }

    /// Returns true when no verdict could be obtained.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Indeterminate { .. })
    }
}

impl std::fmt::Display for ScanVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean { engines_total } => {
                write!(f, "Clean (0/{} engines)", engines_total)
            }
            Self::Suspicious {
                count,
                engines_total,
            } => {
                write!(
                    f,
                    "SUSPICIOUS: {} of {} engines flagged as suspicious",
                    count, engines_total
                )
            }
            Self::Malicious { count } => {
                write!(f, "THREAT DETECTED: {} engines flagged as malicious", count)
            }
            Self::Indeterminate { reason } => {
                write!(f, "Scan indeterminate: {}", reason)
            }
        }
    }
}
