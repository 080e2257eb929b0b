//! Error type shared by the evidence engine and the driver.
//!
//! The numeric core only ever produces the first three variants; `Io` and
//! `Format` come from the file-facing driver layer.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EvidenceError {
    /// Input that can never evaluate: a precision matrix that is not symmetric
    /// positive semi-definite, a latitude outside `[-π/2, π/2]`, a non-positive
    /// trial distance, non-finite values.
    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    /// A log-determinant that must be positive came back with sign ≤ 0.
    #[error("singular covariance in {what} (determinant sign {sign})")]
    SingularCovariance { what: &'static str, sign: f64 },

    /// Batched inputs or matrix blocks whose dimensions disagree.
    #[error("shape mismatch: {message}")]
    ShapeMismatch { message: String },

    #[error("{message}")]
    Io { message: String },

    #[error("{message}")]
    Format { message: String },
}

impl EvidenceError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    pub fn shape(message: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            message: message.into(),
        }
    }

    pub fn singular(what: &'static str, sign: f64) -> Self {
        Self::SingularCovariance { what, sign }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Process exit code used by the `comove` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MalformedInput { .. } => 2,
            Self::ShapeMismatch { .. } => 3,
            Self::SingularCovariance { .. } => 4,
            Self::Io { .. } => 5,
            Self::Format { .. } => 6,
        }
    }

    /// True for failures that only invalidate one trial distance.
    ///
    /// The integration layer can drop such a distance from its running sum and
    /// keep going; everything else means the inputs themselves are bad.
    pub fn is_singular(&self) -> bool {
        matches!(self, Self::SingularCovariance { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let errs = [
            EvidenceError::malformed("x"),
            EvidenceError::shape("x"),
            EvidenceError::singular("A", 0.0),
            EvidenceError::io("x"),
            EvidenceError::format("x"),
        ];
        let mut codes: Vec<u8> = errs.iter().map(|e| e.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errs.len());
    }

    #[test]
    fn singular_display_names_the_matrix() {
        let err = EvidenceError::singular("posterior covariance", -1.0);
        assert!(err.to_string().contains("posterior covariance"));
        assert!(err.is_singular());
    }
}
