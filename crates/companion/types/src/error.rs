use thiserror::Error;

/// Returned when a stored integer does not name a known enum variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown {kind} discriminant: {value}")]
pub struct UnknownDiscriminant {
    /// Name of the enum being decoded.
    pub kind: &'static str,
    /// The offending value.
    pub value: i64,
}
