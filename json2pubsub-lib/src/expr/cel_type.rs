use strum::Display;

/// Static type of an expression or of a function parameter, as far as it can be known before evaluation.
///
/// `Dyn` is the type of anything whose shape depends on the request, such as every field
/// reached through `request` or `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CelType {
    Bool,
    Int,
    #[strum(serialize = "uint")]
    UInt,
    Double,
    String,
    Bytes,
    #[strum(serialize = "null_type")]
    Null,
    List,
    Map,
    #[strum(serialize = "google.protobuf.Timestamp")]
    Timestamp,
    #[strum(serialize = "google.protobuf.Duration")]
    Duration,
    Dyn,
}

impl CelType {
    /// Whether a value of static type `self` may be passed where `expected` is declared.
    #[must_use]
    pub fn is_assignable_to(self, expected: Self) -> bool {
        self == expected || self == Self::Dyn || expected == Self::Dyn
    }

    /// The common type of two branches, falling back to `Dyn` when they differ.
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        if self == other { self } else { Self::Dyn }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::UInt | Self::Double)
    }
}
