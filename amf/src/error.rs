use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("Output buffer cannot take {requested} more bytes ({available} available)")]
    AllocationFailure { requested: usize, available: usize },

    #[error("Reference index {0} does not fit the reference space")]
    ReferenceOverflow(usize),

    #[error("String too long: {0} bytes")]
    StringTooLong(usize),

    #[error("Array too long: {0} elements")]
    ArrayTooLong(usize),

    #[error("Too many object members: {0}")]
    TooManyMembers(usize),

    #[error("Encoding of externalizable objects is not implemented.")]
    ExternalizableObject,

    #[error("Value nesting exceeds the limit of {0} levels")]
    NestingTooDeep(usize),
}

/// Decoding failure together with the input offset it was detected at.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} (at byte {offset})")]
pub struct DecodingError {
    pub kind: DecodingErrorKind,
    pub offset: usize,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodingErrorKind {
    #[error("Unexpected end of input")]
    EndOfInput,

    #[error("Unknown data type: {0}")]
    UnknownType(u8),

    #[error("Complex type reference out of bounds: {0}")]
    OutOfBoundsReference(usize),

    #[error("Expected object end marker, found {0}")]
    MissingObjectEnd(u8),

    #[error("Element count overflow: {0}")]
    CountOverflow(u32),

    #[error("Arrays with associative keys are not supported.")]
    AssociativeArray,

    #[error("Handling of externalizable object traits is not implemented.")]
    ExternalizableTrait,

    #[error("Value nesting exceeds the limit of {0} levels")]
    NestingTooDeep(usize),
}

impl DecodingErrorKind {
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, DecodingErrorKind::EndOfInput)
    }

    /// Every kind other than [`DecodingErrorKind::EndOfInput`] means the input is structurally
    /// invalid, no matter how many more bytes would follow.
    pub fn is_malformed(&self) -> bool {
        !self.is_end_of_input()
    }
}

impl DecodingError {
    pub fn is_end_of_input(&self) -> bool {
        self.kind.is_end_of_input()
    }

    pub fn is_malformed(&self) -> bool {
        self.kind.is_malformed()
    }
}
