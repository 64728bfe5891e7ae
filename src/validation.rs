//! Accumulating validation result

use crate::consensus::ConsensusError;

/// Ordered list of consensus errors; valid iff empty
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    errors: Vec<ConsensusError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn with_errors(errors: Vec<ConsensusError>) -> Self {
        Self { errors }
    }

    pub fn add_error(&mut self, error: ConsensusError) {
        self.errors.push(error);
    }

    pub fn add_errors<I: IntoIterator<Item = ConsensusError>>(&mut self, errors: I) {
        self.errors.extend(errors);
    }

    /// Append another result's errors after this one's
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ConsensusError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ConsensusError> {
        self.errors
    }

    pub fn first_error(&self) -> Option<&ConsensusError> {
        self.errors.first()
    }

    /// Error codes in reporting order
    pub fn codes(&self) -> Vec<u32> {
        self.errors.iter().map(ConsensusError::code).collect()
    }
}

impl From<ConsensusError> for ValidationResult {
    fn from(error: ConsensusError) -> Self {
        Self { errors: vec![error] }
    }
}

impl FromIterator<ValidationResult> for ValidationResult {
    fn from_iter<I: IntoIterator<Item = ValidationResult>>(iter: I) -> Self {
        let mut merged = ValidationResult::new();
        for result in iter {
            merged.merge(result);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identifier;

    fn not_found(byte: u8) -> ConsensusError {
        ConsensusError::DocumentNotFound {
            document_id: Identifier::new([byte; 32]),
        }
    }

    #[test]
    fn test_empty_result_is_valid() {
        assert!(ValidationResult::new().is_valid());
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut a = ValidationResult::from(not_found(1));
        let b = ValidationResult::with_errors(vec![not_found(2), not_found(3)]);
        a.merge(b);

        assert!(!a.is_valid());
        assert_eq!(a.errors(), &[not_found(1), not_found(2), not_found(3)]);
    }

    #[test]
    fn test_merge_is_associative() {
        let a = ValidationResult::from(not_found(1));
        let b = ValidationResult::from(not_found(2));
        let c = ValidationResult::from(not_found(3));

        let mut left = a.clone();
        left.merge(b.clone());
        left.merge(c.clone());

        let mut right_tail = b;
        right_tail.merge(c);
        let mut right = a;
        right.merge(right_tail);

        assert_eq!(left, right);
    }
}
