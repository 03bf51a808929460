//! Centralized validation and helper functions.

/// Maximum number of candidate providers accepted in a single request
pub const MAX_CANDIDATES: usize = 50_000;

/// Maximum number of target identifiers accepted for one coverage scan
pub const MAX_TARGETS: usize = 1_000_000;

/// Validation error types
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Too many candidates: {0} exceeds maximum allowed ({MAX_CANDIDATES})")]
    TooManyCandidates(usize),
    #[error("Too many target identifiers: {0} exceeds maximum allowed ({MAX_TARGETS})")]
    TooManyTargets(usize),
}

/// Check that a string is a well-formed NPI: ten digits whose last digit is
/// the Luhn check digit computed over the `80840` prefix plus the first nine.
///
/// # Examples
///
/// ```
/// use provider_match::utils::validation::is_valid_npi;
///
/// assert!(is_valid_npi("1234567893"));
/// assert!(!is_valid_npi("1234567890"));
/// assert!(!is_valid_npi("12345"));
/// ```
#[must_use]
pub fn is_valid_npi(s: &str) -> bool {
    if s.len() != 10 || !s.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();

    // Luhn over the first nine digits, doubling from the rightmost payload digit.
    // The constant 24 accounts for the "80840" card-issuer prefix.
    let mut sum = 24;
    for (i, &d) in digits[..9].iter().rev().enumerate() {
        if i % 2 == 0 {
            let doubled = d * 2;
            sum += doubled / 10 + doubled % 10;
        } else {
            sum += d;
        }
    }

    let check = (10 - sum % 10) % 10;
    check == digits[9]
}

/// Check if adding another candidate would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new candidate.
///
/// # Errors
///
/// Returns `ValidationError::TooManyCandidates` when the limit is reached.
pub fn check_candidate_limit(count: usize) -> Result<(), ValidationError> {
    if count >= MAX_CANDIDATES {
        Err(ValidationError::TooManyCandidates(count))
    } else {
        Ok(())
    }
}

/// Check that a target set is within the scan limit.
///
/// # Errors
///
/// Returns `ValidationError::TooManyTargets` when `count` exceeds the limit.
pub fn check_target_limit(count: usize) -> Result<(), ValidationError> {
    if count > MAX_TARGETS {
        Err(ValidationError::TooManyTargets(count))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_npi() {
        assert!(is_valid_npi("1234567893"));
        assert!(is_valid_npi("1245319599"));
        assert!(!is_valid_npi("1111111111"));
        assert!(!is_valid_npi("123456789a"));
        assert!(!is_valid_npi(""));
    }

    #[test]
    fn test_limits() {
        assert!(check_candidate_limit(0).is_ok());
        assert!(matches!(
            check_candidate_limit(MAX_CANDIDATES),
            Err(ValidationError::TooManyCandidates(_))
        ));
        assert!(check_target_limit(MAX_TARGETS).is_ok());
        assert!(check_target_limit(MAX_TARGETS + 1).is_err());
    }
}
