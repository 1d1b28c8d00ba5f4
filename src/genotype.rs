// ==============================================================================
// genotype.rs - Genotype Call Classification
// ==============================================================================
// Description: Compares a sample's GT call against the reference sample's call
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================
// Algorithm:
//   Given the reference call and one comparison call (raw GT strings):
//   - reference "./." or ".|." (or absent) → site skipped, nothing classified
//   - comparison "./." or ".|." (or absent) → Undefined
//   - comparison == reference (byte-for-byte) → Same
//   - anything else                           → Different
//   "0|1" vs "0/1" and "0/1" vs "1/0" are Different: no allele-set matching.
// ==============================================================================

/// Unphased missing genotype
pub const MISSING_UNPHASED: &str = "./.";

/// Phased missing genotype
pub const MISSING_PHASED: &str = ".|.";

/// Outcome of comparing one call against the reference call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallClass {
    Same,
    Different,
    Undefined,
}

/// Whether a call counts as a real genotype
///
/// # Examples
/// ```
/// use genotype_windows::genotype::is_defined;
///
/// assert!(is_defined(Some("0/1")));
/// assert!(!is_defined(Some("./.")));
/// assert!(!is_defined(Some(".|.")));
/// assert!(!is_defined(None));
/// ```
pub fn is_defined(call: Option<&str>) -> bool {
    matches!(call, Some(gt) if gt != MISSING_UNPHASED && gt != MISSING_PHASED)
}

/// Classify a comparison call against an already-defined reference call
pub fn classify(reference: &str, call: Option<&str>) -> CallClass {
    match call {
        Some(gt) if is_defined(Some(gt)) => {
            if gt == reference {
                CallClass::Same
            } else {
                CallClass::Different
            }
        }
        _ => CallClass::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sentinels() {
        assert!(!is_defined(Some(MISSING_UNPHASED)));
        assert!(!is_defined(Some(MISSING_PHASED)));
        assert!(!is_defined(None));

        // only the two diploid encodings are sentinels
        assert!(is_defined(Some(".")));
        assert!(is_defined(Some("0/.")));
    }

    #[test]
    fn test_exact_match_is_same() {
        assert_eq!(classify("0/0", Some("0/0")), CallClass::Same);
        assert_eq!(classify("1|1", Some("1|1")), CallClass::Same);
    }

    #[test]
    fn test_phasing_and_order_are_different() {
        assert_eq!(classify("0/1", Some("0|1")), CallClass::Different);
        assert_eq!(classify("0/1", Some("1/0")), CallClass::Different);
        assert_eq!(classify("0/0", Some("1/1")), CallClass::Different);
    }

    #[test]
    fn test_missing_comparison_is_undefined() {
        assert_eq!(classify("0/0", Some("./.")), CallClass::Undefined);
        assert_eq!(classify("0/0", Some(".|.")), CallClass::Undefined);
        assert_eq!(classify("0/0", None), CallClass::Undefined);
    }
}
