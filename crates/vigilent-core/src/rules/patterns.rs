//! Shared thresholds and patterns for rules and escalation.
//!
//! The escalation policy re-checks some rule conditions, so the thresholds
//! live here once.

use lazy_static::lazy_static;
use regex::Regex;

/// Relative price deviation above which a contract is anomalous.
pub const PRICE_DEVIATION_THRESHOLD: f64 = 0.30;

/// Direct awards above this value need justification.
pub const DIRECT_AWARD_VALUE_THRESHOLD: f64 = 50_000.0;

/// Contracts above this value carry base risk.
pub const HIGH_VALUE_THRESHOLD: f64 = 1_000_000.0;

lazy_static! {
    /// Procedure types describing a direct (non-competitive) award.
    pub static ref DIRECT_PROCEDURE_PATTERN: Regex = Regex::new(r"(?i)direct").unwrap();
}

/// Check if a procedure type describes a direct award.
pub fn is_direct_procedure(procedure_type: &str) -> bool {
    DIRECT_PROCEDURE_PATTERN.is_match(procedure_type)
}

/// Check if a relative deviation is anomalous.
pub fn is_price_anomaly(deviation: f64) -> bool {
    deviation.abs() > PRICE_DEVIATION_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_procedure_detection() {
        assert!(is_direct_procedure("Direct award"));
        assert!(is_direct_procedure("ATRIBUIRE DIRECTA"));
        assert!(is_direct_procedure("achizitie directa"));
        assert!(!is_direct_procedure("Open tender"));
    }

    #[test]
    fn test_price_anomaly_threshold() {
        assert!(is_price_anomaly(0.35));
        assert!(is_price_anomaly(-0.31));
        assert!(!is_price_anomaly(0.30));
        assert!(!is_price_anomaly(-0.2));
    }
}
