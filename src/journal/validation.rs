//! Double-entry validation rules
//!
//! Pure functions: the caller computes totals and validates before
//! constructing or mutating a stored record, so every business rule
//! stays visible and independently testable.

use bigdecimal::BigDecimal;

use crate::types::{EntryTotals, LineItem, ValidationIssue, ValidationReport};

/// Sum debits and credits over a line-item set. No side effects.
pub fn compute_totals(line_items: &[LineItem]) -> EntryTotals {
    let mut totals = EntryTotals {
        total_debit: BigDecimal::from(0),
        total_credit: BigDecimal::from(0),
    };
    for line in line_items {
        totals.total_debit += &line.debit;
        totals.total_credit += &line.credit;
    }
    totals
}

/// Check that a line-item set forms a legal double-entry journal entry.
///
/// Rules are applied in order and every violation is collected, so the
/// caller gets a complete report rather than the first failure:
/// 1. at least 2 line items;
/// 2. total debits equal total credits within `tolerance`;
/// 3. at least one line with a positive debit and one with a positive
///    credit (an all-debit or all-credit set is invalid even when the
///    zero amounts make it numerically balanced);
/// 4. no negative debit or credit amounts.
pub fn validate_line_items(line_items: &[LineItem], tolerance: &BigDecimal) -> ValidationReport {
    let mut issues = Vec::new();
    let zero = BigDecimal::from(0);

    if line_items.len() < 2 {
        issues.push(ValidationIssue::TooFewLineItems {
            found: line_items.len(),
        });
    }

    let totals = compute_totals(line_items);
    if (&totals.total_debit - &totals.total_credit).abs() >= *tolerance {
        issues.push(ValidationIssue::Unbalanced {
            total_debit: totals.total_debit.clone(),
            total_credit: totals.total_credit.clone(),
        });
    }

    if !line_items.iter().any(|line| line.debit > zero) {
        issues.push(ValidationIssue::MissingDebitLine);
    }
    if !line_items.iter().any(|line| line.credit > zero) {
        issues.push(ValidationIssue::MissingCreditLine);
    }

    for (index, line) in line_items.iter().enumerate() {
        if line.debit < zero || line.credit < zero {
            issues.push(ValidationIssue::NegativeAmount { line: index });
        }
    }

    ValidationReport {
        is_valid: issues.is_empty(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;

    fn tolerance() -> BigDecimal {
        BigDecimal::from(1) / BigDecimal::from(100)
    }

    #[test]
    fn test_balanced_two_line_entry_is_valid() {
        let lines = vec![
            LineItem::debit("cash", BigDecimal::from(500), Currency::INR),
            LineItem::credit("revenue", BigDecimal::from(500), Currency::INR),
        ];

        let report = validate_line_items(&lines, &tolerance());
        assert!(report.is_valid);
        assert!(report.issues.is_empty());

        let totals = compute_totals(&lines);
        assert_eq!(totals.total_debit, BigDecimal::from(500));
        assert_eq!(totals.total_credit, BigDecimal::from(500));
    }

    #[test]
    fn test_single_line_reports_minimum() {
        let lines = vec![LineItem::debit("cash", BigDecimal::from(500), Currency::INR)];

        let report = validate_line_items(&lines, &tolerance());
        assert!(!report.is_valid);
        assert!(report
            .issues
            .iter()
            .any(|issue| matches!(issue, ValidationIssue::TooFewLineItems { found: 1 })));
    }

    #[test]
    fn test_unbalanced_beyond_tolerance_is_rejected() {
        let lines = vec![
            LineItem::debit("cash", BigDecimal::from(1000), Currency::INR),
            LineItem::credit("revenue", BigDecimal::from(999), Currency::INR),
        ];

        let report = validate_line_items(&lines, &tolerance());
        assert!(!report.is_valid);
        assert!(report
            .issues
            .iter()
            .any(|issue| matches!(issue, ValidationIssue::Unbalanced { .. })));
    }

    #[test]
    fn test_drift_within_tolerance_passes() {
        let lines = vec![
            LineItem::debit("cash", "1000.004".parse().unwrap(), Currency::INR),
            LineItem::credit("revenue", BigDecimal::from(1000), Currency::INR),
        ];

        let report = validate_line_items(&lines, &tolerance());
        assert!(report.is_valid);
    }

    #[test]
    fn test_all_debit_entry_is_rejected_even_if_balanced() {
        // two zero-credit lines balance numerically against nothing
        let lines = vec![
            LineItem::debit("cash", BigDecimal::from(0), Currency::INR),
            LineItem::debit("inventory", BigDecimal::from(0), Currency::INR),
        ];

        let report = validate_line_items(&lines, &tolerance());
        assert!(!report.is_valid);
        assert!(report
            .issues
            .iter()
            .any(|issue| matches!(issue, ValidationIssue::MissingDebitLine)));
        assert!(report
            .issues
            .iter()
            .any(|issue| matches!(issue, ValidationIssue::MissingCreditLine)));
    }

    #[test]
    fn test_all_violations_are_collected() {
        let lines = vec![LineItem::debit("cash", BigDecimal::from(100), Currency::INR)];

        let report = validate_line_items(&lines, &tolerance());
        // one line: too few, unbalanced, and no credit side, all reported
        assert_eq!(report.issues.len(), 3);
    }

    #[test]
    fn test_negative_amounts_are_reported_per_line() {
        let mut negative = LineItem::debit("cash", BigDecimal::from(100), Currency::INR);
        negative.debit = BigDecimal::from(-100);
        let lines = vec![
            negative,
            LineItem::credit("revenue", BigDecimal::from(-100), Currency::INR),
        ];

        let report = validate_line_items(&lines, &tolerance());
        assert!(!report.is_valid);
        let negatives: Vec<_> = report
            .issues
            .iter()
            .filter(|issue| matches!(issue, ValidationIssue::NegativeAmount { .. }))
            .collect();
        assert_eq!(negatives.len(), 2);
    }
}
