//! Automatic statement matching heuristic

use bigdecimal::BigDecimal;
use std::collections::HashSet;
use uuid::Uuid;

use crate::reconciliation::{BankStatementLine, BookTransaction, ItemStatus, ReconciliationItem};

/// Pair bank statement lines against book transactions.
///
/// A bank line and a book transaction are candidates when their amounts
/// agree within `tolerance` (one minor currency unit) and their dates
/// lie within `window_days` of each other. A line with exactly one
/// candidate is auto-paired as `matched` and consumes the candidate; a
/// line with zero or several candidates stays `unmatched` for manual
/// resolution. Each book transaction pairs with at most one line.
pub fn match_statement(
    bank_lines: Vec<BankStatementLine>,
    book_transactions: &[BookTransaction],
    window_days: i64,
    tolerance: &BigDecimal,
) -> Vec<ReconciliationItem> {
    let mut consumed: HashSet<Uuid> = HashSet::new();
    let mut items = Vec::with_capacity(bank_lines.len());

    for bank in bank_lines {
        let candidates: Vec<&BookTransaction> = book_transactions
            .iter()
            .filter(|book| !consumed.contains(&book.id))
            .filter(|book| (&bank.amount - &book.amount).abs() <= *tolerance)
            .filter(|book| (bank.date - book.date).num_days().abs() <= window_days)
            .collect();

        let item = if candidates.len() == 1 {
            let book = candidates[0].clone();
            consumed.insert(book.id);
            ReconciliationItem {
                id: Uuid::new_v4(),
                difference: &bank.amount - &book.amount,
                bank_transaction: bank,
                book_transaction: Some(book),
                status: ItemStatus::Matched,
            }
        } else {
            ReconciliationItem {
                id: Uuid::new_v4(),
                difference: bank.amount.clone(),
                bank_transaction: bank,
                book_transaction: None,
                status: ItemStatus::Unmatched,
            }
        };
        items.push(item);
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn tolerance() -> BigDecimal {
        BigDecimal::from(1) / BigDecimal::from(100)
    }

    #[test]
    fn test_single_candidate_is_auto_matched() {
        let bank = vec![BankStatementLine::new(
            day(5),
            BigDecimal::from(250),
            "NEFT credit",
        )];
        let books = vec![BookTransaction::new(
            day(5),
            BigDecimal::from(250),
            "Customer payment",
        )];

        let items = match_statement(bank, &books, 0, &tolerance());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, ItemStatus::Matched);
        assert_eq!(items[0].difference, BigDecimal::from(0));
        assert_eq!(items[0].book_transaction.as_ref().unwrap().id, books[0].id);
    }

    #[test]
    fn test_ambiguous_candidates_stay_unmatched() {
        let bank = vec![BankStatementLine::new(
            day(5),
            BigDecimal::from(250),
            "NEFT credit",
        )];
        let books = vec![
            BookTransaction::new(day(5), BigDecimal::from(250), "Payment A"),
            BookTransaction::new(day(5), BigDecimal::from(250), "Payment B"),
        ];

        let items = match_statement(bank, &books, 0, &tolerance());
        assert_eq!(items[0].status, ItemStatus::Unmatched);
        assert!(items[0].book_transaction.is_none());
        assert_eq!(items[0].difference, BigDecimal::from(250));
    }

    #[test]
    fn test_no_candidate_stays_unmatched() {
        let bank = vec![BankStatementLine::new(
            day(5),
            BigDecimal::from(200),
            "Bank charge",
        )];
        let books = vec![BookTransaction::new(
            day(5),
            BigDecimal::from(300),
            "Unrelated",
        )];

        let items = match_statement(bank, &books, 0, &tolerance());
        assert_eq!(items[0].status, ItemStatus::Unmatched);
        assert_eq!(items[0].difference, BigDecimal::from(200));
    }

    #[test]
    fn test_date_window_widens_candidates() {
        let bank = vec![BankStatementLine::new(
            day(5),
            BigDecimal::from(250),
            "NEFT credit",
        )];
        let books = vec![BookTransaction::new(
            day(3),
            BigDecimal::from(250),
            "Payment",
        )];

        // same-day window misses the two-day-old book transaction
        let items = match_statement(bank.clone(), &books, 0, &tolerance());
        assert_eq!(items[0].status, ItemStatus::Unmatched);

        let items = match_statement(bank, &books, 3, &tolerance());
        assert_eq!(items[0].status, ItemStatus::Matched);
    }

    #[test]
    fn test_amount_tolerance_is_minor_unit() {
        let bank = vec![BankStatementLine::new(
            day(5),
            "250.01".parse().unwrap(),
            "NEFT credit",
        )];
        let books = vec![BookTransaction::new(
            day(5),
            BigDecimal::from(250),
            "Payment",
        )];

        let items = match_statement(bank, &books, 0, &tolerance());
        assert_eq!(items[0].status, ItemStatus::Matched);
        assert_eq!(items[0].difference, "0.01".parse::<BigDecimal>().unwrap());
    }

    #[test]
    fn test_book_transaction_is_consumed_once() {
        let bank = vec![
            BankStatementLine::new(day(5), BigDecimal::from(250), "First"),
            BankStatementLine::new(day(5), BigDecimal::from(250), "Second"),
        ];
        let books = vec![BookTransaction::new(
            day(5),
            BigDecimal::from(250),
            "Payment",
        )];

        let items = match_statement(bank, &books, 0, &tolerance());
        assert_eq!(items[0].status, ItemStatus::Matched);
        assert_eq!(items[1].status, ItemStatus::Unmatched);
    }
}
