// Matcher - scores one bank transaction against its candidate invoices

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::normalize;
use crate::scoring::{combine_confidence, date_proximity_score, MatchClassification, ScoreBreakdown};
use crate::similarity::name_similarity;

/// Weight applied to name similarity when ranking candidates against each
/// other. Ranking is independent of the confidence formula, which weighs
/// the name at 1.0; the two are intentionally not the same number.
pub const RANKING_NAME_WEIGHT: f64 = 0.7;

/// The facts the matcher needs about one bank transaction. Candidates are
/// assumed to be pre-filtered by exact amount, so the amount itself does
/// not participate in scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFacts {
    pub description: String,
    pub transaction_date: NaiveDate,
}

/// An unpaid invoice whose amount equals the transaction amount.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateInvoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    pub due_date: NaiveDate,
}

/// Outcome of one matcher run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub classification: MatchClassification,
    pub matched_invoice_id: Option<Uuid>,
    pub matched_invoice_number: Option<String>,
    pub confidence: f64,
    pub breakdown: ScoreBreakdown,
    pub explanation: String,
}

impl MatchResult {
    fn no_candidates() -> Self {
        MatchResult {
            classification: MatchClassification::Unmatched,
            matched_invoice_id: None,
            matched_invoice_number: None,
            confidence: 0.0,
            breakdown: ScoreBreakdown {
                raw_name: 0.0,
                weighted_name: 0.0,
                date: 0,
                ambiguity: 0,
                raw_total: 0.0,
            },
            explanation: "No candidate invoices found with matching amount".to_string(),
        }
    }
}

struct RankedCandidate<'a> {
    candidate: &'a CandidateInvoice,
    name_score: f64,
    date_score: i32,
    preliminary: f64,
}

/// Score `transaction` against `candidates` and classify the outcome.
///
/// Deterministic: reordering `candidates` never changes the result; ties
/// on the ranking score break toward the smaller candidate id.
pub fn match_transaction(
    transaction: &TransactionFacts,
    candidates: &[CandidateInvoice],
) -> MatchResult {
    if candidates.is_empty() {
        return MatchResult::no_candidates();
    }

    let description = normalize(&transaction.description);

    let mut winner: Option<RankedCandidate> = None;
    for candidate in candidates {
        let customer = normalize(&candidate.customer_name);
        let name_score = name_similarity(&description, &customer);
        let date_score = date_proximity_score(transaction.transaction_date, candidate.due_date);
        let preliminary = name_score * RANKING_NAME_WEIGHT + date_score as f64;

        let ranked = RankedCandidate {
            candidate,
            name_score,
            date_score,
            preliminary,
        };

        winner = match winner {
            None => Some(ranked),
            Some(best) => {
                if ranked.preliminary > best.preliminary
                    || (ranked.preliminary == best.preliminary
                        && ranked.candidate.id < best.candidate.id)
                {
                    Some(ranked)
                } else {
                    Some(best)
                }
            }
        };
    }

    // Non-empty candidate list always produces a winner
    let best = match winner {
        Some(best) => best,
        None => return MatchResult::no_candidates(),
    };

    let (confidence, classification, breakdown) =
        combine_confidence(best.name_score, best.date_score, candidates.len());

    match classification {
        MatchClassification::Unmatched => MatchResult {
            classification,
            matched_invoice_id: None,
            matched_invoice_number: None,
            confidence,
            explanation: format!(
                "Best candidate {} scored {:.2}, below review threshold",
                best.candidate.invoice_number, confidence
            ),
            breakdown,
        },
        _ => MatchResult {
            classification,
            matched_invoice_id: Some(best.candidate.id),
            matched_invoice_number: Some(best.candidate.invoice_number.clone()),
            confidence,
            explanation: format!(
                "Matched invoice {} with {:.2}% confidence (name {:.2}, date {:+}, ambiguity -{}, {} candidate{})",
                best.candidate.invoice_number,
                confidence,
                best.name_score,
                best.date_score,
                breakdown.ambiguity,
                candidates.len(),
                if candidates.len() == 1 { "" } else { "s" },
            ),
            breakdown,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn candidate(id: Uuid, number: &str, name: &str, due: NaiveDate) -> CandidateInvoice {
        CandidateInvoice {
            id,
            invoice_number: number.to_string(),
            customer_name: name.to_string(),
            due_date: due,
        }
    }

    #[test]
    fn test_perfect_match_auto_matches() {
        // Exact name, same-day due date, single candidate
        let txn = TransactionFacts {
            description: "ACME CORPORATION".to_string(),
            transaction_date: day(2024, 1, 15),
        };
        let inv = candidate(
            uuid(1),
            "INV-2024-001",
            "Acme Corporation",
            day(2024, 1, 15),
        );

        let result = match_transaction(&txn, &[inv]);

        assert_eq!(result.classification, MatchClassification::AutoMatched);
        assert_eq!(result.confidence, 100.0);
        assert_eq!(result.matched_invoice_id, Some(uuid(1)));
        assert_eq!(result.matched_invoice_number.as_deref(), Some("INV-2024-001"));
        assert_eq!(result.breakdown.date, 15);
        assert_eq!(result.breakdown.ambiguity, 0);
        assert_eq!(result.breakdown.raw_name, 100.0);
    }

    #[test]
    fn test_reordered_noisy_description_auto_matches() {
        let txn = TransactionFacts {
            description: "CHK DEP SMITH JOHN".to_string(),
            transaction_date: day(2024, 1, 15),
        };
        let inv = candidate(uuid(1), "INV-2024-002", "John Smith", day(2024, 1, 15));

        let result = match_transaction(&txn, &[inv]);

        assert_eq!(result.classification, MatchClassification::AutoMatched);
        assert_eq!(result.matched_invoice_id, Some(uuid(1)));
        assert_eq!(result.breakdown.raw_name, 100.0);
    }

    #[test]
    fn test_ambiguous_candidates_drop_to_review() {
        // Three near-identical candidates: ambiguity penalty of 10 keeps a
        // high name score out of auto-match territory
        let txn = TransactionFacts {
            description: "PAYMENT FROM SMITH".to_string(),
            transaction_date: day(2024, 1, 15),
        };
        let candidates = vec![
            candidate(uuid(1), "INV-100", "Smith Consulting", day(2024, 1, 15)),
            candidate(uuid(2), "INV-101", "Smith Logistics", day(2024, 1, 15)),
            candidate(uuid(3), "INV-102", "Smith Holdings", day(2024, 1, 15)),
        ];

        let result = match_transaction(&txn, &candidates);

        assert_eq!(result.breakdown.ambiguity, 10);
        assert_eq!(result.classification, MatchClassification::NeedsReview);
        assert!(result.breakdown.raw_name >= 85.0 && result.breakdown.raw_name <= 94.0);
        assert!(result.matched_invoice_id.is_some());
    }

    #[test]
    fn test_far_date_and_low_similarity_unmatched() {
        let txn = TransactionFacts {
            description: "PAYMENT ABC".to_string(),
            transaction_date: day(2024, 3, 15),
        };
        let inv = candidate(uuid(1), "INV-2024-003", "XYZ Corp", day(2024, 1, 15));

        let result = match_transaction(&txn, &[inv]);

        assert_eq!(result.classification, MatchClassification::Unmatched);
        assert_eq!(result.matched_invoice_id, None);
        assert_eq!(result.matched_invoice_number, None);
        assert_eq!(result.breakdown.date, -10);
    }

    #[test]
    fn test_empty_candidates() {
        let txn = TransactionFacts {
            description: "ACME".to_string(),
            transaction_date: day(2024, 1, 15),
        };

        let result = match_transaction(&txn, &[]);

        assert_eq!(result.classification, MatchClassification::Unmatched);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.matched_invoice_id, None);
        assert_eq!(
            result.explanation,
            "No candidate invoices found with matching amount"
        );
    }

    #[test]
    fn test_tie_breaks_on_smaller_id() {
        let txn = TransactionFacts {
            description: "ACME CORP".to_string(),
            transaction_date: day(2024, 1, 15),
        };
        let a = candidate(uuid(7), "INV-B", "Acme Corp", day(2024, 1, 15));
        let b = candidate(uuid(3), "INV-A", "Acme Corp", day(2024, 1, 15));

        let forward = match_transaction(&txn, &[a.clone(), b.clone()]);
        let backward = match_transaction(&txn, &[b, a]);

        assert_eq!(forward.matched_invoice_id, Some(uuid(3)));
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_unmatched_winner_keeps_score_but_no_invoice() {
        // A mediocre candidate is still ranked, but unmatched results must
        // not carry its id
        let txn = TransactionFacts {
            description: "NORTHWIND".to_string(),
            transaction_date: day(2024, 2, 1),
        };
        let inv = candidate(uuid(9), "INV-500", "Totally Different Name", day(2024, 1, 1));

        let result = match_transaction(&txn, &[inv]);

        assert_eq!(result.classification, MatchClassification::Unmatched);
        assert!(result.confidence < 60.0);
        assert_eq!(result.matched_invoice_id, None);
    }
}
