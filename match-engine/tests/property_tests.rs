//! Property-based tests for the matching core invariants
//!
//! These tests use proptest to verify:
//! - Determinism: same inputs, bit-identical output; candidate order irrelevant
//! - Clamping: confidence always within 0..=100
//! - Classification boundaries tied to the score bands
//! - UNMATCHED results never carry an invoice id
//! - Normalizer idempotence
//! - Token-sorted similarity never below the direct score
//! - Date-tier monotonicity

use chrono::NaiveDate;
use match_engine::{
    match_transaction, name_similarity, normalize, CandidateInvoice, MatchClassification,
    TransactionFacts,
};
use proptest::prelude::*;
use strsim::jaro_winkler;
use uuid::Uuid;

const BASE_DAY: i32 = 738_000; // an arbitrary day number well inside chrono's range

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i32..3650).prop_map(|offset| {
        NaiveDate::from_num_days_from_ce_opt(BASE_DAY + offset).unwrap()
    })
}

fn name_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9 ,.&'-]{0,40}").unwrap()
}

fn candidate_strategy() -> impl Strategy<Value = CandidateInvoice> {
    (any::<u128>(), "[A-Z]{3}-[0-9]{4}", name_strategy(), date_strategy()).prop_map(
        |(id, invoice_number, customer_name, due_date)| CandidateInvoice {
            id: Uuid::from_u128(id),
            invoice_number,
            customer_name,
            due_date,
        },
    )
}

fn transaction_strategy() -> impl Strategy<Value = TransactionFacts> {
    (name_strategy(), date_strategy()).prop_map(|(description, transaction_date)| {
        TransactionFacts {
            description,
            transaction_date,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: the matcher is deterministic and candidate order never
    /// changes the outcome
    #[test]
    fn prop_matcher_deterministic_and_order_independent(
        txn in transaction_strategy(),
        candidates in proptest::collection::vec(candidate_strategy(), 0..8),
    ) {
        let first = match_transaction(&txn, &candidates);
        let second = match_transaction(&txn, &candidates);
        prop_assert_eq!(&first, &second);

        let mut reversed = candidates.clone();
        reversed.reverse();
        let from_reversed = match_transaction(&txn, &reversed);
        prop_assert_eq!(&first, &from_reversed);

        if candidates.len() > 1 {
            let mut rotated = candidates.clone();
            rotated.rotate_left(1);
            let from_rotated = match_transaction(&txn, &rotated);
            prop_assert_eq!(&first, &from_rotated);
        }
    }

    /// Property: confidence is clamped to 0..=100 and classification
    /// follows the score bands exactly
    #[test]
    fn prop_score_clamped_and_bands_respected(
        txn in transaction_strategy(),
        candidates in proptest::collection::vec(candidate_strategy(), 0..8),
    ) {
        let result = match_transaction(&txn, &candidates);

        prop_assert!(result.confidence >= 0.0);
        prop_assert!(result.confidence <= 100.0);

        match result.classification {
            MatchClassification::AutoMatched => prop_assert!(result.confidence >= 95.0),
            MatchClassification::NeedsReview => {
                prop_assert!(result.confidence >= 60.0);
                prop_assert!(result.confidence < 95.0);
            }
            MatchClassification::Unmatched => prop_assert!(result.confidence < 60.0),
        }
    }

    /// Property: unmatched outcomes never reference an invoice
    #[test]
    fn prop_unmatched_carries_no_invoice(
        txn in transaction_strategy(),
        candidates in proptest::collection::vec(candidate_strategy(), 0..8),
    ) {
        let result = match_transaction(&txn, &candidates);

        if result.classification == MatchClassification::Unmatched {
            prop_assert!(result.matched_invoice_id.is_none());
            prop_assert!(result.matched_invoice_number.is_none());
        } else {
            prop_assert!(result.matched_invoice_id.is_some());
        }
    }

    /// Property: normalization is idempotent
    #[test]
    fn prop_normalize_idempotent(input in "\\PC{0,60}") {
        let once = normalize(&input);
        prop_assert_eq!(normalize(&once), once);
    }

    /// Property: the order-independent similarity never falls below the
    /// direct Jaro-Winkler score
    #[test]
    fn prop_similarity_at_least_direct(a in name_strategy(), b in name_strategy()) {
        let na = normalize(&a);
        let nb = normalize(&b);
        let direct = if na.is_empty() || nb.is_empty() {
            0.0
        } else {
            jaro_winkler(&na, &nb) * 100.0
        };

        // Allow for the 2-dp rounding of the published score
        prop_assert!(name_similarity(&na, &nb) >= direct - 0.005);
    }

    /// Property: the date score is monotone non-increasing as the day
    /// delta grows
    #[test]
    fn prop_date_score_monotone(d1 in 0i64..120, d2 in 0i64..120) {
        let (near, far) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
        let base = NaiveDate::from_num_days_from_ce_opt(BASE_DAY).unwrap();
        let near_score = match_engine::date_proximity_score(
            base,
            base + chrono::Duration::days(near),
        );
        let far_score = match_engine::date_proximity_score(
            base,
            base + chrono::Duration::days(far),
        );
        prop_assert!(near_score >= far_score);
    }
}
