// Confidence scoring: date proximity, ambiguity penalty, signal combination

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::similarity::round2;

/// Weight applied to name similarity in the final confidence formula.
pub const NAME_WEIGHT: f64 = 1.0;

/// Classification thresholds on the combined confidence score.
pub const AUTO_MATCH_THRESHOLD: f64 = 95.0;
pub const REVIEW_THRESHOLD: f64 = 60.0;

/// System outcome for one transaction/candidate-set evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchClassification {
    AutoMatched,
    NeedsReview,
    Unmatched,
}

impl MatchClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchClassification::AutoMatched => "auto_matched",
            MatchClassification::NeedsReview => "needs_review",
            MatchClassification::Unmatched => "unmatched",
        }
    }
}

/// Per-signal breakdown persisted verbatim into `match_details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub raw_name: f64,
    pub weighted_name: f64,
    pub date: i32,
    pub ambiguity: i32,
    pub raw_total: f64,
}

/// Tiered bonus/penalty from the day distance between the transaction
/// date and the candidate's due date (UTC calendar days).
pub fn date_proximity_score(a: NaiveDate, b: NaiveDate) -> i32 {
    let delta = (a - b).num_days().abs();

    if delta <= 3 {
        15
    } else if delta <= 7 {
        10
    } else if delta <= 15 {
        5
    } else if delta > 30 {
        -10
    } else {
        0
    }
}

/// Penalty that grows with the size of the candidate set: an exact-amount
/// hit means much less when three invoices share that amount.
pub fn ambiguity_penalty(candidate_count: usize) -> i32 {
    match candidate_count {
        0 | 1 => 0,
        2 => 5,
        _ => 10,
    }
}

/// Merge the signals into a clamped 0..=100 confidence, classify it, and
/// produce the breakdown record.
pub fn combine_confidence(
    name_score: f64,
    date_score: i32,
    candidate_count: usize,
) -> (f64, MatchClassification, ScoreBreakdown) {
    let weighted_name = round2(name_score * NAME_WEIGHT);
    let ambiguity = ambiguity_penalty(candidate_count);
    let raw_total = round2(weighted_name + date_score as f64 - ambiguity as f64);
    let score = round2(raw_total.clamp(0.0, 100.0));

    let classification = if score >= AUTO_MATCH_THRESHOLD {
        MatchClassification::AutoMatched
    } else if score >= REVIEW_THRESHOLD {
        MatchClassification::NeedsReview
    } else {
        MatchClassification::Unmatched
    };

    let breakdown = ScoreBreakdown {
        raw_name: name_score,
        weighted_name,
        date: date_score,
        ambiguity,
        raw_total,
    };

    (score, classification, breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_proximity_tiers() {
        let base = day(2024, 1, 15);
        assert_eq!(date_proximity_score(base, base), 15);
        assert_eq!(date_proximity_score(base, day(2024, 1, 12)), 15);
        assert_eq!(date_proximity_score(base, day(2024, 1, 8)), 10);
        assert_eq!(date_proximity_score(base, day(2024, 1, 1)), 5);
        assert_eq!(date_proximity_score(base, day(2023, 12, 20)), 0);
        assert_eq!(date_proximity_score(base, day(2023, 12, 1)), -10);
    }

    #[test]
    fn test_date_proximity_is_symmetric() {
        let a = day(2024, 3, 15);
        let b = day(2024, 1, 15);
        assert_eq!(date_proximity_score(a, b), date_proximity_score(b, a));
        assert_eq!(date_proximity_score(a, b), -10);
    }

    #[test]
    fn test_ambiguity_penalty_steps() {
        assert_eq!(ambiguity_penalty(0), 0);
        assert_eq!(ambiguity_penalty(1), 0);
        assert_eq!(ambiguity_penalty(2), 5);
        assert_eq!(ambiguity_penalty(3), 10);
        assert_eq!(ambiguity_penalty(50), 10);
    }

    #[test]
    fn test_combine_clamps_to_100() {
        let (score, class, breakdown) = combine_confidence(100.0, 15, 1);
        assert_eq!(score, 100.0);
        assert_eq!(class, MatchClassification::AutoMatched);
        assert_eq!(breakdown.raw_total, 115.0);
        assert_eq!(breakdown.ambiguity, 0);
    }

    #[test]
    fn test_combine_clamps_to_0() {
        let (score, class, _) = combine_confidence(0.0, -10, 3);
        assert_eq!(score, 0.0);
        assert_eq!(class, MatchClassification::Unmatched);
    }

    #[test]
    fn test_classification_boundaries() {
        // Exactly 95 is auto-matched, just below is review
        let (score, class, _) = combine_confidence(95.0, 0, 1);
        assert_eq!(score, 95.0);
        assert_eq!(class, MatchClassification::AutoMatched);

        let (score, class, _) = combine_confidence(94.99, 0, 1);
        assert_eq!(score, 94.99);
        assert_eq!(class, MatchClassification::NeedsReview);

        // Exactly 60 is review, just below is unmatched
        let (score, class, _) = combine_confidence(60.0, 0, 1);
        assert_eq!(score, 60.0);
        assert_eq!(class, MatchClassification::NeedsReview);

        let (score, class, _) = combine_confidence(59.99, 0, 1);
        assert_eq!(score, 59.99);
        assert_eq!(class, MatchClassification::Unmatched);
    }

    #[test]
    fn test_ambiguity_pushes_into_review() {
        // A 97-point name with three candidates lands below the auto bar
        let (score, class, breakdown) = combine_confidence(97.0, 5, 3);
        assert_eq!(score, 92.0);
        assert_eq!(class, MatchClassification::NeedsReview);
        assert_eq!(breakdown.ambiguity, 10);
    }
}
