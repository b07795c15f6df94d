//! Pure matching core for payment reconciliation
//!
//! Scores a bank transaction against a set of candidate invoices:
//! - Name normalization (noise-word stripping)
//! - Order-independent Jaro-Winkler similarity
//! - Date proximity bonus/penalty
//! - Ambiguity penalty by candidate count
//! - Confidence combination and threshold classification
//!
//! No clock, no randomness, no I/O. Given identical inputs the matcher
//! is reproducible bit-for-bit.

pub mod matcher;
pub mod normalize;
pub mod scoring;
pub mod similarity;

pub use matcher::{match_transaction, CandidateInvoice, MatchResult, TransactionFacts};
pub use normalize::normalize;
pub use scoring::{
    ambiguity_penalty, combine_confidence, date_proximity_score, MatchClassification,
    ScoreBreakdown,
};
pub use similarity::name_similarity;
