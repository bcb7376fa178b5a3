//! Token estimation and cost computation.
//!
//! The estimate deliberately over-counts relative to provider tokenizers so
//! charges err on the side of provider reality. It is an approximation and
//! must never be treated as exact.

use rust_decimal::Decimal;

/// Approximate the token count of a piece of text.
///
/// Takes the larger of two independent estimates: character length divided
/// by four, and whitespace-delimited word count multiplied by 1.3, both
/// rounded up.
pub fn estimate_tokens(text: &str) -> i64 {
    if text.is_empty() {
        return 0;
    }

    let char_count = text.chars().count() as i64;
    let word_count = text.split_whitespace().count() as i64;

    let est_from_chars = (char_count + 3) / 4;
    let est_from_words = (word_count * 13 + 9) / 10;

    est_from_chars.max(est_from_words)
}

/// Charge for a token count at the configured rate per 1000 tokens.
///
/// The rate is flat across models for now; per-model pricing tables are a
/// future extension point.
pub fn calculate_cost(tokens: i64, _model_id: &str, rate_per_1k: Decimal) -> Decimal {
    Decimal::from(tokens) * rate_per_1k / Decimal::ONE_THOUSAND
}
