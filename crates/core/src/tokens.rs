/// Hard ceiling on the cost of any packed file, whatever limit the caller asked for.
pub const MAX_TOKENS_PER_FILE: u64 = 150_000;

/// Records above this cost always get their own group in file-limit packing.
pub const SOLO_THRESHOLD: u64 = 10_000;

/// Coarse token estimate: one token per four characters.
///
/// This is a cost unit, not a tokenizer. Callers rely only on it being
/// monotonic in text length and on every limit being compared in this unit.
pub fn estimate(text: &str) -> u64 {
    (text.chars().count() / 4) as u64
}
