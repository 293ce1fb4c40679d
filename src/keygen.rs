//! Key generation
//!
//! Short keys are derived from the store's current entry count, so the
//! generator is a pure function of that count and never touches storage.

/// Alphabet for the default generator: digits, then lower, then upper case
pub const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Trait for generating short keys.
///
/// Implementations must be deterministic for a given `count`; the store
/// relies on that to pick a fresh candidate by offsetting the count.
pub trait KeyGenerator: Send + Sync + 'static {
    /// Generate the candidate key for a store holding `count` entries
    fn generate(&self, count: usize) -> String;
}

/// Encodes the count in base 62, most significant digit first.
///
/// `0 → "0"`, `61 → "Z"`, `62 → "10"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base62KeyGenerator;

impl KeyGenerator for Base62KeyGenerator {
    fn generate(&self, count: usize) -> String {
        encode_base62(count)
    }
}

/// Encode `n` over [`BASE62_ALPHABET`]
pub fn encode_base62(mut n: usize) -> String {
    if n == 0 {
        return (BASE62_ALPHABET[0] as char).to_string();
    }

    let base = BASE62_ALPHABET.len();
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE62_ALPHABET[n % base]);
        n /= base;
    }
    digits.reverse();

    // Alphabet is ASCII
    digits.into_iter().map(char::from).collect()
}

impl<F> KeyGenerator for F
where
    F: Fn(usize) -> String + Send + Sync + 'static,
{
    fn generate(&self, count: usize) -> String {
        self(count)
    }
}
