//! Term fingerprints
//!
//! A term's first ten normalized characters pack into a base-27 number
//! (blank = 0, A = 1 .. Z = 26, most significant digit first). Base 27
//! rather than 26 so that "AA" orders below "AAA" instead of colliding at
//! zero. Fingerprint order therefore matches string order on the ten-char
//! prefix; terms sharing that prefix collide and need an exact string
//! comparison to tell apart.

/// Characters contributing to a fingerprint.
pub const FINGERPRINT_CHARS: usize = 10;

const fn pow27(exp: u32) -> u64 {
    let mut value = 1u64;
    let mut i = 0;
    while i < exp {
        value *= 27;
        i += 1;
    }
    value
}

const ALPHABET_POW: [u64; FINGERPRINT_CHARS] = [
    pow27(10),
    pow27(9),
    pow27(8),
    pow27(7),
    pow27(6),
    pow27(5),
    pow27(4),
    pow27(3),
    pow27(2),
    pow27(1),
];

/// 64-bit base-27 fingerprint of a term's leading characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermFingerprint(pub u64);

impl TermFingerprint {
    /// Fingerprint a term. Non-alphabetic characters are skipped and case
    /// is folded, mirroring tokenizer normalization, so already-normalized
    /// keys pass through unchanged.
    pub fn new(term: &str) -> Self {
        let mut num = 0u64;
        let digits = term
            .bytes()
            .filter(u8::is_ascii_alphabetic)
            .map(|b| u64::from(b.to_ascii_uppercase() - b'A' + 1))
            .take(FINGERPRINT_CHARS);
        for (i, digit) in digits.enumerate() {
            num += digit * ALPHABET_POW[i];
        }
        TermFingerprint(num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_matches_string_ordering() {
        let words = ["APPLE", "APPLES", "BANANA", "FOX", "ZEBRA"];
        for pair in words.windows(2) {
            assert!(
                TermFingerprint::new(pair[0]) < TermFingerprint::new(pair[1]),
                "{} vs {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_shorter_prefix_orders_first() {
        assert!(TermFingerprint::new("AA") < TermFingerprint::new("AAA"));
        assert!(TermFingerprint::new("A") < TermFingerprint::new("AA"));
    }

    #[test]
    fn test_long_terms_collide_on_prefix() {
        let a = TermFingerprint::new("INTERNATIONALIZE");
        let b = TermFingerprint::new("INTERNATIONALLY");
        // First ten characters agree, so the fingerprints must too.
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalization_is_applied() {
        assert_eq!(
            TermFingerprint::new("fox"),
            TermFingerprint::new("FOX")
        );
        assert_eq!(
            TermFingerprint::new("f-o-x!"),
            TermFingerprint::new("FOX")
        );
    }

    #[test]
    fn test_empty_term_is_zero() {
        assert_eq!(TermFingerprint::new(""), TermFingerprint(0));
    }
}
