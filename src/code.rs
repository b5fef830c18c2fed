//! Room code generation
//!
//! Draws random 6-character codes and retries until one is free.

use rand::Rng;
use tracing::error;

use crate::error::AppError;
use crate::types::{RoomCode, CODE_LEN};

/// Uppercase letters followed by digits
pub const DEFAULT_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default number of draws before giving up
pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;

/// Collision-checked room code generator
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    alphabet: Vec<char>,
    max_attempts: usize,
}

impl CodeGenerator {
    /// Create a generator over the default alphabet
    pub fn new(max_attempts: usize) -> Self {
        Self {
            alphabet: DEFAULT_ALPHABET.chars().collect(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Create a generator over a custom alphabet
    ///
    /// Characters are uppercased and anything that is not ASCII alphanumeric
    /// is dropped so generated codes always pass `RoomCode::parse`. Falls back
    /// to the default alphabet when nothing usable remains.
    pub fn with_alphabet(alphabet: &str, max_attempts: usize) -> Self {
        let mut chars: Vec<char> = alphabet
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        chars.sort_unstable();
        chars.dedup();

        if chars.is_empty() {
            return Self::new(max_attempts);
        }

        Self {
            alphabet: chars,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Generate a code for which `is_taken` returns false
    ///
    /// The caller is expected to hold the registry lock across this call and
    /// the subsequent insert.
    pub fn generate(&self, is_taken: impl Fn(&RoomCode) -> bool) -> Result<RoomCode, AppError> {
        let mut rng = rand::thread_rng();

        for _ in 0..self.max_attempts {
            let code: String = (0..CODE_LEN)
                .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())])
                .collect();
            let code = RoomCode::from_generated(code);

            if !is_taken(&code) {
                return Ok(code);
            }
        }

        error!(
            attempts = self.max_attempts,
            "No free room code found, code space exhausted"
        );
        Err(AppError::CodeSpaceExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_code_shape() {
        let generator = CodeGenerator::default();
        let code = generator.generate(|_| false).unwrap();

        assert_eq!(code.as_str().len(), CODE_LEN);
        assert!(code
            .as_str()
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_eq!(RoomCode::parse(code.as_str()).unwrap(), code);
    }

    #[test]
    fn test_skips_taken_codes() {
        // Two-letter alphabet: 64 possible codes, reject all but one
        let generator = CodeGenerator::with_alphabet("ab", 10_000);
        let free = RoomCode::parse("ABABAB").unwrap();
        let code = generator.generate(|c| c != &free).unwrap();
        assert_eq!(code, free);
    }

    #[test]
    fn test_exhausted_code_space() {
        let generator = CodeGenerator::with_alphabet("A", 5);
        let taken: HashSet<RoomCode> = [RoomCode::parse("AAAAAA").unwrap()].into();

        let result = generator.generate(|c| taken.contains(c));
        assert!(matches!(
            result,
            Err(AppError::CodeSpaceExhausted { attempts: 5 })
        ));
    }

    #[test]
    fn test_unusable_alphabet_falls_back() {
        let generator = CodeGenerator::with_alphabet("-*!", 1);
        let code = generator.generate(|_| false).unwrap();
        assert_eq!(code.as_str().len(), CODE_LEN);
    }
}
