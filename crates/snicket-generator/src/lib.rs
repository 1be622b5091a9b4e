//! Random short-code generation for the Snicket URL shortener.
//!
//! Codes are drawn from a fixed alphabet with ambiguous symbols removed,
//! using the operating system's entropy source. Uniqueness against a store
//! is handled by [`generate_unique_code`], which probes a caller-supplied
//! lookup and retries on collisions.

use snicket_core::StoreError;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, trace};

/// Symbols a short code may contain.
///
/// Digit `0` and capital `I` are left out because they read like `O` and `l`.
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHJKLMNOPQRSTUVWXYZ123456789";

/// Hard upper bound on the code length.
pub const MAX_CODE_LENGTH: usize = 20;

/// How many collision retries [`generate_unique_code`] makes when the
/// caller passes `0` for `max_attempts`.
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

// Eight bytes of entropy per symbol keeps the modulo bias over a
// 60-symbol alphabet negligible.
const BYTES_PER_SYMBOL: usize = 8;

/// Errors returned by code generation.
#[derive(Debug, Clone, Error)]
pub enum GeneratorError {
    #[error("invalid code length {got}; expected 1..={max}", max = MAX_CODE_LENGTH)]
    InvalidLength { got: usize },
    #[error("failed to generate a unique code after {attempts} attempts")]
    Exhausted { attempts: usize },
    #[error("random source failed: {0}")]
    Rng(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Generates a random code of `length` symbols.
pub fn generate_code(length: usize) -> Result<String, GeneratorError> {
    if length == 0 || length > MAX_CODE_LENGTH {
        return Err(GeneratorError::InvalidLength { got: length });
    }

    let mut bytes = vec![0u8; length * BYTES_PER_SYMBOL];
    getrandom::fill(&mut bytes).map_err(|e| GeneratorError::Rng(e.to_string()))?;

    let code = bytes
        .chunks_exact(BYTES_PER_SYMBOL)
        .map(|chunk| {
            let value = chunk.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
            ALPHABET[(value % ALPHABET.len() as u64) as usize] as char
        })
        .collect();
    Ok(code)
}

/// Generates a code that `exists` does not know yet.
///
/// Each attempt draws a fresh random code and probes `exists` with it; the
/// first unclaimed code is returned. A `max_attempts` of `0` falls back to
/// [`DEFAULT_MAX_ATTEMPTS`]. Errors from the probe abort the search.
pub async fn generate_unique_code<F, Fut>(
    length: usize,
    max_attempts: usize,
    exists: F,
) -> Result<String, GeneratorError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<bool, StoreError>>,
{
    let max_attempts = if max_attempts == 0 {
        DEFAULT_MAX_ATTEMPTS
    } else {
        max_attempts
    };

    for attempt in 1..=max_attempts {
        let code = generate_code(length)?;
        if !exists(code.clone()).await? {
            if attempt > 1 {
                debug!(attempt, "found a free code after collisions");
            }
            return Ok(code);
        }
        trace!(code = %code, attempt, "generated code is taken, retrying");
    }

    Err(GeneratorError::Exhausted {
        attempts: max_attempts,
    })
}
