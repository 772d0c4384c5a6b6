//! Scannable code and transfer number generation.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;

use crate::errors::ServiceError;
use crate::registry::UnitRegistry;

/// Crockford-style alphabet: no I, L, O, U, so codes survive handwriting
/// and low-quality label prints.
const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const CODE_SUFFIX_LEN: usize = 10;
const TRANSFER_SUFFIX_LEN: usize = 8;

fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// A fresh unit code, e.g. "TLU-8GK2M4Q7Z3". Uniqueness is the caller's
/// problem; see [`allocate_unique_code`].
pub fn generate_code(prefix: &str) -> String {
    format!("{}-{}", prefix, random_suffix(CODE_SUFFIX_LEN))
}

/// A fresh human-facing transfer number, e.g. "TRF-8GK2M4Q7".
pub fn generate_transfer_number() -> String {
    format!("TRF-{}", random_suffix(TRANSFER_SUFFIX_LEN))
}

/// Draws codes until one is unused in both the registry and the in-flight
/// batch, bounded by `max_attempts`.
pub async fn allocate_unique_code(
    registry: &Arc<dyn UnitRegistry>,
    prefix: &str,
    taken: &HashSet<String>,
    max_attempts: u32,
) -> Result<String, ServiceError> {
    for _ in 0..max_attempts {
        let candidate = generate_code(prefix);
        if taken.contains(&candidate) {
            continue;
        }
        if registry.find_by_code(&candidate).await?.is_none() {
            return Ok(candidate);
        }
    }
    Err(ServiceError::InternalError(format!(
        "Could not allocate a unique code after {} attempts",
        max_attempts
    )))
}
