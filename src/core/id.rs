use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng, TryRngCore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::{Builder, Uuid};

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Produces a fresh UUID-v4-shaped identifier for stories, nodes and choices.
///
/// Randomness comes from the OS when available. If the OS source fails the
/// bytes come from a seeded pseudo-random generator instead; the textual
/// shape is identical either way.
pub fn new_id() -> String {
    let mut bytes = [0u8; 16];
    if OsRng.try_fill_bytes(&mut bytes).is_err() {
        log::debug!("OS randomness unavailable, using pseudo-random identifier");
        fallback_bytes(&mut bytes);
    }
    format_id(bytes)
}

fn format_id(bytes: [u8; 16]) -> String {
    let uuid: Uuid = Builder::from_random_bytes(bytes).into_uuid();
    uuid.hyphenated().to_string()
}

fn fallback_bytes(bytes: &mut [u8; 16]) {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let count = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
    let seed = nanos ^ count.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    StdRng::seed_from_u64(seed).fill_bytes(bytes);
}
