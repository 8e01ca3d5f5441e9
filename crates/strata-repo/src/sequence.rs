//! Next-free sequence number search
//!
//! Sequence numbers for one dictionary key are dense: `0..n` exist, `n..`
//! do not. Given a hint for the last existing number, this finds `n` using
//! only existence probes:
//!
//! 1. Probe the hint. While it is missing, remember it as the lowest known
//!    gap and halve it. A missing 0 means nothing exists.
//! 2. If the hint existed, probe `hint + 1`, `hint + 2`, `hint + 4`, ...
//!    until one is missing.
//! 3. Binary search between the highest existing and lowest missing number.
//!
//! An accurate hint costs two probes. The probes are sequential by nature.

use std::future::Future;

use strata_core::{StrataError, StrataResult};

/// Find the lowest sequence number for which `exists` is false.
pub async fn next_sequence_number<F, Fut>(hint: u64, mut exists: F) -> StrataResult<u64>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = StrataResult<bool>>,
{
    let mut probe = hint;
    let mut lowest_missing = None;
    while !exists(probe).await? {
        if probe == 0 {
            return Ok(0);
        }
        lowest_missing = Some(probe);
        probe /= 2;
    }
    let mut highest_existing = probe;

    let mut lowest_missing = match lowest_missing {
        Some(missing) => missing,
        None => {
            let start = highest_existing;
            let mut step = 1u64;
            loop {
                // Clamped so a gap just below u64::MAX is still found
                let candidate = start.saturating_add(step);
                if !exists(candidate).await? {
                    break candidate;
                }
                if candidate == u64::MAX {
                    return Err(StrataError::SequenceSpaceExhausted);
                }
                highest_existing = candidate;
                step = step.saturating_mul(2);
            }
        }
    };

    while lowest_missing - highest_existing > 1 {
        let mid = highest_existing + (lowest_missing - highest_existing) / 2;
        if exists(mid).await? {
            highest_existing = mid;
        } else {
            lowest_missing = mid;
        }
    }
    Ok(lowest_missing)
}
