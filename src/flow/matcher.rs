//! Time-windowed search for the RVM transaction that captured an origin transaction
//!
//! The reactive network exposes its transaction log only as batches anchored
//! at a pivot time, so the capture is located by bisecting a window around
//! the origin block timestamp. Each probe either finds an entry whose `refTx`
//! is the origin hash or uses the batch's first entry time to pick a half.

use crate::error::{TracerError, TracerResult};
use crate::reactive::RvmTransaction;

use std::future::Future;
use tracing::debug;

/// Default half-width of the search window, seconds
pub const DEFAULT_WINDOW_SECS: i64 = 1_000;

/// Default number of RVM transactions requested per probe
pub const DEFAULT_BATCH_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherConfig {
    pub window_secs: i64,
    pub batch_size: u32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Result of one search, with the number of probes it took
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSearch {
    pub found: Option<RvmTransaction>,
    pub probes: u32,
}

/// Bisect `[origin_timestamp - window, origin_timestamp + window]` for the
/// RVM transaction referencing `origin_tx_hash`.
///
/// `fetch(pivot_time, batch_size)` supplies one batch per probe. The window
/// shrinks on every probe, so the search ends after at most
/// `log2(2 * window + 1) + 1` fetches. Fetch errors abort the search, and a
/// window that does not fit in `i64` is rejected as a malformed timestamp.
pub async fn find_capture<F, Fut>(
    origin_tx_hash: &str,
    origin_timestamp: i64,
    config: MatcherConfig,
    mut fetch: F,
) -> TracerResult<CaptureSearch>
where
    F: FnMut(i64, u32) -> Fut,
    Fut: Future<Output = TracerResult<Vec<RvmTransaction>>>,
{
    let bounds = origin_timestamp
        .checked_sub(config.window_secs)
        .zip(origin_timestamp.checked_add(config.window_secs))
        .filter(|(start, end)| end.checked_sub(*start).is_some());
    let (mut start, mut end) = match bounds {
        Some(bounds) => bounds,
        None => {
            return Err(TracerError::MalformedResponse(format!(
                "origin timestamp {} is out of range for a {}s capture window",
                origin_timestamp, config.window_secs
            )))
        }
    };
    let mut probes = 0u32;

    while start <= end {
        let mid = start + (end - start) / 2;
        probes += 1;

        let batch = fetch(mid, config.batch_size).await?;
        debug!(
            probes,
            pivot = mid,
            start,
            end,
            batch_len = batch.len(),
            "Capture search probe"
        );

        let first_time = batch.first().and_then(|tx| tx.time);

        if let Some(found) = batch.into_iter().find(|tx| tx.references(origin_tx_hash)) {
            return Ok(CaptureSearch {
                found: Some(found),
                probes,
            });
        }

        // Bounds sit at the edge of i64 only when the window is exhausted
        match first_time {
            Some(t) if t < origin_timestamp => match mid.checked_add(1) {
                Some(next) => start = next,
                None => break,
            },
            _ => match mid.checked_sub(1) {
                Some(next) => end = next,
                None => break,
            },
        }
    }

    Ok(CaptureSearch {
        found: None,
        probes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::block_timestamp;
    use serde_json::json;
    use serde_json::Map;
    use std::cell::Cell;

    const ORIGIN: &str = "0xorigin";
    const TS: i64 = 1_700_000_000;

    fn rvm_tx(hash: &str, time: i64, ref_tx: Option<&str>) -> RvmTransaction {
        RvmTransaction {
            hash: hash.to_string(),
            time: Some(time),
            ref_tx: ref_tx.map(str::to_string),
            extra: Map::new(),
        }
    }

    /// Transactions every 10s; a batch is the `n` entries at or before the pivot
    fn log_with_capture(capture_time: i64) -> Vec<RvmTransaction> {
        (-150..=150)
            .map(|i| {
                let time = TS + i * 10;
                if time == capture_time {
                    rvm_tx("0xcapture", time, Some("0xORIGIN"))
                } else {
                    rvm_tx(&format!("0x{}", i), time, Some("0xother"))
                }
            })
            .collect()
    }

    fn batch_before(log: &[RvmTransaction], pivot: i64, n: u32) -> Vec<RvmTransaction> {
        let upto: Vec<_> = log
            .iter()
            .filter(|tx| tx.time.unwrap_or_default() <= pivot)
            .cloned()
            .collect();
        let skip = upto.len().saturating_sub(n as usize);
        upto[skip..].to_vec()
    }

    #[tokio::test]
    async fn test_found_on_first_probe() {
        let search = find_capture(ORIGIN, TS, MatcherConfig::default(), |_, _| async {
            Ok(vec![rvm_tx("0xa", TS - 5, None), rvm_tx("0xcapture", TS + 3, Some(ORIGIN))])
        })
        .await
        .unwrap();

        assert_eq!(search.probes, 1);
        assert_eq!(search.found.unwrap().hash, "0xcapture");
    }

    #[tokio::test]
    async fn test_bisects_toward_capture() {
        let log = log_with_capture(TS + 20);
        let config = MatcherConfig {
            window_secs: 1_000,
            batch_size: 5,
        };

        let search = find_capture(ORIGIN, TS, config, |pivot, n| {
            let batch = batch_before(&log, pivot, n);
            async move { Ok(batch) }
        })
        .await
        .unwrap();

        let found = search.found.expect("capture should be found");
        assert_eq!(found.hash, "0xcapture");
        assert!(search.probes > 1);
    }

    #[tokio::test]
    async fn test_no_match_terminates() {
        let config = MatcherConfig::default();
        let calls = Cell::new(0u32);

        let search = find_capture(ORIGIN, TS, config, |pivot, _| {
            calls.set(calls.get() + 1);
            // Alternate early and late first entries; nothing references the origin
            let time = if calls.get() % 2 == 0 { TS - 1 } else { TS + 1 };
            async move { Ok(vec![rvm_tx("0xnoise", time, Some("0xother")), rvm_tx("0xp", pivot, None)]) }
        })
        .await
        .unwrap();

        assert!(search.found.is_none());
        assert_eq!(search.probes, calls.get());
        // ceil(log2(2001)) probes at most
        assert!(search.probes <= 11, "took {} probes", search.probes);
    }

    #[tokio::test]
    async fn test_empty_batches_terminate() {
        let search = find_capture(ORIGIN, TS, MatcherConfig::default(), |_, _| async {
            Ok(Vec::new())
        })
        .await
        .unwrap();

        assert!(search.found.is_none());
        assert!(search.probes > 0 && search.probes <= 11);
    }

    #[tokio::test]
    async fn test_window_below_zero_does_not_underflow() {
        let search = find_capture(ORIGIN, 10, MatcherConfig::default(), |pivot, _| async move {
            Ok(vec![rvm_tx("0xearly", pivot - 1, None)])
        })
        .await
        .unwrap();

        assert!(search.found.is_none());
    }

    #[tokio::test]
    async fn test_timestamp_near_i64_max_is_rejected() {
        let origin_timestamp = block_timestamp(&json!({ "timeStamp": "0x7fffffffffffffff" })).unwrap();
        let calls = Cell::new(0u32);

        let result = find_capture(ORIGIN, origin_timestamp, MatcherConfig::default(), |_, _| {
            calls.set(calls.get() + 1);
            async { Ok(Vec::new()) }
        })
        .await;

        assert!(matches!(result, Err(TracerError::MalformedResponse(_))));
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test]
    async fn test_window_reaching_i64_min_is_rejected() {
        let config = MatcherConfig {
            window_secs: i64::MAX,
            batch_size: 10,
        };

        let result = find_capture(ORIGIN, -10, config, |_, _| async { Ok(Vec::new()) }).await;

        assert!(matches!(result, Err(TracerError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_pivot_and_batch_size_forwarded() {
        let config = MatcherConfig {
            window_secs: 1_000,
            batch_size: 100,
        };
        let seen = Cell::new(None);

        let _ = find_capture(ORIGIN, TS, config, |pivot, n| {
            if seen.get().is_none() {
                seen.set(Some((pivot, n)));
            }
            async { Ok(Vec::new()) }
        })
        .await
        .unwrap();

        assert_eq!(seen.get(), Some((TS, 100)));
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let result = find_capture(ORIGIN, TS, MatcherConfig::default(), |_, _| async {
            Err(TracerError::Rpc {
                method: "rnk_getTransactions".into(),
                code: -32000,
                message: "unavailable".into(),
            })
        })
        .await;

        assert!(matches!(result, Err(TracerError::Rpc { .. })));
    }
}
