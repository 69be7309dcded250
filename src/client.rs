//! Rate-limited, retrying single-position rsID lookup

use crate::chrom::normalize_chromosome;
use crate::entrez::{build_query, EntrezSearch, SnpSearch};
use crate::{RsidResult, NORSID, RSID_PREFIX};
use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Default number of lookups allowed in flight at once
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1;

/// Default minimum spacing between two requests from the same thread
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared throttle for every lookup of one annotation run
///
/// A counting semaphore bounds how many lookups are in flight; independently,
/// each thread waits until `min_interval` has passed since its own previous
/// request.
#[derive(Debug)]
pub struct RateLimiter {
    permits: Mutex<usize>,
    released: Condvar,
    capacity: usize,
    min_interval: Duration,
    last_request: Mutex<HashMap<ThreadId, Instant>>,
}

impl RateLimiter {
    pub fn new(max_in_flight: usize, min_interval: Duration) -> Self {
        let capacity = max_in_flight.max(1);
        Self {
            permits: Mutex::new(capacity),
            released: Condvar::new(),
            capacity,
            min_interval,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    /// No concurrency ceiling beyond `max_in_flight`, no spacing
    pub fn unthrottled(max_in_flight: usize) -> Self {
        Self::new(max_in_flight, Duration::ZERO)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn available_permits(&self) -> usize {
        *lock(&self.permits)
    }

    /// Block until a permit is free; the permit is returned on drop
    pub fn acquire(&self) -> RatePermit<'_> {
        let mut permits = lock(&self.permits);
        while *permits == 0 {
            permits = self
                .released
                .wait(permits)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        *permits -= 1;
        RatePermit { limiter: self }
    }

    fn release(&self) {
        let mut permits = lock(&self.permits);
        *permits += 1;
        self.released.notify_one();
    }

    /// Sleep until this thread may issue its next request, then record it
    pub fn pace(&self) {
        let id = thread::current().id();
        let last = lock(&self.last_request).get(&id).copied();

        if let Some(last) = last {
            let since = last.elapsed();
            if since < self.min_interval {
                thread::sleep(self.min_interval - since);
            }
        }

        lock(&self.last_request).insert(id, Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT, DEFAULT_MIN_INTERVAL)
    }
}

/// A held concurrency slot of a [`RateLimiter`]
#[derive(Debug)]
pub struct RatePermit<'a> {
    limiter: &'a RateLimiter,
}

impl Drop for RatePermit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

/// Linear backoff: attempt `n` failing waits `backoff_step * n`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts,
            backoff_step,
        }
    }

    /// Same attempt budget, no waiting between attempts
    pub fn without_backoff(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(1500))
    }
}

/// Resolve one position to a comma-separated rsID list or [`NORSID`]
///
/// Remote failures never surface as errors; only a chromosome that cannot be
/// queried at all is an `Err`.
pub trait RsidLookup: Send + Sync {
    fn lookup(&self, chromosome: &str, position: u64, limiter: &RateLimiter) -> RsidResult<String>;
}

/// Prefix each raw identifier with `rs` and join with commas
pub fn join_rsids(ids: &[String]) -> String {
    ids.iter()
        .map(|id| {
            if id.starts_with(RSID_PREFIX) {
                id.clone()
            } else {
                format!("{}{}", RSID_PREFIX, id)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// [`RsidLookup`] over any [`SnpSearch`] transport
pub struct RsidClient<S: SnpSearch> {
    search: S,
    retry: RetryPolicy,
}

impl RsidClient<EntrezSearch> {
    /// Client against the public NCBI endpoint
    pub fn entrez(email: &str, retry: RetryPolicy) -> RsidResult<Self> {
        Ok(Self::new(EntrezSearch::new(email)?, retry))
    }
}

impl<S: SnpSearch> RsidClient<S> {
    pub fn new(search: S, retry: RetryPolicy) -> Self {
        Self { search, retry }
    }

    pub fn search(&self) -> &S {
        &self.search
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }
}

impl<S: SnpSearch> RsidLookup for RsidClient<S> {
    fn lookup(&self, chromosome: &str, position: u64, limiter: &RateLimiter) -> RsidResult<String> {
        let chrom = match normalize_chromosome(chromosome) {
            Some(chrom) => chrom,
            None => {
                log::warn!("Cannot query chromosome '{}' at {}, using {}", chromosome, position, NORSID);
                return Ok(NORSID.to_string());
            }
        };
        let term = build_query(chrom, position);
        let max_attempts = self.retry.max_attempts;

        // The permit covers every attempt of this lookup, backoff included
        let _permit = limiter.acquire();

        for attempt in 1..=max_attempts {
            limiter.pace();

            match self.search.esearch(&term) {
                Ok(ids) if ids.is_empty() => {
                    log::debug!("No rsID for chr{}:{}", chrom, position);
                    return Ok(NORSID.to_string());
                }
                Ok(ids) => return Ok(join_rsids(&ids)),
                Err(e) if attempt < max_attempts => {
                    log::warn!(
                        "Retry {}/{} for chr{}:{} - {}",
                        attempt,
                        max_attempts,
                        chrom,
                        position,
                        e
                    );
                    thread::sleep(self.retry.backoff(attempt));
                }
                Err(e) => {
                    log::error!(
                        "Failed to fetch rsID for chr{}:{} after {} attempts: {}",
                        chrom,
                        position,
                        max_attempts,
                        e
                    );
                }
            }
        }

        Ok(NORSID.to_string())
    }
}
