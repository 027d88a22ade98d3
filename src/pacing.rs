//! Token-bucket pacing for remote calls.
//!
//! Lookups, uploads and record submissions draw from independent budgets so
//! a burst of cache-hit lookups cannot starve the upload budget. Callers
//! await the relevant `before_*` immediately ahead of the remote call.
use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct Pacer {
    lookups: Limiter,
    uploads: Limiter,
    submits: Limiter,
}

impl Pacer {
    pub fn new(lookup_rps: u32, upload_rps: u32, submit_rps: u32) -> Self {
        Self {
            lookups: RateLimiter::direct(quota(lookup_rps)),
            uploads: RateLimiter::direct(quota(upload_rps)),
            submits: RateLimiter::direct(quota(submit_rps)),
        }
    }

    pub async fn before_lookup(&self) {
        self.lookups.until_ready().await;
    }

    pub async fn before_upload(&self) {
        self.uploads.until_ready().await;
    }

    pub async fn before_submit(&self) {
        self.submits.until_ready().await;
    }
}

fn quota(rps: u32) -> Quota {
    // A zero budget would deadlock every caller; clamp to one per second.
    Quota::per_second(NonZeroU32::new(rps.max(1)).unwrap())
}
