//! Freshness Module
//!
//! Expiry bookkeeping and the refresh decision evaluated on every read of a
//! TTL cell. Everything here is synchronous and takes `now` explicitly.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::CellConfig;

// == Expiry ==
/// Expiry state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// No value has ever been accepted
    Unset,
    /// Forced into the past by an invalidation; older than any grace window
    Lapsed,
    /// The value is fresh until this instant (inclusive)
    At(Instant),
    /// The deadline lies beyond what an `Instant` can represent
    Never,
}

impl Expiry {
    /// Creates an expiry `max_age` after `now`, saturating to `Never`.
    pub fn after(now: Instant, max_age: Duration) -> Self {
        now.checked_add(max_age).map_or(Expiry::Never, Expiry::At)
    }

    /// True once an expiry has been set, even if it later lapsed.
    pub fn is_set(&self) -> bool {
        !matches!(self, Expiry::Unset)
    }
}

// == Freshness ==
/// Outcome of the refresh decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Serve the cached value, no fetch
    Fresh,
    /// Serve the cached value and refresh ahead of expiry in the background
    RefreshAhead,
    /// Expired but inside the grace window: serve and refresh in the background
    ServeStale,
    /// Nothing servable: callers wait for a fetch
    MustFetch,
}

impl Freshness {
    /// Whether the cached value may be returned immediately.
    pub fn is_servable(self) -> bool {
        !matches!(self, Freshness::MustFetch)
    }

    /// Whether a fetch has to be started (or joined).
    pub fn needs_fetch(self) -> bool {
        !matches!(self, Freshness::Fresh)
    }
}

// == Evaluate ==
/// Decides how a read at `now` is served.
///
/// Rules, first match wins:
/// 1. no expiry, lapsed expiry or no valid value: must fetch
/// 2. stale grace set and `now` in `(expiry, expiry + grace]`: serve stale
/// 3. stale grace set and `now` past `expiry + grace`: must fetch
/// 4. early refresh set and `now` in `[expiry - lead, expiry]`: refresh ahead
/// 5. fresh while `now <= expiry`, must fetch afterwards
pub fn evaluate(config: &CellConfig, expiry: Expiry, has_value: bool, now: Instant) -> Freshness {
    let expires_at = match expiry {
        Expiry::At(at) if has_value => at,
        Expiry::Never if has_value => return Freshness::Fresh,
        _ => return Freshness::MustFetch,
    };

    if let Some(grace) = config.stale_grace {
        if now > expires_at {
            // an unrepresentable grace deadline covers every `now`
            let within_grace = expires_at
                .checked_add(grace)
                .map_or(true, |limit| now <= limit);
            return if within_grace {
                Freshness::ServeStale
            } else {
                Freshness::MustFetch
            };
        }
    }

    if let Some(lead) = config.early_refresh_lead {
        let reaches_expiry = now
            .checked_add(lead)
            .map_or(true, |horizon| horizon >= expires_at);
        if now <= expires_at && reaches_expiry {
            return Freshness::RefreshAhead;
        }
    }

    if now <= expires_at {
        Freshness::Fresh
    } else {
        Freshness::MustFetch
    }
}
