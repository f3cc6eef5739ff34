//! Exchange-rate resolution with provenance.
//!
//! Four-tier fallback: identity, cached (memory, then the durable store),
//! live lookup (timeout-guarded, cached back durably), static table of
//! common pairs, and finally an identity rate tagged "default". Rates are
//! keyed by (from, to, day) so repeat valuations for the same date are free.

use crate::domain::{Currency, Decimal, RateSource, TimeMs};
use crate::store::RateStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for live rate lookups.
#[derive(Debug, Error)]
pub enum RateError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected http status: {0}")]
    HttpStatus(u16),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("rate unavailable for pair")]
    Unavailable,
}

/// Live rate provider; implementations handle retry and rate limiting.
#[async_trait]
pub trait LiveRateSource: Send + Sync {
    async fn fetch_rate(
        &self,
        from: &Currency,
        to: &Currency,
        day: &str,
    ) -> Result<Decimal, RateError>;
}

/// A resolved rate with its provenance tag.
#[derive(Debug, Clone, PartialEq)]
pub struct RateResolution {
    pub rate: Decimal,
    pub source: RateSource,
}

/// USD value of one unit of each commonly seen currency. Crossing through
/// USD covers every pair in the table.
const STATIC_USD_RATES: [(&str, &str); 8] = [
    ("USD", "1.0"),
    ("EUR", "1.08"),
    ("GBP", "1.27"),
    ("CAD", "0.73"),
    ("AUD", "0.66"),
    ("JPY", "0.0067"),
    ("MXN", "0.058"),
    ("CNY", "0.14"),
];

fn static_usd_value(currency: &Currency) -> Option<Decimal> {
    STATIC_USD_RATES
        .iter()
        .find(|(code, _)| *code == currency.as_str())
        .and_then(|(_, rate)| Decimal::parse(rate).ok())
}

/// Static cross rate for a pair, when both sides are in the table.
pub fn static_rate(from: &Currency, to: &Currency) -> Option<Decimal> {
    let from_usd = static_usd_value(from)?;
    let to_usd = static_usd_value(to)?;
    if to_usd.is_zero() {
        return None;
    }
    Some(from_usd / to_usd)
}

type RateKey = (Currency, Currency, String);

/// Shared FX resolver. Concurrent reads are free; writes are idempotent
/// upserts on the natural (pair, day) key.
pub struct FxConverter {
    memory: RwLock<HashMap<RateKey, Decimal>>,
    store: Option<Arc<dyn RateStore>>,
    live: Option<Arc<dyn LiveRateSource>>,
    live_timeout: Duration,
}

impl FxConverter {
    pub fn new(
        store: Option<Arc<dyn RateStore>>,
        live: Option<Arc<dyn LiveRateSource>>,
        live_timeout: Duration,
    ) -> Self {
        FxConverter {
            memory: RwLock::new(HashMap::new()),
            store,
            live,
            live_timeout,
        }
    }

    /// Resolver with no external tiers: identity, static, default only.
    pub fn offline() -> Self {
        Self::new(None, None, Duration::from_secs(5))
    }

    fn memory_get(&self, key: &RateKey) -> Option<Decimal> {
        let guard = self.memory.read().unwrap_or_else(|e| e.into_inner());
        guard.get(key).copied()
    }

    fn memory_put(&self, key: RateKey, rate: Decimal) {
        let mut guard = self.memory.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(key, rate);
    }

    /// Resolve the exchange rate for a pair on the given date.
    ///
    /// Never fails: every miss falls through to the next tier and the final
    /// tier is an identity rate tagged `default`.
    pub async fn resolve(&self, from: &Currency, to: &Currency, date: TimeMs) -> RateResolution {
        if from == to {
            return RateResolution {
                rate: Decimal::ONE,
                source: RateSource::Identity,
            };
        }

        let day = date.day_key();
        let key = (from.clone(), to.clone(), day.clone());

        if let Some(rate) = self.memory_get(&key) {
            return RateResolution {
                rate,
                source: RateSource::Cached,
            };
        }

        if let Some(store) = &self.store {
            match store.get_rate(from, to, &day).await {
                Ok(Some(rate)) => {
                    self.memory_put(key, rate);
                    return RateResolution {
                        rate,
                        source: RateSource::Cached,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(pair = %format!("{from}/{to}"), day = %day, error = %e,
                        "durable rate lookup failed; trying next tier");
                }
            }
        }

        if let Some(live) = &self.live {
            match tokio::time::timeout(self.live_timeout, live.fetch_rate(from, to, &day)).await
            {
                Ok(Ok(rate)) => {
                    debug!(pair = %format!("{from}/{to}"), day = %day, rate = %rate,
                        "live rate fetched");
                    self.memory_put(key, rate);
                    if let Some(store) = &self.store {
                        if let Err(e) = store.put_rate(from, to, &day, rate).await {
                            warn!(error = %e, "failed to persist live rate");
                        }
                    }
                    return RateResolution {
                        rate,
                        source: RateSource::Live,
                    };
                }
                Ok(Err(e)) => {
                    warn!(pair = %format!("{from}/{to}"), error = %e,
                        "live rate lookup failed; falling back");
                }
                Err(_) => {
                    warn!(pair = %format!("{from}/{to}"), timeout_ms = %self.live_timeout.as_millis(),
                        "live rate lookup timed out; falling back");
                }
            }
        }

        if let Some(rate) = static_rate(from, to) {
            return RateResolution {
                rate,
                source: RateSource::Static,
            };
        }

        RateResolution {
            rate: Decimal::ONE,
            source: RateSource::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRateStore;

    struct FixedLiveSource(Decimal);

    #[async_trait]
    impl LiveRateSource for FixedLiveSource {
        async fn fetch_rate(
            &self,
            _from: &Currency,
            _to: &Currency,
            _day: &str,
        ) -> Result<Decimal, RateError> {
            Ok(self.0)
        }
    }

    struct FailingLiveSource;

    #[async_trait]
    impl LiveRateSource for FailingLiveSource {
        async fn fetch_rate(
            &self,
            _from: &Currency,
            _to: &Currency,
            _day: &str,
        ) -> Result<Decimal, RateError> {
            Err(RateError::Network("connection refused".into()))
        }
    }

    struct SlowLiveSource;

    #[async_trait]
    impl LiveRateSource for SlowLiveSource {
        async fn fetch_rate(
            &self,
            _from: &Currency,
            _to: &Currency,
            _day: &str,
        ) -> Result<Decimal, RateError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(RateError::Unavailable)
        }
    }

    fn eur() -> Currency {
        Currency::new("EUR")
    }

    #[tokio::test]
    async fn test_identity_rate() {
        let fx = FxConverter::offline();
        let resolution = fx
            .resolve(&Currency::usd(), &Currency::usd(), TimeMs::new(0))
            .await;
        assert_eq!(resolution.rate, Decimal::ONE);
        assert_eq!(resolution.source, RateSource::Identity);
    }

    #[tokio::test]
    async fn test_live_rate_cached_back_durably() {
        let store = Arc::new(MemoryRateStore::new());
        let fx = FxConverter::new(
            Some(store.clone()),
            Some(Arc::new(FixedLiveSource(Decimal::parse("1.10").unwrap()))),
            Duration::from_secs(5),
        );

        let first = fx.resolve(&eur(), &Currency::usd(), TimeMs::new(0)).await;
        assert_eq!(first.source, RateSource::Live);
        assert_eq!(first.rate, Decimal::parse("1.10").unwrap());

        // Durable store now has the rate.
        let stored = store
            .get_rate(&eur(), &Currency::usd(), &TimeMs::new(0).day_key())
            .await
            .unwrap();
        assert_eq!(stored, Some(Decimal::parse("1.10").unwrap()));

        // Second resolution is served from cache.
        let second = fx.resolve(&eur(), &Currency::usd(), TimeMs::new(0)).await;
        assert_eq!(second.source, RateSource::Cached);
    }

    #[tokio::test]
    async fn test_failed_live_falls_to_static() {
        let fx = FxConverter::new(
            None,
            Some(Arc::new(FailingLiveSource)),
            Duration::from_secs(5),
        );
        let resolution = fx.resolve(&eur(), &Currency::usd(), TimeMs::new(0)).await;
        assert_eq!(resolution.source, RateSource::Static);
        assert_eq!(resolution.rate, Decimal::parse("1.08").unwrap());
    }

    #[tokio::test]
    async fn test_timeout_falls_to_static() {
        let fx = FxConverter::new(
            None,
            Some(Arc::new(SlowLiveSource)),
            Duration::from_millis(20),
        );
        let resolution = fx.resolve(&eur(), &Currency::usd(), TimeMs::new(0)).await;
        assert_eq!(resolution.source, RateSource::Static);
    }

    #[tokio::test]
    async fn test_unknown_pair_defaults_to_identity() {
        let fx = FxConverter::offline();
        let resolution = fx
            .resolve(&Currency::new("XXX"), &Currency::usd(), TimeMs::new(0))
            .await;
        assert_eq!(resolution.source, RateSource::Default);
        assert_eq!(resolution.rate, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_static_cross_rate() {
        // EUR -> GBP through USD: 1.08 / 1.27.
        let rate = static_rate(&eur(), &Currency::new("GBP")).unwrap();
        let expected = Decimal::parse("1.08").unwrap() / Decimal::parse("1.27").unwrap();
        assert_eq!(rate, expected);
    }

    #[tokio::test]
    async fn test_different_days_are_distinct_cache_keys() {
        let store = Arc::new(MemoryRateStore::new());
        store
            .put_rate(
                &eur(),
                &Currency::usd(),
                &TimeMs::new(0).day_key(),
                Decimal::parse("1.05").unwrap(),
            )
            .await
            .unwrap();
        let fx = FxConverter::new(Some(store), None, Duration::from_secs(5));

        let cached_day = fx.resolve(&eur(), &Currency::usd(), TimeMs::new(0)).await;
        assert_eq!(cached_day.source, RateSource::Cached);

        let other_day = fx
            .resolve(&eur(), &Currency::usd(), TimeMs::new(0).plus_days(1))
            .await;
        // No stored rate for the other day: static fallback.
        assert_eq!(other_day.source, RateSource::Static);
    }
}
