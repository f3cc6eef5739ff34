//! HTTP client for a daily exchange-rate API.

use super::fx::{LiveRateSource, RateError};
use crate::domain::{Currency, Decimal};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Rate API client: `GET {base_url}/{day}?base={from}&symbols={to}`
/// returning `{"rates": {"<to>": <rate>}}`.
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    client: Client,
    base_url: String,
}

impl HttpRateSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, RateError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(RateError::Network(e.to_string())))?;

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(backoff::Error::transient(RateError::HttpStatus(
                    status.as_u16(),
                )));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(RateError::HttpStatus(
                    status.as_u16(),
                )));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(RateError::Parse(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl LiveRateSource for HttpRateSource {
    async fn fetch_rate(
        &self,
        from: &Currency,
        to: &Currency,
        day: &str,
    ) -> Result<Decimal, RateError> {
        let url = format!(
            "{}/{}?base={}&symbols={}",
            self.base_url,
            day,
            from.as_str(),
            to.as_str()
        );
        debug!(%url, "fetching live exchange rate");

        let body = self.get_json(&url).await?;
        let rate_value = body
            .get("rates")
            .and_then(|rates| rates.get(to.as_str()))
            .ok_or(RateError::Unavailable)?;

        match rate_value {
            serde_json::Value::Number(n) => Decimal::parse(&n.to_string())
                .map_err(|e| RateError::Parse(e.to_string())),
            serde_json::Value::String(s) => {
                Decimal::parse(s).map_err(|e| RateError::Parse(e.to_string()))
            }
            other => Err(RateError::Parse(format!("unexpected rate value: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_shape() {
        let source = HttpRateSource::new("https://rates.example.com".to_string());
        // The URL format is part of the provider contract; pin it.
        let url = format!(
            "{}/{}?base={}&symbols={}",
            source.base_url,
            "2024-01-15",
            "EUR",
            "USD"
        );
        assert_eq!(
            url,
            "https://rates.example.com/2024-01-15?base=EUR&symbols=USD"
        );
    }
}
