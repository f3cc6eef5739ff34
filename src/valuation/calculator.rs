//! The claim value calculator.
//!
//! Resolves the maximum defensible recovery amount for one detection's raw
//! facts: item cost through the cascade, package dimensions and size tier,
//! fee-schedule math, and currency conversion. Every resolver has a
//! deterministic fallback, so valuation always completes; weak inputs only
//! lower the valuation confidence.

use super::cost::{resolve_unit_cost, CostCache};
use super::dimensions::{classify_size_tier, resolve_dimensions};
use super::fees::expected_unit_fee;
use super::fx::{FxConverter, RateResolution};
use crate::detectors::DetectionDataset;
use crate::domain::{ClaimFacts, ClaimValuation, Currency, Decimal, SellerId, TimeMs};
use std::sync::Arc;
use tracing::debug;

pub struct ClaimValueCalculator {
    cost_cache: Arc<CostCache>,
    fx: Arc<FxConverter>,
}

impl ClaimValueCalculator {
    pub fn new(cost_cache: Arc<CostCache>, fx: Arc<FxConverter>) -> Self {
        Self { cost_cache, fx }
    }

    /// Resolve an exchange rate directly, for detections that only need a
    /// currency conversion rather than a full valuation.
    pub async fn convert(
        &self,
        from: &Currency,
        to: &Currency,
        date: TimeMs,
    ) -> RateResolution {
        self.fx.resolve(from, to, date).await
    }

    /// Value one claim. `data` supplies the seller's invoices, catalog, and
    /// order history for cost/dimension resolution.
    pub async fn calculate(
        &self,
        seller_id: &SellerId,
        claim_id: &str,
        facts: &ClaimFacts,
        target_currency: &Currency,
        data: &DetectionDataset,
    ) -> ClaimValuation {
        let mut notes = Vec::new();

        let asin = data
            .catalog
            .iter()
            .find(|e| e.sku == facts.sku)
            .and_then(|e| e.asin.clone());

        let cost = match self.cost_cache.get(seller_id, &facts.sku) {
            Some(cached) => cached,
            None => {
                let resolved = resolve_unit_cost(
                    &facts.sku,
                    asin.as_deref(),
                    &data.invoices,
                    &data.catalog,
                    &data.orders,
                );
                self.cost_cache.put(seller_id, &facts.sku, resolved.clone());
                resolved
            }
        };
        notes.push(format!(
            "unit cost {} from {} (confidence {:.2})",
            cost.unit_cost,
            cost.source.as_str(),
            cost.confidence
        ));

        let dims = resolve_dimensions(&facts.sku, &data.catalog);
        let tier = classify_size_tier(&dims.dimensions);
        notes.push(format!(
            "size tier {} from {} dimensions (billable {} oz)",
            tier.as_str(),
            if dims.from_catalog {
                "catalog"
            } else {
                "placeholder"
            },
            dims.dimensions.billable_weight_oz().round_cents()
        ));

        let category = facts.category.as_deref().or_else(|| {
            data.catalog
                .iter()
                .find(|e| e.sku == facts.sku)
                .and_then(|e| e.category.as_deref())
        });
        let expected_fee =
            expected_unit_fee(tier, &dims.dimensions, facts.sale_price, category);
        let fee_overcharge_per_unit = match facts.charged_fee {
            Some(charged) => (charged - expected_fee).max(Decimal::ZERO),
            None => Decimal::ZERO,
        };
        if fee_overcharge_per_unit.is_positive() {
            notes.push(format!(
                "fee overcharge {} per unit against expected {}",
                fee_overcharge_per_unit, expected_fee
            ));
        }

        let quantity = Decimal::from_i64(facts.quantity);
        let base_value = cost.unit_cost * quantity;
        let fee_recovery = fee_overcharge_per_unit * quantity;
        let total_value = base_value + fee_recovery;

        let rate = self
            .fx
            .resolve(&facts.currency, target_currency, facts.event_date)
            .await;
        let converted_value = (total_value * rate.rate).round_cents();
        notes.push(format!(
            "converted {} {} -> {} {} at rate {} ({})",
            total_value,
            facts.currency,
            converted_value,
            target_currency,
            rate.rate,
            rate.source.as_str()
        ));

        debug!(claim = claim_id, seller = %seller_id, total = %total_value,
            converted = %converted_value, "claim valued");

        ClaimValuation {
            unit_cost: cost.unit_cost,
            cost_source: cost.source,
            cost_confidence: cost.confidence,
            quantity: facts.quantity,
            fee_overcharge_per_unit,
            base_value,
            fee_recovery,
            total_value,
            source_currency: facts.currency.clone(),
            target_currency: target_currency.clone(),
            exchange_rate: rate.rate,
            rate_source: rate.source,
            converted_value,
            valuation_confidence: cost.confidence.min(dims.confidence),
            method_notes: notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CatalogEntry, CostSource, InvoiceLineItem, RateSource, Sku, TimeMs,
    };
    use std::time::Duration;

    fn facts(sku: &str, quantity: i64) -> ClaimFacts {
        ClaimFacts {
            sku: Sku::new(sku),
            quantity,
            event_date: TimeMs::new(1_705_320_000_000),
            charged_fee: None,
            category: None,
            sale_price: None,
            currency: Currency::usd(),
        }
    }

    fn calculator() -> ClaimValueCalculator {
        ClaimValueCalculator::new(
            Arc::new(CostCache::new(Duration::from_secs(300))),
            Arc::new(FxConverter::offline()),
        )
    }

    #[tokio::test]
    async fn test_invoice_cost_and_identity_rate() {
        let data = DetectionDataset {
            invoices: vec![InvoiceLineItem {
                invoice_id: "INV-1".into(),
                sku: Some(Sku::new("SKU-1")),
                asin: None,
                unit_cost: Decimal::parse("12.50").unwrap(),
                quantity: 100,
                invoice_date: TimeMs::new(0),
            }],
            ..Default::default()
        };
        let valuation = calculator()
            .calculate(
                &SellerId::new("S1"),
                "claim-1",
                &facts("SKU-1", 4),
                &Currency::usd(),
                &data,
            )
            .await;

        assert_eq!(valuation.cost_source, CostSource::Invoice);
        assert_eq!(valuation.cost_confidence, 0.95);
        assert_eq!(valuation.base_value, Decimal::parse("50").unwrap());
        assert_eq!(valuation.exchange_rate, Decimal::ONE);
        assert_eq!(valuation.rate_source, RateSource::Identity);
        assert_eq!(valuation.converted_value, Decimal::parse("50").unwrap());
        // Placeholder dimensions cap the valuation confidence at 0.5.
        assert_eq!(valuation.valuation_confidence, 0.50);
    }

    #[tokio::test]
    async fn test_fee_recovery_added() {
        let mut claim_facts = facts("SKU-1", 2);
        // Placeholder dims bill at ~2.3 lb dimensional weight: up-to-3-lb
        // band, $5.68 fulfillment fee. Charged $8 per unit.
        claim_facts.charged_fee = Some(Decimal::parse("8").unwrap());
        let valuation = calculator()
            .calculate(
                &SellerId::new("S1"),
                "claim-1",
                &claim_facts,
                &Currency::usd(),
                &DetectionDataset::default(),
            )
            .await;

        assert_eq!(
            valuation.fee_overcharge_per_unit,
            Decimal::parse("2.32").unwrap()
        );
        assert_eq!(valuation.fee_recovery, Decimal::parse("4.64").unwrap());
        // Default $15 cost x 2 + fee recovery.
        assert_eq!(valuation.total_value, Decimal::parse("34.64").unwrap());
    }

    #[tokio::test]
    async fn test_catalog_dimensions_raise_confidence() {
        let data = DetectionDataset {
            catalog: vec![CatalogEntry {
                sku: Sku::new("SKU-1"),
                asin: None,
                unit_cost: Some(Decimal::parse("10").unwrap()),
                weight_lb: Some(Decimal::parse("0.5").unwrap()),
                length_in: Some(Decimal::parse("12").unwrap()),
                width_in: Some(Decimal::parse("9").unwrap()),
                height_in: Some(Decimal::parse("0.5").unwrap()),
                category: None,
            }],
            ..Default::default()
        };
        let valuation = calculator()
            .calculate(
                &SellerId::new("S1"),
                "claim-1",
                &facts("SKU-1", 1),
                &Currency::usd(),
                &data,
            )
            .await;

        assert_eq!(valuation.cost_source, CostSource::Catalog);
        // min(catalog cost 0.85, catalog dimensions 0.90).
        assert_eq!(valuation.valuation_confidence, 0.85);
    }

    #[tokio::test]
    async fn test_static_conversion_applied() {
        let mut claim_facts = facts("SKU-1", 1);
        claim_facts.currency = Currency::new("EUR");
        let valuation = calculator()
            .calculate(
                &SellerId::new("S1"),
                "claim-1",
                &claim_facts,
                &Currency::usd(),
                &DetectionDataset::default(),
            )
            .await;

        assert_eq!(valuation.rate_source, RateSource::Static);
        // $15 default cost x 1.08 static EUR/USD.
        assert_eq!(valuation.converted_value, Decimal::parse("16.20").unwrap());
    }

    #[tokio::test]
    async fn test_round_trip_conversion_within_tolerance() {
        let mut there_facts = facts("SKU-1", 3);
        there_facts.currency = Currency::new("EUR");
        let calc = calculator();
        let there = calc
            .calculate(
                &SellerId::new("S1"),
                "claim-1",
                &there_facts,
                &Currency::usd(),
                &DetectionDataset::default(),
            )
            .await;

        // Convert back with the inverse rate.
        let back = there.converted_value / there.exchange_rate;
        let diff = (back - there.total_value).abs();
        assert!(diff <= Decimal::parse("0.01").unwrap(), "diff {}", diff);
    }

    #[tokio::test]
    async fn test_cost_cache_reused_across_calls() {
        let cache = Arc::new(CostCache::new(Duration::from_secs(300)));
        let calc = ClaimValueCalculator::new(cache.clone(), Arc::new(FxConverter::offline()));
        let data = DetectionDataset {
            catalog: vec![CatalogEntry {
                sku: Sku::new("SKU-1"),
                asin: None,
                unit_cost: Some(Decimal::parse("10").unwrap()),
                weight_lb: None,
                length_in: None,
                width_in: None,
                height_in: None,
                category: None,
            }],
            ..Default::default()
        };
        let seller = SellerId::new("S1");

        calc.calculate(&seller, "claim-1", &facts("SKU-1", 1), &Currency::usd(), &data)
            .await;
        assert!(cache.get(&seller, &Sku::new("SKU-1")).is_some());

        // Second call resolves from cache even with the catalog gone.
        let valuation = calc
            .calculate(
                &seller,
                "claim-2",
                &facts("SKU-1", 1),
                &Currency::usd(),
                &DetectionDataset::default(),
            )
            .await;
        assert_eq!(valuation.cost_source, CostSource::Catalog);
    }
}
