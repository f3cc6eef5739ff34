//! End-to-end detection run tests over in-memory stores.

use recoup::calibration::{ConfidenceCalibrator, DEFAULT_CACHE_TTL};
use recoup::domain::{
    CaseId, ClaimRecord, ClaimStatus, Currency, Decimal, DetectionStatus, Order, OrderId, Refund,
    SellerId, Sku, SyncId, TimeMs,
};
use recoup::orchestration::DetectionRunner;
use recoup::store::memory::SellerEvents;
use recoup::store::{MemoryEventStore, MemoryOutcomeStore, MemoryResultSink};
use recoup::valuation::{ClaimValueCalculator, CostCache, FxConverter};
use recoup::AnomalyType;
use std::sync::Arc;
use std::time::Duration;

fn as_of() -> TimeMs {
    TimeMs::new(1_750_000_000_000)
}

fn seller() -> SellerId {
    SellerId::new("S1")
}

fn fixture_events() -> SellerEvents {
    SellerEvents {
        orders: vec![Order {
            order_id: OrderId::new("ORD-2"),
            seller_id: seller(),
            sku: Sku::new("SKU-2"),
            buyer_id: None,
            order_date: as_of().minus_days(20),
            quantity_ordered: 5,
            quantity_shipped: 3,
            unit_price: Decimal::parse("30").unwrap(),
            listed_price: Decimal::parse("30").unwrap(),
            charged_fee: Decimal::parse("15").unwrap(),
            expected_fee: None,
            net_proceeds: None,
            category: None,
            currency: Currency::usd(),
        }],
        refunds: vec![Refund {
            refund_id: "R-1".into(),
            order_id: OrderId::new("ORD-1"),
            sku: None,
            buyer_id: None,
            refund_date: as_of().minus_days(70),
            quantity: 1,
            amount: Decimal::parse("50").unwrap(),
            currency: Currency::usd(),
            marked_return_status: None,
            restocking_fee_applied: Decimal::ZERO,
        }],
        claims: vec![ClaimRecord {
            case_id: CaseId::new("C-1"),
            order_id: None,
            sku: None,
            event_date: as_of().minus_days(30),
            filed_date: as_of().minus_days(20),
            status: ClaimStatus::Closed,
            requested_amount: Decimal::parse("100").unwrap(),
            reimbursed_amount: Decimal::parse("60").unwrap(),
            currency: Currency::usd(),
            resolution_reason: None,
            last_response_date: None,
            has_proof_of_delivery: false,
            has_invoice: false,
            carrier_delay_days: 0,
            platform_delay_days: 0,
        }],
        ..Default::default()
    }
}

struct Harness {
    event_store: Arc<MemoryEventStore>,
    sink: Arc<MemoryResultSink>,
    calibrator: Arc<ConfidenceCalibrator>,
    runner: DetectionRunner,
}

fn harness() -> Harness {
    let event_store = Arc::new(MemoryEventStore::new());
    event_store.insert_seller(seller(), fixture_events());

    let sink = Arc::new(MemoryResultSink::new());
    let outcomes = Arc::new(MemoryOutcomeStore::new());
    let calibrator = Arc::new(ConfidenceCalibrator::new(outcomes, DEFAULT_CACHE_TTL));
    let calculator = Arc::new(ClaimValueCalculator::new(
        Arc::new(CostCache::new(Duration::from_secs(300))),
        Arc::new(FxConverter::offline()),
    ));

    let runner = DetectionRunner::new(
        event_store.clone(),
        sink.clone(),
        calibrator.clone(),
        calculator,
        180,
        Currency::usd(),
    );
    Harness {
        event_store,
        sink,
        calibrator,
        runner,
    }
}

#[tokio::test]
async fn test_full_run_emits_and_writes_expected_detections() {
    let h = harness();
    let summary = h
        .runner
        .run_batch(&seller(), &SyncId::new("sync-1"), as_of())
        .await;

    assert_eq!(summary.detectors_run, 8);
    assert_eq!(summary.results_emitted, 3);
    assert_eq!(summary.results_written, 3);

    let results = h.sink.results();
    let types: Vec<AnomalyType> = results.iter().map(|r| r.anomaly_type).collect();
    assert!(types.contains(&AnomalyType::RefundNoReturn));
    assert!(types.contains(&AnomalyType::QuantityMismatch));
    assert!(types.contains(&AnomalyType::PartialReimbursement));

    for result in &results {
        assert_eq!(result.status, DetectionStatus::Pending);
        assert_eq!(result.sync_id, SyncId::new("sync-1"));
        assert!(result.estimated_value >= Decimal::from_i64(10));
        // Without outcome history, calibration passes raw scores through.
        assert_eq!(
            result.evidence.fields["raw_confidence"],
            serde_json::json!(result.confidence)
        );
    }
}

#[tokio::test]
async fn test_failing_source_degrades_to_partial_run() {
    let h = harness();
    h.event_store.fail_source("refunds");

    let summary = h
        .runner
        .run_batch(&seller(), &SyncId::new("sync-1"), as_of())
        .await;

    // Refund-based detections vanish; the rest of the run proceeds.
    assert_eq!(summary.results_emitted, 2);
    let types: Vec<AnomalyType> = h.sink.results().iter().map(|r| r.anomaly_type).collect();
    assert!(!types.contains(&AnomalyType::RefundNoReturn));
    assert!(types.contains(&AnomalyType::QuantityMismatch));
    assert!(types.contains(&AnomalyType::PartialReimbursement));
}

#[tokio::test]
async fn test_failing_sink_swallows_write_errors() {
    let h = harness();
    h.sink.set_failing(true);

    let summary = h
        .runner
        .run_batch(&seller(), &SyncId::new("sync-1"), as_of())
        .await;

    // Detection still ran; writes were dropped, not fatal.
    assert_eq!(summary.results_emitted, 3);
    assert_eq!(summary.results_written, 0);
}

#[tokio::test]
async fn test_outcome_history_rewrites_confidence() {
    let h = harness();

    // 60 resolved refund-no-return outcomes at 40% approval.
    for n in 0..60 {
        let outcome = if n < 24 {
            recoup::domain::ClaimOutcome::Approved
        } else {
            recoup::domain::ClaimOutcome::Rejected
        };
        h.calibrator
            .record_outcome(&recoup::domain::OutcomeRecord {
                detection_key: format!("det:{n}"),
                anomaly_type: AnomalyType::RefundNoReturn,
                predicted_confidence: 0.95,
                outcome,
                claimed_amount: Decimal::parse("100").unwrap(),
                recovery_amount: Decimal::ZERO,
                filed_date: None,
                resolution_date: None,
                recorded_at: as_of(),
            })
            .await
            .unwrap();
    }

    h.runner
        .run_batch(&seller(), &SyncId::new("sync-1"), as_of())
        .await;

    let results = h.sink.results();
    let refund = results
        .iter()
        .find(|r| r.anomaly_type == AnomalyType::RefundNoReturn)
        .unwrap();

    // Raw 0.95 down-weighted by the 40% historical approval rate at full
    // sample weight: factor clamps to 0.5.
    assert_eq!(
        refund.evidence.fields["raw_confidence"],
        serde_json::json!(0.95)
    );
    assert!((refund.confidence - 0.475).abs() < 1e-9);
    assert_eq!(
        refund.evidence.fields["confidence_interval"],
        serde_json::json!("high")
    );

    // Types without history remain untouched.
    let quantity = results
        .iter()
        .find(|r| r.anomaly_type == AnomalyType::QuantityMismatch)
        .unwrap();
    assert_eq!(quantity.confidence, 0.75);
}
