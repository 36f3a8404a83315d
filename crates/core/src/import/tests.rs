//! Lifecycle wiring tests: documents flowing through the default hooks.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use landed_shared::AccountsConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::ImportError;
use super::hooks::{HookContext, SalesInvoiceCharges, default_registry};
use super::lifecycle::{Document, HookRegistry, LifecycleEvent};
use super::memory::RecordingDocumentWriter;
use super::outbox::{InMemoryOutbox, TaskStatus};
use super::ports::DocumentWriter;
use super::types::{ImportDoc, ImportDocItem, PurchaseInvoice, SalesInvoice, SalesInvoiceItem};
use crate::charge::{ChargeAllocationService, ChargeType, EntryType, InMemoryChargeLedger};
use crate::journal::InMemoryLedgerPoster;
use crate::tax::{LandedCostItem, LandedCostVoucher, StaticTariffTable, TaxCategory, TaxRates};

/// Host that refuses every write-back.
struct RejectingWriter;

#[async_trait]
impl DocumentWriter for RejectingWriter {
    async fn set_allocated_charges(
        &self,
        invoice: &str,
        _item_code: &str,
        _charges: Decimal,
    ) -> Result<(), ImportError> {
        Err(ImportError::Store(format!("{invoice} is locked")))
    }

    async fn save_assessment(&self, _voucher: &LandedCostVoucher) -> Result<(), ImportError> {
        Err(ImportError::Store("locked".to_string()))
    }
}

struct Harness {
    charges: Arc<ChargeAllocationService<InMemoryChargeLedger>>,
    poster: Arc<InMemoryLedgerPoster>,
    writer: Arc<RecordingDocumentWriter>,
    outbox: Arc<InMemoryOutbox>,
    ctx: HookContext,
    registry: HookRegistry,
}

fn accounts() -> AccountsConfig {
    AccountsConfig {
        unallocated_import_charges: Some("Unallocated Import Charges - CO".to_string()),
        default_import_charges: Some("Import Charges - CO".to_string()),
        sales_tax_input: Some("Sales Tax Input - CO".to_string()),
        advance_income_tax: Some("Advance Income Tax - CO".to_string()),
        government_payable: Some("Government Payable - CO".to_string()),
        rounding: Some("Round Off - CO".to_string()),
        ..AccountsConfig::default()
    }
}

fn harness_with(accounts: AccountsConfig) -> Harness {
    let charges = Arc::new(ChargeAllocationService::new(InMemoryChargeLedger::new()));
    let poster = Arc::new(InMemoryLedgerPoster::new());
    let writer = Arc::new(RecordingDocumentWriter::new());
    let outbox = Arc::new(InMemoryOutbox::new());
    let tariffs = StaticTariffTable::new().with_rates(
        "8471.3010",
        TaxRates::new()
            .with(TaxCategory::CustomsDuty, dec!(10))
            .with(TaxCategory::AdditionalCustomsDuty, dec!(2))
            .with(TaxCategory::SalesTax, dec!(17))
            .with(TaxCategory::AdditionalSalesTax, dec!(3))
            .with(TaxCategory::IncomeTax, dec!(1)),
    );
    let ctx = HookContext {
        poster: poster.clone(),
        writer: writer.clone(),
        tariffs: Arc::new(tariffs),
        outbox: outbox.clone(),
        accounts,
    };
    let registry = default_registry(charges.clone(), ctx.clone());
    Harness {
        charges,
        poster,
        writer,
        outbox,
        ctx,
        registry,
    }
}

fn harness() -> Harness {
    harness_with(accounts())
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 7).unwrap()
}

fn import_doc() -> ImportDoc {
    ImportDoc {
        name: "IMP-0001".to_string(),
        items: vec![
            ImportDocItem {
                item_code: "ITEM-001".to_string(),
                qty: dec!(10),
                base_amount: dec!(1000),
                allocated_charges_ex_cd: dec!(100),
                assessment_difference: dec!(-40),
            },
            ImportDocItem {
                item_code: "ITEM-002".to_string(),
                qty: dec!(4),
                base_amount: dec!(400),
                allocated_charges_ex_cd: dec!(40),
                assessment_difference: Decimal::ZERO,
            },
        ],
        ..ImportDoc::default()
    }
}

fn sales_invoice(name: &str, is_return: bool, items: &[(&str, Decimal)]) -> SalesInvoice {
    SalesInvoice {
        name: name.to_string(),
        posting_date: date(),
        is_return,
        items: items
            .iter()
            .map(|(item_code, qty)| SalesInvoiceItem {
                item_code: (*item_code).to_string(),
                qty: *qty,
            })
            .collect(),
    }
}

async fn submit(h: &Harness, doc: Document) {
    h.registry.dispatch(LifecycleEvent::Submit, &doc).await.unwrap();
}

#[tokio::test]
async fn test_import_doc_submit_creates_layers() {
    let h = harness();

    submit(&h, Document::ImportDoc(import_doc())).await;

    let entries = h.charges.store().entries().await;
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.entry_type == EntryType::Addition));

    let variance = h
        .charges
        .available_charges("ITEM-001", ChargeType::AssessmentVariance)
        .await
        .unwrap();
    assert_eq!(variance.remaining_charges, dec!(40));
    assert_eq!(variance.remaining_qty, dec!(10));

    let pool = h
        .charges
        .available_charges("ITEM-002", ChargeType::ImportCharges)
        .await
        .unwrap();
    assert_eq!(pool.remaining_charges, dec!(40));
    assert_eq!(pool.open_layers, 1);
}

#[tokio::test]
async fn test_import_doc_with_bad_row_writes_nothing() {
    let h = harness();
    let mut doc = import_doc();
    doc.items[1].qty = Decimal::ZERO;

    let err = h
        .registry
        .dispatch(LifecycleEvent::Submit, &Document::ImportDoc(doc))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    assert!(h.charges.store().entries().await.is_empty());
}

#[tokio::test]
async fn test_sales_submit_allocates_posts_and_writes_back() {
    let h = harness();
    submit(&h, Document::ImportDoc(import_doc())).await;

    let invoice = sales_invoice(
        "SINV-0001",
        false,
        &[("ITEM-001", dec!(3)), ("ITEM-404", dec!(1)), ("ITEM-002", dec!(2))],
    );
    submit(&h, Document::SalesInvoice(invoice)).await;

    assert_eq!(h.writer.allocated_charges("SINV-0001", "ITEM-001"), Some(dec!(30)));
    assert_eq!(h.writer.allocated_charges("SINV-0001", "ITEM-002"), Some(dec!(20)));
    assert_eq!(h.writer.allocated_charges("SINV-0001", "ITEM-404"), None);

    let posted = h.poster.posted();
    assert_eq!(posted.len(), 2);
    assert!(posted.iter().all(|v| v.is_balanced()));
    assert_eq!(posted[0].total_debit(), dec!(30));
    assert_eq!(posted[0].lines[0].account, "Import Charges - CO");
    assert_eq!(posted[0].lines[1].account, "Unallocated Import Charges - CO");

    // Only the import charges pool is consumed by sales
    let variance = h
        .charges
        .available_charges("ITEM-001", ChargeType::AssessmentVariance)
        .await
        .unwrap();
    assert_eq!(variance.remaining_qty, dec!(10));
}

#[tokio::test]
async fn test_sales_item_failure_does_not_stop_other_items() {
    let h = harness();
    submit(&h, Document::ImportDoc(import_doc())).await;
    let handler = SalesInvoiceCharges::new(h.charges.clone(), h.ctx.clone());

    let summary = handler
        .submit(&sales_invoice(
            "SINV-0002",
            false,
            &[("ITEM-002", dec!(9)), ("ITEM-001", dec!(1))],
        ))
        .await;

    assert_eq!(summary.charged, vec![("ITEM-001".to_string(), dec!(10))]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "ITEM-002");
    assert_eq!(summary.failed[0].1.error_code(), "INSUFFICIENT_CHARGE_LAYERS");
}

#[tokio::test]
async fn test_sales_item_rolls_back_when_posting_fails() {
    let h = harness();
    submit(&h, Document::ImportDoc(import_doc())).await;
    h.poster.set_failing(true);

    submit(
        &h,
        Document::SalesInvoice(sales_invoice("SINV-0003", false, &[("ITEM-001", dec!(5))])),
    )
    .await;

    let pool = h
        .charges
        .available_charges("ITEM-001", ChargeType::ImportCharges)
        .await
        .unwrap();
    assert_eq!(pool.remaining_qty, dec!(10));
    assert_eq!(pool.remaining_charges, dec!(100));
    assert!(h.charges.entries_for("SINV-0003").await.unwrap().is_empty());
    assert_eq!(h.writer.allocated_charges("SINV-0003", "ITEM-001"), None);
}

#[tokio::test]
async fn test_return_invoice_restores_charges() {
    let h = harness();
    submit(&h, Document::ImportDoc(import_doc())).await;
    submit(
        &h,
        Document::SalesInvoice(sales_invoice("SINV-0004", false, &[("ITEM-001", dec!(8))])),
    )
    .await;

    submit(
        &h,
        Document::SalesInvoice(sales_invoice("SINV-RET-0001", true, &[("ITEM-001", dec!(-3))])),
    )
    .await;

    assert_eq!(
        h.writer.allocated_charges("SINV-RET-0001", "ITEM-001"),
        Some(dec!(-30))
    );
    let pool = h
        .charges
        .available_charges("ITEM-001", ChargeType::ImportCharges)
        .await
        .unwrap();
    assert_eq!(pool.remaining_qty, dec!(5));
    assert_eq!(pool.remaining_charges, dec!(50));

    let posted = h.poster.posted();
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[1].lines[0].account, "Unallocated Import Charges - CO");
    assert_eq!(posted[1].total_debit(), dec!(30));
}

#[tokio::test]
async fn test_sales_cancel_releases_and_reverses() {
    let h = harness();
    submit(&h, Document::ImportDoc(import_doc())).await;
    let invoice = Document::SalesInvoice(sales_invoice(
        "SINV-0005",
        false,
        &[("ITEM-001", dec!(4)), ("ITEM-002", dec!(4))],
    ));
    submit(&h, invoice.clone()).await;

    h.registry
        .dispatch(LifecycleEvent::Cancel, &invoice)
        .await
        .unwrap();

    for (item, charges) in [("ITEM-001", dec!(100)), ("ITEM-002", dec!(40))] {
        let pool = h
            .charges
            .available_charges(item, ChargeType::ImportCharges)
            .await
            .unwrap();
        assert_eq!(pool.remaining_charges, charges);
    }
    let posted = h.poster.posted();
    assert_eq!(posted.len(), 3);
    assert_eq!(posted[2].total_credit(), dec!(80));
    assert_eq!(posted[2].lines[1].account, "Import Charges - CO");
}

#[tokio::test]
async fn test_multi_pool_item_is_all_or_nothing() {
    let h = harness();
    submit(&h, Document::ImportDoc(import_doc())).await;
    let handler = SalesInvoiceCharges::new(h.charges.clone(), h.ctx.clone())
        .with_pools(vec![ChargeType::ImportCharges, ChargeType::AssessmentVariance]);

    // ITEM-002 has no assessment variance layer
    let summary = handler
        .submit(&sales_invoice(
            "SINV-0006",
            false,
            &[("ITEM-002", dec!(2)), ("ITEM-001", dec!(3))],
        ))
        .await;

    assert_eq!(summary.charged, vec![("ITEM-001".to_string(), dec!(42))]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "ITEM-002");
    assert!(summary.unrecorded.is_empty());

    let pool = h
        .charges
        .available_charges("ITEM-002", ChargeType::ImportCharges)
        .await
        .unwrap();
    assert_eq!(pool.remaining_qty, dec!(4));
    assert_eq!(pool.remaining_charges, dec!(40));
    let entries = h.charges.entries_for("SINV-0006").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.item_code == "ITEM-001"));

    // one journal for the item total across both pools
    let posted = h.poster.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].total_debit(), dec!(42));
}

#[tokio::test]
async fn test_failed_write_back_keeps_committed_item() {
    let h = harness();
    submit(&h, Document::ImportDoc(import_doc())).await;
    let ctx = HookContext {
        writer: Arc::new(RejectingWriter),
        ..h.ctx.clone()
    };
    let handler = SalesInvoiceCharges::new(h.charges.clone(), ctx);

    let summary = handler
        .submit(&sales_invoice("SINV-0007", false, &[("ITEM-001", dec!(3))]))
        .await;

    assert_eq!(summary.charged, vec![("ITEM-001".to_string(), dec!(30))]);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.unrecorded.len(), 1);
    assert_eq!(summary.unrecorded[0].1.error_code(), "STORE_ERROR");
    assert_eq!(h.charges.entries_for("SINV-0007").await.unwrap().len(), 1);
    assert_eq!(h.poster.posted().len(), 1);
}

#[tokio::test]
async fn test_return_invoice_cancel_consumes_restored_charges() {
    let h = harness();
    submit(&h, Document::ImportDoc(import_doc())).await;
    let sale = Document::SalesInvoice(sales_invoice("SINV-0008", false, &[("ITEM-001", dec!(8))]));
    let ret = Document::SalesInvoice(sales_invoice(
        "SINV-RET-0002",
        true,
        &[("ITEM-001", dec!(-3))],
    ));
    submit(&h, sale.clone()).await;
    submit(&h, ret.clone()).await;

    h.registry.dispatch(LifecycleEvent::Cancel, &ret).await.unwrap();

    let pool = h
        .charges
        .available_charges("ITEM-001", ChargeType::ImportCharges)
        .await
        .unwrap();
    assert_eq!(pool.remaining_qty, dec!(2));
    assert_eq!(pool.remaining_charges, dec!(20));
    let entries = h.charges.entries_for("SINV-RET-0002").await.unwrap();
    assert!(entries.iter().all(|e| e.is_cancelled));

    let posted = h.poster.posted();
    assert_eq!(posted.len(), 3);
    assert_eq!(posted[2].lines[0].account, "Import Charges - CO");
    assert_eq!(posted[2].total_debit(), dec!(30));

    // the sale releases everything it drew once the return is gone
    h.registry.dispatch(LifecycleEvent::Cancel, &sale).await.unwrap();
    let pool = h
        .charges
        .available_charges("ITEM-001", ChargeType::ImportCharges)
        .await
        .unwrap();
    assert_eq!(pool.remaining_qty, dec!(10));
    assert_eq!(pool.remaining_charges, dec!(100));
}

#[tokio::test]
async fn test_sale_cancel_after_full_return_restores_nothing_more() {
    let h = harness();
    submit(&h, Document::ImportDoc(import_doc())).await;
    let sale = Document::SalesInvoice(sales_invoice("SINV-0009", false, &[("ITEM-001", dec!(4))]));
    submit(&h, sale.clone()).await;
    submit(
        &h,
        Document::SalesInvoice(sales_invoice("SINV-RET-0003", true, &[("ITEM-001", dec!(-4))])),
    )
    .await;

    h.registry.dispatch(LifecycleEvent::Cancel, &sale).await.unwrap();

    let pool = h
        .charges
        .available_charges("ITEM-001", ChargeType::ImportCharges)
        .await
        .unwrap();
    assert_eq!(pool.remaining_qty, dec!(10));
    assert_eq!(pool.remaining_charges, dec!(100));
    // sale and return journals only; nothing left to reverse
    assert_eq!(h.poster.posted().len(), 2);
}

fn landed_cost_voucher(import_document: Option<&str>) -> LandedCostVoucher {
    LandedCostVoucher {
        name: "LCV-0001".to_string(),
        posting_date: date(),
        import_document: import_document.map(str::to_string),
        items: vec![LandedCostItem {
            item_code: "ITEM-001".to_string(),
            qty: dec!(10),
            amount: dec!(27500),
            assessed_value_per_unit: dec!(10),
            insurance: dec!(1),
            exchange_rate: dec!(278.50),
            has_incoterm: true,
            tariff_number: Some("8471.3010".to_string()),
            ..LandedCostItem::default()
        }],
    }
}

#[tokio::test]
async fn test_landed_cost_voucher_posts_taxes_then_enqueues() {
    let h = harness();

    submit(
        &h,
        Document::LandedCostVoucher(landed_cost_voucher(Some("IMP-0001"))),
    )
    .await;

    let assessed = h.writer.assessments();
    assert_eq!(assessed.len(), 1);
    let item = &assessed[0].items[0];
    assert_eq!(item.base_assessed_value, dec!(28410));
    assert_eq!(item.base_assessment_difference, dec!(910));

    let posted = h.poster.posted();
    assert_eq!(posted.len(), 5);
    assert_eq!(posted[0].title, "ST Pakistan Customs");
    assert_eq!(
        posted.iter().map(|v| v.total_debit()).sum::<Decimal>(),
        item.taxes.total
    );
    assert!(
        posted
            .iter()
            .all(|v| v.import_document.as_deref() == Some("IMP-0001"))
    );
    assert_eq!(h.outbox.count(TaskStatus::Pending), 1);
}

#[tokio::test]
async fn test_landed_cost_voucher_missing_account_posts_nothing() {
    let h = harness_with(AccountsConfig {
        government_payable: None,
        ..accounts()
    });

    let err = h
        .registry
        .dispatch(
            LifecycleEvent::Submit,
            &Document::LandedCostVoucher(landed_cost_voucher(Some("IMP-0001"))),
        )
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "MISSING_CONFIGURATION");
    assert!(h.poster.posted().is_empty());
    assert_eq!(h.outbox.count(TaskStatus::Pending), 0);
}

#[tokio::test]
async fn test_tagged_documents_enqueue_recompute() {
    let h = harness();
    let tagged = PurchaseInvoice {
        name: "PINV-0001".to_string(),
        import_document: Some("IMP-0001".to_string()),
        is_submitted: true,
        ..PurchaseInvoice::default()
    };
    let untagged = PurchaseInvoice {
        name: "PINV-0002".to_string(),
        ..PurchaseInvoice::default()
    };

    submit(&h, Document::PurchaseInvoice(untagged)).await;
    assert_eq!(h.outbox.count(TaskStatus::Pending), 0);

    submit(&h, Document::PurchaseInvoice(tagged.clone())).await;
    h.registry
        .dispatch(LifecycleEvent::Cancel, &Document::PurchaseInvoice(tagged))
        .await
        .unwrap();
    h.registry
        .dispatch(
            LifecycleEvent::Cancel,
            &Document::LandedCostVoucher(landed_cost_voucher(Some("IMP-0001"))),
        )
        .await
        .unwrap();

    // Pending tasks for the same document coalesce
    assert_eq!(h.outbox.count(TaskStatus::Pending), 1);
}
