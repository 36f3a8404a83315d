//! Postgres charge ledger store.
//!
//! Every engine operation runs in one database transaction. Queries with
//! `for_update` lock the matched rows (`SELECT ... FOR UPDATE`), so two
//! allocations from the same pool serialize on the cost layers they read.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use landed_core::charge::{
    ChargeEntryQuery, ChargeError, ChargeLedgerEntry, ChargeLedgerStore, ChargeLedgerTxn,
    ChargeType, DocumentRef, NewChargeEntry, SortOrder, SourceReference,
};
use landed_shared::types::ChargeEntryId;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::entities::sea_orm_active_enums::ChargeEntryType;
use crate::entities::{charge_ledger_entries, charge_source_references};

fn db_err(err: DbErr) -> ChargeError {
    ChargeError::Store(err.to_string())
}

/// Charge ledger backed by Postgres.
#[derive(Debug, Clone)]
pub struct SeaChargeLedger {
    db: DatabaseConnection,
}

impl SeaChargeLedger {
    /// Creates a new store.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl ChargeLedgerStore for SeaChargeLedger {
    type Txn = SeaChargeTxn;

    async fn begin(&self) -> Result<Self::Txn, ChargeError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        Ok(SeaChargeTxn { txn })
    }
}

/// Database transaction over the charge ledger. Dropped without commit, it
/// rolls back.
pub struct SeaChargeTxn {
    txn: DatabaseTransaction,
}

impl SeaChargeTxn {
    /// Next FIFO key: now, at database precision, but never at or before
    /// the newest entry of the pool.
    async fn next_posting_datetime(
        &self,
        item_code: &str,
        charge_type: ChargeType,
    ) -> Result<DateTime<Utc>, ChargeError> {
        let now = Utc::now().trunc_subsecs(6);
        let newest = charge_ledger_entries::Entity::find()
            .filter(charge_ledger_entries::Column::ItemCode.eq(item_code))
            .filter(charge_ledger_entries::Column::ChargeType.eq(charge_type.as_str()))
            .order_by_desc(charge_ledger_entries::Column::PostingDatetime)
            .limit(1)
            .one(&self.txn)
            .await
            .map_err(db_err)?;

        Ok(match newest {
            Some(row) if now <= row.posting_datetime.with_timezone(&Utc) => {
                row.posting_datetime.with_timezone(&Utc) + Duration::microseconds(1)
            }
            _ => now,
        })
    }

    async fn load_sources(
        &self,
        entry_ids: Vec<Uuid>,
    ) -> Result<HashMap<Uuid, Vec<SourceReference>>, ChargeError> {
        if entry_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = charge_source_references::Entity::find()
            .filter(charge_source_references::Column::EntryId.is_in(entry_ids))
            .order_by_asc(charge_source_references::Column::EntryId)
            .order_by_asc(charge_source_references::Column::Position)
            .all(&self.txn)
            .await
            .map_err(db_err)?;

        let mut by_entry: HashMap<Uuid, Vec<SourceReference>> = HashMap::new();
        for row in rows {
            by_entry.entry(row.entry_id).or_default().push(SourceReference {
                source_entry: ChargeEntryId::from_uuid(row.source_entry_id),
                allocated_qty: row.allocated_qty,
                allocated_charges: row.allocated_charges,
            });
        }
        Ok(by_entry)
    }

    async fn hydrate(
        &self,
        rows: Vec<charge_ledger_entries::Model>,
    ) -> Result<Vec<ChargeLedgerEntry>, ChargeError> {
        let mut sources = self.load_sources(rows.iter().map(|r| r.id).collect()).await?;
        rows.into_iter()
            .map(|row| {
                let refs = sources.remove(&row.id).unwrap_or_default();
                to_entry(row, refs)
            })
            .collect()
    }
}

fn to_entry(
    row: charge_ledger_entries::Model,
    source_references: Vec<SourceReference>,
) -> Result<ChargeLedgerEntry, ChargeError> {
    Ok(ChargeLedgerEntry {
        id: ChargeEntryId::from_uuid(row.id),
        entry_type: row.entry_type.into(),
        charge_type: row.charge_type.parse()?,
        item_code: row.item_code,
        qty: row.qty,
        charges: row.charges,
        remaining_qty: row.remaining_qty,
        remaining_charges: row.remaining_charges,
        posting_datetime: row.posting_datetime.with_timezone(&Utc),
        reference: DocumentRef::new(row.reference_doctype, row.reference_name),
        source_references,
        reverses: row.reverses_entry_id.map(ChargeEntryId::from_uuid),
        is_cancelled: row.is_cancelled,
    })
}

#[async_trait]
impl ChargeLedgerTxn for SeaChargeTxn {
    async fn insert(&mut self, entry: NewChargeEntry) -> Result<ChargeLedgerEntry, ChargeError> {
        entry.validate()?;

        let id = ChargeEntryId::new();
        let posting_datetime = self
            .next_posting_datetime(&entry.item_code, entry.charge_type)
            .await?;

        charge_ledger_entries::ActiveModel {
            id: Set(id.into_inner()),
            entry_type: Set(ChargeEntryType::from(entry.entry_type)),
            charge_type: Set(entry.charge_type.as_str().to_string()),
            item_code: Set(entry.item_code.clone()),
            qty: Set(entry.qty),
            charges: Set(entry.charges),
            remaining_qty: Set(entry.remaining_qty),
            remaining_charges: Set(entry.remaining_charges),
            posting_datetime: Set(posting_datetime.fixed_offset()),
            reference_doctype: Set(entry.reference.doctype.clone()),
            reference_name: Set(entry.reference.name.clone()),
            is_cancelled: Set(false),
            reverses_entry_id: Set(entry.reverses.map(ChargeEntryId::into_inner)),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(&self.txn)
        .await
        .map_err(db_err)?;

        if !entry.source_references.is_empty() {
            let rows = entry
                .source_references
                .iter()
                .zip(0_i32..)
                .map(|(source, position)| charge_source_references::ActiveModel {
                    entry_id: Set(id.into_inner()),
                    position: Set(position),
                    source_entry_id: Set(source.source_entry.into_inner()),
                    allocated_qty: Set(source.allocated_qty),
                    allocated_charges: Set(source.allocated_charges),
                });
            charge_source_references::Entity::insert_many(rows)
                .exec(&self.txn)
                .await
                .map_err(db_err)?;
        }

        tracing::debug!(
            entry_id = %id,
            entry_type = %entry.entry_type,
            "charge ledger entry inserted"
        );
        Ok(ChargeLedgerEntry {
            id,
            entry_type: entry.entry_type,
            charge_type: entry.charge_type,
            item_code: entry.item_code,
            qty: entry.qty,
            charges: entry.charges,
            remaining_qty: entry.remaining_qty,
            remaining_charges: entry.remaining_charges,
            posting_datetime,
            reference: entry.reference,
            source_references: entry.source_references,
            reverses: entry.reverses,
            is_cancelled: false,
        })
    }

    async fn query(
        &mut self,
        query: &ChargeEntryQuery,
    ) -> Result<Vec<ChargeLedgerEntry>, ChargeError> {
        use charge_ledger_entries::Column;

        let mut select = charge_ledger_entries::Entity::find();
        if let Some(item_code) = &query.item_code {
            select = select.filter(Column::ItemCode.eq(item_code.as_str()));
        }
        if let Some(charge_type) = query.charge_type {
            select = select.filter(Column::ChargeType.eq(charge_type.as_str()));
        }
        if !query.entry_types.is_empty() {
            // One typed comparison per value so each bind is cast to the enum
            let any_type = query
                .entry_types
                .iter()
                .fold(Condition::any(), |cond, entry_type| {
                    cond.add(Column::EntryType.eq(ChargeEntryType::from(*entry_type)))
                });
            select = select.filter(any_type);
        }
        if let Some(reference_name) = &query.reference_name {
            select = select.filter(Column::ReferenceName.eq(reference_name.as_str()));
        }
        if query.has_remaining {
            select = select.filter(Column::RemainingQty.gt(Decimal::ZERO));
        }
        if let Some(is_cancelled) = query.is_cancelled {
            select = select.filter(Column::IsCancelled.eq(is_cancelled));
        }
        if let Some(reverses) = query.reverses {
            select = select.filter(Column::ReversesEntryId.eq(reverses.into_inner()));
        }
        select = match query.order {
            SortOrder::Asc => select
                .order_by_asc(Column::PostingDatetime)
                .order_by_asc(Column::Id),
            SortOrder::Desc => select
                .order_by_desc(Column::PostingDatetime)
                .order_by_desc(Column::Id),
        };
        if let Some(limit) = query.limit {
            select = select.limit(limit);
        }
        if query.for_update {
            select = select.lock_exclusive();
        }

        let rows = select.all(&self.txn).await.map_err(db_err)?;
        self.hydrate(rows).await
    }

    async fn get(
        &mut self,
        id: ChargeEntryId,
        lock: bool,
    ) -> Result<ChargeLedgerEntry, ChargeError> {
        let mut select = charge_ledger_entries::Entity::find_by_id(id.into_inner());
        if lock {
            select = select.lock_exclusive();
        }
        let row = select
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .ok_or(ChargeError::EntryNotFound(id))?;

        self.hydrate(vec![row])
            .await?
            .pop()
            .ok_or(ChargeError::EntryNotFound(id))
    }

    async fn save(&mut self, entry: &ChargeLedgerEntry) -> Result<(), ChargeError> {
        use charge_ledger_entries::Column;

        let result = charge_ledger_entries::Entity::update_many()
            .col_expr(Column::RemainingQty, Expr::value(entry.remaining_qty))
            .col_expr(Column::RemainingCharges, Expr::value(entry.remaining_charges))
            .col_expr(Column::IsCancelled, Expr::value(entry.is_cancelled))
            .filter(Column::Id.eq(entry.id.into_inner()))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(ChargeError::EntryNotFound(entry.id));
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), ChargeError> {
        self.txn.commit().await.map_err(db_err)
    }
}
