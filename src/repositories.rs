use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::cache::Scope;
use crate::models::{
    assets::{Asset, AssetPatch, NewAsset},
    debts::{Debt, DebtPatch, NewDebt},
    family::{
        FamilyAsset, FamilyAssetPatch, FamilyDebt, FamilyDebtPatch, FamilyMember,
        FamilyMemberPatch, NewFamilyAsset, NewFamilyDebt, NewFamilyMember,
    },
    EntityKind, Identified,
};
use crate::validation::Validate;

pub mod memory;
pub mod postgres;
pub mod users;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use users::{AuthError, AuthProvider};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{table} record '{id}' not found")]
    NotFound { table: &'static str, id: String },
    #[error("Write rejected: {0}")]
    Rejected(String),
    #[error("Corrupt row in {table}: {reason}")]
    Decode { table: &'static str, reason: String },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A table of user-owned records: its row type, the fields accepted on
/// insert, and the partial update shape.
pub trait Table: Send + Sync + 'static {
    const KIND: EntityKind;
    const MEMBER_SCOPED: bool = false;

    type Row: Identified + Clone + Serialize + Send + Sync + 'static;
    type Insert: Validate + DeserializeOwned + Send + Sync + 'static;
    type Patch: Validate + DeserializeOwned + Send + Sync + 'static;

    fn build(id: String, user_id: String, fields: Self::Insert, now: DateTime<Utc>) -> Self::Row;
    fn apply(row: &mut Self::Row, patch: Self::Patch, now: DateTime<Utc>);
    fn created_at(row: &Self::Row) -> DateTime<Utc>;

    fn row_member(_row: &Self::Row) -> Option<&str> {
        None
    }

    fn insert_member(_fields: &Self::Insert) -> Option<&str> {
        None
    }

    fn patch_member(_patch: &Self::Patch) -> Option<&str> {
        None
    }
}

pub struct AssetTable;
pub struct DebtTable;
pub struct FamilyMemberTable;
pub struct FamilyAssetTable;
pub struct FamilyDebtTable;

impl Table for AssetTable {
    const KIND: EntityKind = EntityKind::Asset;

    type Row = Asset;
    type Insert = NewAsset;
    type Patch = AssetPatch;

    fn build(id: String, user_id: String, fields: NewAsset, now: DateTime<Utc>) -> Asset {
        Asset::new(id, user_id, fields, now)
    }

    fn apply(row: &mut Asset, patch: AssetPatch, now: DateTime<Utc>) {
        row.apply(patch, now)
    }

    fn created_at(row: &Asset) -> DateTime<Utc> {
        row.created_at
    }
}

impl Table for DebtTable {
    const KIND: EntityKind = EntityKind::Debt;

    type Row = Debt;
    type Insert = NewDebt;
    type Patch = DebtPatch;

    fn build(id: String, user_id: String, fields: NewDebt, now: DateTime<Utc>) -> Debt {
        Debt::new(id, user_id, fields, now)
    }

    fn apply(row: &mut Debt, patch: DebtPatch, now: DateTime<Utc>) {
        row.apply(patch, now)
    }

    fn created_at(row: &Debt) -> DateTime<Utc> {
        row.created_at
    }
}

impl Table for FamilyMemberTable {
    const KIND: EntityKind = EntityKind::FamilyMember;

    type Row = FamilyMember;
    type Insert = NewFamilyMember;
    type Patch = FamilyMemberPatch;

    fn build(
        id: String,
        user_id: String,
        fields: NewFamilyMember,
        now: DateTime<Utc>,
    ) -> FamilyMember {
        FamilyMember::new(id, user_id, fields, now)
    }

    fn apply(row: &mut FamilyMember, patch: FamilyMemberPatch, now: DateTime<Utc>) {
        row.apply(patch, now)
    }

    fn created_at(row: &FamilyMember) -> DateTime<Utc> {
        row.created_at
    }
}

impl Table for FamilyAssetTable {
    const KIND: EntityKind = EntityKind::FamilyAsset;
    const MEMBER_SCOPED: bool = true;

    type Row = FamilyAsset;
    type Insert = NewFamilyAsset;
    type Patch = FamilyAssetPatch;

    fn build(id: String, user_id: String, fields: NewFamilyAsset, now: DateTime<Utc>) -> FamilyAsset {
        FamilyAsset::new(id, user_id, fields, now)
    }

    fn apply(row: &mut FamilyAsset, patch: FamilyAssetPatch, now: DateTime<Utc>) {
        row.apply(patch, now)
    }

    fn created_at(row: &FamilyAsset) -> DateTime<Utc> {
        row.asset.created_at
    }

    fn row_member(row: &FamilyAsset) -> Option<&str> {
        Some(&row.family_member_id)
    }

    fn insert_member(fields: &NewFamilyAsset) -> Option<&str> {
        Some(&fields.family_member_id)
    }

    fn patch_member(patch: &FamilyAssetPatch) -> Option<&str> {
        patch.family_member_id.as_deref()
    }
}

impl Table for FamilyDebtTable {
    const KIND: EntityKind = EntityKind::FamilyDebt;
    const MEMBER_SCOPED: bool = true;

    type Row = FamilyDebt;
    type Insert = NewFamilyDebt;
    type Patch = FamilyDebtPatch;

    fn build(id: String, user_id: String, fields: NewFamilyDebt, now: DateTime<Utc>) -> FamilyDebt {
        FamilyDebt::new(id, user_id, fields, now)
    }

    fn apply(row: &mut FamilyDebt, patch: FamilyDebtPatch, now: DateTime<Utc>) {
        row.apply(patch, now)
    }

    fn created_at(row: &FamilyDebt) -> DateTime<Utc> {
        row.debt.created_at
    }

    fn row_member(row: &FamilyDebt) -> Option<&str> {
        Some(&row.family_member_id)
    }

    fn insert_member(fields: &NewFamilyDebt) -> Option<&str> {
        Some(&fields.family_member_id)
    }

    fn patch_member(patch: &FamilyDebtPatch) -> Option<&str> {
        patch.family_member_id.as_deref()
    }
}

/// Authenticated CRUD over one table. Every call is scoped to the owning
/// user; lists come back newest first.
#[async_trait]
pub trait RecordStore<T: Table>: Send + Sync {
    async fn list(&self, scope: &Scope) -> Result<Vec<T::Row>, StoreError>;
    async fn insert(&self, user_id: &str, fields: T::Insert) -> Result<T::Row, StoreError>;
    async fn update(&self, user_id: &str, id: &str, patch: T::Patch)
        -> Result<T::Row, StoreError>;
    async fn delete(&self, user_id: &str, id: &str) -> Result<String, StoreError>;
}

/// Everything the ledger needs from a backend.
pub trait FinanceStore:
    RecordStore<AssetTable>
    + RecordStore<DebtTable>
    + RecordStore<FamilyMemberTable>
    + RecordStore<FamilyAssetTable>
    + RecordStore<FamilyDebtTable>
    + AuthProvider
    + 'static
{
}

impl<S> FinanceStore for S where
    S: RecordStore<AssetTable>
        + RecordStore<DebtTable>
        + RecordStore<FamilyMemberTable>
        + RecordStore<FamilyAssetTable>
        + RecordStore<FamilyDebtTable>
        + AuthProvider
        + 'static
{
}
