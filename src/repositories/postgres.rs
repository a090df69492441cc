use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::query_builder::Separated;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    AssetTable, DebtTable, FamilyAssetTable, FamilyDebtTable, FamilyMemberTable, RecordStore,
    StoreError, Table,
};
use crate::cache::Scope;
use crate::models::{
    assets::{Asset, AssetPatch, NewAsset},
    debts::{Debt, DebtPatch, NewDebt},
    family::{
        FamilyAsset, FamilyAssetPatch, FamilyDebt, FamilyDebtPatch, FamilyMember,
        FamilyMemberPatch, NewFamilyAsset, NewFamilyDebt, NewFamilyMember,
    },
};

#[derive(Clone)]
pub struct PgStore {
    pub(super) conn: PgPool,
}

impl PgStore {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    pub async fn migrate(&self) -> Result<(), anyhow::Error> {
        sqlx::migrate!("./migrations").run(&self.conn).await?;
        Ok(())
    }
}

/// Column mapping for a table stored in PostgreSQL.
trait PgTable: Table {
    type Record: for<'r> FromRow<'r, PgRow> + Send + Unpin;

    /// Columns bound by `bind_insert`, in order, after `id` and `user_id`.
    const INSERT_COLUMNS: &'static str;

    fn decode(record: Self::Record) -> Result<Self::Row, StoreError>;
    fn bind_insert(values: &mut Separated<'_, '_, Postgres, &'static str>, fields: Self::Insert);
    fn push_patch(query: &mut QueryBuilder<'_, Postgres>, patch: Self::Patch);
}

fn classify(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if let Some(constraint) = db_err.constraint() {
            return StoreError::Rejected(format!("violates {constraint}"));
        }
    }
    StoreError::Database(err)
}

fn decode_error(table: &'static str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Decode {
        table,
        reason: err.to_string(),
    }
}

#[derive(FromRow)]
struct AssetRecord {
    id: String,
    user_id: String,
    #[sqlx(rename = "type")]
    kind: String,
    subtype: Option<String>,
    name: String,
    value: f64,
    currency: String,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssetRecord {
    fn into_asset(self, table: &'static str) -> Result<Asset, StoreError> {
        Ok(Asset {
            kind: self.kind.parse().map_err(|e| decode_error(table, e))?,
            id: self.id,
            user_id: self.user_id,
            subtype: self.subtype,
            name: self.name,
            value: self.value,
            currency: self.currency,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct DebtRecord {
    id: String,
    user_id: String,
    #[sqlx(rename = "type")]
    kind: String,
    lender: String,
    principal: f64,
    interest_rate: Option<f64>,
    term_years: Option<i32>,
    balance: f64,
    currency: String,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DebtRecord {
    fn into_debt(self, table: &'static str) -> Result<Debt, StoreError> {
        Ok(Debt {
            kind: self.kind.parse().map_err(|e| decode_error(table, e))?,
            id: self.id,
            user_id: self.user_id,
            lender: self.lender,
            principal: self.principal,
            interest_rate: self.interest_rate,
            term_years: self.term_years,
            balance: self.balance,
            currency: self.currency,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct FamilyMemberRecord {
    id: String,
    user_id: String,
    name: String,
    relation: String,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct FamilyAssetRecord {
    family_member_id: String,
    #[sqlx(flatten)]
    asset: AssetRecord,
}

#[derive(FromRow)]
struct FamilyDebtRecord {
    family_member_id: String,
    #[sqlx(flatten)]
    debt: DebtRecord,
}

fn bind_new_asset(values: &mut Separated<'_, '_, Postgres, &'static str>, fields: NewAsset) {
    values.push_bind(fields.kind.as_str());
    values.push_bind(fields.subtype);
    values.push_bind(fields.name);
    values.push_bind(fields.value);
    values.push_bind(fields.currency);
    values.push_bind(fields.metadata);
}

fn push_asset_patch(query: &mut QueryBuilder<'_, Postgres>, patch: AssetPatch) {
    if let Some(kind) = patch.kind {
        query.push(", type = ").push_bind(kind.as_str());
    }
    if let Some(subtype) = patch.subtype {
        query.push(", subtype = ").push_bind(subtype);
    }
    if let Some(name) = patch.name {
        query.push(", name = ").push_bind(name);
    }
    if let Some(value) = patch.value {
        query.push(", value = ").push_bind(value);
    }
    if let Some(currency) = patch.currency {
        query.push(", currency = ").push_bind(currency);
    }
    if let Some(metadata) = patch.metadata {
        query.push(", metadata = ").push_bind(metadata);
    }
}

fn bind_new_debt(values: &mut Separated<'_, '_, Postgres, &'static str>, fields: NewDebt) {
    values.push_bind(fields.kind.as_str());
    values.push_bind(fields.lender);
    values.push_bind(fields.principal);
    values.push_bind(fields.interest_rate);
    values.push_bind(fields.term_years);
    values.push_bind(fields.balance);
    values.push_bind(fields.currency);
    values.push_bind(fields.metadata);
}

fn push_debt_patch(query: &mut QueryBuilder<'_, Postgres>, patch: DebtPatch) {
    if let Some(kind) = patch.kind {
        query.push(", type = ").push_bind(kind.as_str());
    }
    if let Some(lender) = patch.lender {
        query.push(", lender = ").push_bind(lender);
    }
    if let Some(principal) = patch.principal {
        query.push(", principal = ").push_bind(principal);
    }
    if let Some(rate) = patch.interest_rate {
        query.push(", interest_rate = ").push_bind(rate);
    }
    if let Some(term) = patch.term_years {
        query.push(", term_years = ").push_bind(term);
    }
    if let Some(balance) = patch.balance {
        query.push(", balance = ").push_bind(balance);
    }
    if let Some(currency) = patch.currency {
        query.push(", currency = ").push_bind(currency);
    }
    if let Some(metadata) = patch.metadata {
        query.push(", metadata = ").push_bind(metadata);
    }
}

impl PgTable for AssetTable {
    type Record = AssetRecord;

    const INSERT_COLUMNS: &'static str = "type, subtype, name, value, currency, metadata";

    fn decode(record: AssetRecord) -> Result<Asset, StoreError> {
        record.into_asset("assets")
    }

    fn bind_insert(values: &mut Separated<'_, '_, Postgres, &'static str>, fields: NewAsset) {
        bind_new_asset(values, fields)
    }

    fn push_patch(query: &mut QueryBuilder<'_, Postgres>, patch: AssetPatch) {
        push_asset_patch(query, patch)
    }
}

impl PgTable for DebtTable {
    type Record = DebtRecord;

    const INSERT_COLUMNS: &'static str =
        "type, lender, principal, interest_rate, term_years, balance, currency, metadata";

    fn decode(record: DebtRecord) -> Result<Debt, StoreError> {
        record.into_debt("debts")
    }

    fn bind_insert(values: &mut Separated<'_, '_, Postgres, &'static str>, fields: NewDebt) {
        bind_new_debt(values, fields)
    }

    fn push_patch(query: &mut QueryBuilder<'_, Postgres>, patch: DebtPatch) {
        push_debt_patch(query, patch)
    }
}

impl PgTable for FamilyMemberTable {
    type Record = FamilyMemberRecord;

    const INSERT_COLUMNS: &'static str = "name, relation, avatar_url";

    fn decode(record: FamilyMemberRecord) -> Result<FamilyMember, StoreError> {
        Ok(FamilyMember {
            relation: record
                .relation
                .parse()
                .map_err(|e| decode_error("family_members", e))?,
            id: record.id,
            user_id: record.user_id,
            name: record.name,
            avatar_url: record.avatar_url,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    fn bind_insert(
        values: &mut Separated<'_, '_, Postgres, &'static str>,
        fields: NewFamilyMember,
    ) {
        values.push_bind(fields.name);
        values.push_bind(fields.relation.as_str());
        values.push_bind(fields.avatar_url);
    }

    fn push_patch(query: &mut QueryBuilder<'_, Postgres>, patch: FamilyMemberPatch) {
        if let Some(name) = patch.name {
            query.push(", name = ").push_bind(name);
        }
        if let Some(relation) = patch.relation {
            query.push(", relation = ").push_bind(relation.as_str());
        }
        if let Some(avatar_url) = patch.avatar_url {
            query.push(", avatar_url = ").push_bind(avatar_url);
        }
    }
}

impl PgTable for FamilyAssetTable {
    type Record = FamilyAssetRecord;

    const INSERT_COLUMNS: &'static str =
        "family_member_id, type, subtype, name, value, currency, metadata";

    fn decode(record: FamilyAssetRecord) -> Result<FamilyAsset, StoreError> {
        Ok(FamilyAsset {
            family_member_id: record.family_member_id,
            asset: record.asset.into_asset("family_assets")?,
        })
    }

    fn bind_insert(values: &mut Separated<'_, '_, Postgres, &'static str>, fields: NewFamilyAsset) {
        values.push_bind(fields.family_member_id);
        bind_new_asset(values, fields.asset);
    }

    fn push_patch(query: &mut QueryBuilder<'_, Postgres>, patch: FamilyAssetPatch) {
        if let Some(member) = patch.family_member_id {
            query.push(", family_member_id = ").push_bind(member);
        }
        push_asset_patch(query, patch.asset);
    }
}

impl PgTable for FamilyDebtTable {
    type Record = FamilyDebtRecord;

    const INSERT_COLUMNS: &'static str = "family_member_id, type, lender, principal, \
        interest_rate, term_years, balance, currency, metadata";

    fn decode(record: FamilyDebtRecord) -> Result<FamilyDebt, StoreError> {
        Ok(FamilyDebt {
            family_member_id: record.family_member_id,
            debt: record.debt.into_debt("family_debts")?,
        })
    }

    fn bind_insert(values: &mut Separated<'_, '_, Postgres, &'static str>, fields: NewFamilyDebt) {
        values.push_bind(fields.family_member_id);
        bind_new_debt(values, fields.debt);
    }

    fn push_patch(query: &mut QueryBuilder<'_, Postgres>, patch: FamilyDebtPatch) {
        if let Some(member) = patch.family_member_id {
            query.push(", family_member_id = ").push_bind(member);
        }
        push_debt_patch(query, patch.debt);
    }
}

#[async_trait]
impl<T: PgTable> RecordStore<T> for PgStore {
    async fn list(&self, scope: &Scope) -> Result<Vec<T::Row>, StoreError> {
        let mut query = QueryBuilder::new(format!(
            "SELECT * FROM {} WHERE user_id = ",
            T::KIND.table_name()
        ));
        query.push_bind(scope.user_id.clone());
        if let (true, Some(member)) = (T::MEMBER_SCOPED, &scope.family_member_id) {
            query.push(" AND family_member_id = ").push_bind(member.clone());
        }
        query.push(" ORDER BY created_at DESC");

        let records = query
            .build_query_as::<T::Record>()
            .fetch_all(&self.conn)
            .await
            .map_err(classify)?;

        records.into_iter().map(T::decode).collect()
    }

    async fn insert(&self, user_id: &str, fields: T::Insert) -> Result<T::Row, StoreError> {
        let id = Uuid::new_v4().hyphenated().to_string();

        let mut query = QueryBuilder::new(format!(
            "INSERT INTO {} (id, user_id, {}) VALUES (",
            T::KIND.table_name(),
            T::INSERT_COLUMNS
        ));
        {
            let mut values = query.separated(", ");
            values.push_bind(id);
            values.push_bind(user_id.to_string());
            T::bind_insert(&mut values, fields);
        }
        query.push(") RETURNING *");

        let record = query
            .build_query_as::<T::Record>()
            .fetch_one(&self.conn)
            .await
            .map_err(classify)?;

        T::decode(record)
    }

    async fn update(
        &self,
        user_id: &str,
        id: &str,
        patch: T::Patch,
    ) -> Result<T::Row, StoreError> {
        let mut query = QueryBuilder::new(format!(
            "UPDATE {} SET updated_at = CURRENT_TIMESTAMP",
            T::KIND.table_name()
        ));
        T::push_patch(&mut query, patch);
        query
            .push(" WHERE id = ")
            .push_bind(id.to_string())
            .push(" AND user_id = ")
            .push_bind(user_id.to_string())
            .push(" RETURNING *");

        let record = query
            .build_query_as::<T::Record>()
            .fetch_optional(&self.conn)
            .await
            .map_err(classify)?;

        match record {
            Some(record) => T::decode(record),
            None => Err(StoreError::NotFound {
                table: T::KIND.table_name(),
                id: id.to_string(),
            }),
        }
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<String, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE id = $1 AND user_id = $2 RETURNING id",
            T::KIND.table_name()
        );

        let deleted: Option<String> = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.conn)
            .await
            .map_err(classify)?;

        deleted.ok_or_else(|| StoreError::NotFound {
            table: T::KIND.table_name(),
            id: id.to_string(),
        })
    }
}
