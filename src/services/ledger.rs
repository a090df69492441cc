use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::aggregation::{FamilyOverview, FinancialSummary};
use crate::cache::{QueryCache, Scope};
use crate::models::{
    assets::Asset,
    debts::Debt,
    family::{FamilyAsset, FamilyDebt, FamilyMember},
    EntityKind, Identified,
};
use crate::repositories::{
    AssetTable, DebtTable, FamilyAssetTable, FamilyDebtTable, FamilyMemberTable, FinanceStore,
    RecordStore, StoreError, Table,
};
use crate::session::{SessionContext, SessionError};
use crate::validation::{Validate, ValidationErrors};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("No active session")]
    Unauthenticated,
    #[error("Unknown family member '{0}'")]
    UnknownFamilyMember(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SessionError> for LedgerError {
    fn from(_: SessionError) -> Self {
        LedgerError::Unauthenticated
    }
}

/// One cache per table.
#[derive(Default)]
pub struct QueryCaches {
    assets: QueryCache<Asset>,
    debts: QueryCache<Debt>,
    family_members: QueryCache<FamilyMember>,
    family_assets: QueryCache<FamilyAsset>,
    family_debts: QueryCache<FamilyDebt>,
}

impl QueryCaches {
    pub fn clear(&self) {
        self.assets.clear();
        self.debts.clear();
        self.family_members.clear();
        self.family_assets.clear();
        self.family_debts.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
            && self.debts.is_empty()
            && self.family_members.is_empty()
            && self.family_assets.is_empty()
            && self.family_debts.is_empty()
    }
}

pub trait CacheFor<T: Table> {
    fn cache(&self) -> &QueryCache<T::Row>;
}

impl CacheFor<AssetTable> for QueryCaches {
    fn cache(&self) -> &QueryCache<Asset> {
        &self.assets
    }
}

impl CacheFor<DebtTable> for QueryCaches {
    fn cache(&self) -> &QueryCache<Debt> {
        &self.debts
    }
}

impl CacheFor<FamilyMemberTable> for QueryCaches {
    fn cache(&self) -> &QueryCache<FamilyMember> {
        &self.family_members
    }
}

impl CacheFor<FamilyAssetTable> for QueryCaches {
    fn cache(&self) -> &QueryCache<FamilyAsset> {
        &self.family_assets
    }
}

impl CacheFor<FamilyDebtTable> for QueryCaches {
    fn cache(&self) -> &QueryCache<FamilyDebt> {
        &self.family_debts
    }
}

/// Data access for the signed-in user: validated writes against the record
/// store, reads through the per-table caches.
pub struct Ledger<S> {
    store: Arc<S>,
    session: SessionContext,
    caches: Arc<QueryCaches>,
}

impl<S> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Ledger {
            store: self.store.clone(),
            session: self.session.clone(),
            caches: self.caches.clone(),
        }
    }
}

impl<S: FinanceStore> Ledger<S> {
    pub fn new(store: Arc<S>, session: SessionContext) -> Self {
        Ledger {
            store,
            session,
            caches: Arc::new(QueryCaches::default()),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn caches(&self) -> &QueryCaches {
        &self.caches
    }

    /// Drops every cached list. Called whenever the session changes hands.
    pub fn on_session_change(&self) {
        log::debug!("Session changed, clearing query caches.");
        self.caches.clear();
    }

    /// Clears the caches on every session transition. The task holds its own
    /// session handle, so it runs until the runtime shuts down.
    pub async fn watch_session(self) {
        let mut changes = self.session.subscribe();
        while changes.changed().await.is_ok() {
            self.on_session_change();
        }
    }

    /// Rows of `T` owned by the signed-in user, newest first. Member-scoped
    /// tables can be narrowed to one family member. Without a session the
    /// list is empty.
    pub async fn list<T>(&self, family_member_id: Option<&str>) -> Result<Vec<T::Row>, LedgerError>
    where
        T: Table,
        S: RecordStore<T>,
        QueryCaches: CacheFor<T>,
    {
        let Some(user) = self.session.current_user() else {
            log::debug!("No session, listing no {}.", T::KIND.table_name());
            return Ok(Vec::new());
        };

        let scope = match family_member_id {
            Some(member) if T::MEMBER_SCOPED => Scope::member(&user.id, member),
            _ => Scope::user(&user.id),
        };

        let cache = CacheFor::<T>::cache(self.caches.as_ref());
        if let Some(rows) = cache.fresh(&scope) {
            log::debug!("Cache hit for {} {:?}", T::KIND.table_name(), scope);
            return Ok(rows);
        }

        log::debug!("Cache miss for {} {:?}", T::KIND.table_name(), scope);
        let ticket = cache.begin_fetch();
        let rows = RecordStore::<T>::list(self.store.as_ref(), &scope)
            .await
            .inspect_err(|e| log::warn!("Failed to list {}: {}", T::KIND.table_name(), e))?;
        cache.complete_fetch(&scope, ticket, rows.clone());

        Ok(rows)
    }

    pub async fn create<T>(&self, fields: T::Insert) -> Result<T::Row, LedgerError>
    where
        T: Table,
        S: RecordStore<T>,
        QueryCaches: CacheFor<T>,
    {
        let user = self.session.require_user()?;
        fields.validate()?;
        if let Some(member) = T::insert_member(&fields) {
            self.ensure_member(member).await?;
        }

        let row = RecordStore::<T>::insert(self.store.as_ref(), &user.id, fields)
            .await
            .inspect_err(|e| log::warn!("Failed to insert into {}: {}", T::KIND.table_name(), e))?;
        CacheFor::<T>::cache(self.caches.as_ref()).invalidate_user(&user.id);

        log::info!("Created {} {} for user {}", T::KIND.table_name(), row.id(), user.id);
        Ok(row)
    }

    pub async fn update<T>(&self, id: &str, patch: T::Patch) -> Result<T::Row, LedgerError>
    where
        T: Table,
        S: RecordStore<T>,
        QueryCaches: CacheFor<T>,
    {
        let user = self.session.require_user()?;
        patch.validate()?;
        if let Some(member) = T::patch_member(&patch) {
            self.ensure_member(member).await?;
        }

        let row = RecordStore::<T>::update(self.store.as_ref(), &user.id, id, patch)
            .await
            .inspect_err(|e| log::warn!("Failed to update {} {}: {}", T::KIND.table_name(), id, e))?;
        CacheFor::<T>::cache(self.caches.as_ref()).invalidate_user(&user.id);

        log::info!("Updated {} {} for user {}", T::KIND.table_name(), id, user.id);
        Ok(row)
    }

    /// Deletes one row. A family member is removed through
    /// `delete_family_member`, taking their records with them.
    pub async fn delete<T>(&self, id: &str) -> Result<String, LedgerError>
    where
        T: Table,
        S: RecordStore<T>,
        QueryCaches: CacheFor<T>,
    {
        if T::KIND == EntityKind::FamilyMember {
            return self.delete_family_member(id).await;
        }
        let user = self.session.require_user()?;

        let deleted = RecordStore::<T>::delete(self.store.as_ref(), &user.id, id)
            .await
            .inspect_err(|e| log::warn!("Failed to delete {} {}: {}", T::KIND.table_name(), id, e))?;
        CacheFor::<T>::cache(self.caches.as_ref()).invalidate_user(&user.id);

        log::info!("Deleted {} {} for user {}", T::KIND.table_name(), id, user.id);
        Ok(deleted)
    }

    /// Removes a family member together with their family assets and debts.
    pub async fn delete_family_member(&self, id: &str) -> Result<String, LedgerError> {
        let user = self.session.require_user()?;

        let scope = Scope::member(&user.id, id);
        let assets = RecordStore::<FamilyAssetTable>::list(self.store.as_ref(), &scope).await;
        let debts = RecordStore::<FamilyDebtTable>::list(self.store.as_ref(), &scope).await;
        let result = self.cascade(&user.id, id, assets, debts).await;

        // Partial cascades still changed rows.
        self.caches.family_assets.invalidate_user(&user.id);
        self.caches.family_debts.invalidate_user(&user.id);
        self.caches.family_members.invalidate_user(&user.id);

        match &result {
            Ok(_) => log::info!("Deleted family member {} for user {}", id, user.id),
            Err(e) => log::warn!("Failed to delete family member {}: {}", id, e),
        }
        result
    }

    async fn cascade(
        &self,
        user_id: &str,
        member_id: &str,
        assets: Result<Vec<FamilyAsset>, StoreError>,
        debts: Result<Vec<FamilyDebt>, StoreError>,
    ) -> Result<String, LedgerError> {
        for asset in assets? {
            RecordStore::<FamilyAssetTable>::delete(self.store.as_ref(), user_id, asset.id())
                .await?;
        }
        for debt in debts? {
            RecordStore::<FamilyDebtTable>::delete(self.store.as_ref(), user_id, debt.id())
                .await?;
        }

        Ok(RecordStore::<FamilyMemberTable>::delete(self.store.as_ref(), user_id, member_id)
            .await?)
    }

    async fn ensure_member(&self, member_id: &str) -> Result<(), LedgerError> {
        let members = self.list::<FamilyMemberTable>(None).await?;
        if members.iter().any(|member| member.id == member_id) {
            Ok(())
        } else {
            Err(LedgerError::UnknownFamilyMember(member_id.to_string()))
        }
    }

    pub async fn summary(&self) -> Result<FinancialSummary, LedgerError> {
        let assets = self.list::<AssetTable>(None).await?;
        let debts = self.list::<DebtTable>(None).await?;

        Ok(FinancialSummary::compute(&assets, &debts))
    }

    pub async fn family_overview(&self) -> Result<FamilyOverview, LedgerError> {
        let members = self.list::<FamilyMemberTable>(None).await?;
        let assets = self.list::<FamilyAssetTable>(None).await?;
        let debts = self.list::<FamilyDebtTable>(None).await?;

        Ok(FamilyOverview::compute(&members, &assets, &debts))
    }
}

pub enum TableRequest<T: Table> {
    List {
        family_member_id: Option<String>,
        response: oneshot::Sender<Result<Vec<T::Row>, ServiceError>>,
    },
    Create {
        fields: T::Insert,
        response: oneshot::Sender<Result<T::Row, ServiceError>>,
    },
    Update {
        id: String,
        patch: T::Patch,
        response: oneshot::Sender<Result<T::Row, ServiceError>>,
    },
    Delete {
        id: String,
        response: oneshot::Sender<Result<String, ServiceError>>,
    },
}

pub enum LedgerRequest {
    Assets(TableRequest<AssetTable>),
    Debts(TableRequest<DebtTable>),
    FamilyMembers(TableRequest<FamilyMemberTable>),
    FamilyAssets(TableRequest<FamilyAssetTable>),
    FamilyDebts(TableRequest<FamilyDebtTable>),
    Summary {
        response: oneshot::Sender<Result<FinancialSummary, ServiceError>>,
    },
    FamilyOverview {
        response: oneshot::Sender<Result<FamilyOverview, ServiceError>>,
    },
}

/// Tables reachable through the ledger channel.
pub trait LedgerTable: Table {
    fn wrap(request: TableRequest<Self>) -> LedgerRequest
    where
        Self: Sized;
}

impl LedgerTable for AssetTable {
    fn wrap(request: TableRequest<Self>) -> LedgerRequest {
        LedgerRequest::Assets(request)
    }
}

impl LedgerTable for DebtTable {
    fn wrap(request: TableRequest<Self>) -> LedgerRequest {
        LedgerRequest::Debts(request)
    }
}

impl LedgerTable for FamilyMemberTable {
    fn wrap(request: TableRequest<Self>) -> LedgerRequest {
        LedgerRequest::FamilyMembers(request)
    }
}

impl LedgerTable for FamilyAssetTable {
    fn wrap(request: TableRequest<Self>) -> LedgerRequest {
        LedgerRequest::FamilyAssets(request)
    }
}

impl LedgerTable for FamilyDebtTable {
    fn wrap(request: TableRequest<Self>) -> LedgerRequest {
        LedgerRequest::FamilyDebts(request)
    }
}

pub struct LedgerRequestHandler<S> {
    ledger: Ledger<S>,
}

impl<S> Clone for LedgerRequestHandler<S> {
    fn clone(&self) -> Self {
        LedgerRequestHandler {
            ledger: self.ledger.clone(),
        }
    }
}

impl<S: FinanceStore> LedgerRequestHandler<S> {
    pub fn new(ledger: Ledger<S>) -> Self {
        LedgerRequestHandler { ledger }
    }

    async fn handle_table<T>(&self, request: TableRequest<T>)
    where
        T: Table,
        S: RecordStore<T>,
        QueryCaches: CacheFor<T>,
    {
        match request {
            TableRequest::List {
                family_member_id,
                response,
            } => {
                let rows = self.ledger.list::<T>(family_member_id.as_deref()).await;
                let _ = response.send(rows.map_err(ServiceError::from));
            }
            TableRequest::Create { fields, response } => {
                let row = self.ledger.create::<T>(fields).await;
                let _ = response.send(row.map_err(ServiceError::from));
            }
            TableRequest::Update {
                id,
                patch,
                response,
            } => {
                let row = self.ledger.update::<T>(&id, patch).await;
                let _ = response.send(row.map_err(ServiceError::from));
            }
            TableRequest::Delete { id, response } => {
                let deleted = self.ledger.delete::<T>(&id).await;
                let _ = response.send(deleted.map_err(ServiceError::from));
            }
        }
    }
}

#[async_trait]
impl<S: FinanceStore> RequestHandler<LedgerRequest> for LedgerRequestHandler<S> {
    async fn handle_request(&self, request: LedgerRequest) {
        match request {
            LedgerRequest::Assets(request) => self.handle_table(request).await,
            LedgerRequest::Debts(request) => self.handle_table(request).await,
            LedgerRequest::FamilyMembers(request) => self.handle_table(request).await,
            LedgerRequest::FamilyAssets(request) => self.handle_table(request).await,
            LedgerRequest::FamilyDebts(request) => self.handle_table(request).await,
            LedgerRequest::Summary { response } => {
                let summary = self.ledger.summary().await;
                let _ = response.send(summary.map_err(ServiceError::from));
            }
            LedgerRequest::FamilyOverview { response } => {
                let overview = self.ledger.family_overview().await;
                let _ = response.send(overview.map_err(ServiceError::from));
            }
        }
    }
}

pub struct LedgerService;

impl LedgerService {
    pub fn new() -> Self {
        LedgerService {}
    }
}

#[async_trait]
impl<S: FinanceStore> Service<LedgerRequest, LedgerRequestHandler<S>> for LedgerService {}
