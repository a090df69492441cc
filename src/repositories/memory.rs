use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::users::{hash_password, new_salt, normalize_email};
use super::{
    AssetTable, AuthError, AuthProvider, DebtTable, FamilyAssetTable, FamilyDebtTable,
    FamilyMemberTable, RecordStore, StoreError, Table,
};
use crate::cache::Scope;
use crate::models::users::{Credentials, User};
use crate::models::Identified;

struct MemoryTable<T: Table> {
    rows: RwLock<Vec<T::Row>>,
}

impl<T: Table> Default for MemoryTable<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }
}

struct StoredUser {
    user: User,
    salt: String,
    password_hash: String,
}

/// Process-local record store, used when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    assets: MemoryTable<AssetTable>,
    debts: MemoryTable<DebtTable>,
    family_members: MemoryTable<FamilyMemberTable>,
    family_assets: MemoryTable<FamilyAssetTable>,
    family_debts: MemoryTable<FamilyDebtTable>,
    users: RwLock<Vec<StoredUser>>,
    reject_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent insert, update and delete fail, the way a
    /// backend constraint violation would.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("store is rejecting writes".to_string()));
        }
        Ok(())
    }
}

trait HoldsTable<T: Table> {
    fn table(&self) -> &MemoryTable<T>;
}

impl HoldsTable<AssetTable> for MemoryStore {
    fn table(&self) -> &MemoryTable<AssetTable> {
        &self.assets
    }
}

impl HoldsTable<DebtTable> for MemoryStore {
    fn table(&self) -> &MemoryTable<DebtTable> {
        &self.debts
    }
}

impl HoldsTable<FamilyMemberTable> for MemoryStore {
    fn table(&self) -> &MemoryTable<FamilyMemberTable> {
        &self.family_members
    }
}

impl HoldsTable<FamilyAssetTable> for MemoryStore {
    fn table(&self) -> &MemoryTable<FamilyAssetTable> {
        &self.family_assets
    }
}

impl HoldsTable<FamilyDebtTable> for MemoryStore {
    fn table(&self) -> &MemoryTable<FamilyDebtTable> {
        &self.family_debts
    }
}

#[async_trait]
impl<T: Table> RecordStore<T> for MemoryStore
where
    MemoryStore: HoldsTable<T>,
{
    async fn list(&self, scope: &Scope) -> Result<Vec<T::Row>, StoreError> {
        let rows = HoldsTable::<T>::table(self).rows.read().await;

        // Newest insert first, so equal timestamps keep that order after the
        // stable sort.
        let mut matching: Vec<T::Row> = rows
            .iter()
            .rev()
            .filter(|row| row.user_id() == scope.user_id)
            .filter(|row| match (&scope.family_member_id, T::row_member(row)) {
                (Some(wanted), Some(member)) => wanted == member,
                _ => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| T::created_at(b).cmp(&T::created_at(a)));

        Ok(matching)
    }

    async fn insert(&self, user_id: &str, fields: T::Insert) -> Result<T::Row, StoreError> {
        self.check_writable()?;

        let id = Uuid::new_v4().hyphenated().to_string();
        let row = T::build(id, user_id.to_string(), fields, Utc::now());
        HoldsTable::<T>::table(self)
            .rows
            .write()
            .await
            .push(row.clone());

        Ok(row)
    }

    async fn update(
        &self,
        user_id: &str,
        id: &str,
        patch: T::Patch,
    ) -> Result<T::Row, StoreError> {
        self.check_writable()?;

        let mut rows = HoldsTable::<T>::table(self).rows.write().await;
        let row = rows
            .iter_mut()
            .find(|row| row.id() == id && row.user_id() == user_id)
            .ok_or_else(|| StoreError::NotFound {
                table: T::KIND.table_name(),
                id: id.to_string(),
            })?;
        T::apply(row, patch, Utc::now());

        Ok(row.clone())
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<String, StoreError> {
        self.check_writable()?;

        let mut rows = HoldsTable::<T>::table(self).rows.write().await;
        let position = rows
            .iter()
            .position(|row| row.id() == id && row.user_id() == user_id)
            .ok_or_else(|| StoreError::NotFound {
                table: T::KIND.table_name(),
                id: id.to_string(),
            })?;
        rows.remove(position);

        Ok(id.to_string())
    }
}

#[async_trait]
impl AuthProvider for MemoryStore {
    async fn sign_up(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let email = normalize_email(&credentials.email);
        let mut users = self.users.write().await;
        if users.iter().any(|stored| stored.user.email == email) {
            return Err(AuthError::EmailTaken);
        }

        let salt = new_salt();
        let user = User {
            id: Uuid::new_v4().hyphenated().to_string(),
            email,
            created_at: Utc::now(),
        };
        users.push(StoredUser {
            user: user.clone(),
            password_hash: hash_password(&salt, &credentials.password),
            salt,
        });

        Ok(user)
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let email = normalize_email(&credentials.email);
        let users = self.users.read().await;
        let stored = users
            .iter()
            .find(|stored| stored.user.email == email)
            .ok_or(AuthError::InvalidCredentials)?;

        if hash_password(&stored.salt, &credentials.password) != stored.password_hash {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(stored.user.clone())
    }
}
