// ============================
// crates/backend-lib/src/storage.rs
// ============================
//! Account storage abstraction with in-memory and flat-file implementations.
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use eventmgmt_common::{UserRole, UserView};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs as tokio_fs, sync::Mutex};
use uuid::Uuid;

/// A user account as persisted
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Account {
    /// Time-ordered identifier assigned at creation
    pub id: Uuid,
    /// Normalised (trimmed, lower-case) email
    pub email: String,
    /// Salted password hash, never the plaintext
    pub stored_credential: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: &str, stored_credential: String, role: UserRole) -> Self {
        Self {
            id: Uuid::now_v7(),
            email: normalize_email(email),
            stored_credential,
            role,
            created_at: Utc::now(),
        }
    }

    /// Public projection without credential material
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Canonical form used for storing and comparing emails
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trait for account storage backends
///
/// `save` enforces email uniqueness and fails with
/// [`AppError::DuplicateEmail`] when another account holds the email.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Every stored account, in creation order
    async fn all(&self) -> Result<Vec<Account>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;

    /// Insert or replace an account
    async fn save(&self, account: Account) -> Result<Account, AppError>;

    /// Remove an account, returning whether it existed
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// Replace the stored credential of `id` only while it still equals
    /// `expected`. Other fields are left as they are in the store. Returns
    /// whether the write happened.
    async fn update_credential_if(
        &self,
        id: Uuid,
        expected: &str,
        credential: String,
    ) -> Result<bool, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let email = normalize_email(email);
        Ok(self.all().await?.into_iter().find(|a| a.email == email))
    }

    /// One page of accounts in creation order
    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Account>, AppError> {
        Ok(self.all().await?.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self) -> Result<usize, AppError> {
        Ok(self.all().await?.len())
    }

    async fn find_by_role(&self, role: UserRole) -> Result<Vec<Account>, AppError> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|a| a.role == role)
            .collect())
    }

    /// Case-insensitive substring match on email
    async fn search_by_email(&self, pattern: &str) -> Result<Vec<Account>, AppError> {
        let pattern = pattern.trim().to_lowercase();
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|a| a.email.contains(&pattern))
            .collect())
    }
}

/// In-process account store
#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    accounts: Arc<DashMap<Uuid, Account>>,
    by_email: Arc<DashMap<String, Uuid>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn all(&self) -> Result<Vec<Account>, AppError> {
        let mut accounts: Vec<Account> = self.accounts.iter().map(|e| e.value().clone()).collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.accounts.get(&id).map(|a| a.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let Some(id) = self.by_email.get(&normalize_email(email)).map(|id| *id) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn save(&self, mut account: Account) -> Result<Account, AppError> {
        account.email = normalize_email(&account.email);

        // claim the email first so two writers cannot both take it
        match self.by_email.entry(account.email.clone()) {
            Entry::Occupied(owner) if *owner.get() != account.id => {
                return Err(AppError::DuplicateEmail);
            },
            Entry::Occupied(_) => {},
            Entry::Vacant(slot) => {
                slot.insert(account.id);
            },
        }

        if let Some(previous) = self.accounts.insert(account.id, account.clone()) {
            if previous.email != account.email {
                self.by_email
                    .remove_if(&previous.email, |_, owner| *owner == account.id);
            }
        }

        Ok(account)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        match self.accounts.remove(&id) {
            Some((_, account)) => {
                self.by_email.remove_if(&account.email, |_, owner| *owner == id);
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn update_credential_if(
        &self,
        id: Uuid,
        expected: &str,
        credential: String,
    ) -> Result<bool, AppError> {
        match self.accounts.get_mut(&id) {
            Some(mut account) if account.stored_credential == expected => {
                account.stored_credential = credential;
                Ok(true)
            },
            _ => Ok(false),
        }
    }
}

/// Flat-file implementation: one JSON document per account under `accounts/`
#[derive(Clone)]
pub struct FlatFileStorage {
    root: PathBuf,
    // serialises writers so the uniqueness check and the write are one step
    write_lock: Arc<Mutex<()>>,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("accounts"))?;
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn account_path(&self, id: Uuid) -> PathBuf {
        self.root.join("accounts").join(format!("{id}.json"))
    }

    // callers hold `write_lock`
    async fn write_account(&self, account: &Account) -> Result<(), AppError> {
        let path = self.account_path(account.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(account)?;
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for FlatFileStorage {
    async fn all(&self) -> Result<Vec<Account>, AppError> {
        let mut accounts = Vec::new();
        let mut entries = tokio_fs::read_dir(self.root.join("accounts")).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = tokio_fs::read_to_string(&path).await?;
            match serde_json::from_str::<Account>(&content) {
                Ok(account) => accounts.push(account),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable account file");
                },
            }
        }

        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let path = self.account_path(id);
        if !tokio_fs::try_exists(&path).await? {
            return Ok(None);
        }

        let content = tokio_fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn save(&self, mut account: Account) -> Result<Account, AppError> {
        account.email = normalize_email(&account.email);
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.find_by_email(&account.email).await? {
            if existing.id != account.id {
                return Err(AppError::DuplicateEmail);
            }
        }

        self.write_account(&account).await?;
        Ok(account)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        match tokio_fs::remove_file(self.account_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_credential_if(
        &self,
        id: Uuid,
        expected: &str,
        credential: String,
    ) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;

        let Some(mut account) = self.find_by_id(id).await? else {
            return Ok(false);
        };
        if account.stored_credential != expected {
            return Ok(false);
        }

        account.stored_credential = credential;
        self.write_account(&account).await?;
        Ok(true)
    }
}
