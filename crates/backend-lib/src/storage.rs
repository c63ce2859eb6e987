// ============================
// backend-lib/src/storage.rs
// ============================
//! Storage abstraction with in-memory and flat-file implementations.
//!
//! Uniqueness of usernames and emails is checked by the handlers with
//! separate lookups before inserting. Nothing here makes check-then-insert
//! atomic, so two concurrent registrations for the same name can both pass.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs as tokio_fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Product, User};

const USERS_FILE: &str = "users.json";
const PRODUCTS_FILE: &str = "products.json";

/// Filter and window for a product listing
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub offset: u64,
    pub limit: u32,
}

/// One page of products plus the total number of matches
#[derive(Debug, Clone, Default)]
pub struct ProductPage {
    pub total: u64,
    pub items: Vec<Product>,
}

/// Trait for storage backends
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist a new identity
    async fn insert_user(&self, user: User) -> Result<User, AppError>;

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// All identities, newest first
    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    /// Replace an existing identity
    async fn update_user(&self, user: User) -> Result<User, AppError>;

    /// Remove an identity and every product it owns. Returns `false` when absent.
    async fn delete_user(&self, id: Uuid) -> Result<bool, AppError>;

    async fn insert_product(&self, product: Product) -> Result<Product, AppError>;

    async fn product_by_id(&self, id: Uuid) -> Result<Option<Product>, AppError>;

    /// Products matching the filter, newest first
    async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, AppError>;

    /// Products owned by one identity, newest first
    async fn products_by_owner(&self, owner_id: Uuid) -> Result<Vec<Product>, AppError>;

    /// Replace an existing product
    async fn update_product(&self, product: Product) -> Result<Product, AppError>;

    /// Returns `false` when absent
    async fn delete_product(&self, id: Uuid) -> Result<bool, AppError>;
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, Product>,
}

/// Process-local storage
#[derive(Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records(users: Vec<User>, products: Vec<Product>) -> Self {
        let tables = Tables {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
            products: products.into_iter().map(|p| (p.id, p)).collect(),
        };
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    fn snapshot(&self) -> (Vec<User>, Vec<Product>) {
        let tables = self.tables.read();
        (
            tables.users.values().cloned().collect(),
            tables.products.values().cloned().collect(),
        )
    }
}

fn newest_first<T, F>(items: &mut [T], created_at: F)
where
    F: Fn(&T) -> chrono::DateTime<chrono::Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn insert_user(&self, user: User) -> Result<User, AppError> {
        self.tables.write().users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut users: Vec<User> = self.tables.read().users.values().cloned().collect();
        newest_first(&mut users, |u| u.created_at);
        Ok(users)
    }

    async fn update_user(&self, user: User) -> Result<User, AppError> {
        let mut tables = self.tables.write();
        match tables.users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(user)
            },
            None => Err(AppError::NotFound("User not found".to_string())),
        }
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write();
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        tables.products.retain(|_, p| p.owner_id != id);
        Ok(true)
    }

    async fn insert_product(&self, product: Product) -> Result<Product, AppError> {
        self.tables
            .write()
            .products
            .insert(product.id, product.clone());
        Ok(product)
    }

    async fn product_by_id(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.tables.read().products.get(&id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, AppError> {
        let mut matching: Vec<Product> = self
            .tables
            .read()
            .products
            .values()
            .filter(|p| match &filter.category {
                Some(category) => p.category.as_deref() == Some(category.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        newest_first(&mut matching, |p| p.created_at);

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(filter.offset).unwrap_or(usize::MAX))
            .take(filter.limit as usize)
            .collect();
        Ok(ProductPage { total, items })
    }

    async fn products_by_owner(&self, owner_id: Uuid) -> Result<Vec<Product>, AppError> {
        let mut owned: Vec<Product> = self
            .tables
            .read()
            .products
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        newest_first(&mut owned, |p| p.created_at);
        Ok(owned)
    }

    async fn update_product(&self, product: Product) -> Result<Product, AppError> {
        let mut tables = self.tables.write();
        match tables.products.get_mut(&product.id) {
            Some(slot) => {
                *slot = product.clone();
                Ok(product)
            },
            None => Err(AppError::NotFound("Product not found".to_string())),
        }
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.tables.write().products.remove(&id).is_some())
    }
}

/// Flat-file implementation of the Storage trait.
///
/// Keeps the working set in memory and rewrites `users.json` and
/// `products.json` under the root directory after every mutation.
#[derive(Clone)]
pub struct FlatFileStorage {
    root: PathBuf,
    inner: MemoryStorage,
    write_lock: Arc<Mutex<()>>,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let users: Vec<User> = read_table(&root.join(USERS_FILE))?;
        let products: Vec<Product> = read_table(&root.join(PRODUCTS_FILE))?;
        tracing::info!(
            root = %root.display(),
            users = users.len(),
            products = products.len(),
            "loaded flat-file storage"
        );
        Ok(Self {
            root,
            inner: MemoryStorage::with_records(users, products),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Write both tables to disk. Writes go to a temp file first, then rename.
    async fn persist(&self) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let (users, products) = self.inner.snapshot();
        write_table(&self.root.join(USERS_FILE), &users).await?;
        write_table(&self.root.join(PRODUCTS_FILE), &products).await?;
        Ok(())
    }
}

fn read_table<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}

async fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(rows)?;
    let tmp = path.with_extension("json.tmp");
    tokio_fs::write(&tmp, json).await?;
    tokio_fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl Storage for FlatFileStorage {
    async fn insert_user(&self, user: User) -> Result<User, AppError> {
        let user = self.inner.insert_user(user).await?;
        self.persist().await?;
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.inner.user_by_id(id).await
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.inner.user_by_username(username).await
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.inner.user_by_email(email).await
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.inner.list_users().await
    }

    async fn update_user(&self, user: User) -> Result<User, AppError> {
        let user = self.inner.update_user(user).await?;
        self.persist().await?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        let removed = self.inner.delete_user(id).await?;
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    async fn insert_product(&self, product: Product) -> Result<Product, AppError> {
        let product = self.inner.insert_product(product).await?;
        self.persist().await?;
        Ok(product)
    }

    async fn product_by_id(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        self.inner.product_by_id(id).await
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, AppError> {
        self.inner.list_products(filter).await
    }

    async fn products_by_owner(&self, owner_id: Uuid) -> Result<Vec<Product>, AppError> {
        self.inner.products_by_owner(owner_id).await
    }

    async fn update_product(&self, product: Product) -> Result<Product, AppError> {
        let product = self.inner.update_product(product).await?;
        self.persist().await?;
        Ok(product)
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool, AppError> {
        let removed = self.inner.delete_product(id).await?;
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }
}
