use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
    Client, Collection, IndexModel,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{event, Level};

use crate::{
    config::MongoDbInitializationInfo,
    domain::{CookieStand, CookieStandFields, CookieStandId, User, UserId},
};

static COUNTERS_COLLECTION_NAME: &str = "counters";
static COOKIE_STAND_SEQUENCE: &str = "cookie_stand_id";
static USER_SEQUENCE: &str = "user_id";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} with id {id} does not exist")]
    NotFound { entity: &'static str, id: i64 },

    #[error("user '{0}' already exists")]
    DuplicateUsername(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<mongodb::error::Error> for RepositoryError {
    fn from(e: mongodb::error::Error) -> Self {
        RepositoryError::Storage(e.to_string())
    }
}

const DUPLICATE_KEY_CODE: i32 = 11000;

fn write_error_code(e: &mongodb::error::Error) -> Option<i32> {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => Some(write_error.code),
        _ => None,
    }
}

/// A concurrent registration can pass the lookup and still lose on the unique index.
fn user_insert_error(code: Option<i32>, username: &str, message: String) -> RepositoryError {
    match code {
        Some(DUPLICATE_KEY_CODE) => RepositoryError::DuplicateUsername(username.to_string()),
        _ => RepositoryError::Storage(message),
    }
}

fn cookie_stand_not_found(id: CookieStandId) -> RepositoryError {
    RepositoryError::NotFound {
        entity: "CookieStand",
        id,
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CookieStandRepository: Send + Sync {
    async fn create(&self, fields: CookieStandFields) -> Result<CookieStand, RepositoryError>;
    async fn read(&self, id: CookieStandId) -> Result<CookieStand, RepositoryError>;
    /// All stands in ascending id order.
    async fn read_all(&self) -> Result<Vec<CookieStand>, RepositoryError>;
    async fn update(
        &self,
        id: CookieStandId,
        fields: CookieStandFields,
    ) -> Result<CookieStand, RepositoryError>;
    async fn delete(&self, id: CookieStandId) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, username: &str, password_hash: &str) -> Result<User, RepositoryError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
}

struct Table<T> {
    rows: BTreeMap<i64, T>,
    // ids are never reused, even after a delete
    last_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Table {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Default)]
pub struct InMemoryCookieStandRepository {
    stands: Mutex<Table<CookieStand>>,
}

impl InMemoryCookieStandRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CookieStandRepository for InMemoryCookieStandRepository {
    async fn create(&self, fields: CookieStandFields) -> Result<CookieStand, RepositoryError> {
        let mut lock = self.stands.lock().await;
        let id = lock.next_id();
        let stand = CookieStand::from_fields(id, fields);
        lock.rows.insert(id, stand.clone());
        Ok(stand)
    }

    async fn read(&self, id: CookieStandId) -> Result<CookieStand, RepositoryError> {
        let lock = self.stands.lock().await;
        lock.rows.get(&id).cloned().ok_or_else(|| cookie_stand_not_found(id))
    }

    async fn read_all(&self) -> Result<Vec<CookieStand>, RepositoryError> {
        let lock = self.stands.lock().await;
        Ok(lock.rows.values().cloned().collect())
    }

    async fn update(
        &self,
        id: CookieStandId,
        fields: CookieStandFields,
    ) -> Result<CookieStand, RepositoryError> {
        let mut lock = self.stands.lock().await;
        match lock.rows.get_mut(&id) {
            Some(existing) => {
                *existing = CookieStand::from_fields(id, fields);
                Ok(existing.clone())
            }
            None => Err(cookie_stand_not_found(id)),
        }
    }

    async fn delete(&self, id: CookieStandId) -> Result<(), RepositoryError> {
        let mut lock = self.stands.lock().await;
        match lock.rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(cookie_stand_not_found(id)),
        }
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Table<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, username: &str, password_hash: &str) -> Result<User, RepositoryError> {
        let mut lock = self.users.lock().await;
        if lock.rows.values().any(|u| u.username == username) {
            return Err(RepositoryError::DuplicateUsername(username.to_string()));
        }

        let user = User {
            id: lock.next_id(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        lock.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let lock = self.users.lock().await;
        Ok(lock.rows.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let lock = self.users.lock().await;
        Ok(lock.rows.get(&id).cloned())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CookieStandDocument {
    #[serde(rename = "_id")]
    id: i64,
    location: String,
    owner: i64,
    description: String,
    hourly_sales: Vec<String>,
    minimum_customers_per_hour: i32,
    maximum_customers_per_hour: i32,
    average_cookies_per_sale: f64,
}

impl From<CookieStand> for CookieStandDocument {
    fn from(stand: CookieStand) -> Self {
        CookieStandDocument {
            id: stand.id,
            location: stand.location,
            owner: stand.owner,
            description: stand.description,
            hourly_sales: stand.hourly_sales,
            minimum_customers_per_hour: stand.minimum_customers_per_hour,
            maximum_customers_per_hour: stand.maximum_customers_per_hour,
            average_cookies_per_sale: stand.average_cookies_per_sale,
        }
    }
}

impl From<CookieStandDocument> for CookieStand {
    fn from(document: CookieStandDocument) -> Self {
        CookieStand {
            id: document.id,
            location: document.location,
            owner: document.owner,
            description: document.description,
            hourly_sales: document.hourly_sales,
            minimum_customers_per_hour: document.minimum_customers_per_hour,
            maximum_customers_per_hour: document.maximum_customers_per_hour,
            average_cookies_per_sale: document.average_cookies_per_sale,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: i64,
    username: String,
    password_hash: String,
}

impl From<UserDocument> for User {
    fn from(document: UserDocument) -> Self {
        User {
            id: document.id,
            username: document.username,
            password_hash: document.password_hash,
        }
    }
}

/// Atomically bumps the named counter, creating it on first use.
async fn next_sequence_value(
    counters: &Collection<Document>,
    sequence: &str,
) -> Result<i64, RepositoryError> {
    let counter = counters
        .find_one_and_update(doc! {"_id": sequence}, doc! {"$inc": {"value": 1_i64}})
        .upsert(true)
        .return_document(ReturnDocument::After)
        .await?;

    counter
        .and_then(|c| c.get_i64("value").ok())
        .ok_or_else(|| RepositoryError::Storage(format!("sequence {} returned no value", sequence)))
}

#[derive(Clone)]
pub struct MongoDbCookieStandRepository {
    cookie_stand_collection: Collection<CookieStandDocument>,
    counters: Collection<Document>,
}

impl MongoDbCookieStandRepository {
    pub fn new(info: &MongoDbInitializationInfo, client: &Client) -> Self {
        let database = client.database(&info.database);

        MongoDbCookieStandRepository {
            cookie_stand_collection: database.collection(&info.cookie_stand_collection),
            counters: database.collection(COUNTERS_COLLECTION_NAME),
        }
    }
}

#[async_trait]
impl CookieStandRepository for MongoDbCookieStandRepository {
    async fn create(&self, fields: CookieStandFields) -> Result<CookieStand, RepositoryError> {
        let id = next_sequence_value(&self.counters, COOKIE_STAND_SEQUENCE).await?;
        let stand = CookieStand::from_fields(id, fields);

        self.cookie_stand_collection
            .insert_one(CookieStandDocument::from(stand.clone()))
            .await?;
        event!(Level::DEBUG, "inserted cookie stand {} into mongodb", id);

        Ok(stand)
    }

    async fn read(&self, id: CookieStandId) -> Result<CookieStand, RepositoryError> {
        match self.cookie_stand_collection.find_one(doc! {"_id": id}).await? {
            Some(document) => Ok(document.into()),
            None => Err(cookie_stand_not_found(id)),
        }
    }

    async fn read_all(&self) -> Result<Vec<CookieStand>, RepositoryError> {
        let documents: Vec<CookieStandDocument> = self
            .cookie_stand_collection
            .find(doc! {})
            .sort(doc! {"_id": 1})
            .await?
            .try_collect()
            .await?;

        Ok(documents.into_iter().map(CookieStand::from).collect())
    }

    async fn update(
        &self,
        id: CookieStandId,
        fields: CookieStandFields,
    ) -> Result<CookieStand, RepositoryError> {
        let stand = CookieStand::from_fields(id, fields);
        let result = self
            .cookie_stand_collection
            .replace_one(doc! {"_id": id}, CookieStandDocument::from(stand.clone()))
            .await?;

        if result.matched_count == 0 {
            return Err(cookie_stand_not_found(id));
        }

        Ok(stand)
    }

    async fn delete(&self, id: CookieStandId) -> Result<(), RepositoryError> {
        let result = self.cookie_stand_collection.delete_one(doc! {"_id": id}).await?;

        if result.deleted_count == 0 {
            return Err(cookie_stand_not_found(id));
        }

        Ok(())
    }
}

#[derive(Clone)]
pub struct MongoDbUserRepository {
    user_collection: Collection<UserDocument>,
    counters: Collection<Document>,
}

impl MongoDbUserRepository {
    pub async fn new(
        info: &MongoDbInitializationInfo,
        client: &Client,
    ) -> Result<Self, RepositoryError> {
        let database = client.database(&info.database);
        let user_collection: Collection<UserDocument> = database.collection(&info.user_collection);

        let unique_username = IndexModel::builder()
            .keys(doc! {"username": 1})
            .options(IndexOptions::builder().unique(true).build())
            .build();
        user_collection.create_index(unique_username).await?;

        Ok(MongoDbUserRepository {
            user_collection,
            counters: database.collection(COUNTERS_COLLECTION_NAME),
        })
    }
}

#[async_trait]
impl UserRepository for MongoDbUserRepository {
    async fn create(&self, username: &str, password_hash: &str) -> Result<User, RepositoryError> {
        if self.find_by_username(username).await?.is_some() {
            return Err(RepositoryError::DuplicateUsername(username.to_string()));
        }

        let document = UserDocument {
            id: next_sequence_value(&self.counters, USER_SEQUENCE).await?,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        let user = User {
            id: document.id,
            username: document.username.clone(),
            password_hash: document.password_hash.clone(),
        };

        self.user_collection
            .insert_one(document)
            .await
            .map_err(|e| user_insert_error(write_error_code(&e), username, e.to_string()))?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .user_collection
            .find_one(doc! {"username": username})
            .await?
            .map(User::from))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .user_collection
            .find_one(doc! {"_id": id})
            .await?
            .map(User::from))
    }
}
