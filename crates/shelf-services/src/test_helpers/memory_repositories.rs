//! In-memory repository implementations for testing

use async_trait::async_trait;
use chrono::{Duration, Utc};
use shelf_core::{
    AppError, AssetIntent, Book, BookChanges, IntentOperation, IntentState, NewBook,
    RemoteAssetRef,
};
use shelf_db::{ensure_remote_url, AssetIntentRepository, BookRepository};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Book store backed by a map. Writes can be made to fail.
#[derive(Default)]
pub struct MemoryBookRepository {
    books: Mutex<HashMap<Uuid, Book>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing validation.
    pub fn insert(&self, book: Book) -> Book {
        self.books.lock().unwrap().insert(book.id, book.clone());
        book
    }

    pub fn get(&self, id: Uuid) -> Option<Book> {
        self.books.lock().unwrap().get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.books.lock().unwrap().len()
    }

    /// Make create, update and delete fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("simulated database outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BookRepository for MemoryBookRepository {
    async fn create(&self, book: NewBook) -> Result<Book, AppError> {
        self.check_writable()?;
        ensure_remote_url("coverImage", &book.cover_image_url)?;
        ensure_remote_url("file", &book.file_url)?;

        let now = Utc::now();
        let created = Book {
            id: book.id,
            title: book.title,
            genre: book.genre,
            author: book.author,
            cover_image_url: book.cover_image_url,
            file_url: book.file_url,
            created_at: now,
            updated_at: now,
        };
        self.books
            .lock()
            .unwrap()
            .insert(created.id, created.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>, AppError> {
        Ok(self.get(id))
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        changes: BookChanges,
    ) -> Result<Option<Book>, AppError> {
        self.check_writable()?;
        if let Some(ref url) = changes.cover_image_url {
            ensure_remote_url("coverImage", url)?;
        }
        if let Some(ref url) = changes.file_url {
            ensure_remote_url("file", url)?;
        }

        let mut books = self.books.lock().unwrap();
        let Some(book) = books.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply_to(book);
        book.updated_at = Utc::now();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Some(book.clone()))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AppError> {
        self.check_writable()?;
        let removed = self.books.lock().unwrap().remove(&id).is_some();
        if removed {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }
}

/// Intent log backed by a vector, in insertion order.
#[derive(Default)]
pub struct MemoryIntentLog {
    intents: Mutex<Vec<AssetIntent>>,
    fail_begin: AtomicBool,
    fail_transitions: Mutex<Vec<IntentState>>,
}

impl MemoryIntentLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an intent directly.
    pub fn insert(&self, intent: AssetIntent) -> AssetIntent {
        self.intents.lock().unwrap().push(intent.clone());
        intent
    }

    pub fn get(&self, id: Uuid) -> Option<AssetIntent> {
        self.intents
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<AssetIntent> {
        self.intents.lock().unwrap().clone()
    }

    /// Make `begin` fail with a database error.
    pub fn fail_begin(&self, fail: bool) {
        self.fail_begin.store(fail, Ordering::SeqCst);
    }

    /// Make every transition into one of `states` fail with a database error.
    pub fn fail_transitions_to(&self, states: &[IntentState]) {
        *self.fail_transitions.lock().unwrap() = states.to_vec();
    }

    /// Move `updated_at` of an intent into the past.
    pub fn backdate(&self, id: Uuid, by: Duration) {
        self.with_intent(id, |intent| intent.updated_at = intent.updated_at - by)
            .expect("intent to backdate");
    }

    fn with_intent<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut AssetIntent) -> T,
    ) -> Result<T, AppError> {
        let mut intents = self.intents.lock().unwrap();
        let intent = intents
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Intent {} not found", id)))?;
        Ok(f(intent))
    }
}

#[async_trait]
impl AssetIntentRepository for MemoryIntentLog {
    async fn begin(
        &self,
        operation: IntentOperation,
        book_id: Option<Uuid>,
        assets: Vec<RemoteAssetRef>,
    ) -> Result<AssetIntent, AppError> {
        if self.fail_begin.load(Ordering::SeqCst) {
            return Err(AppError::Internal("simulated database outage".to_string()));
        }
        let now = Utc::now();
        Ok(self.insert(AssetIntent {
            id: Uuid::new_v4(),
            operation,
            state: IntentState::Pending,
            book_id,
            assets,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }))
    }

    async fn record_asset(&self, id: Uuid, asset: RemoteAssetRef) -> Result<(), AppError> {
        self.with_intent(id, |intent| {
            intent.assets.push(asset);
            intent.updated_at = Utc::now();
        })
    }

    async fn transition(
        &self,
        id: Uuid,
        state: IntentState,
        book_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        if self.fail_transitions.lock().unwrap().contains(&state) {
            return Err(AppError::Internal("simulated database outage".to_string()));
        }
        self.with_intent(id, |intent| {
            intent.state = state;
            if book_id.is_some() {
                intent.book_id = book_id;
            }
            intent.updated_at = Utc::now();
        })
    }

    async fn list_unresolved(&self, limit: i64) -> Result<Vec<AssetIntent>, AppError> {
        let mut pending: Vec<AssetIntent> = self
            .intents
            .lock()
            .unwrap()
            .iter()
            .filter(|i| !i.state.is_terminal())
            .cloned()
            .collect();
        pending.sort_by_key(|i| i.updated_at);
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn record_failure(&self, id: Uuid, error: &str) -> Result<i32, AppError> {
        self.with_intent(id, |intent| {
            intent.attempts += 1;
            intent.last_error = Some(error.to_string());
            intent.attempts
        })
    }
}
