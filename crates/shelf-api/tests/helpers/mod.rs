//! Test helpers: build AppState and router over in-memory doubles.
//!
//! Run from workspace root: `cargo test -p shelf-api --test books_test`. No database or
//! network is needed.

pub mod auth;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use shelf_api::auth::JwtVerifier;
use shelf_api::setup::routes;
use shelf_api::{AppState, StagingConfig};
use shelf_services::test_helpers::{fixtures, MemoryBookRepository, MemoryIntentLog, RecordingGateway};
use shelf_services::{BookDeletionService, BookUploadService};
use std::sync::Arc;
use tempfile::TempDir;

/// Test application: server plus handles on every double.
pub struct TestApp {
    pub server: TestServer,
    pub books: Arc<MemoryBookRepository>,
    pub intents: Arc<MemoryIntentLog>,
    pub gateway: Arc<RecordingGateway>,
    pub staging: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Files left behind in the staging directory
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.staging.path())
            .expect("Failed to read staging dir")
            .count()
    }
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with_limit(10_000_000)
}

pub fn setup_test_app_with_limit(max_upload_bytes: usize) -> TestApp {
    let books = Arc::new(MemoryBookRepository::new());
    let intents = Arc::new(MemoryIntentLog::new());
    let gateway = Arc::new(RecordingGateway::new());
    let staging = tempfile::tempdir().expect("Failed to create staging dir");

    let state = Arc::new(AppState {
        upload_service: Arc::new(BookUploadService::new(
            books.clone(),
            intents.clone(),
            gateway.clone(),
            fixtures::settings(),
        )),
        deletion_service: Arc::new(BookDeletionService::new(
            books.clone(),
            intents.clone(),
            gateway.clone(),
            fixtures::settings(),
        )),
        staging: StagingConfig {
            dir: staging.path().to_path_buf(),
            max_upload_bytes,
        },
    });

    let verifier = Arc::new(JwtVerifier::new(auth::TEST_JWT_SECRET));
    let server = TestServer::new(routes::app_router(state, verifier))
        .expect("Failed to start test server");

    TestApp {
        server,
        books,
        intents,
        gateway,
        staging,
    }
}

pub fn cover_part() -> Part {
    Part::bytes(b"\xff\xd8\xff\xe0cover".to_vec())
        .file_name("cover.jpg")
        .mime_type("image/jpeg")
}

pub fn document_part() -> Part {
    Part::bytes(b"%PDF-1.7 novel".to_vec())
        .file_name("novel.pdf")
        .mime_type("application/pdf")
}

/// A complete create form
pub fn book_form() -> MultipartForm {
    MultipartForm::new()
        .add_text("title", "Dune")
        .add_text("genre", "Science fiction")
        .add_part("coverImage", cover_part())
        .add_part("file", document_part())
}
