//! Shared fixtures

use chrono::Utc;
use shelf_core::{Book, StagedAsset};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::publishing::PublishingSettings;

pub const COVER_URL: &str =
    "https://res.cloudinary.com/demo/image/upload/v1/book-covers/cover_abc123.jpg";
pub const FILE_URL: &str =
    "https://res.cloudinary.com/demo/raw/upload/v1/book-pdfs/novel_xyz789.pdf";

pub fn settings() -> PublishingSettings {
    PublishingSettings {
        cover_namespace: "book-covers".to_string(),
        document_namespace: "book-pdfs".to_string(),
        remote_timeout: Duration::from_secs(5),
    }
}

/// A persisted-looking book owned by `author` with the two reference URLs.
pub fn book(author: Uuid) -> Book {
    let now = Utc::now();
    Book {
        id: Uuid::new_v4(),
        title: "Dune".to_string(),
        genre: "Science fiction".to_string(),
        author,
        cover_image_url: COVER_URL.to_string(),
        file_url: FILE_URL.to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// Write a staged file under a random name, the way multipart staging does.
pub fn staged_file(dir: &Path, mime_type: &str, original_filename: &str, body: &[u8]) -> StagedAsset {
    let path = dir.join(Uuid::new_v4().to_string());
    std::fs::write(&path, body).expect("write staged file");
    StagedAsset::new(path, mime_type, original_filename)
}

pub fn staged_cover(dir: &Path) -> StagedAsset {
    staged_file(dir, "image/jpeg", "cover.jpg", b"\xff\xd8\xff\xe0jpeg")
}

pub fn staged_document(dir: &Path) -> StagedAsset {
    staged_file(dir, "application/pdf", "novel.pdf", b"%PDF-1.7")
}
