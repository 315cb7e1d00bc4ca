use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A published book. Both asset URLs are fully-qualified remote URLs once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub genre: String,
    /// Owner identity; never changes after creation.
    pub author: Uuid,
    pub cover_image_url: String,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new book record
#[derive(Debug, Clone)]
pub struct NewBook {
    /// Assigned before the first upload so the intent log can name the record early.
    pub id: Uuid,
    pub title: String,
    pub genre: String,
    pub author: Uuid,
    pub cover_image_url: String,
    pub file_url: String,
}

/// Partial update of a book record. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookChanges {
    pub title: Option<String>,
    pub genre: Option<String>,
    pub cover_image_url: Option<String>,
    pub file_url: Option<String>,
}

impl BookChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.genre.is_none()
            && self.cover_image_url.is_none()
            && self.file_url.is_none()
    }

    /// Apply the changes to an in-memory copy of the record.
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(ref title) = self.title {
            book.title = title.clone();
        }
        if let Some(ref genre) = self.genre {
            book.genre = genre.clone();
        }
        if let Some(ref url) = self.cover_image_url {
            book.cover_image_url = url.clone();
        }
        if let Some(ref url) = self.file_url {
            book.file_url = url.clone();
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub genre: String,
    pub author: Uuid,
    pub cover_image: String,
    pub file: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        BookResponse {
            id: book.id,
            title: book.title,
            genre: book.genre,
            author: book.author,
            cover_image: book.cover_image_url,
            file: book.file_url,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// Body returned after a successful create
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedBookResponse {
    pub id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> Book {
        Book {
            id: Uuid::new_v4(),
            title: "Dune".to_string(),
            genre: "Science fiction".to_string(),
            author: Uuid::new_v4(),
            cover_image_url: "https://res.cloudinary.com/demo/image/upload/v1/book-covers/cover_abc123.jpg"
                .to_string(),
            file_url: "https://res.cloudinary.com/demo/raw/upload/v1/book-pdfs/novel_xyz789.pdf"
                .to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_book_response_wire_shape() {
        let book = sample_book();
        let json = serde_json::to_value(BookResponse::from(book.clone())).unwrap();
        assert_eq!(json["id"], book.id.to_string());
        assert_eq!(json["coverImage"], book.cover_image_url);
        assert_eq!(json["file"], book.file_url);
        assert_eq!(json["author"], book.author.to_string());
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_changes_apply_only_set_fields() {
        let mut book = sample_book();
        let original = book.clone();
        let changes = BookChanges {
            title: Some("Dune Messiah".to_string()),
            ..Default::default()
        };
        assert!(!changes.is_empty());
        changes.apply_to(&mut book);
        assert_eq!(book.title, "Dune Messiah");
        assert_eq!(book.genre, original.genre);
        assert_eq!(book.cover_image_url, original.cover_image_url);
        assert_eq!(book.file_url, original.file_url);
    }

    #[test]
    fn test_default_changes_are_empty() {
        assert!(BookChanges::default().is_empty());
    }
}
