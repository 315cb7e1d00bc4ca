use shelf_core::{is_remote_url, AppError, Book, BookChanges, NewBook};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Book record store
#[async_trait::async_trait]
pub trait BookRepository: Send + Sync {
    async fn create(&self, book: NewBook) -> Result<Book, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>, AppError>;

    /// Apply `changes` and return the updated record, or `None` if it does not exist.
    async fn update_by_id(&self, id: Uuid, changes: BookChanges)
        -> Result<Option<Book>, AppError>;

    /// Returns whether a record was removed.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AppError>;
}

/// Reject anything that is not an absolute http(s) URL.
///
/// Keeps local staging paths and empty strings out of the asset columns.
pub fn ensure_remote_url(field: &str, value: &str) -> Result<(), AppError> {
    if is_remote_url(value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{} must be a fully-qualified remote URL",
            field
        )))
    }
}

const BOOK_COLUMNS: &str =
    "id, title, genre, author, cover_image_url, file_url, created_at, updated_at";

/// PostgreSQL book repository
#[derive(Clone)]
pub struct PgBookRepository {
    pool: PgPool,
}

impl PgBookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BookRepository for PgBookRepository {
    #[tracing::instrument(skip(self, book), fields(db.table = "books", db.operation = "insert"))]
    async fn create(&self, book: NewBook) -> Result<Book, AppError> {
        ensure_remote_url("coverImage", &book.cover_image_url)?;
        ensure_remote_url("file", &book.file_url)?;

        let created = sqlx::query_as::<Postgres, Book>(&format!(
            r#"
            INSERT INTO books (id, title, genre, author, cover_image_url, file_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.genre)
        .bind(book.author)
        .bind(&book.cover_image_url)
        .bind(&book.file_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "books", db.operation = "select", db.record_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>, AppError> {
        let book = sqlx::query_as::<Postgres, Book>(&format!(
            "SELECT {} FROM books WHERE id = $1",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    #[tracing::instrument(skip(self, changes), fields(db.table = "books", db.operation = "update", db.record_id = %id))]
    async fn update_by_id(
        &self,
        id: Uuid,
        changes: BookChanges,
    ) -> Result<Option<Book>, AppError> {
        if let Some(ref url) = changes.cover_image_url {
            ensure_remote_url("coverImage", url)?;
        }
        if let Some(ref url) = changes.file_url {
            ensure_remote_url("file", url)?;
        }

        let book = sqlx::query_as::<Postgres, Book>(&format!(
            r#"
            UPDATE books
            SET title = COALESCE($2, title),
                genre = COALESCE($3, genre),
                cover_image_url = COALESCE($4, cover_image_url),
                file_url = COALESCE($5, file_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.genre)
        .bind(changes.cover_image_url)
        .bind(changes.file_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    #[tracing::instrument(skip(self), fields(db.table = "books", db.operation = "delete", db.record_id = %id))]
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_urls_accepted() {
        assert!(ensure_remote_url(
            "coverImage",
            "https://res.cloudinary.com/demo/image/upload/v1/book-covers/cover_abc123.jpg"
        )
        .is_ok());
    }

    #[test]
    fn test_local_paths_rejected() {
        let err = ensure_remote_url("file", "/app/public/data/uploads/3f2a").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(ensure_remote_url("file", "").is_err());
    }
}
