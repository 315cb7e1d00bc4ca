use chrono::{DateTime, Utc};
use shelf_core::{AppError, AssetIntent, IntentOperation, IntentState, RemoteAssetRef};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

/// Durable log of operations that span remote storage and the record store.
#[async_trait::async_trait]
pub trait AssetIntentRepository: Send + Sync {
    /// Open a new intent in `pending`.
    async fn begin(
        &self,
        operation: IntentOperation,
        book_id: Option<Uuid>,
        assets: Vec<RemoteAssetRef>,
    ) -> Result<AssetIntent, AppError>;

    /// Append an asset the operation has created or is about to remove.
    async fn record_asset(&self, id: Uuid, asset: RemoteAssetRef) -> Result<(), AppError>;

    /// Move to `state`. `book_id`, when given, is stored on the intent.
    async fn transition(
        &self,
        id: Uuid,
        state: IntentState,
        book_id: Option<Uuid>,
    ) -> Result<(), AppError>;

    /// Non-terminal intents, oldest first.
    async fn list_unresolved(&self, limit: i64) -> Result<Vec<AssetIntent>, AppError>;

    /// Record a failed resolution attempt and return the new attempt count.
    async fn record_failure(&self, id: Uuid, error: &str) -> Result<i32, AppError>;
}

#[derive(Debug, FromRow)]
struct AssetIntentRow {
    id: Uuid,
    operation: IntentOperation,
    state: IntentState,
    book_id: Option<Uuid>,
    assets: Json<Vec<RemoteAssetRef>>,
    attempts: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AssetIntentRow> for AssetIntent {
    fn from(row: AssetIntentRow) -> Self {
        AssetIntent {
            id: row.id,
            operation: row.operation,
            state: row.state,
            book_id: row.book_id,
            assets: row.assets.0,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const INTENT_COLUMNS: &str =
    "id, operation, state, book_id, assets, attempts, last_error, created_at, updated_at";

/// PostgreSQL intent log
#[derive(Clone)]
pub struct PgAssetIntentRepository {
    pool: PgPool,
}

impl PgAssetIntentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AssetIntentRepository for PgAssetIntentRepository {
    #[tracing::instrument(skip(self, assets), fields(db.table = "asset_intents", db.operation = "insert"))]
    async fn begin(
        &self,
        operation: IntentOperation,
        book_id: Option<Uuid>,
        assets: Vec<RemoteAssetRef>,
    ) -> Result<AssetIntent, AppError> {
        let row = sqlx::query_as::<Postgres, AssetIntentRow>(&format!(
            r#"
            INSERT INTO asset_intents (operation, state, book_id, assets)
            VALUES ($1, 'pending', $2, $3)
            RETURNING {}
            "#,
            INTENT_COLUMNS
        ))
        .bind(operation)
        .bind(book_id)
        .bind(Json(assets))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    #[tracing::instrument(skip(self, asset), fields(db.table = "asset_intents", db.operation = "update", db.record_id = %id))]
    async fn record_asset(&self, id: Uuid, asset: RemoteAssetRef) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE asset_intents
            SET assets = assets || $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(Json(vec![asset]))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_intents", db.operation = "update", db.record_id = %id))]
    async fn transition(
        &self,
        id: Uuid,
        state: IntentState,
        book_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE asset_intents
            SET state = $2, book_id = COALESCE($3, book_id), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(state)
        .bind(book_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_intents", db.operation = "select"))]
    async fn list_unresolved(&self, limit: i64) -> Result<Vec<AssetIntent>, AppError> {
        let rows = sqlx::query_as::<Postgres, AssetIntentRow>(&format!(
            r#"
            SELECT {}
            FROM asset_intents
            WHERE state NOT IN ('done', 'abandoned')
            ORDER BY updated_at ASC
            LIMIT $1
            "#,
            INTENT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AssetIntent::from).collect())
    }

    #[tracing::instrument(skip(self, error), fields(db.table = "asset_intents", db.operation = "update", db.record_id = %id))]
    async fn record_failure(&self, id: Uuid, error: &str) -> Result<i32, AppError> {
        let attempts = sqlx::query_scalar::<Postgres, i32>(
            r#"
            UPDATE asset_intents
            SET attempts = attempts + 1, last_error = $2
            WHERE id = $1
            RETURNING attempts
            "#,
        )
        .bind(id)
        .bind(error)
        .fetch_one(&self.pool)
        .await?;

        Ok(attempts)
    }
}
