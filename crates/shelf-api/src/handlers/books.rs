//! Book publishing endpoints

use axum::{
    extract::{rejection::PathRejection, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shelf_core::{BookResponse, CreatedBookResponse};
use shelf_services::{CreateBookInput, UpdateBookInput};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::RequesterId;
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::staging::stage_multipart;

/// `POST /api/books`: multipart `title`, `genre`, `coverImage`, `file`.
#[tracing::instrument(skip_all, fields(requester_id = %requester.0))]
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    requester: RequesterId,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let form = stage_multipart(multipart, &state.staging).await?;

    let book = state
        .upload_service
        .create_book(
            requester.0,
            CreateBookInput {
                title: form.title.unwrap_or_default(),
                genre: form.genre.unwrap_or_default(),
                cover_image: form.cover_image,
                file: form.file,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(CreatedBookResponse { id: book.id })))
}

/// `PATCH /api/books/{book_id}`: every multipart field is optional.
#[tracing::instrument(skip_all, fields(requester_id = %requester.0))]
pub async fn update_book(
    State(state): State<Arc<AppState>>,
    requester: RequesterId,
    book_id: Result<Path<Uuid>, PathRejection>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let Path(book_id) = book_id?;
    let form = stage_multipart(multipart, &state.staging).await?;

    let book = state
        .upload_service
        .update_book(
            requester.0,
            book_id,
            UpdateBookInput {
                title: form.title,
                genre: form.genre,
                cover_image: form.cover_image,
                file: form.file,
            },
        )
        .await?;

    Ok(Json(BookResponse::from(book)))
}

/// `DELETE /api/books/{book_id}`
#[tracing::instrument(skip_all, fields(requester_id = %requester.0))]
pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    requester: RequesterId,
    book_id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let Path(book_id) = book_id?;
    state
        .deletion_service
        .delete_book(requester.0, book_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
