//! HTTP binding of the [`BookResource`].

use crate::resource::{BookInput, BookResource, BookView, Outcome, UNEXPECTED};
use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use shelf_catalog::BookId;

const EPUB_MEDIA_TYPE: &str = "application/epub+zip";
const FILE_FIELD: &str = "file";
const COVER_FIELD: &str = "cover";

impl<T: IntoResponse> IntoResponse for Outcome<T> {
    fn into_response(self) -> Response {
        match self {
            Outcome::Ok(body) => body.into_response(),
            Outcome::Acknowledged(message) => (StatusCode::OK, message).into_response(),
            Outcome::NoContent => StatusCode::NO_CONTENT.into_response(),
            Outcome::NotFound => StatusCode::NOT_FOUND.into_response(),
            Outcome::Rejected(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            Outcome::Unexpected => (StatusCode::INTERNAL_SERVER_ERROR, UNEXPECTED).into_response(),
        }
    }
}

/// Build the application router.
///
/// Request bodies are capped at `max_upload_bytes`.
pub fn router(resource: BookResource, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/books", get(list_books).post(create_book))
        .route("/api/books/{id}", get(get_book).patch(update_book).put(replace_book).delete(delete_book))
        .route("/api/books/{id}/upload", patch(upload_file).post(upload_file))
        .route("/api/books/{id}/file", get(download_file))
        .route("/api/books/{id}/cover", get(get_cover).patch(upload_cover).post(upload_cover))
        .route("/api/status", get(status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::from_fn(allow_any_origin))
        .with_state(resource)
}

/// Answer CORS preflights and allow every origin.
async fn allow_any_origin(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    response
}

async fn list_books(State(resource): State<BookResource>) -> Outcome<Json<Vec<BookView>>> {
    resource.list().await.map(Json)
}

async fn get_book(State(resource): State<BookResource>, Path(id): Path<i64>) -> Outcome<Json<BookView>> {
    resource.get(BookId::from(id)).await.map(Json)
}

async fn create_book(State(resource): State<BookResource>, Json(input): Json<BookInput>) -> Outcome<Json<BookView>> {
    resource.create(input).await.map(Json)
}

async fn update_book(
    State(resource): State<BookResource>,
    Path(id): Path<i64>,
    Json(input): Json<BookInput>,
) -> Outcome<Json<BookView>> {
    resource.update(BookId::from(id), input).await.map(Json)
}

async fn replace_book(
    State(resource): State<BookResource>,
    Path(id): Path<i64>,
    Json(input): Json<BookInput>,
) -> Outcome<Json<BookView>> {
    resource.replace(BookId::from(id), input).await.map(Json)
}

async fn delete_book(State(resource): State<BookResource>, Path(id): Path<i64>) -> Outcome<()> {
    resource.delete(BookId::from(id)).await
}

/// One named part of a multipart body.
#[derive(Default)]
struct Part {
    filename: Option<String>,
    data: Bytes,
}

/// The first part called `name`. A missing part reads as an empty upload.
async fn read_part(mut multipart: Multipart, name: &str) -> Result<Part, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(name) {
            let filename = field.file_name().map(str::to_string);
            let data = field.bytes().await?;
            return Ok(Part { filename, data });
        }
    }
    Ok(Part::default())
}

async fn upload_file(
    State(resource): State<BookResource>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Outcome<()>, MultipartError> {
    let part = read_part(multipart, FILE_FIELD).await?;
    Ok(resource.upload_file(BookId::from(id), part.filename.as_deref(), &part.data).await)
}

async fn upload_cover(
    State(resource): State<BookResource>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Outcome<()>, MultipartError> {
    let part = read_part(multipart, COVER_FIELD).await?;
    Ok(resource.upload_cover(BookId::from(id), &part.data).await)
}

async fn download_file(State(resource): State<BookResource>, Path(id): Path<i64>) -> Outcome<Response> {
    let id = BookId::from(id);
    resource.download_file(id).await.map(|data| {
        let headers = [
            (header::CONTENT_TYPE, EPUB_MEDIA_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"book_{id}.epub\"")),
        ];
        (headers, data).into_response()
    })
}

async fn get_cover(State(resource): State<BookResource>, Path(id): Path<i64>) -> Outcome<Response> {
    resource
        .cover(BookId::from(id))
        .await
        .map(|cover| ([(header::CONTENT_TYPE, cover.media_type)], cover.data).into_response())
}

async fn status(State(resource): State<BookResource>) -> &'static str {
    resource.status()
}
