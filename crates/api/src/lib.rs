//! The REST surface of the shelf.
//!
//! [`BookResource`] is the transport-agnostic facade over the
//! [`Library`](shelf_library::Library); [`router`] binds it to HTTP:
//!
//! | Route                       | Methods                        |
//! |-----------------------------|--------------------------------|
//! | `/api/books`                | `GET`, `POST`                  |
//! | `/api/books/{id}`           | `GET`, `PATCH`, `PUT`, `DELETE`|
//! | `/api/books/{id}/upload`    | `PATCH`, `POST` (multipart `file`) |
//! | `/api/books/{id}/file`      | `GET`                          |
//! | `/api/books/{id}/cover`     | `GET`, `PATCH`, `POST` (multipart `cover`) |
//! | `/api/status`               | `GET`                          |

pub mod resource;
mod routes;

pub use crate::resource::{BookInput, BookResource, BookView, Outcome};
pub use crate::routes::router;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use shelf_catalog::{Database, Repository};
    use shelf_library::{Library, Settings};
    use shelf_storage::backend::MockBackend;
    use std::sync::Arc;

    pub(crate) async fn resource_with(settings: Settings) -> (BookResource, Arc<MockBackend>) {
        let db = Database::connect_in_memory().await.unwrap();
        let backend = Arc::new(MockBackend::default());
        let library = Library::new(backend.clone(), Repository::from(&db), settings);
        (BookResource::new(Arc::new(library)), backend)
    }

    pub(crate) async fn resource() -> (BookResource, Arc<MockBackend>) {
        resource_with(Settings::default()).await
    }
}
