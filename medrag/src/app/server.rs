//! HTTP interface. Serves the chat page, the JSON API and its OpenAPI docs.

pub mod api;
pub mod router;
