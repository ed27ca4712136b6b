use axum::{
    body::Body,
    extract::Path,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use mime_guess::from_path;
use rust_embed::RustEmbed;

use super::classifier::CorsHeaders;

/// Beacon client scripts compiled into the binary
#[derive(RustEmbed)]
#[folder = "assets/js"]
pub struct ClientScripts;

/// Serve an embedded client script. Scripts are loaded cross-origin by the
/// monitored sites, so every response carries CORS headers.
pub async fn serve_script(Path(file): Path<String>, headers: HeaderMap) -> Response {
    let cors = CorsHeaders::from_request(&headers);

    match ClientScripts::get(&file) {
        Some(content) => {
            let mime = from_path(&file).first_or_octet_stream();
            (
                cors,
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                Body::from(content.data),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, cors, "404 Not Found").into_response(),
    }
}
