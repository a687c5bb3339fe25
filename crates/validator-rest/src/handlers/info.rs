//! Introspection handlers.
//!
//! Purely descriptive: they report the running configuration and never touch
//! a worker's engine instance.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use helios_validator::Engine;
use tracing::debug;

use crate::error::RestResult;
use crate::state::AppState;

/// Version reported as the application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Handler for application info.
///
/// # HTTP Request
///
/// `GET [base]/info`
///
/// # Response
///
/// - `200 OK` - Versions, implementation guides, loaded packages and the
///   configuration property list
/// - `503 Service Unavailable` - Engine not ready
pub async fn info_handler<E: Engine>(State(state): State<AppState<E>>) -> RestResult<Response> {
    debug!("Processing info request");
    let info = state.service().info(APP_VERSION)?;
    Ok((StatusCode::OK, Json(info)).into_response())
}

/// Handler for the HTML index page.
///
/// # HTTP Request
///
/// `GET [base]/`
pub async fn index_handler<E: Engine>(State(state): State<AppState<E>>) -> Html<String> {
    let service = state.service();
    let properties: String = service
        .config()
        .all_properties()
        .iter()
        .map(|p| format!("      <li>{}</li>\n", escape_html(p)))
        .collect();

    Html(format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><title>Helios FHIR Validator</title></head>\n\
         <body>\n\
         <h1>Helios FHIR Validator {version}</h1>\n\
         <p>FHIR {fhir} &middot; {workers} workers</p>\n\
         <h2>Endpoints</h2>\n\
         <ul>\n\
               <li><code>POST /validate?profile=..&amp;format=outcome|list</code></li>\n\
               <li><code>POST /validateBundle</code></li>\n\
               <li><code>GET /info</code></li>\n\
         </ul>\n\
         <h2>Configuration</h2>\n\
         <ul>\n{properties}</ul>\n\
         </body>\n\
         </html>\n",
        version = APP_VERSION,
        fhir = escape_html(service.config().version_string()),
        workers = service.workers(),
    ))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
    }
}
