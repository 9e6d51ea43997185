use std::fmt::Write as _;

use axum::http::header;
use axum::response::{IntoResponse, Response};

use bftrpc_core::Registry;

/// HTML page linking every registered endpoint, shown to browsers that hit
/// the JSON-RPC endpoint with an empty body.
pub(super) fn endpoint_listing(registry: &Registry, host: &str) -> Response {
    let page = render(registry, host);
    ([(header::CONTENT_TYPE, "text/html")], page).into_response()
}

fn render(registry: &Registry, host: &str) -> String {
    // Registry iteration is ordered by name, so both groups come out sorted.
    let (no_args, with_args): (Vec<_>, Vec<_>) = registry
        .iter()
        .partition(|descriptor| descriptor.arg_names().is_empty());

    let mut page = String::from("<html><body>");
    page.push_str("<br>Available endpoints:<br>");
    for descriptor in no_args {
        let link = format!("//{host}/{}", descriptor.name());
        let _ = write!(page, "<a href=\"{link}\">{link}</a></br>");
    }

    page.push_str("<br>Endpoints that require arguments:<br>");
    for descriptor in with_args {
        let query = descriptor
            .arg_names()
            .iter()
            .map(|name| format!("{name}=_"))
            .collect::<Vec<_>>()
            .join("&");
        let link = format!("//{host}/{}?{query}", descriptor.name());
        let _ = write!(page, "<a href=\"{link}\">{link}</a></br>");
    }
    page.push_str("</body></html>");
    page
}
