//! Synthetic responses served when neither network nor cache can answer

use folio_storage::Response;

/// Text that identifies the offline page
pub const OFFLINE_MARKER: &str = "You are offline";

pub const STATIC_UNAVAILABLE_BODY: &str = "offline mode — resource unavailable";
pub const DOCUMENT_UNAVAILABLE_BODY: &str = "document unavailable";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

/// Self-contained offline page: inline styles, no external references
const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline</title>
<style>
  body { margin: 0; min-height: 100vh; display: flex; align-items: center; justify-content: center;
         font-family: Georgia, "Times New Roman", serif; background: #f6f1e7; color: #3b3228; }
  main { max-width: 28rem; padding: 2rem; text-align: center; }
  h1 { font-size: 1.6rem; margin-bottom: 0.5rem; }
  p { line-height: 1.5; }
  button { margin-top: 1rem; padding: 0.6rem 1.4rem; border: 1px solid #3b3228; border-radius: 4px;
           background: transparent; color: inherit; font: inherit; cursor: pointer; }
  button:hover { background: #3b3228; color: #f6f1e7; }
</style>
</head>
<body>
<main>
  <h1>You are offline</h1>
  <p>This page is not available without a network connection. Books you have already opened remain readable from your library.</p>
  <button type="button" onclick="location.reload()">Try again</button>
</main>
</body>
</html>
"#;

/// The offline page, status 200
pub fn offline_page() -> Response {
    Response::new(200, OFFLINE_PAGE).with_header("Content-Type", TEXT_HTML)
}

/// 503 for a static asset that is neither cached nor reachable
pub fn static_unavailable() -> Response {
    Response::new(503, STATIC_UNAVAILABLE_BODY).with_header("Content-Type", TEXT_PLAIN)
}

/// 404 for a document that is neither reachable nor cached
pub fn document_unavailable() -> Response {
    Response::new(404, DOCUMENT_UNAVAILABLE_BODY).with_header("Content-Type", TEXT_PLAIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_page_is_self_contained() {
        let page = offline_page();
        assert_eq!(page.status, 200);
        assert_eq!(page.header("content-type"), Some("text/html; charset=utf-8"));

        let html = page.text();
        assert!(html.contains(OFFLINE_MARKER));
        assert!(html.contains("location.reload()"));
        assert!(!html.contains("src="));
        assert!(!html.contains("href="));
        assert!(!html.contains("http://"));
        assert!(!html.contains("https://"));
    }

    #[test]
    fn test_synthetic_errors() {
        let unavailable = static_unavailable();
        assert_eq!(unavailable.status, 503);
        assert_eq!(unavailable.text(), STATIC_UNAVAILABLE_BODY);

        let missing = document_unavailable();
        assert_eq!(missing.status, 404);
        assert_eq!(missing.text(), "document unavailable");
    }
}
