//! Request classification
//!
//! Maps a request URL to the category that selects its fetch strategy, and
//! decides which requests are intercepted at all.

use folio_storage::Request;
use http::Method;
use serde::Serialize;
use url::Url;

use crate::config::WorkerConfig;

/// Category of a requested asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    /// App shell and code assets, versioned with the static partition
    Static,
    /// Downloadable document packages
    Document,
    Other,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Static => "static",
            AssetClass::Document => "document",
            AssetClass::Other => "other",
        }
    }
}

/// Pure URL classifier built from a [`WorkerConfig`]
#[derive(Debug, Clone)]
pub struct Classifier {
    static_assets: Vec<String>,
    cdn_hosts: Vec<String>,
    static_extensions: Vec<String>,
    document_extensions: Vec<String>,
    bypass_schemes: Vec<String>,
    bypass_hosts: Vec<String>,
}

impl Classifier {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            static_assets: config.static_assets.clone(),
            cdn_hosts: lowercase_all(&config.cdn_hosts),
            static_extensions: lowercase_all(&config.static_extensions),
            document_extensions: lowercase_all(&config.document_extensions),
            bypass_schemes: lowercase_all(&config.bypass_schemes),
            bypass_hosts: lowercase_all(&config.bypass_hosts),
        }
    }

    /// Classify a URL. Never fails: unparseable URLs are [`AssetClass::Other`].
    pub fn classify(&self, raw: &str) -> AssetClass {
        let Ok(url) = Url::parse(raw) else {
            return AssetClass::Other;
        };

        if self.is_static(raw, &url) {
            AssetClass::Static
        } else if self.is_document(&url) {
            AssetClass::Document
        } else {
            AssetClass::Other
        }
    }

    /// Whether a request is handled by the worker at all
    ///
    /// Non-GET requests, browser-internal schemes and developer tooling
    /// hosts go straight to the network.
    pub fn should_intercept(&self, request: &Request) -> bool {
        if request.method != Method::GET {
            return false;
        }

        let Ok(url) = Url::parse(&request.url) else {
            return true;
        };

        if self.bypass_schemes.iter().any(|s| s == url.scheme()) {
            return false;
        }

        if let Some(host) = url.host_str() {
            let host = host.to_ascii_lowercase();
            let authority = match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.clone(),
            };
            if self
                .bypass_hosts
                .iter()
                .any(|h| *h == host || *h == authority)
            {
                return false;
            }
        }

        true
    }

    fn is_static(&self, raw: &str, url: &Url) -> bool {
        // Substring containment, so relative manifest entries match their
        // absolute request URLs
        if self
            .static_assets
            .iter()
            .any(|asset| !asset.is_empty() && raw.contains(asset.as_str()))
        {
            return true;
        }

        if let Some(host) = url.host_str()
            && self.cdn_hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
        {
            return true;
        }

        let path = url.path().to_ascii_lowercase();
        self.static_extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    fn is_document(&self, url: &Url) -> bool {
        let path = url.path().to_ascii_lowercase();
        path.split('/').any(|segment| {
            self.document_extensions
                .iter()
                .any(|ext| segment.len() > ext.len() && segment.ends_with(ext.as_str()))
        })
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_ascii_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(&WorkerConfig::default())
    }

    #[test]
    fn test_static_by_extension() {
        let c = classifier();
        assert_eq!(c.classify("https://reader.example.com/js/app.js"), AssetClass::Static);
        assert_eq!(c.classify("https://reader.example.com/css/Main.CSS"), AssetClass::Static);
        assert_eq!(c.classify("https://reader.example.com/data/toc.json?v=3"), AssetClass::Static);
    }

    #[test]
    fn test_static_by_cdn_host_and_manifest() {
        let c = classifier();
        assert_eq!(
            c.classify("https://cdnjs.cloudflare.com/ajax/libs/some/font.woff2"),
            AssetClass::Static
        );
        // "./index.html" contained in a URL that carries it verbatim
        assert_eq!(
            c.classify("https://reader.example.com/app/./index.html"),
            AssetClass::Static
        );
    }

    #[test]
    fn test_document() {
        let c = classifier();
        assert_eq!(c.classify("https://books.example.com/moby-dick.epub"), AssetClass::Document);
        assert_eq!(
            c.classify("https://books.example.com/Moby-Dick.EPUB?download=1#start"),
            AssetClass::Document
        );
        assert_eq!(
            c.classify("https://books.example.com/moby-dick.epub/OEBPS/chapter1.xhtml"),
            AssetClass::Document
        );
        assert_eq!(c.classify("https://books.example.com/notes.epubx"), AssetClass::Other);
        assert_eq!(c.classify("https://books.example.com/.epub"), AssetClass::Other);
    }

    #[test]
    fn test_other_and_malformed() {
        let c = classifier();
        assert_eq!(c.classify("https://reader.example.com/library"), AssetClass::Other);
        assert_eq!(c.classify("https://reader.example.com/cover.png"), AssetClass::Other);
        assert_eq!(c.classify("not a url"), AssetClass::Other);
        assert_eq!(c.classify(""), AssetClass::Other);
        assert_eq!(c.classify("http://[::1"), AssetClass::Other);
    }

    #[test]
    fn test_should_intercept() {
        let c = classifier();
        assert!(c.should_intercept(&Request::get("https://reader.example.com/")));

        for method in [Method::POST, Method::PUT, Method::DELETE, Method::HEAD] {
            assert!(!c.should_intercept(&Request::new(method, "https://reader.example.com/app.js")));
        }

        assert!(!c.should_intercept(&Request::get("chrome-extension://abcdef/content.js")));
        assert!(!c.should_intercept(&Request::get("http://localhost:35729/livereload.js")));
        assert!(c.should_intercept(&Request::get("http://localhost:8080/app.js")));
    }
}
