//! Static MCP resources served by `resources/list` and `resources/read`.

use serde::Serialize;

/// A declared, read-only text resource.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
    pub text: &'static str,
}

/// `resources/list` entry (no body).
#[derive(Debug, Serialize)]
pub struct ResourceInfo {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
}

/// `resources/read` content item.
#[derive(Debug, Serialize)]
pub struct ResourceContents {
    pub uri: &'static str,
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
    pub text: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    resources: Vec<ResourceDescriptor>,
}

impl ResourceCatalog {
    #[must_use]
    pub fn new(resources: Vec<ResourceDescriptor>) -> Self {
        Self { resources }
    }

    #[must_use]
    pub fn list(&self) -> Vec<ResourceInfo> {
        self.resources
            .iter()
            .map(|r| ResourceInfo {
                uri: r.uri,
                name: r.name,
                description: r.description,
                mime_type: r.mime_type,
            })
            .collect()
    }

    /// Contents for an exact `uri`, if declared.
    #[must_use]
    pub fn read(&self, uri: &str) -> Option<ResourceContents> {
        self.resources.iter().find(|r| r.uri == uri).map(|r| ResourceContents {
            uri: r.uri,
            mime_type: r.mime_type,
            text: r.text,
        })
    }
}

const PORTFOLIO_GUIDE: &str = "\
# Working with a KnearMe portfolio

Every tool call acts on the contractor business bound to your access token.
Call `get_account` to see which business that is.

Projects are the unit of the portfolio: a title, a trade (masonry, roofing,
concrete...), a city, photos and a write-up. Keep descriptions factual and
local; homeowners search by trade and city.
";

/// Resources declared by this server.
#[must_use]
pub fn default_catalog() -> ResourceCatalog {
    ResourceCatalog::new(vec![ResourceDescriptor {
        uri: "knearme://guides/portfolio",
        name: "Portfolio guide",
        description: "How portfolio projects are structured and how tools act on them",
        mime_type: "text/markdown",
        text: PORTFOLIO_GUIDE,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_has_no_bodies() {
        let value = serde_json::to_value(default_catalog().list()).unwrap();
        assert_eq!(value[0]["uri"], "knearme://guides/portfolio");
        assert_eq!(value[0]["mimeType"], "text/markdown");
        assert!(value[0].get("text").is_none());
    }

    #[test]
    fn test_read_known_and_unknown() {
        let catalog = default_catalog();
        let contents = catalog.read("knearme://guides/portfolio").unwrap();
        assert!(contents.text.contains("get_account"));
        assert!(catalog.read("knearme://guides/missing").is_none());
    }
}
