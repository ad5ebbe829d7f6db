// Endpoint catalog: immutable table of Verify endpoint descriptors

use crate::error::{CoreError, CoreResult};
use crate::types::{path_placeholders, CategoryDecl, EndpointDescriptor, HttpMethod, ParamLocation};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Endpoint data compiled into the binary
const BUILTIN_CATALOG: &str = include_str!("../data/verify_api.json");

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    categories: Vec<CategoryDecl>,
    endpoints: Vec<EndpointDescriptor>,
}

/// Process-wide endpoint catalog.
///
/// Built once at startup and shared behind an `Arc`. There is no mutation
/// API, so readers never need to coordinate.
#[derive(Debug)]
pub struct EndpointCatalog {
    categories: Vec<CategoryDecl>,
    endpoints: Vec<EndpointDescriptor>,
    by_id: HashMap<String, usize>,
}

impl EndpointCatalog {
    /// Load the bundled IBM Security Verify endpoint catalog
    pub fn load_builtin() -> CoreResult<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parse and validate a catalog document
    pub fn from_json(raw: &str) -> CoreResult<Self> {
        let doc: CatalogDocument = serde_json::from_str(raw)
            .map_err(|e| CoreError::catalog_load(format!("invalid catalog document: {}", e)))?;
        Self::from_parts(doc.categories, doc.endpoints)
    }

    /// Build a catalog from already-parsed parts, enforcing every load invariant
    pub fn from_parts(
        categories: Vec<CategoryDecl>,
        endpoints: Vec<EndpointDescriptor>,
    ) -> CoreResult<Self> {
        let mut category_names: HashSet<String> = HashSet::with_capacity(categories.len());
        for category in &categories {
            if category.name.trim().is_empty() {
                return Err(CoreError::catalog_load("category with empty name"));
            }
            if !category_names.insert(category.name.to_lowercase()) {
                return Err(CoreError::catalog_load(format!(
                    "duplicate category: {}",
                    category.name
                )));
            }
        }

        let mut by_id = HashMap::with_capacity(endpoints.len());
        let mut used_categories: HashSet<&str> = HashSet::new();

        for (position, endpoint) in endpoints.iter().enumerate() {
            validate_endpoint(endpoint)?;

            if !categories.iter().any(|c| c.name == endpoint.category) {
                return Err(CoreError::catalog_load(format!(
                    "endpoint {} references unknown category: {}",
                    endpoint.id, endpoint.category
                )));
            }
            used_categories.insert(endpoint.category.as_str());

            if by_id.insert(endpoint.id.clone(), position).is_some() {
                return Err(CoreError::catalog_load(format!(
                    "duplicate endpoint id: {}",
                    endpoint.id
                )));
            }
        }

        if let Some(empty) = categories
            .iter()
            .find(|c| !used_categories.contains(c.name.as_str()))
        {
            return Err(CoreError::catalog_load(format!(
                "category has no endpoints: {}",
                empty.name
            )));
        }

        tracing::debug!(
            endpoints = endpoints.len(),
            categories = categories.len(),
            "Endpoint catalog loaded"
        );

        Ok(Self {
            categories,
            endpoints,
            by_id,
        })
    }

    /// Get a descriptor by id
    pub fn get(&self, id: &str) -> CoreResult<&EndpointDescriptor> {
        self.by_id
            .get(id)
            .map(|&position| &self.endpoints[position])
            .ok_or_else(|| CoreError::EndpointNotFound(id.to_string()))
    }

    /// Catalog position of a descriptor (its insertion order)
    pub fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn at(&self, position: usize) -> Option<&EndpointDescriptor> {
        self.endpoints.get(position)
    }

    /// Every descriptor in insertion order. The iterator is `Clone`, so it
    /// can be restarted from any point.
    pub fn all(&self) -> std::slice::Iter<'_, EndpointDescriptor> {
        self.endpoints.iter()
    }

    /// Declared categories in declaration order
    pub fn categories(&self) -> &[CategoryDecl] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Ids containing `id` case-insensitively, in catalog order
    pub fn suggest(&self, id: &str, max: usize) -> Vec<&str> {
        let needle = id.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.endpoints
            .iter()
            .filter(|e| e.id.to_lowercase().contains(&needle))
            .take(max)
            .map(|e| e.id.as_str())
            .collect()
    }

    /// First descriptor declared with this method and literal path template
    pub fn find_by_route(&self, method: HttpMethod, path: &str) -> Option<&EndpointDescriptor> {
        let path = path.trim_end_matches('/');
        self.endpoints
            .iter()
            .find(|e| e.method == method && e.path.trim_end_matches('/') == path)
    }
}

fn validate_endpoint(endpoint: &EndpointDescriptor) -> CoreResult<()> {
    if endpoint.id.trim().is_empty() {
        return Err(CoreError::catalog_load(format!(
            "endpoint with empty id (path {})",
            endpoint.path
        )));
    }
    for (field, value) in [
        ("category", &endpoint.category),
        ("path", &endpoint.path),
        ("summary", &endpoint.summary),
    ] {
        if value.trim().is_empty() {
            return Err(CoreError::catalog_load(format!(
                "endpoint {} is missing {}",
                endpoint.id, field
            )));
        }
    }

    let mut names = HashSet::new();
    for param in &endpoint.parameters {
        if param.name.trim().is_empty() {
            return Err(CoreError::catalog_load(format!(
                "endpoint {} has a parameter without a name",
                endpoint.id
            )));
        }
        if !names.insert(param.name.as_str()) {
            return Err(CoreError::catalog_load(format!(
                "endpoint {} declares parameter {} twice",
                endpoint.id, param.name
            )));
        }
    }

    for placeholder in path_placeholders(&endpoint.path) {
        let declared = endpoint
            .parameters
            .iter()
            .any(|p| p.name == placeholder && p.location == ParamLocation::Path);
        if !declared {
            return Err(CoreError::catalog_load(format!(
                "endpoint {} path placeholder {{{}}} has no path parameter",
                endpoint.id, placeholder
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_doc(endpoints: &str) -> String {
        format!(
            r#"{{"categories": [{{"name": "Identity", "description": "Users"}}], "endpoints": [{}]}}"#,
            endpoints
        )
    }

    const GET_USERS: &str = r#"{"id": "getUsers", "category": "Identity", "method": "GET",
        "path": "/v2.0/Users", "summary": "List or search users", "parameters": []}"#;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = EndpointCatalog::load_builtin().unwrap();

        assert_eq!(catalog.len(), 210);
        assert_eq!(catalog.categories().len(), 89);
        assert_eq!(catalog.get("getUsers").unwrap().path, "/v2.0/Users");
    }

    #[test]
    fn test_all_preserves_insertion_order_and_restarts() {
        let catalog = EndpointCatalog::load_builtin().unwrap();
        let iter = catalog.all();
        let first: Vec<&str> = iter.clone().map(|e| e.id.as_str()).collect();
        let second: Vec<&str> = iter.map(|e| e.id.as_str()).collect();

        assert_eq!(first, second);
        assert_eq!(first[0], "getUsers");
        for (position, id) in first.iter().enumerate() {
            assert_eq!(catalog.position(id), Some(position));
        }
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let catalog = EndpointCatalog::from_json(&minimal_doc(GET_USERS)).unwrap();
        let err = catalog.get("getGroups").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let doc = minimal_doc(&format!("{},{}", GET_USERS, GET_USERS));
        let err = EndpointCatalog::from_json(&doc).unwrap_err();
        assert!(err.to_string().contains("duplicate endpoint id: getUsers"));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let doc = minimal_doc(
            r#"{"id": "x", "category": "Nowhere", "method": "GET", "path": "/x", "summary": "x"}"#,
        );
        let err = EndpointCatalog::from_json(&doc).unwrap_err();
        assert!(err.to_string().contains("unknown category"));
    }

    #[test]
    fn test_missing_field_rejected() {
        let doc = minimal_doc(r#"{"id": "x", "category": "Identity", "method": "GET", "path": "/x"}"#);
        assert!(matches!(
            EndpointCatalog::from_json(&doc),
            Err(CoreError::CatalogLoad(_))
        ));

        let doc = minimal_doc(
            r#"{"id": "x", "category": "Identity", "method": "GET", "path": "/x", "summary": "  "}"#,
        );
        let err = EndpointCatalog::from_json(&doc).unwrap_err();
        assert!(err.to_string().contains("missing summary"));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let doc = minimal_doc(
            r#"{"id": "x", "category": "Identity", "method": "TRACE", "path": "/x", "summary": "x"}"#,
        );
        assert!(EndpointCatalog::from_json(&doc).is_err());
    }

    #[test]
    fn test_undeclared_placeholder_rejected() {
        let doc = minimal_doc(
            r#"{"id": "getUser", "category": "Identity", "method": "GET", "path": "/v2.0/Users/{id}", "summary": "Get a user"}"#,
        );
        let err = EndpointCatalog::from_json(&doc).unwrap_err();
        assert!(err.to_string().contains("{id}"));
    }

    #[test]
    fn test_empty_category_rejected() {
        let doc = r#"{"categories": [{"name": "Identity"}, {"name": "Empty"}], "endpoints": [
            {"id": "getUsers", "category": "Identity", "method": "GET", "path": "/v2.0/Users", "summary": "List users"}
        ]}"#;
        let err = EndpointCatalog::from_json(doc).unwrap_err();
        assert!(err.to_string().contains("category has no endpoints: Empty"));
    }

    #[test]
    fn test_suggest_and_route_lookup() {
        let catalog = EndpointCatalog::load_builtin().unwrap();

        let suggestions = catalog.suggest("SelfUser", 10);
        assert!(suggestions.contains(&"getSelfUser"));
        assert!(suggestions.iter().all(|id| id.to_lowercase().contains("selfuser")));
        assert!(catalog.suggest("", 10).is_empty());

        let found = catalog.find_by_route(HttpMethod::Get, "/v2.0/Users/").unwrap();
        assert_eq!(found.id, "getUsers");
        assert!(catalog.find_by_route(HttpMethod::Put, "/nope").is_none());
    }
}
