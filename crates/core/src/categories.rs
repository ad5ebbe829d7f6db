// Category index derived from the endpoint catalog

use crate::catalog::EndpointCatalog;
use crate::error::{CoreError, CoreResult};
use serde::Serialize;
use std::collections::HashMap;

/// One category with its endpoint count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub name: String,
    pub description: String,
    pub endpoint_count: usize,
}

/// Categories sorted by name, with the catalog positions of their members.
///
/// Computed once from the catalog; since the catalog never changes the index
/// is never invalidated.
#[derive(Debug)]
pub struct CategoryIndex {
    summaries: Vec<CategorySummary>,
    /// Lowercased name -> index into `summaries`
    lookup: HashMap<String, usize>,
    /// Catalog positions per category, parallel to `summaries`
    members: Vec<Vec<usize>>,
    total_endpoints: usize,
}

impl CategoryIndex {
    pub fn build(catalog: &EndpointCatalog) -> CoreResult<Self> {
        let mut declared: Vec<_> = catalog.categories().iter().collect();
        declared.sort_by(|a, b| a.name.cmp(&b.name));

        let lookup: HashMap<String, usize> = declared
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.to_lowercase(), i))
            .collect();

        let mut members = vec![Vec::new(); declared.len()];
        for (position, endpoint) in catalog.all().enumerate() {
            let slot = lookup
                .get(&endpoint.category.to_lowercase())
                .copied()
                .ok_or_else(|| CoreError::CategoryNotFound(endpoint.category.clone()))?;
            members[slot].push(position);
        }

        let summaries: Vec<CategorySummary> = declared
            .iter()
            .zip(&members)
            .map(|(decl, ids)| CategorySummary {
                name: decl.name.clone(),
                description: decl.description.clone(),
                endpoint_count: ids.len(),
            })
            .collect();

        let total_endpoints: usize = summaries.iter().map(|s| s.endpoint_count).sum();
        if total_endpoints != catalog.len() {
            return Err(CoreError::catalog_load(format!(
                "category counts sum to {} but catalog has {} endpoints",
                total_endpoints,
                catalog.len()
            )));
        }

        Ok(Self {
            summaries,
            lookup,
            members,
            total_endpoints,
        })
    }

    /// All categories sorted by name
    pub fn list(&self) -> &[CategorySummary] {
        &self.summaries
    }

    /// Case-insensitive exact lookup
    pub fn get(&self, name: &str) -> Option<&CategorySummary> {
        self.slot(name).map(|slot| &self.summaries[slot])
    }

    /// Catalog positions of a category's endpoints, ascending
    pub fn member_positions(&self, name: &str) -> Option<&[usize]> {
        self.slot(name).map(|slot| self.members[slot].as_slice())
    }

    /// Endpoint ids of a category in catalog order
    pub fn endpoint_ids<'a>(
        &self,
        catalog: &'a EndpointCatalog,
        name: &str,
    ) -> CoreResult<Vec<&'a str>> {
        let positions = self
            .member_positions(name)
            .ok_or_else(|| CoreError::CategoryNotFound(name.to_string()))?;
        Ok(positions
            .iter()
            .filter_map(|&p| catalog.at(p))
            .map(|e| e.id.as_str())
            .collect())
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn total_endpoints(&self) -> usize {
        self.total_endpoints
    }

    fn slot(&self, name: &str) -> Option<usize> {
        self.lookup.get(&name.trim().to_lowercase()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_counts_sum_to_catalog_size() {
        let catalog = EndpointCatalog::load_builtin().unwrap();
        let index = CategoryIndex::build(&catalog).unwrap();

        let sum: usize = index.list().iter().map(|c| c.endpoint_count).sum();
        assert_eq!(sum, catalog.len());
        assert_eq!(index.total_endpoints(), catalog.len());
        assert_eq!(index.len(), 89);
    }

    #[test]
    fn test_every_descriptor_in_exactly_one_category() {
        let catalog = EndpointCatalog::load_builtin().unwrap();
        let index = CategoryIndex::build(&catalog).unwrap();

        let mut seen = HashSet::new();
        for summary in index.list() {
            for id in index.endpoint_ids(&catalog, &summary.name).unwrap() {
                assert!(seen.insert(id), "{} listed twice", id);
            }
        }
        assert_eq!(seen.len(), catalog.len());
    }

    #[test]
    fn test_sorted_by_name() {
        let catalog = EndpointCatalog::load_builtin().unwrap();
        let index = CategoryIndex::build(&catalog).unwrap();

        let names: Vec<&str> = index.list().iter().map(|c| c.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = EndpointCatalog::load_builtin().unwrap();
        let index = CategoryIndex::build(&catalog).unwrap();

        let summary = index.get("users management v2.0 (scim)").unwrap();
        assert_eq!(summary.name, "Users Management v2.0 (SCIM)");
        assert_eq!(summary.endpoint_count, 20);
        assert!(index.get("Nonexistent").is_none());
        assert!(index.endpoint_ids(&catalog, "Nonexistent").is_err());
    }

    #[test]
    fn test_member_positions_ascending() {
        let catalog = EndpointCatalog::load_builtin().unwrap();
        let index = CategoryIndex::build(&catalog).unwrap();

        for summary in index.list() {
            let positions = index.member_positions(&summary.name).unwrap();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
