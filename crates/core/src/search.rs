//! Ranked discovery over the endpoint catalog.
//!
//! Matches fall into three relevance tiers, highest first:
//!
//! 1. `Exact`: the whole query equals the endpoint id, or its normalized
//!    name (lowercase, non-alphanumerics removed).
//! 2. `WordBoundary`: the query appears on word boundaries in the summary or
//!    in the id split into words (`getUsers` reads as `get users`).
//! 3. `Substring`: the query appears anywhere in the id, summary, category
//!    or path.
//!
//! Within a tier, results keep catalog insertion order so that paging through
//! the same query is reproducible.

use crate::catalog::EndpointCatalog;
use crate::categories::CategoryIndex;
use crate::types::{EndpointDescriptor, HttpMethod, ParameterSpec};
use regex::Regex;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Page size when the caller does not ask for one
pub const DEFAULT_LIMIT: usize = 25;
/// Hard upper bound on page size
pub const MAX_LIMIT: usize = 25;
/// Result sets this small carry full parameter schemas inline
pub const AUTO_DETAIL_THRESHOLD: usize = 3;

/// Relevance bucket of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// No query given; catalog order
    Unranked,
    Substring,
    WordBoundary,
    Exact,
}

/// Discovery request
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchRequest {
    #[serde(default, alias = "search")]
    pub query: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    /// Negative or fractional values are floored at 0
    #[serde(default, deserialize_with = "lenient_offset")]
    pub offset: usize,
    /// Any number is accepted and later clamped to `[1, MAX_LIMIT]`
    #[serde(default, deserialize_with = "lenient_limit")]
    pub limit: Option<usize>,
}

/// Wire form of a count: clients send negative, huge or float values
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseCount {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl LooseCount {
    fn floor(self) -> usize {
        match self {
            LooseCount::Signed(n) => usize::try_from(n.max(0)).unwrap_or(usize::MAX),
            LooseCount::Unsigned(n) => usize::try_from(n).unwrap_or(usize::MAX),
            // `as` saturates and maps NaN to 0
            LooseCount::Float(n) => n.floor() as usize,
        }
    }
}

fn lenient_offset<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    Ok(Option::<LooseCount>::deserialize(deserializer)?.map_or(0, LooseCount::floor))
}

fn lenient_limit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
    Ok(Option::<LooseCount>::deserialize(deserializer)?.map(LooseCount::floor))
}

impl SearchRequest {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }

    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Requested limit clamped to `[1, MAX_LIMIT]`
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    fn normalized_query(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// One ranked descriptor in a result page
#[derive(Debug, Clone)]
pub struct SearchHit<'a> {
    pub endpoint: &'a EndpointDescriptor,
    pub tier: MatchTier,
    /// Whether the full parameter schema is inlined
    pub detailed: bool,
}

impl Serialize for SearchHit<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = if self.detailed { 8 } else { 6 };
        let mut s = serializer.serialize_struct("SearchHit", fields)?;
        s.serialize_field("endpoint_id", &self.endpoint.id)?;
        s.serialize_field("method", &self.endpoint.method)?;
        s.serialize_field("path", &self.endpoint.path)?;
        s.serialize_field("category", &self.endpoint.category)?;
        s.serialize_field("summary", &self.endpoint.summary)?;
        s.serialize_field("tier", &self.tier)?;
        if self.detailed {
            let parameters: &[ParameterSpec] = &self.endpoint.parameters;
            s.serialize_field("parameters", parameters)?;
            s.serialize_field("required", &self.endpoint.required_params())?;
        }
        s.end()
    }
}

/// One category of the matched set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup<'a> {
    pub category: &'a str,
    /// Matches in this category across all pages
    pub count: usize,
    /// Ids of those matches on the current page
    pub endpoint_ids: Vec<&'a str>,
}

/// A page of ranked matches
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult<'a> {
    pub total_matches: usize,
    pub offset: usize,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
    pub detail_inlined: bool,
    pub results: Vec<SearchHit<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<CategoryGroup<'a>>>,
}

impl<'a> SearchResult<'a> {
    fn empty(offset: usize, limit: usize) -> Self {
        Self {
            total_matches: 0,
            offset,
            limit,
            next_offset: None,
            detail_inlined: false,
            results: Vec::new(),
            groups: None,
        }
    }

    pub fn ids(&self) -> Vec<&'a str> {
        self.results.iter().map(|h| h.endpoint.id.as_str()).collect()
    }
}

/// Lowercased text of one descriptor, prepared once
#[derive(Debug)]
struct SearchKey {
    id: String,
    id_words: String,
    name: String,
    summary: String,
    category: String,
    path: String,
}

impl SearchKey {
    fn new(endpoint: &EndpointDescriptor) -> Self {
        Self {
            id: endpoint.id.to_lowercase(),
            id_words: split_identifier(&endpoint.id),
            name: normalize_name(&endpoint.id),
            summary: endpoint.summary.to_lowercase(),
            category: endpoint.category.to_lowercase(),
            path: endpoint.path.to_lowercase(),
        }
    }
}

/// Compiled form of a query string
#[derive(Debug)]
struct QueryMatcher {
    lower: String,
    normalized: String,
    word: Option<Regex>,
}

impl QueryMatcher {
    fn new(query: &str) -> Self {
        let lower = query.to_lowercase();
        let word = Regex::new(&format!(r"\b{}\b", regex::escape(&lower)))
            .map_err(|e| tracing::warn!(error = %e, "Word-boundary matcher unavailable for query"))
            .ok();
        Self {
            normalized: normalize_name(&lower),
            lower,
            word,
        }
    }

    fn tier(&self, key: &SearchKey) -> Option<MatchTier> {
        if key.id == self.lower || (!self.normalized.is_empty() && key.name == self.normalized) {
            return Some(MatchTier::Exact);
        }
        if let Some(word) = &self.word {
            if word.is_match(&key.summary) || word.is_match(&key.id_words) {
                return Some(MatchTier::WordBoundary);
            }
        }
        let q = self.lower.as_str();
        if key.id.contains(q) || key.summary.contains(q) || key.category.contains(q) || key.path.contains(q) {
            return Some(MatchTier::Substring);
        }
        None
    }
}

/// Ranking engine over a shared catalog
#[derive(Debug)]
pub struct SearchEngine {
    catalog: Arc<EndpointCatalog>,
    categories: Arc<CategoryIndex>,
    keys: Vec<SearchKey>,
}

impl SearchEngine {
    pub fn new(catalog: Arc<EndpointCatalog>, categories: Arc<CategoryIndex>) -> Self {
        let keys = catalog.all().map(SearchKey::new).collect();
        Self {
            catalog,
            categories,
            keys,
        }
    }

    pub fn catalog(&self) -> &EndpointCatalog {
        &self.catalog
    }

    pub fn categories(&self) -> &CategoryIndex {
        &self.categories
    }

    /// Filter, rank and paginate.
    ///
    /// Unknown categories or methods produce an empty result rather than an
    /// error, as does an offset past the end of the matches.
    pub fn search(&self, request: &SearchRequest) -> SearchResult<'_> {
        let limit = request.effective_limit();
        let offset = request.offset;

        let candidates: Vec<usize> = match request.category.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => match self.categories.member_positions(name) {
                Some(positions) => positions.to_vec(),
                None => {
                    tracing::debug!(category = name, "Discovery for unknown category");
                    return SearchResult::empty(offset, limit);
                }
            },
            _ => (0..self.keys.len()).collect(),
        };

        let method = match request.method.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => match m.parse::<HttpMethod>() {
                Ok(method) => Some(method),
                Err(_) => return SearchResult::empty(offset, limit),
            },
            _ => None,
        };

        let matcher = request.normalized_query().map(QueryMatcher::new);

        let mut scored: Vec<(MatchTier, usize)> = candidates
            .into_iter()
            .filter(|&p| method.map_or(true, |m| self.endpoint(p).method == m))
            .filter_map(|p| match &matcher {
                Some(matcher) => matcher.tier(&self.keys[p]).map(|tier| (tier, p)),
                None => Some((MatchTier::Unranked, p)),
            })
            .collect();

        // Stable: equal tiers keep catalog order
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let total_matches = scored.len();
        let detailed = total_matches > 0 && total_matches <= AUTO_DETAIL_THRESHOLD;

        let results: Vec<SearchHit<'_>> = scored
            .iter()
            .skip(offset)
            .take(limit)
            .map(|&(tier, p)| SearchHit {
                endpoint: self.endpoint(p),
                tier,
                detailed,
            })
            .collect();

        let end = offset.saturating_add(results.len());
        let next_offset = (!results.is_empty() && end < total_matches).then_some(end);
        let groups = self.group_by_category(&scored, &results);

        SearchResult {
            total_matches,
            offset,
            limit,
            next_offset,
            detail_inlined: detailed,
            results,
            groups,
        }
    }

    fn endpoint(&self, position: usize) -> &EndpointDescriptor {
        // keys were built from the same catalog, so every position is valid
        &self.catalog.all().as_slice()[position]
    }

    /// Counts cover every match, ids only the page. `None` when all matches
    /// share one category.
    fn group_by_category<'a>(
        &'a self,
        scored: &[(MatchTier, usize)],
        page: &[SearchHit<'a>],
    ) -> Option<Vec<CategoryGroup<'a>>> {
        let mut groups: Vec<CategoryGroup<'a>> = Vec::new();
        for &(_, position) in scored {
            let category = self.endpoint(position).category.as_str();
            match groups.iter_mut().find(|g| g.category == category) {
                Some(group) => group.count += 1,
                None => groups.push(CategoryGroup {
                    category,
                    count: 1,
                    endpoint_ids: Vec::new(),
                }),
            }
        }
        if groups.len() < 2 {
            return None;
        }

        for hit in page {
            if let Some(group) = groups.iter_mut().find(|g| g.category == hit.endpoint.category) {
                group.endpoint_ids.push(hit.endpoint.id.as_str());
            }
        }
        Some(groups)
    }
}

/// Lowercase with every non-alphanumeric character removed
fn normalize_name(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split a camelCase / snake_case identifier into lowercase words
fn split_identifier(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let mut out = String::with_capacity(id.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            continue;
        }
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary && !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
        }
        out.extend(c.to_lowercase());
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CategoryDecl, ParamLocation};

    fn endpoint(id: &str, category: &str, method: HttpMethod, summary: &str) -> EndpointDescriptor {
        EndpointDescriptor {
            id: id.to_string(),
            category: category.to_string(),
            method,
            path: format!("/v1.0/{}", id.to_lowercase()),
            summary: summary.to_string(),
            parameters: vec![ParameterSpec {
                name: "filter".to_string(),
                location: ParamLocation::Query,
                required: false,
                param_type: "string".to_string(),
                description: "SCIM filter".to_string(),
            }],
        }
    }

    fn engine(endpoints: Vec<EndpointDescriptor>) -> SearchEngine {
        let mut names: Vec<String> = Vec::new();
        for e in &endpoints {
            if !names.contains(&e.category) {
                names.push(e.category.clone());
            }
        }
        let categories = names
            .into_iter()
            .map(|name| CategoryDecl {
                name,
                description: String::new(),
            })
            .collect();
        let catalog = Arc::new(EndpointCatalog::from_parts(categories, endpoints).unwrap());
        let index = Arc::new(CategoryIndex::build(&catalog).unwrap());
        SearchEngine::new(catalog, index)
    }

    fn identity_engine() -> SearchEngine {
        engine(vec![
            endpoint("getUsers", "Identity", HttpMethod::Get, "List or search users"),
            endpoint("createUser", "Identity", HttpMethod::Post, "Create a user"),
            endpoint("deleteUser", "Identity", HttpMethod::Delete, "Delete a user"),
            endpoint("listGroups", "Groups", HttpMethod::Get, "List groups"),
        ])
    }

    fn builtin_engine() -> SearchEngine {
        let catalog = Arc::new(EndpointCatalog::load_builtin().unwrap());
        let index = Arc::new(CategoryIndex::build(&catalog).unwrap());
        SearchEngine::new(catalog, index)
    }

    #[test]
    fn test_split_identifier() {
        assert_eq!(split_identifier("getUsers"), "get users");
        assert_eq!(split_identifier("listMFAProviders"), "list mfa providers");
        assert_eq!(split_identifier("get_user-info"), "get user info");
        assert_eq!(split_identifier("v2Users"), "v2 users");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("get users"), "getusers");
        assert_eq!(normalize_name("Get_Users"), "getusers");
    }

    #[test]
    fn test_users_query_ranks_get_users_first() {
        let engine = identity_engine();
        let result = engine.search(&SearchRequest::query("users"));

        assert!(result.total_matches >= 1);
        assert_eq!(result.results[0].endpoint.id, "getUsers");
        assert_eq!(result.results[0].tier, MatchTier::WordBoundary);
    }

    #[test]
    fn test_category_only_returns_catalog_order_unranked() {
        let engine = identity_engine();
        let result = engine.search(&SearchRequest::category("identity"));

        assert_eq!(result.ids(), vec!["getUsers", "createUser", "deleteUser"]);
        assert!(result.results.iter().all(|h| h.tier == MatchTier::Unranked));
        assert_eq!(result.total_matches, 3);
    }

    #[test]
    fn test_tier_ordering_law() {
        // Declared in reverse relevance order so sorting has to do the work
        let engine = engine(vec![
            endpoint("superusersAudit", "Audit", HttpMethod::Get, "Audit trail"),
            endpoint("getUsers", "Identity", HttpMethod::Get, "List users"),
            endpoint("users", "Identity", HttpMethod::Get, "Root collection"),
        ]);
        let result = engine.search(&SearchRequest::query("users"));

        assert_eq!(result.ids(), vec!["users", "getUsers", "superusersAudit"]);
        let tiers: Vec<MatchTier> = result.results.iter().map(|h| h.tier).collect();
        assert_eq!(
            tiers,
            vec![MatchTier::Exact, MatchTier::WordBoundary, MatchTier::Substring]
        );
    }

    #[test]
    fn test_normalized_name_is_exact() {
        let engine = identity_engine();
        let result = engine.search(&SearchRequest::query("Get Users"));

        assert_eq!(result.results[0].endpoint.id, "getUsers");
        assert_eq!(result.results[0].tier, MatchTier::Exact);
    }

    #[test]
    fn test_no_match_is_excluded() {
        let engine = identity_engine();
        let result = engine.search(&SearchRequest::query("kerberos"));

        assert_eq!(result.total_matches, 0);
        assert!(result.results.is_empty());
        assert!(result.next_offset.is_none());
    }

    #[test]
    fn test_unknown_category_is_empty_not_error() {
        let engine = identity_engine();
        let result = engine.search(&SearchRequest::query("users").with_category("Nope"));

        assert_eq!(result.total_matches, 0);
        assert!(result.results.is_empty());
    }

    #[test]
    fn test_method_filter() {
        let engine = identity_engine();
        let result = engine.search(&SearchRequest::query("user").with_method("delete"));
        assert_eq!(result.ids(), vec!["deleteUser"]);

        let result = engine.search(&SearchRequest::query("user").with_method("TRACE"));
        assert_eq!(result.total_matches, 0);
    }

    #[test]
    fn test_blank_query_counts_as_absent() {
        let engine = identity_engine();
        let result = engine.search(&SearchRequest::query("   "));

        assert_eq!(result.total_matches, 4);
        assert!(result.results.iter().all(|h| h.tier == MatchTier::Unranked));
    }

    #[test]
    fn test_limit_is_clamped() {
        let engine = builtin_engine();

        let result = engine.search(&SearchRequest::default().page(0, 500));
        assert_eq!(result.limit, MAX_LIMIT);
        assert_eq!(result.results.len(), MAX_LIMIT);

        let result = engine.search(&SearchRequest::default().page(0, 0));
        assert_eq!(result.limit, 1);
        assert_eq!(result.results.len(), 1);

        let result = engine.search(&SearchRequest::default());
        assert_eq!(result.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_out_of_range_paging_is_lenient() {
        let engine = builtin_engine();
        let parse = |v: serde_json::Value| serde_json::from_value::<SearchRequest>(v).unwrap();

        let request = parse(serde_json::json!({"search": "users", "limit": -5}));
        assert_eq!(request.limit, Some(0));
        assert_eq!(engine.search(&request).limit, 1);

        let request = parse(serde_json::json!({"limit": 0}));
        assert_eq!(engine.search(&request).results.len(), 1);

        let request = parse(serde_json::json!({"offset": -1, "limit": 2.0}));
        assert_eq!(request.offset, 0);
        assert_eq!(request.limit, Some(2));
        assert_eq!(engine.search(&request).results.len(), 2);

        let request = parse(serde_json::json!({"offset": 3.7, "limit": 1e12}));
        assert_eq!(request.offset, 3);
        assert_eq!(engine.search(&request).limit, MAX_LIMIT);

        let request = parse(serde_json::json!({"offset": null, "limit": null}));
        assert_eq!(request, SearchRequest::default());

        assert!(serde_json::from_value::<SearchRequest>(serde_json::json!({"offset": "ten"})).is_err());
    }

    #[test]
    fn test_offset_past_end_is_empty_page() {
        let engine = identity_engine();
        let result = engine.search(&SearchRequest::default().page(10, 25));

        assert_eq!(result.total_matches, 4);
        assert!(result.results.is_empty());
        assert!(result.next_offset.is_none());
    }

    #[test]
    fn test_pagination_has_no_gap_or_overlap() {
        let engine = builtin_engine();
        for query in [None, Some("user"), Some("config"), Some("a")] {
            let base = SearchRequest {
                query: query.map(str::to_string),
                ..Default::default()
            };
            let total = engine.search(&base).total_matches;

            let mut paged = Vec::new();
            let mut offset = 0;
            loop {
                let page = engine.search(&base.clone().page(offset, 25));
                assert_eq!(page.total_matches, total);
                paged.extend(page.ids());
                match page.next_offset {
                    Some(next) => offset = next,
                    None => break,
                }
            }

            let mut single_pass = Vec::new();
            let mut offset = 0;
            while offset < total {
                single_pass.extend(engine.search(&base.clone().page(offset, 1)).ids());
                offset += 1;
            }

            assert_eq!(paged.len(), total, "query {:?}", query);
            assert_eq!(paged, single_pass, "query {:?}", query);
        }
    }

    #[test]
    fn test_results_are_deterministic() {
        let engine = builtin_engine();
        let request = SearchRequest::query("user").page(25, 25);

        let first = serde_json::to_string(&engine.search(&request)).unwrap();
        let second = serde_json::to_string(&engine.search(&request)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_auto_detail_threshold() {
        let engine = identity_engine();

        let small = engine.search(&SearchRequest::category("Identity"));
        assert_eq!(small.total_matches, 3);
        assert!(small.detail_inlined);
        let json = serde_json::to_value(&small).unwrap();
        assert!(json["results"][0]["parameters"].is_array());
        assert!(json["results"][0]["required"].is_array());

        let large = engine.search(&SearchRequest::default());
        assert_eq!(large.total_matches, 4);
        assert!(!large.detail_inlined);
        let json = serde_json::to_value(&large).unwrap();
        assert!(json["results"][0].get("parameters").is_none());
    }

    #[test]
    fn test_auto_detail_uses_total_not_page_size() {
        let engine = identity_engine();
        let result = engine.search(&SearchRequest::default().page(0, 1));

        assert_eq!(result.results.len(), 1);
        assert!(!result.detail_inlined);
    }

    #[test]
    fn test_groups_only_when_spanning_categories() {
        let engine = identity_engine();

        let mixed = engine.search(&SearchRequest::query("list"));
        let groups = mixed.groups.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].category, "Identity");
        assert_eq!(groups[0].endpoint_ids, vec!["getUsers"]);
        assert_eq!(groups[1].category, "Groups");
        assert_eq!(groups[1].count, 1);

        let single = engine.search(&SearchRequest::category("Identity"));
        assert!(single.groups.is_none());
    }

    #[test]
    fn test_group_counts_cover_all_pages() {
        let engine = identity_engine();

        // "s" hits all three Identity endpoints and listGroups
        let first = engine.search(&SearchRequest::query("s").page(0, 1));
        assert_eq!(first.total_matches, 4);
        let groups = first.groups.unwrap();
        let identity = groups.iter().find(|g| g.category == "Identity").unwrap();
        assert_eq!(identity.count, 3);
        let on_page: usize = groups.iter().map(|g| g.endpoint_ids.len()).sum();
        assert_eq!(on_page, 1);

        let last = engine.search(&SearchRequest::query("s").page(3, 1));
        let groups = last.groups.unwrap();
        assert_eq!(groups.iter().map(|g| g.count).sum::<usize>(), 4);
    }

    #[test]
    fn test_builtin_exact_id_lookup() {
        let engine = builtin_engine();
        let result = engine.search(&SearchRequest::query("getUsers"));

        assert_eq!(result.results[0].endpoint.id, "getUsers");
        assert_eq!(result.results[0].tier, MatchTier::Exact);
    }
}
