use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// HTTP method of a catalogued endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported HTTP method: {}", other)),
        }
    }
}

/// Where a parameter travels in the outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Query,
    Path,
    Body,
}

/// Declared parameter of an endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParamLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub description: String,
}

/// A declared API category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDecl {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Catalog record describing one Verify REST endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub id: String,
    pub category: String,
    pub method: HttpMethod,
    pub path: String,
    pub summary: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl EndpointDescriptor {
    /// Names of every required parameter, in declaration order
    pub fn required_params(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn params_in(&self, location: ParamLocation) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters.iter().filter(move |p| p.location == location)
    }

    /// Substitute `{placeholder}` segments of the path template.
    ///
    /// Returns the resolved path and the parameters that were not consumed
    /// by the template. Every placeholder must be supplied.
    pub fn resolve_path(&self, params: &Map<String, Value>) -> CoreResult<(String, Map<String, Value>)> {
        resolve_template(&self.id, &self.path, params)
    }
}

/// Substitute `{placeholder}` segments of any path template. `label` names
/// the endpoint in the error.
pub fn resolve_template(
    label: &str,
    template: &str,
    params: &Map<String, Value>,
) -> CoreResult<(String, Map<String, Value>)> {
    let mut remaining = params.clone();
    let mut resolved = template.to_string();
    let mut missing = Vec::new();

    for name in path_placeholders(template) {
        match remaining.remove(name) {
            Some(value) => {
                resolved = resolved.replace(&format!("{{{}}}", name), &segment_text(&value));
            }
            None => missing.push(name.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(CoreError::MissingPathParams {
            endpoint: label.to_string(),
            missing,
        });
    }

    Ok((resolved, remaining))
}

/// Placeholder names in a path template, in order of appearance
pub fn path_placeholders(path: &str) -> Vec<&str> {
    path.split('{')
        .skip(1)
        .filter_map(|chunk| chunk.split_once('}').map(|(name, _)| name))
        .collect()
}

fn segment_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
