//! Record finder: precise, filterable lookup over a JSON record catalog.
//!
//! The catalog is a JSON array of records loaded once at startup:
//!
//! ```json
//! [{"title": "Paper A", "name": "TFN membrane", "year": 2023,
//!   "value": 45.0, "category": "NMP"}]
//! ```
//!
//! Returns the distinct titles of matching records, in catalog order.

use async_trait::async_trait;
use planloop_core::error::ToolError;
use planloop_core::tool::{ParamKind, ParameterSpec, Tool};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Message returned when a query is valid but nothing matches.
pub const NO_MATCHES: &str = "query succeeded, but no matching records were found";

const DEFAULT_LIMIT: u64 = 10;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Default)]
struct Filters {
    name_like: Option<String>,
    min_year: Option<i64>,
    max_value: Option<f64>,
    category: Option<String>,
    limit: usize,
}

impl Filters {
    fn from_input(input: &Value) -> Result<Self, ToolError> {
        if !input.is_object() {
            return Err(ToolError::InvalidArguments(
                "record_finder input must be an object".into(),
            ));
        }
        let limit = match &input["limit"] {
            Value::Null => DEFAULT_LIMIT,
            v => v.as_u64().ok_or_else(|| {
                ToolError::InvalidArguments("'limit' must be a non-negative integer".into())
            })?,
        };

        Ok(Self {
            name_like: input["name_like"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
            min_year: input["min_year"].as_i64(),
            max_value: input["max_value"].as_f64(),
            category: input["category"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
            limit: usize::try_from(limit).unwrap_or(usize::MAX),
        })
    }

    fn matches(&self, record: &Record) -> bool {
        if let Some(needle) = &self.name_like
            && !record.name.to_lowercase().contains(needle.as_str())
        {
            return false;
        }
        if let Some(min_year) = self.min_year
            && !record.year.is_some_and(|y| y > min_year)
        {
            return false;
        }
        if let Some(max_value) = self.max_value
            && !record.value.is_some_and(|v| v < max_value)
        {
            return false;
        }
        if let Some(category) = &self.category
            && !record
                .category
                .as_deref()
                .is_some_and(|c| c.to_lowercase() == *category)
        {
            return false;
        }
        true
    }
}

pub struct RecordFinderTool {
    records: Vec<Record>,
}

impl RecordFinderTool {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Parse a catalog from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, ToolError> {
        let records: Vec<Record> =
            serde_json::from_str(json).map_err(|e| ToolError::ExecutionFailed {
                tool_name: "record_finder".into(),
                reason: format!("invalid record catalog: {e}"),
            })?;
        Ok(Self::new(records))
    }

    /// Load a catalog file.
    pub fn load(path: &Path) -> Result<Self, ToolError> {
        let json = std::fs::read_to_string(path).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "record_finder".into(),
            reason: format!("cannot read record catalog {}: {e}", path.display()),
        })?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl Tool for RecordFinderTool {
    fn name(&self) -> &str {
        "record_finder"
    }

    fn description(&self) -> &str {
        "Precise structured lookup over the record catalog. Filters by name keyword, \
         publication year, measured value and category, and returns the matching titles. \
         Use it first when the goal names concrete conditions."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::optional(
                "name_like",
                ParamKind::String,
                "Keyword contained in the record name, e.g. 'TFN' (case-insensitive)",
            ),
            ParameterSpec::optional(
                "min_year",
                ParamKind::Integer,
                "Only records published strictly after this year",
            ),
            ParameterSpec::optional(
                "max_value",
                ParamKind::Number,
                "Only records whose measured value is strictly below this",
            ),
            ParameterSpec::optional(
                "category",
                ParamKind::String,
                "Exact category name, e.g. 'NMP' (case-insensitive)",
            ),
            ParameterSpec::optional(
                "limit",
                ParamKind::Integer,
                "Maximum number of titles to return (default 10)",
            ),
        ]
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let filters = Filters::from_input(&input)?;

        let mut titles: Vec<&str> = Vec::new();
        for record in self.records.iter().filter(|r| filters.matches(r)) {
            if titles.len() >= filters.limit {
                break;
            }
            if !titles.contains(&record.title.as_str()) {
                titles.push(&record.title);
            }
        }

        debug!(matches = titles.len(), catalog = self.records.len(), "record_finder done");

        if titles.is_empty() {
            return Ok(Value::String(NO_MATCHES.into()));
        }
        Ok(Value::Array(
            titles.into_iter().map(|t| Value::String(t.into())).collect(),
        ))
    }
}
