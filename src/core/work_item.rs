use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::html;

const TITLE_FIELD: &str = "System.Title";
const DESCRIPTION_FIELD: &str = "System.Description";
const ACCEPTANCE_FIELD: &str = "Microsoft.VSTS.Common.AcceptanceCriteria";
const PARENT_RELATION: &str = "System.LinkTypes.Hierarchy-Reverse";

/// Flat projection of a raw work-item record. Total: a record with no
/// `fields` map at all projects to empty strings, never an error.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkItemSummary {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub acceptance_criteria: String,
}

impl WorkItemSummary {
    /// Standard projection: description flattened to one line.
    pub fn from_raw(raw: &Value) -> Self {
        Self::project(raw, html::strip_tags_inline)
    }

    /// Variant keeping paragraph/list boundaries in the description, for
    /// consumers that reason about structure (completeness analysis).
    pub fn from_raw_structured(raw: &Value) -> Self {
        Self::project(raw, html::strip_tags_block)
    }

    fn project(raw: &Value, describe: fn(&str) -> String) -> Self {
        let id = raw.get("id").and_then(Value::as_u64).unwrap_or(0);
        let fields = raw.get("fields");

        Self {
            id,
            title: string_field(fields, TITLE_FIELD),
            description: describe(&string_field(fields, DESCRIPTION_FIELD)),
            acceptance_criteria: html::tags_to_newlines(&string_field(
                fields,
                ACCEPTANCE_FIELD,
            )),
        }
    }
}

fn string_field(fields: Option<&Value>, name: &str) -> String {
    fields
        .and_then(|f| f.get(name))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Id of the parent work item, if the record was fetched with relations
/// expanded and a hierarchy link exists. The id is the trailing path
/// segment of the relation URL.
pub fn find_parent_id(raw: &Value) -> Option<u64> {
    let relations = raw.get("relations")?.as_array()?;
    relations
        .iter()
        .find(|rel| rel.get("rel").and_then(Value::as_str) == Some(PARENT_RELATION))
        .and_then(|rel| rel.get("url"))
        .and_then(Value::as_str)
        .and_then(|url| url.rsplit('/').next())
        .and_then(|segment| segment.parse().ok())
}
