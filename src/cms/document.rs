//! Wire shapes of the Prismic REST API

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A content record as served by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub uid: Option<String>,

    #[serde(rename = "type", default)]
    pub doc_type: String,

    /// `None` when the key is absent, `Some(None)` when it is null
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub first_publication_date: Option<Option<String>>,

    #[serde(default)]
    pub last_publication_date: Option<String>,

    /// Typed fields defined by the repository's custom type
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Marks a key as present, keeping a null value as `Some(None)`
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// One page of a search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPage {
    #[serde(default)]
    pub page: u32,

    #[serde(default)]
    pub results_per_page: usize,

    #[serde(default)]
    pub total_results_size: usize,

    #[serde(default)]
    pub total_pages: u32,

    /// Continuation URL, absent on the last page
    #[serde(default)]
    pub next_page: Option<String>,

    #[serde(default)]
    pub results: Vec<Document>,
}

impl ApiPage {
    /// A page holding `results` that continues at `next_page`
    pub fn new(results: Vec<Document>, next_page: Option<String>) -> Self {
        Self {
            page: 1,
            results_per_page: results.len(),
            total_results_size: results.len(),
            total_pages: 1,
            next_page,
            results,
        }
    }
}

/// API entry point response, only the parts needed to pick a ref
#[derive(Debug, Clone, Deserialize)]
pub struct ApiInfo {
    #[serde(default)]
    pub refs: Vec<ApiRef>,
}

/// A content release reference
#[derive(Debug, Clone, Deserialize)]
pub struct ApiRef {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "ref")]
    pub reference: String,

    #[serde(rename = "isMasterRef", default)]
    pub is_master_ref: bool,
}

impl ApiInfo {
    /// The ref of the published content
    pub fn master_ref(&self) -> Option<&str> {
        self.refs
            .iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference.as_str())
    }
}
