//! Query predicates in the Prismic query syntax

use std::fmt;

/// A single query predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Field equals value
    At(String, String),
}

impl Predicate {
    pub fn at(path: &str, value: &str) -> Self {
        Predicate::At(path.to_string(), value.to_string())
    }

    /// Documents of a custom type
    pub fn document_type(doc_type: &str) -> Self {
        Self::at("document.type", doc_type)
    }

    /// The document of a custom type with the given uid
    pub fn uid(doc_type: &str, uid: &str) -> Self {
        Self::at(&format!("my.{}.uid", doc_type), uid)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::At(path, value) => write!(f, "[at({},{})]", path, quote(value)),
        }
    }
}

/// Render predicates as the value of the `q` parameter
pub fn to_query(predicates: &[Predicate]) -> String {
    let inner: String = predicates.iter().map(|p| p.to_string()).collect();
    format!("[{}]", inner)
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Options of a search query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Restrict returned fields, e.g. `post.title`
    pub fetch: Vec<String>,
    pub page_size: Option<usize>,
}

impl QueryOptions {
    pub fn fetch<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.fetch = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }
}
