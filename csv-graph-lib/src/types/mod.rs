mod csv;
mod instance;
mod vocabulary;

use serde::Serialize;

pub use csv::{ColumnOverride, ExtraItem, OnEntity, PivotColumn, PropertyDatatype};
pub use instance::{InstanceValue, JsonLdInstance, JsonLdInstances};
pub use vocabulary::{IdOpt, TermKind, VocabularyMap, VocabularyTerm};

#[derive(Debug, Serialize)]
pub struct DataModel {
    #[serde(rename = "@id", skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "@type")]
    pub type_: Vec<String>,
    #[serde(rename = "rdfs:label")]
    pub label: String,
    #[serde(rename = "rdfs:comment")]
    pub comment: String,
    #[serde(rename = "f:properties")]
    pub properties: Vec<VocabularyTerm>,
    #[serde(rename = "f:classes")]
    pub classes: Vec<VocabularyTerm>,
}

#[derive(Debug, Serialize)]
pub struct JsonLdVocabulary {
    #[serde(rename = "@context")]
    pub context: serde_json::Value,
    pub ledger: String,
    pub insert: DataModel,
}
