use crate::error::ProcessorError;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// A single property value on an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceValue {
    Literal(JsonValue),
    Reference(String),
}

impl InstanceValue {
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            InstanceValue::Reference(iri) => Some(iri),
            InstanceValue::Literal(_) => None,
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            InstanceValue::Literal(value) => value.clone(),
            InstanceValue::Reference(iri) => {
                let mut reference = Map::new();
                reference.insert("@id".to_string(), JsonValue::String(iri.clone()));
                JsonValue::Object(reference)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonLdInstance {
    pub id: String,
    pub types: Vec<String>,
    pub label: Option<String>,
    /// Property IRI to values, in first-seen order
    pub properties: BTreeMap<String, Vec<InstanceValue>>,
}

impl JsonLdInstance {
    pub fn new(id: impl Into<String>, type_: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            types: vec![type_.into()],
            label: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn values(&self, property_iri: &str) -> &[InstanceValue] {
        self.properties
            .get(property_iri)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Append a value unless the property already carries it.
    pub fn push_value(&mut self, property_iri: &str, value: InstanceValue) {
        let values = self.properties.entry(property_iri.to_string()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    pub(crate) fn set_label(&mut self, label: &str) -> Result<(), ProcessorError> {
        match &self.label {
            Some(existing) if existing != label => Err(ProcessorError::Conflict(format!(
                "Entity '{}' is labelled both '{}' and '{}'",
                self.id, existing, label
            ))),
            _ => {
                self.label = Some(label.to_string());
                Ok(())
            }
        }
    }

    /// Merge values and label of `other` into this entity. Types are
    /// reconciled by the caller, which knows the class hierarchy.
    pub(crate) fn update_with(&mut self, other: JsonLdInstance) -> Result<(), ProcessorError> {
        if let Some(label) = &other.label {
            self.set_label(label)?;
        }
        for (property, values) in other.properties {
            for value in values {
                self.push_value(&property, value);
            }
        }
        Ok(())
    }
}

impl Serialize for JsonLdInstance {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = Map::new();
        map.insert("@id".to_string(), JsonValue::String(self.id.clone()));
        let types = match self.types.as_slice() {
            [single] => JsonValue::String(single.clone()),
            many => JsonValue::Array(many.iter().cloned().map(JsonValue::String).collect()),
        };
        map.insert("@type".to_string(), types);
        if let Some(label) = &self.label {
            map.insert("rdfs:label".to_string(), JsonValue::String(label.clone()));
        }
        for (property, values) in &self.properties {
            let value = match values.as_slice() {
                [] => continue,
                [single] => single.to_json(),
                many => JsonValue::Array(many.iter().map(InstanceValue::to_json).collect()),
            };
            map.insert(property.clone(), value);
        }
        map.serialize(serializer)
    }
}

#[derive(Debug, Serialize)]
pub struct JsonLdInstances {
    #[serde(rename = "@context")]
    pub context: Map<String, JsonValue>,
    pub ledger: String,
    pub insert: Vec<JsonLdInstance>,
}
