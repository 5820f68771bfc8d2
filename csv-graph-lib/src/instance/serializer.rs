use serde_json::{Map, Value as JsonValue};

use crate::sink::DocumentHeader;
use crate::types::{JsonLdInstance, JsonLdInstances, VocabularyTerm};

pub struct InstanceSerializer<'a> {
    header: &'a DocumentHeader,
}

impl<'a> InstanceSerializer<'a> {
    pub fn new(header: &'a DocumentHeader) -> Self {
        Self { header }
    }

    fn create_context<'t>(
        &self,
        properties: impl Iterator<Item = &'t VocabularyTerm>,
    ) -> Map<String, JsonValue> {
        let mut context = Map::new();

        context.insert(
            "xsd".to_string(),
            JsonValue::String("http://www.w3.org/2001/XMLSchema#".to_string()),
        );
        context.insert(
            "rdfs".to_string(),
            JsonValue::String("http://www.w3.org/2000/01/rdf-schema#".to_string()),
        );

        // model terms resolve against @vocab, entity references against @base
        if !self.header.model_base_iri.is_empty() {
            context.insert(
                "@vocab".to_string(),
                JsonValue::String(self.header.model_base_iri.clone()),
            );
        }
        if !self.header.instances_base_iri.is_empty() {
            context.insert(
                "@base".to_string(),
                JsonValue::String(self.header.instances_base_iri.clone()),
            );
        }

        for property in properties {
            let datatype = property.datatype();
            let type_ = if datatype.is_reference() {
                "@id"
            } else {
                datatype.xsd_type()
            };
            let mut property_context = Map::new();
            property_context.insert("@type".to_string(), JsonValue::String(type_.to_string()));
            context.insert(property.iri.clone(), JsonValue::Object(property_context));
        }

        context
    }

    pub fn document<'t>(
        &self,
        properties: impl Iterator<Item = &'t VocabularyTerm>,
        instances: &[JsonLdInstance],
    ) -> JsonLdInstances {
        JsonLdInstances {
            context: self.create_context(properties),
            ledger: self.header.ledger.clone(),
            insert: instances.to_vec(),
        }
    }
}
