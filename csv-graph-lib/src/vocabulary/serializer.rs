use crate::sink::DocumentHeader;
use crate::types::{DataModel, JsonLdVocabulary, VocabularyTerm};

pub struct VocabularySerializer<'a> {
    header: &'a DocumentHeader,
}

impl<'a> VocabularySerializer<'a> {
    pub fn new(header: &'a DocumentHeader) -> Self {
        Self { header }
    }

    pub fn document(
        &self,
        classes: Vec<VocabularyTerm>,
        properties: Vec<VocabularyTerm>,
    ) -> JsonLdVocabulary {
        let insert = DataModel {
            id: self.header.id.clone(),
            type_: vec!["f:DataModel".to_string()],
            label: self.header.name.clone(),
            comment: self.header.description.clone(),
            classes,
            properties,
        };

        JsonLdVocabulary {
            context: serde_json::json!({
                "rdfs": "http://www.w3.org/2000/01/rdf-schema#",
                "rdf": "http://www.w3.org/1999/02/22-rdf-syntax-ns#",
                "xsd": "http://www.w3.org/2001/XMLSchema#",
                "f": "https://ns.flur.ee/ledger#",
                "rdfs:domain": { "@type": "@id" },
                "rdfs:range": { "@type": "@id" },
                "rdfs:subClassOf": { "@type": "@id" },
            }),
            ledger: self.header.ledger.clone(),
            insert,
        }
    }
}
