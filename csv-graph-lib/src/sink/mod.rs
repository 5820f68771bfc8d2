//! Graph sinks: where the built graph goes.

use crate::error::ProcessorError;
use crate::instance::serializer::InstanceSerializer;
use crate::manifest::Manifest;
use crate::types::{JsonLdInstance, JsonLdInstances, JsonLdVocabulary, VocabularyTerm};
use crate::vocabulary::serializer::VocabularySerializer;
use serde::Serialize;
use std::collections::hash_map::Entry as HashEntry;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Accepts classes, properties and entities keyed by IRI. Repeated IRIs are
/// merged into what the sink already holds.
pub trait GraphSink {
    fn declare_class(&mut self, class: &VocabularyTerm) -> Result<(), ProcessorError>;
    fn declare_property(&mut self, property: &VocabularyTerm) -> Result<(), ProcessorError>;
    fn put_entity(&mut self, entity: &JsonLdInstance) -> Result<(), ProcessorError>;
}

/// Manifest metadata carried into the output documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentHeader {
    pub id: String,
    pub ledger: String,
    pub name: String,
    pub description: String,
    pub model_base_iri: String,
    pub instances_base_iri: String,
}

impl From<&Manifest> for DocumentHeader {
    fn from(manifest: &Manifest) -> Self {
        Self {
            id: manifest.id.clone(),
            ledger: manifest.ledger.clone(),
            name: manifest.name.clone(),
            description: manifest.description.clone(),
            model_base_iri: manifest.model.base_iri.clone(),
            instances_base_iri: manifest.instances.base_iri.clone(),
        }
    }
}

/// Collects the graph and renders it as `vocabulary.jsonld` and
/// `instances.jsonld`.
#[derive(Debug, Default)]
pub struct JsonLdSink {
    header: DocumentHeader,
    classes: BTreeMap<String, VocabularyTerm>,
    properties: BTreeMap<String, VocabularyTerm>,
    instances: Vec<JsonLdInstance>,
    index: HashMap<String, usize>,
}

fn merge_term(
    terms: &mut BTreeMap<String, VocabularyTerm>,
    term: &VocabularyTerm,
) -> Result<(), ProcessorError> {
    match terms.entry(term.iri.clone()) {
        Entry::Occupied(mut entry) => entry.get_mut().update_with(term.clone()),
        Entry::Vacant(entry) => {
            entry.insert(term.clone());
            Ok(())
        }
    }
}

impl JsonLdSink {
    pub fn new(header: DocumentHeader) -> Self {
        Self {
            header,
            ..Default::default()
        }
    }

    pub fn classes(&self) -> impl Iterator<Item = &VocabularyTerm> {
        self.classes.values()
    }

    pub fn properties(&self) -> impl Iterator<Item = &VocabularyTerm> {
        self.properties.values()
    }

    pub fn entities(&self) -> &[JsonLdInstance] {
        &self.instances
    }

    pub fn vocabulary_document(&self) -> JsonLdVocabulary {
        VocabularySerializer::new(&self.header).document(
            self.classes.values().cloned().collect(),
            self.properties.values().cloned().collect(),
        )
    }

    pub fn instances_document(&self) -> JsonLdInstances {
        InstanceSerializer::new(&self.header).document(self.properties.values(), &self.instances)
    }

    pub async fn save(&self, output_dir: &Path) -> Result<(), ProcessorError> {
        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            ProcessorError::Processing(format!(
                "Failed to create output directory {}: {}",
                output_dir.display(),
                e
            ))
        })?;
        write_document(output_dir, "vocabulary.jsonld", &self.vocabulary_document()).await?;
        write_document(output_dir, "instances.jsonld", &self.instances_document()).await?;
        Ok(())
    }
}

async fn write_document<T: Serialize>(
    output_dir: &Path,
    file_name: &str,
    document: &T,
) -> Result<(), ProcessorError> {
    let json = serde_json::to_string_pretty(document).map_err(|e| {
        ProcessorError::Processing(format!("Failed to serialize {}: {}", file_name, e))
    })?;
    let output_path = output_dir.join(file_name);
    tokio::fs::write(&output_path, json).await.map_err(|e| {
        ProcessorError::Processing(format!(
            "Failed to write {}: {}",
            output_path.display(),
            e
        ))
    })?;
    tracing::info!("Saved {}", output_path.display());
    Ok(())
}

impl GraphSink for JsonLdSink {
    fn declare_class(&mut self, class: &VocabularyTerm) -> Result<(), ProcessorError> {
        merge_term(&mut self.classes, class)
    }

    fn declare_property(&mut self, property: &VocabularyTerm) -> Result<(), ProcessorError> {
        merge_term(&mut self.properties, property)
    }

    fn put_entity(&mut self, entity: &JsonLdInstance) -> Result<(), ProcessorError> {
        match self.index.entry(entity.id.clone()) {
            HashEntry::Occupied(entry) => {
                let existing = &mut self.instances[*entry.get()];
                for type_ in &entity.types {
                    if !existing.types.contains(type_) {
                        existing.types.push(type_.clone());
                    }
                }
                existing.update_with(entity.clone())
            }
            HashEntry::Vacant(entry) => {
                entry.insert(self.instances.len());
                self.instances.push(entity.clone());
                Ok(())
            }
        }
    }
}
