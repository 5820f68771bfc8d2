use crate::error::ProcessorError;
use crate::sink::GraphSink;
use crate::types::{InstanceValue, JsonLdInstance, VocabularyMap, VocabularyTerm};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Model,
    Instances,
}

/// The graph under construction: vocabulary plus entities in the order they
/// were first seen.
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    vocabulary: VocabularyMap,
    instances: Vec<JsonLdInstance>,
    index: HashMap<String, usize>,
    phase: Phase,
}

impl GraphState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vocabulary(&self) -> &VocabularyMap {
        &self.vocabulary
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn enter_instances_phase(&mut self) {
        self.phase = Phase::Instances;
    }

    pub fn instances(&self) -> &[JsonLdInstance] {
        &self.instances
    }

    pub fn instance(&self, iri: &str) -> Option<&JsonLdInstance> {
        self.index.get(iri).map(|i| &self.instances[*i])
    }

    pub fn class(&self, iri: &str) -> Option<&VocabularyTerm> {
        self.vocabulary.classes.get(iri)
    }

    pub fn property(&self, iri: &str) -> Option<&VocabularyTerm> {
        self.vocabulary.properties.get(iri)
    }

    pub(crate) fn upsert_class(&mut self, term: VocabularyTerm) -> Result<(), ProcessorError> {
        self.vocabulary.upsert_class(term)
    }

    pub(crate) fn upsert_property(&mut self, term: VocabularyTerm) -> Result<(), ProcessorError> {
        self.vocabulary.upsert_property(term)
    }

    pub(crate) fn set_identifier(
        &mut self,
        class_iri: &str,
        term: VocabularyTerm,
    ) -> Result<(), ProcessorError> {
        self.vocabulary.set_identifier(class_iri, term)
    }

    /// Insert an entity, or merge it into the existing entity with the same IRI.
    pub(crate) fn upsert_instance(
        &mut self,
        instance: JsonLdInstance,
    ) -> Result<(), ProcessorError> {
        match self.index.get(&instance.id).copied() {
            Some(position) => {
                let types = self.reconcile_types(&self.instances[position], &instance.types)?;
                let existing = &mut self.instances[position];
                existing.types = types;
                existing.update_with(instance)
            }
            None => {
                self.index.insert(instance.id.clone(), self.instances.len());
                self.instances.push(instance);
                Ok(())
            }
        }
    }

    /// Keep the most specific type on each branch of the hierarchy. Types on
    /// unrelated branches conflict.
    fn reconcile_types(
        &self,
        existing: &JsonLdInstance,
        incoming: &[String],
    ) -> Result<Vec<String>, ProcessorError> {
        let mut types = existing.types.clone();
        for new_type in incoming {
            if types.contains(new_type) {
                continue;
            }
            if types
                .iter()
                .any(|t| self.vocabulary.is_subclass_of(t, new_type))
            {
                continue;
            }
            if let Some(slot) = types
                .iter_mut()
                .find(|t| self.vocabulary.is_subclass_of(new_type, t))
            {
                *slot = new_type.clone();
                continue;
            }
            return Err(ProcessorError::Conflict(format!(
                "Entity '{}' is typed both {:?} and '{}', which are unrelated classes",
                existing.id, types, new_type
            )));
        }
        Ok(types)
    }

    /// Attach a value to an entity that must already exist.
    pub(crate) fn attach_value(
        &mut self,
        iri: &str,
        property_iri: &str,
        value: InstanceValue,
    ) -> Result<(), ProcessorError> {
        let position = self.index.get(iri).copied().ok_or_else(|| {
            ProcessorError::Resolution(format!(
                "Cannot attach '{}' to entity '{}': the entity does not exist",
                property_iri, iri
            ))
        })?;
        self.instances[position].push_value(property_iri, value);
        Ok(())
    }

    /// Push the whole graph into `sink`: classes, properties (identifier
    /// properties included), then entities in first-seen order.
    pub fn emit<K: GraphSink + ?Sized>(&self, sink: &mut K) -> Result<(), ProcessorError> {
        for class in self.vocabulary.classes.values() {
            sink.declare_class(class)?;
        }
        for property in self.vocabulary.properties.values() {
            sink.declare_property(property)?;
        }
        for (class_iri, identifier) in &self.vocabulary.identifiers {
            let mut identifier = identifier.clone();
            if !identifier.domain.contains(class_iri) {
                identifier.domain.push(class_iri.clone());
            }
            sink.declare_property(&identifier)?;
        }
        for instance in &self.instances {
            sink.put_entity(instance)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IdOpt, TermKind};

    const BASE: &str = "https://example.com/model/";

    fn class(local: &str, parent: Option<&str>) -> VocabularyTerm {
        let mut term = VocabularyTerm::new(
            TermKind::Class,
            format!("{}{}", BASE, local),
            IdOpt::String(local.into()),
        );
        if let Some(parent) = parent {
            term.sub_class_of.push(format!("{}{}", BASE, parent));
        }
        term
    }

    fn graph() -> GraphState {
        let mut graph = GraphState::new();
        graph.upsert_class(class("Material", None)).unwrap();
        graph.upsert_class(class("DRAM", Some("Material"))).unwrap();
        graph.upsert_class(class("Plant", None)).unwrap();
        graph
    }

    #[test]
    fn test_upsert_keeps_most_specific_type() {
        let mut graph = graph();
        let iri = "https://example.com/data/material/M1";
        graph
            .upsert_instance(JsonLdInstance::new(iri, format!("{}Material", BASE)))
            .unwrap();
        graph
            .upsert_instance(JsonLdInstance::new(iri, format!("{}DRAM", BASE)))
            .unwrap();
        graph
            .upsert_instance(JsonLdInstance::new(iri, format!("{}Material", BASE)))
            .unwrap();

        assert_eq!(graph.instances().len(), 1);
        assert_eq!(graph.instance(iri).unwrap().types, vec![format!("{}DRAM", BASE)]);

        let error = graph
            .upsert_instance(JsonLdInstance::new(iri, format!("{}Plant", BASE)))
            .unwrap_err();
        assert!(matches!(error, ProcessorError::Conflict(_)));
    }

    #[test]
    fn test_attach_value_requires_entity() {
        let mut graph = graph();
        let error = graph
            .attach_value("missing", "p", InstanceValue::Literal(1.into()))
            .unwrap_err();
        assert!(matches!(error, ProcessorError::Resolution(_)));

        graph
            .upsert_instance(JsonLdInstance::new("m1", format!("{}Material", BASE)))
            .unwrap();
        graph
            .attach_value("m1", "p", InstanceValue::Literal(1.into()))
            .unwrap();
        assert_eq!(graph.instance("m1").unwrap().values("p").len(), 1);
    }

    #[test]
    fn test_entities_keep_first_seen_order() {
        let mut graph = graph();
        for id in ["c", "a", "b", "a"] {
            graph
                .upsert_instance(JsonLdInstance::new(id, format!("{}Material", BASE)))
                .unwrap();
        }
        let ids: Vec<&str> = graph.instances().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
