use crate::error::ProcessorError;
use crate::utils::{are_conflicting, expand_iri_with_base, to_camel_case, to_pascal_case};
use serde::{Serialize, Serializer};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt::Display;

use super::PropertyDatatype;

/// The local id a term was declared with. `ReplacementMap` records a term whose
/// IRI was generated from a replacement value while the original id stays
/// usable as a lookup alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdOpt {
    String(String),
    ReplacementMap {
        original_id: String,
        replacement_id: String,
    },
}

impl IdOpt {
    pub fn final_id(&self) -> &str {
        match self {
            IdOpt::String(s) => s,
            IdOpt::ReplacementMap { replacement_id, .. } => replacement_id,
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            IdOpt::String(s) => s == candidate,
            IdOpt::ReplacementMap {
                original_id,
                replacement_id,
            } => original_id == candidate || replacement_id == candidate,
        }
    }
}

impl Display for IdOpt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdOpt::String(s) => write!(f, "{}", s),
            IdOpt::ReplacementMap {
                original_id,
                replacement_id,
            } => write!(f, "{} (replaced by {})", original_id, replacement_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Class,
    Property,
}

impl TermKind {
    fn rdf_type(&self) -> &'static str {
        match self {
            TermKind::Class => "rdfs:Class",
            TermKind::Property => "rdf:Property",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VocabularyTerm {
    pub iri: String,
    pub id: IdOpt,
    pub kind: TermKind,
    pub label: Option<String>,
    pub comment: Option<String>,
    pub sub_class_of: Vec<String>,
    pub domain: Vec<String>,
    pub range: Vec<PropertyDatatype>,
    pub extra_items: BTreeMap<String, String>,
}

fn union_into<T: PartialEq + Clone>(target: &mut Vec<T>, items: &[T]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

impl VocabularyTerm {
    pub fn new(kind: TermKind, iri: impl Into<String>, id: IdOpt) -> Self {
        Self {
            iri: iri.into(),
            id,
            kind,
            label: None,
            comment: None,
            sub_class_of: Vec::new(),
            domain: Vec::new(),
            range: Vec::new(),
            extra_items: BTreeMap::new(),
        }
    }

    /// The label, falling back to the local id.
    pub fn display_label(&self) -> &str {
        match &self.label {
            Some(label) if !label.is_empty() => label,
            _ => self.id.final_id(),
        }
    }

    /// The datatype values of this property coerce to. A class range wins over
    /// literal ranges.
    pub fn datatype(&self) -> PropertyDatatype {
        self.range
            .iter()
            .find(|r| r.is_reference())
            .or_else(|| self.range.first())
            .cloned()
            .unwrap_or(PropertyDatatype::String)
    }

    pub(crate) fn update_with(&mut self, other: VocabularyTerm) -> Result<(), ProcessorError> {
        if are_conflicting(&self.label, &other.label) {
            return Err(ProcessorError::Conflict(format!(
                "The CSV uses conflicting labels for the same term '{}':\n\
                     - Label 1: {}\n\
                     - Label 2: {}",
                self.iri,
                self.label.as_deref().unwrap_or_default(),
                other.label.as_deref().unwrap_or_default()
            )));
        }

        if are_conflicting(&self.comment, &other.comment) {
            return Err(ProcessorError::Conflict(format!(
                "The CSV uses conflicting comments for the same term '{}':\n\
                     - Comment 1: {:#?}\n\
                     - Comment 2: {:#?}",
                self.iri,
                self.comment.as_deref().unwrap_or_default(),
                other.comment.as_deref().unwrap_or_default()
            )));
        }

        for (key, value) in &other.extra_items {
            if let Some(this_value) = self.extra_items.get(key) {
                if !value.is_empty() && !this_value.is_empty() && value != this_value {
                    return Err(ProcessorError::Conflict(format!(
                        "The CSV uses conflicting values for the same term '{}':\n\
                             - Key: {}\n\
                             - Value 1: {}\n\
                             - Value 2: {}",
                        self.iri, key, this_value, value
                    )));
                }
            }
        }

        if self.label.as_deref().unwrap_or_default().is_empty() {
            self.label = other.label;
        }
        if self.comment.as_deref().unwrap_or_default().is_empty() {
            self.comment = other.comment;
        }
        if let (IdOpt::String(_), IdOpt::ReplacementMap { .. }) = (&self.id, &other.id) {
            self.id = other.id;
        }
        union_into(&mut self.sub_class_of, &other.sub_class_of);
        union_into(&mut self.domain, &other.domain);
        union_into(&mut self.range, &other.range);
        for (key, value) in other.extra_items {
            if !value.is_empty() {
                self.extra_items.insert(key, value);
            }
        }

        Ok(())
    }
}

impl Serialize for VocabularyTerm {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serde_json::Map::new();
        map.insert("@id".to_string(), serde_json::Value::String(self.iri.clone()));
        map.insert(
            "@type".to_string(),
            serde_json::Value::String(self.kind.rdf_type().to_string()),
        );
        map.insert(
            "rdfs:label".to_string(),
            serde_json::Value::String(self.display_label().to_string()),
        );
        if let Some(comment) = self.comment.as_ref().filter(|c| !c.is_empty()) {
            map.insert(
                "rdfs:comment".to_string(),
                serde_json::Value::String(comment.clone()),
            );
        }
        if !self.sub_class_of.is_empty() {
            map.insert(
                "rdfs:subClassOf".to_string(),
                serde_json::to_value(&self.sub_class_of).map_err(serde::ser::Error::custom)?,
            );
        }
        if !self.domain.is_empty() {
            map.insert(
                "rdfs:domain".to_string(),
                serde_json::to_value(&self.domain).map_err(serde::ser::Error::custom)?,
            );
        }
        if !self.range.is_empty() {
            map.insert(
                "rdfs:range".to_string(),
                serde_json::to_value(&self.range).map_err(serde::ser::Error::custom)?,
            );
        }
        for (key, value) in &self.extra_items {
            if !value.is_empty() {
                map.insert(key.clone(), serde_json::Value::String(value.clone()));
            }
        }
        map.serialize(serializer)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VocabularyMap {
    pub classes: BTreeMap<String, VocabularyTerm>,
    pub properties: BTreeMap<String, VocabularyTerm>,
    /// Maps a class IRI to its identifier property term
    pub identifiers: BTreeMap<String, VocabularyTerm>,
}

fn upsert(
    terms: &mut BTreeMap<String, VocabularyTerm>,
    key: String,
    term: VocabularyTerm,
) -> Result<(), ProcessorError> {
    match terms.entry(key) {
        Entry::Occupied(mut entry) => entry.get_mut().update_with(term),
        Entry::Vacant(entry) => {
            entry.insert(term);
            Ok(())
        }
    }
}

impl VocabularyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_class(&mut self, term: VocabularyTerm) -> Result<(), ProcessorError> {
        upsert(&mut self.classes, term.iri.clone(), term)
    }

    pub fn upsert_property(&mut self, term: VocabularyTerm) -> Result<(), ProcessorError> {
        upsert(&mut self.properties, term.iri.clone(), term)
    }

    pub fn set_identifier(
        &mut self,
        class_iri: &str,
        term: VocabularyTerm,
    ) -> Result<(), ProcessorError> {
        if let Some(existing) = self.identifiers.get(class_iri) {
            if existing.iri != term.iri {
                return Err(ProcessorError::Conflict(format!(
                    "Class '{}' declares two identifier properties: '{}' and '{}'",
                    class_iri, existing.iri, term.iri
                )));
            }
        }
        upsert(&mut self.identifiers, class_iri.to_string(), term)
    }

    /// Find a class by IRI, by its id (original or replacement), by its id
    /// expanded against `base_iri`, or by label.
    pub fn find_class(&self, reference: &str, base_iri: &str) -> Option<&VocabularyTerm> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        if let Some(term) = self.classes.get(reference) {
            return Some(term);
        }
        let expanded = expand_iri_with_base(base_iri, &to_pascal_case(reference));
        if let Some(term) = self.classes.get(&expanded) {
            return Some(term);
        }
        self.classes
            .values()
            .find(|term| term.id.matches(reference))
            .or_else(|| {
                self.classes
                    .values()
                    .find(|term| term.label.as_deref() == Some(reference))
            })
    }

    /// Find a property by IRI, id, label or camelCase form of its label.
    pub fn find_property(&self, reference: &str, base_iri: &str) -> Option<&VocabularyTerm> {
        self.find_property_in(self.properties.values(), reference, base_iri)
    }

    pub(crate) fn find_property_in<'a>(
        &self,
        candidates: impl Iterator<Item = &'a VocabularyTerm> + Clone,
        reference: &str,
        base_iri: &str,
    ) -> Option<&'a VocabularyTerm> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        let expanded = expand_iri_with_base(base_iri, &to_camel_case(reference));
        let camel = to_camel_case(reference);
        candidates
            .clone()
            .find(|term| term.iri == reference || term.iri == expanded)
            .or_else(|| candidates.clone().find(|term| term.id.matches(reference)))
            .or_else(|| {
                candidates
                    .clone()
                    .find(|term| term.label.as_deref() == Some(reference))
            })
            .or_else(|| {
                candidates
                    .clone()
                    .find(|term| to_camel_case(term.display_label()) == camel)
            })
    }

    /// All transitive superclasses of `class_iri`, nearest first.
    pub fn ancestors(&self, class_iri: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::from([class_iri.to_string()]);
        seen.insert(class_iri.to_string());

        while let Some(current) = queue.pop_front() {
            if let Some(term) = self.classes.get(&current) {
                for parent in &term.sub_class_of {
                    if seen.insert(parent.clone()) {
                        result.push(parent.clone());
                        queue.push_back(parent.clone());
                    }
                }
            }
        }
        result
    }

    /// All transitive subclasses of `class_iri`.
    pub fn descendants(&self, class_iri: &str) -> Vec<String> {
        self.classes
            .keys()
            .filter(|iri| iri.as_str() != class_iri)
            .filter(|iri| self.ancestors(iri).iter().any(|a| a == class_iri))
            .cloned()
            .collect()
    }

    /// Whether `candidate` is `ancestor` or one of its transitive subclasses.
    pub fn is_subclass_of(&self, candidate: &str, ancestor: &str) -> bool {
        candidate == ancestor || self.ancestors(candidate).iter().any(|a| a == ancestor)
    }

    /// The class that declares the identifier for `class_iri` (itself or its
    /// nearest ancestor declaring one), together with the identifier term.
    pub fn identifier_for(&self, class_iri: &str) -> Option<(&str, &VocabularyTerm)> {
        std::iter::once(class_iri.to_string())
            .chain(self.ancestors(class_iri))
            .find_map(|iri| self.identifiers.get_key_value(&iri))
            .map(|(owner, term)| (owner.as_str(), term))
    }

    /// Properties whose domain includes `class_iri`, one of its ancestors or
    /// one of its descendants.
    pub fn properties_for_class(&self, class_iri: &str) -> Vec<&VocabularyTerm> {
        let mut related = vec![class_iri.to_string()];
        related.extend(self.ancestors(class_iri));
        related.extend(self.descendants(class_iri));
        self.properties
            .values()
            .filter(|term| term.domain.iter().any(|d| related.contains(d)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://example.com/model/";

    fn class(local: &str) -> VocabularyTerm {
        VocabularyTerm::new(
            TermKind::Class,
            format!("{}{}", BASE, local),
            IdOpt::String(local.to_string()),
        )
    }

    fn sample() -> VocabularyMap {
        let mut vocabulary = VocabularyMap::new();
        vocabulary.upsert_class(class("Material")).unwrap();
        let mut memory = class("Memory");
        memory.sub_class_of = vec![format!("{}Material", BASE)];
        vocabulary.upsert_class(memory).unwrap();
        let mut dram = class("DRAM");
        dram.id = IdOpt::ReplacementMap {
            original_id: "D-1".into(),
            replacement_id: "DRAM".into(),
        };
        dram.sub_class_of = vec![format!("{}Memory", BASE)];
        vocabulary.upsert_class(dram).unwrap();

        let mut id = VocabularyTerm::new(
            TermKind::Property,
            format!("{}materialNumber", BASE),
            IdOpt::String("Material Number".into()),
        );
        id.label = Some("Material Number".into());
        vocabulary
            .set_identifier(&format!("{}Material", BASE), id)
            .unwrap();

        let mut weight = VocabularyTerm::new(
            TermKind::Property,
            format!("{}unitWeight", BASE),
            IdOpt::String("Unit Weight".into()),
        );
        weight.domain = vec![format!("{}Material", BASE)];
        weight.range = vec![PropertyDatatype::Decimal];
        vocabulary.upsert_property(weight).unwrap();
        vocabulary
    }

    #[test]
    fn test_update_with_merges_and_detects_conflicts() {
        let mut term = class("Material");
        term.label = Some("Material".into());

        let mut other = class("Material");
        other.comment = Some("A physical material".into());
        other.extra_items.insert("category".into(), "Raw".into());
        term.update_with(other).unwrap();
        assert_eq!(term.comment.as_deref(), Some("A physical material"));
        assert_eq!(term.extra_items["category"], "Raw");

        let mut conflicting = class("Material");
        conflicting.label = Some("Stuff".into());
        assert!(matches!(
            term.update_with(conflicting),
            Err(ProcessorError::Conflict(_))
        ));

        let mut conflicting = class("Material");
        conflicting.extra_items.insert("category".into(), "Finished".into());
        assert!(matches!(
            term.update_with(conflicting),
            Err(ProcessorError::Conflict(_))
        ));
    }

    #[test]
    fn test_find_class() {
        let vocabulary = sample();
        let dram = format!("{}DRAM", BASE);
        assert_eq!(vocabulary.find_class("DRAM", BASE).unwrap().iri, dram);
        assert_eq!(vocabulary.find_class("D-1", BASE).unwrap().iri, dram);
        assert_eq!(vocabulary.find_class(&dram, BASE).unwrap().iri, dram);
        assert!(vocabulary.find_class("SRAM", BASE).is_none());
        assert!(vocabulary.find_class("  ", BASE).is_none());
    }

    #[test]
    fn test_hierarchy() {
        let vocabulary = sample();
        let material = format!("{}Material", BASE);
        let dram = format!("{}DRAM", BASE);

        assert_eq!(
            vocabulary.ancestors(&dram),
            vec![format!("{}Memory", BASE), material.clone()]
        );
        assert!(vocabulary.is_subclass_of(&dram, &material));
        assert!(!vocabulary.is_subclass_of(&material, &dram));
        assert_eq!(vocabulary.descendants(&material).len(), 2);

        let (owner, identifier) = vocabulary.identifier_for(&dram).unwrap();
        assert_eq!(owner, material);
        assert_eq!(identifier.display_label(), "Material Number");

        assert_eq!(vocabulary.properties_for_class(&dram).len(), 1);
    }

    #[test]
    fn test_find_property() {
        let vocabulary = sample();
        let weight = format!("{}unitWeight", BASE);
        assert_eq!(vocabulary.find_property("Unit Weight", BASE).unwrap().iri, weight);
        assert_eq!(vocabulary.find_property("unitWeight", BASE).unwrap().iri, weight);
        assert!(vocabulary.find_property("Color", BASE).is_none());
    }

    #[test]
    fn test_conflicting_identifiers() {
        let mut vocabulary = sample();
        let other = VocabularyTerm::new(
            TermKind::Property,
            format!("{}sku", BASE),
            IdOpt::String("SKU".into()),
        );
        assert!(matches!(
            vocabulary.set_identifier(&format!("{}Material", BASE), other),
            Err(ProcessorError::Conflict(_))
        ));
    }

    #[test]
    fn test_term_serialization() {
        let vocabulary = sample();
        let json = serde_json::to_value(&vocabulary.classes[&format!("{}DRAM", BASE)]).unwrap();
        assert_eq!(json["@type"], "rdfs:Class");
        assert_eq!(json["rdfs:label"], "DRAM");
        assert_eq!(json["rdfs:subClassOf"][0], format!("{}Memory", BASE));

        let json =
            serde_json::to_value(&vocabulary.properties[&format!("{}unitWeight", BASE)]).unwrap();
        assert_eq!(json["rdfs:range"][0], "xsd:decimal");
        assert!(json.get("rdfs:comment").is_none());
    }
}
