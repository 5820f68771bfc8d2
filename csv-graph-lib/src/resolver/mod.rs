//! Symbolic references such as `$Class.Name` and their resolution against a
//! row and the graph built so far.

use crate::error::ProcessorError;
use crate::mapping::ColumnMapping;
use crate::types::VocabularyMap;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Class,
    Property,
    Entity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    ID,
    Name,
    Description,
    Type,
    TargetClass,
    Value,
}

/// A parsed `$Entity.Field` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
    pub entity: EntityKind,
    pub field: Field,
}

impl Symbol {
    pub const CLASS_ID: Symbol = Symbol::new(EntityKind::Class, Field::ID);
    pub const CLASS_NAME: Symbol = Symbol::new(EntityKind::Class, Field::Name);
    pub const CLASS_DESCRIPTION: Symbol = Symbol::new(EntityKind::Class, Field::Description);
    pub const PROPERTY_ID: Symbol = Symbol::new(EntityKind::Property, Field::ID);
    pub const PROPERTY_NAME: Symbol = Symbol::new(EntityKind::Property, Field::Name);
    pub const PROPERTY_DESCRIPTION: Symbol =
        Symbol::new(EntityKind::Property, Field::Description);
    pub const PROPERTY_TYPE: Symbol = Symbol::new(EntityKind::Property, Field::Type);
    pub const PROPERTY_TARGET_CLASS: Symbol =
        Symbol::new(EntityKind::Property, Field::TargetClass);
    pub const PROPERTY_VALUE: Symbol = Symbol::new(EntityKind::Property, Field::Value);
    pub const ENTITY_ID: Symbol = Symbol::new(EntityKind::Entity, Field::ID);
    pub const ENTITY_TYPE: Symbol = Symbol::new(EntityKind::Entity, Field::Type);

    pub const fn new(entity: EntityKind, field: Field) -> Self {
        Self { entity, field }
    }

    fn is_valid(&self) -> bool {
        match self.entity {
            EntityKind::Class => matches!(self.field, Field::ID | Field::Name | Field::Description),
            EntityKind::Property => true,
            EntityKind::Entity => matches!(self.field, Field::ID | Field::Type),
        }
    }
}

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\$(Class|Property|Entity)\.(ID|Name|Description|Type|TargetClass|Value)$")
            .expect("symbol pattern is a valid regex")
    })
}

impl FromStr for Symbol {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "@id" {
            return Ok(Symbol::ENTITY_ID);
        }
        let captures = symbol_pattern().captures(s).ok_or_else(|| {
            ProcessorError::InvalidManifest(format!(
                "'{}' is not a valid reference. Expected the form $Class.ID, $Property.Name, $Entity.ID, ...",
                s
            ))
        })?;

        let entity = match &captures[1] {
            "Class" => EntityKind::Class,
            "Property" => EntityKind::Property,
            _ => EntityKind::Entity,
        };
        let field = match &captures[2] {
            "ID" => Field::ID,
            "Name" => Field::Name,
            "Description" => Field::Description,
            "Type" => Field::Type,
            "TargetClass" => Field::TargetClass,
            _ => Field::Value,
        };

        let symbol = Symbol::new(entity, field);
        if !symbol.is_valid() {
            return Err(ProcessorError::InvalidManifest(format!(
                "'{}' is not a valid reference: {:?} has no {:?} field",
                s, entity, field
            )));
        }
        Ok(symbol)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:?}.{:?}", self.entity, self.field)
    }
}

/// Resolves symbols for one row: from the row's mapped columns first, then
/// from the vocabulary built by earlier rows and steps.
pub struct IdentifierResolver<'a> {
    mapping: &'a ColumnMapping,
    vocabulary: &'a VocabularyMap,
    model_base_iri: &'a str,
}

impl<'a> IdentifierResolver<'a> {
    pub fn new(
        mapping: &'a ColumnMapping,
        vocabulary: &'a VocabularyMap,
        model_base_iri: &'a str,
    ) -> Self {
        Self {
            mapping,
            vocabulary,
            model_base_iri,
        }
    }

    /// The trimmed, non-empty cell mapped to `symbol`.
    pub fn from_row(&self, symbol: &Symbol, row: &[String]) -> Option<String> {
        self.mapping
            .slot(symbol)
            .and_then(|index| row.get(index))
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
            .map(str::to_string)
    }

    pub fn resolve(&self, symbol: &Symbol, row: &[String]) -> Option<String> {
        self.from_row(symbol, row)
            .or_else(|| self.from_vocabulary(symbol, row))
    }

    fn from_vocabulary(&self, symbol: &Symbol, row: &[String]) -> Option<String> {
        let base = self.model_base_iri;
        match symbol.entity {
            EntityKind::Class => {
                let term = self
                    .from_row(&Symbol::CLASS_ID, row)
                    .and_then(|id| self.vocabulary.find_class(&id, base))
                    .or_else(|| {
                        self.from_row(&Symbol::CLASS_NAME, row)
                            .and_then(|name| self.vocabulary.find_class(&name, base))
                    })?;
                match symbol.field {
                    Field::ID => Some(term.id.final_id().to_string()),
                    Field::Name => term.label.clone(),
                    Field::Description => term.comment.clone(),
                    _ => None,
                }
            }
            EntityKind::Property => {
                let term = self
                    .from_row(&Symbol::PROPERTY_ID, row)
                    .and_then(|id| self.vocabulary.find_property(&id, base))
                    .or_else(|| {
                        self.from_row(&Symbol::PROPERTY_NAME, row)
                            .and_then(|name| self.vocabulary.find_property(&name, base))
                    })?;
                match symbol.field {
                    Field::ID => Some(term.id.final_id().to_string()),
                    Field::Name => term.label.clone(),
                    Field::Description => term.comment.clone(),
                    _ => None,
                }
            }
            EntityKind::Entity => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IdOpt, TermKind, VocabularyTerm};

    #[test]
    fn test_symbol_parsing() {
        assert_eq!(Symbol::from_str("$Class.ID").unwrap(), Symbol::CLASS_ID);
        assert_eq!(
            Symbol::from_str(" $Property.TargetClass ").unwrap(),
            Symbol::PROPERTY_TARGET_CLASS
        );
        assert_eq!(Symbol::from_str("@id").unwrap(), Symbol::ENTITY_ID);
        assert_eq!(Symbol::CLASS_NAME.to_string(), "$Class.Name");

        assert!(Symbol::from_str("Class.ID").is_err());
        assert!(Symbol::from_str("$Class.Type").is_err());
        assert!(Symbol::from_str("$Entity.Name").is_err());
        assert!(Symbol::from_str("$Thing.ID").is_err());
    }

    #[test]
    fn test_resolution_falls_back_to_vocabulary() {
        let base = "https://example.com/model/";
        let mut vocabulary = VocabularyMap::new();
        let mut term = VocabularyTerm::new(
            TermKind::Class,
            format!("{}DRAM", base),
            IdOpt::String("DRAM".into()),
        );
        term.label = Some("Dynamic RAM".into());
        vocabulary.upsert_class(term).unwrap();

        let mapping = ColumnMapping::for_slots(
            vec!["Class ID".into(), "Class Name".into()],
            &[(Symbol::CLASS_ID, 0), (Symbol::CLASS_NAME, 1)],
        );
        let resolver = IdentifierResolver::new(&mapping, &vocabulary, base);

        let row = vec!["DRAM".to_string(), "".to_string()];
        assert_eq!(
            resolver.resolve(&Symbol::CLASS_NAME, &row).as_deref(),
            Some("Dynamic RAM")
        );

        let row = vec!["DRAM".to_string(), "Memory chip".to_string()];
        assert_eq!(
            resolver.resolve(&Symbol::CLASS_NAME, &row).as_deref(),
            Some("Memory chip")
        );

        let row = vec!["SRAM".to_string(), "".to_string()];
        assert_eq!(resolver.resolve(&Symbol::CLASS_NAME, &row), None);
    }
}
