use std::collections::BTreeMap;
use std::str::FromStr;

use super::{class_iri, class_reference_iri, property_iri};
use crate::error::ProcessorError;
use crate::manifest::{ModelStep, StepType};
use crate::mapping::{ColumnInference, ColumnMapper, ColumnMapping, ColumnTarget, SlotDefault};
use crate::processor::{StepContext, StepHandler};
use crate::resolver::{IdentifierResolver, Symbol};
use crate::source::Table;
use crate::types::{IdOpt, OnEntity, PropertyDatatype, TermKind, VocabularyTerm};
use crate::utils::to_camel_case;

/// Columns without a rule become camelCase attributes of the row's primary term.
struct AttributeInference {
    on: OnEntity,
}

impl ColumnInference for AttributeInference {
    fn infer(&mut self, column: &str) -> Result<ColumnTarget, ProcessorError> {
        Ok(ColumnTarget::Attribute {
            key: to_camel_case(column),
            on: self.on,
        })
    }
}

fn parse_replacement(value: &Option<String>) -> Result<Option<Symbol>, ProcessorError> {
    value.as_deref().map(Symbol::from_str).transpose()
}

fn attributes(mapping: &ColumnMapping, row: &[String], on: OnEntity) -> BTreeMap<String, String> {
    mapping
        .targets()
        .filter_map(|(index, _, target)| match target {
            ColumnTarget::Attribute { key, on: target_on } if *target_on == on => {
                let value = row.get(index)?.trim();
                (!value.is_empty()).then(|| (key.clone(), value.to_string()))
            }
            _ => None,
        })
        .collect()
}

/// The id a row declares for `id_symbol`, optionally replaced by the value of
/// `replacement`. The original id stays as an alias.
fn declared_id(
    resolver: &IdentifierResolver<'_>,
    row: &[String],
    id_symbol: Symbol,
    replacement: Option<Symbol>,
) -> Option<IdOpt> {
    let original = resolver.from_row(&id_symbol, row);
    let replacement = replacement.and_then(|symbol| resolver.resolve(&symbol, row));
    match (original, replacement) {
        (Some(original_id), Some(replacement_id)) if original_id != replacement_id => {
            Some(IdOpt::ReplacementMap {
                original_id,
                replacement_id,
            })
        }
        (Some(id), _) | (None, Some(id)) => Some(IdOpt::String(id)),
        (None, None) => None,
    }
}

/// Read the class declared by a row without touching the graph.
fn read_class_row(
    ctx: &StepContext<'_>,
    mapping: &ColumnMapping,
    table: &Table,
    row_index: usize,
    row: &[String],
    replacement: Option<Symbol>,
) -> Result<VocabularyTerm, ProcessorError> {
    let resolver = IdentifierResolver::new(mapping, ctx.graph.vocabulary(), ctx.model_base_iri);
    let id = declared_id(&resolver, row, Symbol::CLASS_ID, replacement)
        .ok_or_else(|| ctx.missing_identity(table, row_index, "$Class.ID"))?;

    let mut term = VocabularyTerm::new(
        TermKind::Class,
        class_iri(ctx.model_base_iri, id.final_id()),
        id,
    );
    term.label = resolver.from_row(&Symbol::CLASS_NAME, row);
    term.comment = resolver.from_row(&Symbol::CLASS_DESCRIPTION, row);
    term.extra_items = attributes(mapping, row, OnEntity::Class);
    Ok(term)
}

struct PropertyRow {
    term: VocabularyTerm,
    is_identifier: bool,
    datatype_warning: Option<String>,
}

/// Read the property declared by a row without touching the graph. Returns
/// `None` for rows that declare no property.
fn read_property_row(
    ctx: &StepContext<'_>,
    mapping: &ColumnMapping,
    row: &[String],
    replacement: Option<Symbol>,
) -> Result<Option<PropertyRow>, ProcessorError> {
    let vocabulary = ctx.graph.vocabulary();
    let resolver = IdentifierResolver::new(mapping, vocabulary, ctx.model_base_iri);
    let id = match declared_id(&resolver, row, Symbol::PROPERTY_ID, replacement) {
        Some(id) => id,
        None => return Ok(None),
    };

    let raw_type = resolver
        .from_row(&Symbol::PROPERTY_TYPE, row)
        .unwrap_or_default();
    let (datatype, datatype_warning) = match PropertyDatatype::from_str(&raw_type) {
        Ok(datatype) => (datatype, None),
        Err(e) if !ctx.config.strict => (
            PropertyDatatype::String,
            Some(format!("{} (property '{}'), using String", e, id.final_id())),
        ),
        Err(e) => return Err(e),
    };

    let target_class = resolver
        .from_row(&Symbol::PROPERTY_TARGET_CLASS, row)
        .map(|target| class_reference_iri(vocabulary, ctx.model_base_iri, &target));

    let is_identifier = datatype == PropertyDatatype::ID;
    let range = match (target_class, datatype) {
        (_, PropertyDatatype::ID) => PropertyDatatype::String,
        (Some(target), _) => PropertyDatatype::URI(Some(target)),
        (None, datatype) => datatype,
    };

    let mut term = VocabularyTerm::new(
        TermKind::Property,
        property_iri(ctx.model_base_iri, id.final_id()),
        id,
    );
    term.label = resolver.from_row(&Symbol::PROPERTY_NAME, row);
    term.comment = resolver.from_row(&Symbol::PROPERTY_DESCRIPTION, row);
    term.range = vec![range];
    term.extra_items = attributes(mapping, row, OnEntity::Property);

    Ok(Some(PropertyRow {
        term,
        is_identifier,
        datatype_warning,
    }))
}

fn commit_property_row(
    ctx: &mut StepContext<'_>,
    property: PropertyRow,
    domain: Option<&str>,
) -> Result<(), ProcessorError> {
    let PropertyRow {
        mut term,
        is_identifier,
        datatype_warning,
    } = property;
    if let Some(warning) = datatype_warning {
        ctx.warn(warning);
    }

    if is_identifier {
        let class = domain.ok_or_else(|| {
            ProcessorError::Resolution(format!(
                "Identifier property '{}' is not attached to a class",
                term.iri
            ))
        })?;
        tracing::debug!("Identifier for {}: {}", class, term.iri);
        return ctx.graph.set_identifier(class, term);
    }

    if let Some(class) = domain {
        term.domain = vec![class.to_string()];
    }
    ctx.graph.upsert_property(term)
}

pub(crate) struct BasicVocabularyHandler;

impl StepHandler for BasicVocabularyHandler {
    fn step_type(&self) -> StepType {
        StepType::ModelStep(ModelStep::BasicVocabularyStep)
    }

    fn apply(&self, ctx: &mut StepContext<'_>, table: &Table) -> Result<(), ProcessorError> {
        let step = ctx.step;
        let replace_class = parse_replacement(&step.replace_class_id_with)?;
        let replace_property = parse_replacement(&step.replace_property_id_with)?;
        let class_id = match replace_class {
            Some(_) => SlotDefault::optional(Symbol::CLASS_ID, "Class ID"),
            None => SlotDefault::required(Symbol::CLASS_ID, "Class ID"),
        };
        let property_id = match replace_property {
            Some(_) => SlotDefault::optional(Symbol::PROPERTY_ID, "Property ID"),
            None => SlotDefault::required(Symbol::PROPERTY_ID, "Property ID"),
        };
        let defaults = [
            class_id,
            SlotDefault::optional(Symbol::CLASS_NAME, "Class Name"),
            SlotDefault::optional(Symbol::CLASS_DESCRIPTION, "Class Description"),
            property_id,
            SlotDefault::optional(Symbol::PROPERTY_NAME, "Property Name"),
            SlotDefault::optional(Symbol::PROPERTY_DESCRIPTION, "Property Description"),
            SlotDefault::optional(Symbol::PROPERTY_TYPE, "Type"),
            SlotDefault::optional(Symbol::PROPERTY_TARGET_CLASS, "Class Range"),
        ];
        let mapping = ColumnMapper::new(step, &table.headers).map(
            &defaults,
            &mut AttributeInference {
                on: OnEntity::Property,
            },
        )?;

        ctx.for_each_row(table, &mapping, |ctx, row_index, row| {
            let class = read_class_row(ctx, &mapping, table, row_index, row, replace_class)?;
            let property = read_property_row(ctx, &mapping, row, replace_property)?;

            let class_iri = class.iri.clone();
            ctx.graph.upsert_class(class)?;
            if let Some(property) = property {
                commit_property_row(ctx, property, Some(&class_iri))?;
            }
            Ok(())
        })
    }
}

pub(crate) struct SubClassVocabularyHandler;

impl StepHandler for SubClassVocabularyHandler {
    fn step_type(&self) -> StepType {
        StepType::ModelStep(ModelStep::SubClassVocabularyStep)
    }

    fn apply(&self, ctx: &mut StepContext<'_>, table: &Table) -> Result<(), ProcessorError> {
        let step = ctx.step;
        let replace_class = parse_replacement(&step.replace_class_id_with)?;
        let parents: Vec<String> = step
            .sub_class_of
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|parent| class_reference_iri(ctx.graph.vocabulary(), ctx.model_base_iri, parent))
            .collect();
        if parents.is_empty() {
            return Err(ProcessorError::InvalidManifest(format!(
                "Step '{}': SubClassVocabularyStep requires subClassOf field",
                step.path
            )));
        }

        let class_id = match replace_class {
            Some(_) => SlotDefault::optional(Symbol::CLASS_ID, "Class ID"),
            None => SlotDefault::required(Symbol::CLASS_ID, "Class ID"),
        };
        let defaults = [
            class_id,
            SlotDefault::optional(Symbol::CLASS_NAME, "Class Name"),
            SlotDefault::optional(Symbol::CLASS_DESCRIPTION, "Class Description"),
        ];
        let mapping = ColumnMapper::new(step, &table.headers)
            .map(&defaults, &mut AttributeInference { on: OnEntity::Class })?;

        tracing::debug!("Declaring subclasses of {:?}", parents);
        ctx.for_each_row(table, &mapping, |ctx, row_index, row| {
            let mut class = read_class_row(ctx, &mapping, table, row_index, row, replace_class)?;
            class.sub_class_of = parents.clone();
            ctx.graph.upsert_class(class)
        })
    }
}

pub(crate) struct PropertiesVocabularyHandler;

impl StepHandler for PropertiesVocabularyHandler {
    fn step_type(&self) -> StepType {
        StepType::ModelStep(ModelStep::PropertiesVocabularyStep)
    }

    fn apply(&self, ctx: &mut StepContext<'_>, table: &Table) -> Result<(), ProcessorError> {
        let step = ctx.step;
        let replace_property = parse_replacement(&step.replace_property_id_with)?;
        let property_id = match replace_property {
            Some(_) => SlotDefault::optional(Symbol::PROPERTY_ID, "Property ID"),
            None => SlotDefault::required(Symbol::PROPERTY_ID, "Property ID"),
        };
        let defaults = [
            SlotDefault::optional(Symbol::CLASS_ID, "Class ID"),
            property_id,
            SlotDefault::optional(Symbol::PROPERTY_NAME, "Property Name"),
            SlotDefault::optional(Symbol::PROPERTY_DESCRIPTION, "Property Description"),
            SlotDefault::optional(Symbol::PROPERTY_TYPE, "Type"),
            SlotDefault::optional(Symbol::PROPERTY_TARGET_CLASS, "Class Range"),
        ];
        let mapping = ColumnMapper::new(step, &table.headers).map(
            &defaults,
            &mut AttributeInference {
                on: OnEntity::Property,
            },
        )?;

        ctx.for_each_row(table, &mapping, |ctx, row_index, row| {
            let property = read_property_row(ctx, &mapping, row, replace_property)?
                .ok_or_else(|| ctx.missing_identity(table, row_index, "$Property.ID"))?;

            let resolver =
                IdentifierResolver::new(&mapping, ctx.graph.vocabulary(), ctx.model_base_iri);
            let domain = resolver.from_row(&Symbol::CLASS_ID, row).map(|class_id| {
                match ctx.graph.vocabulary().find_class(&class_id, ctx.model_base_iri) {
                    Some(term) => (term.iri.clone(), None),
                    None => {
                        let iri = class_iri(ctx.model_base_iri, &class_id);
                        let term =
                            VocabularyTerm::new(TermKind::Class, iri.clone(), IdOpt::String(class_id));
                        (iri, Some(term))
                    }
                }
            });

            let domain_iri = match domain {
                Some((iri, new_class)) => {
                    if let Some(term) = new_class {
                        tracing::debug!("Declaring domain class {} from property row", iri);
                        ctx.graph.upsert_class(term)?;
                    }
                    Some(iri)
                }
                None => None,
            };
            commit_property_row(ctx, property, domain_iri.as_deref())
        })
    }
}
