mod pivot;
pub mod serializer;
mod value_processor;

use crate::error::ProcessorError;
use crate::manifest::{ImportStep, InstanceStep, StepType};
use crate::mapping::{
    ColumnInference, ColumnMapper, ColumnMapping, ColumnTarget, PropertyBinding, SlotDefault,
};
use crate::processor::{StepContext, StepHandler};
use crate::resolver::{IdentifierResolver, Symbol};
use crate::source::Table;
use crate::types::{InstanceValue, JsonLdInstance, PivotColumn, VocabularyMap, VocabularyTerm};
use crate::utils::{expand_iri_with_base, local_name, to_kebab_case};
use pivot::PivotPlan;
use serde_json::Value as JsonValue;
use std::str::FromStr;
use value_processor::{cell_values, ValueProcessor};

/// IRI of the entity of class `class_iri` keyed by `key`. Entities live in the
/// namespace of the class that declares their identifier, so subclass instances
/// and references share one IRI space. The key is percent-encoded as a single
/// path segment, so distinct keys always give distinct IRIs.
pub(crate) fn entity_iri(
    vocabulary: &VocabularyMap,
    instances_base_iri: &str,
    class_iri: &str,
    key: &str,
) -> String {
    let namespace = vocabulary
        .identifier_for(class_iri)
        .map_or(class_iri, |(owner, _)| owner);
    let collection = expand_iri_with_base(
        instances_base_iri,
        &format!("{}/", to_kebab_case(local_name(namespace))),
    );
    format!("{}{}", collection, urlencoding::encode(key.trim()))
}

fn resolve_instance_type<'v>(
    vocabulary: &'v VocabularyMap,
    model_base_iri: &str,
    step: &ImportStep,
) -> Result<&'v VocabularyTerm, ProcessorError> {
    vocabulary
        .find_class(&step.instance_type, model_base_iri)
        .ok_or_else(|| {
            ProcessorError::Resolution(format!(
                "instanceType '{}' is not a declared class",
                step.instance_type
            ))
        })
}

/// Default `$Entity.ID` slot: the header naming the class's identifier
/// property, or an `@id` column.
fn entity_id_default(
    vocabulary: &VocabularyMap,
    class_iri: &str,
    step: &ImportStep,
    headers: &[String],
) -> Result<SlotDefault, ProcessorError> {
    if let Some((_, identifier)) = vocabulary.identifier_for(class_iri) {
        let column = headers
            .iter()
            .find(|h| identifier.label.as_deref() == Some(h.as_str()) || identifier.id.matches(h))
            .cloned()
            .unwrap_or_else(|| identifier.display_label().to_string());
        return Ok(SlotDefault::required(Symbol::ENTITY_ID, column));
    }

    let overridden = step
        .overrides
        .iter()
        .any(|o| Symbol::from_str(&o.map_to).ok() == Some(Symbol::ENTITY_ID));
    if overridden || headers.iter().any(|h| h == "@id") {
        return Ok(SlotDefault::required(Symbol::ENTITY_ID, "@id"));
    }
    Err(ProcessorError::Resolution(format!(
        "No identifier property found for class '{}'. Declare a property of type @id for it, or map a column to $Entity.ID",
        class_iri
    )))
}

/// Matches instance columns to declared properties: first those related to
/// the instance class, then the whole vocabulary.
struct InstancePropertyInference<'v> {
    vocabulary: &'v VocabularyMap,
    class_iri: &'v str,
    model_base_iri: &'v str,
    strict: bool,
    warnings: Vec<String>,
}

impl<'v> InstancePropertyInference<'v> {
    fn new(
        vocabulary: &'v VocabularyMap,
        class_iri: &'v str,
        model_base_iri: &'v str,
        strict: bool,
    ) -> Self {
        Self {
            vocabulary,
            class_iri,
            model_base_iri,
            strict,
            warnings: Vec::new(),
        }
    }

    fn lookup(&mut self, class_iri: &str, reference: &str) -> Option<&'v VocabularyTerm> {
        let vocabulary = self.vocabulary;
        let related = vocabulary.properties_for_class(class_iri);
        if let Some(term) =
            vocabulary.find_property_in(related.iter().copied(), reference, self.model_base_iri)
        {
            return Some(term);
        }
        let term = vocabulary.find_property(reference, self.model_base_iri)?;
        self.warnings.push(format!(
            "Column '{}' matched property '{}', which is not declared on class '{}'",
            reference, term.iri, class_iri
        ));
        Some(term)
    }

    fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}

fn binding(term: &VocabularyTerm) -> PropertyBinding {
    PropertyBinding {
        iri: term.iri.clone(),
        datatype: term.datatype(),
    }
}

impl ColumnInference for InstancePropertyInference<'_> {
    fn infer(&mut self, column: &str) -> Result<ColumnTarget, ProcessorError> {
        let class_iri = self.class_iri;
        if let Some(term) = self.lookup(class_iri, column) {
            return Ok(ColumnTarget::Property(binding(term)));
        }
        let message = format!(
            "Column '{}' does not correspond to any property defined in the vocabulary for class '{}'",
            column, class_iri
        );
        if self.strict {
            return Err(ProcessorError::Resolution(message));
        }
        self.warnings.push(format!("{}, ignoring it", message));
        Ok(ColumnTarget::Ignored)
    }

    fn pivot_property(
        &mut self,
        pivot: &PivotColumn,
        column: &str,
    ) -> Result<PropertyBinding, ProcessorError> {
        let vocabulary = self.vocabulary;
        let class = vocabulary
            .find_class(&pivot.instance_type, self.model_base_iri)
            .ok_or_else(|| {
                ProcessorError::Resolution(format!(
                    "Pivot instanceType '{}' is not a declared class",
                    pivot.instance_type
                ))
            })?;
        self.lookup(&class.iri, column).map(binding).ok_or_else(|| {
            ProcessorError::Resolution(format!(
                "Pivot column '{}' does not correspond to any property of class '{}'",
                column, class.iri
            ))
        })
    }
}

/// What an entity step resolves once before reading rows.
struct EntityPlan {
    kind: InstanceStep,
    class_iri: String,
    identifier_iri: Option<String>,
    pivots: Vec<PivotPlan>,
}

/// One row's entity and pivot children, built without touching the graph.
struct EntityRow {
    entity: JsonLdInstance,
    children: Vec<JsonLdInstance>,
    warnings: Vec<String>,
}

fn read_entity_row(
    ctx: &StepContext<'_>,
    plan: &EntityPlan,
    mapping: &ColumnMapping,
    table: &Table,
    row_index: usize,
    row: &[String],
) -> Result<EntityRow, ProcessorError> {
    let vocabulary = ctx.graph.vocabulary();
    let resolver = IdentifierResolver::new(mapping, vocabulary, ctx.model_base_iri);
    let key = resolver
        .from_row(&Symbol::ENTITY_ID, row)
        .ok_or_else(|| ctx.missing_identity(table, row_index, "$Entity.ID"))?;

    let type_iri = match (plan.kind, resolver.from_row(&Symbol::ENTITY_TYPE, row)) {
        (InstanceStep::SubClassInstanceStep, Some(type_ref)) => {
            let class = vocabulary
                .find_class(&type_ref, ctx.model_base_iri)
                .ok_or_else(|| {
                    ProcessorError::Resolution(format!(
                        "Row {}: '{}' is not a declared class",
                        row_index, type_ref
                    ))
                })?;
            if !vocabulary.is_subclass_of(&class.iri, &plan.class_iri) {
                return Err(ProcessorError::Resolution(format!(
                    "Row {}: class '{}' is not a subclass of '{}'",
                    row_index, class.iri, plan.class_iri
                )));
            }
            class.iri.clone()
        }
        _ => plan.class_iri.clone(),
    };

    let iri = entity_iri(vocabulary, ctx.instances_base_iri, &type_iri, &key);
    let mut entity = JsonLdInstance::new(iri, type_iri);
    if let Some(identifier) = &plan.identifier_iri {
        entity.push_value(identifier, InstanceValue::Literal(JsonValue::String(key)));
    }

    let values = ValueProcessor::new(vocabulary, ctx.instances_base_iri, ctx.config.strict);
    let delimiter = ctx.step.delimit_values_on.as_deref();
    let mut warnings = Vec::new();
    for (index, column, target) in mapping.targets() {
        let cell = row.get(index).map_or("", String::as_str);
        match target {
            ColumnTarget::Property(binding) => {
                for value in cell_values(cell, delimiter) {
                    let value =
                        values.process_value(value, binding, column, row_index, &mut warnings)?;
                    entity.push_value(&binding.iri, value);
                }
            }
            ColumnTarget::Label if !cell.trim().is_empty() => {
                entity.set_label(cell.trim())?;
            }
            _ => {}
        }
    }

    let children = pivot::expand_row(
        &plan.pivots,
        mapping,
        &values,
        &mut entity,
        &ctx.step.path,
        row_index,
        row,
        &mut warnings,
    )?;

    Ok(EntityRow {
        entity,
        children,
        warnings,
    })
}

/// Creates one entity per row: `BasicInstanceStep` types it with the step's
/// `instanceType`, `SubClassInstanceStep` with the class named in the
/// `subClassProperty` column.
pub(crate) struct EntityStepHandler {
    kind: InstanceStep,
}

impl EntityStepHandler {
    pub fn new(kind: InstanceStep) -> Self {
        Self { kind }
    }

    fn plan_and_map(
        &self,
        ctx: &mut StepContext<'_>,
        table: &Table,
    ) -> Result<(EntityPlan, ColumnMapping), ProcessorError> {
        let step = ctx.step;
        let vocabulary = ctx.graph.vocabulary();
        let class = resolve_instance_type(vocabulary, ctx.model_base_iri, step)?;
        let class_iri = class.iri.clone();

        let mut defaults = vec![entity_id_default(
            vocabulary,
            &class_iri,
            step,
            &table.headers,
        )?];
        if self.kind == InstanceStep::SubClassInstanceStep {
            let column = step.sub_class_property.clone().ok_or_else(|| {
                ProcessorError::InvalidManifest(format!(
                    "Step '{}': SubClassInstanceStep requires subClassProperty field",
                    step.path
                ))
            })?;
            defaults.push(SlotDefault::required(Symbol::ENTITY_TYPE, column));
        }

        let pivots = pivot::resolve_pivots(vocabulary, ctx.model_base_iri, step)?;
        let mut inference = InstancePropertyInference::new(
            vocabulary,
            &class_iri,
            ctx.model_base_iri,
            ctx.config.strict,
        );
        let mapping = ColumnMapper::new(step, &table.headers).map(&defaults, &mut inference)?;
        let warnings = inference.into_warnings();

        let plan = EntityPlan {
            kind: self.kind,
            identifier_iri: vocabulary
                .identifier_for(&class_iri)
                .map(|(_, identifier)| identifier.iri.clone()),
            class_iri,
            pivots,
        };
        for warning in warnings {
            ctx.warn(warning);
        }
        Ok((plan, mapping))
    }
}

impl StepHandler for EntityStepHandler {
    fn step_type(&self) -> StepType {
        StepType::InstanceStep(self.kind)
    }

    fn apply(&self, ctx: &mut StepContext<'_>, table: &Table) -> Result<(), ProcessorError> {
        let (plan, mapping) = self.plan_and_map(ctx, table)?;
        tracing::debug!(
            "{:?}: {} rows of {} from {}",
            self.kind,
            table.rows.len(),
            plan.class_iri,
            ctx.step.path
        );

        ctx.for_each_row(table, &mapping, |ctx, row_index, row| {
            let EntityRow {
                entity,
                children,
                warnings,
            } = read_entity_row(ctx, &plan, &mapping, table, row_index, row)?;
            for warning in warnings {
                ctx.warn(warning);
            }
            ctx.graph.upsert_instance(entity)?;
            for child in children {
                ctx.graph.upsert_instance(child)?;
            }
            Ok(())
        })
    }
}

/// Attaches one property value per row to an entity created by an earlier step.
pub(crate) struct PropertiesInstanceHandler;

impl StepHandler for PropertiesInstanceHandler {
    fn step_type(&self) -> StepType {
        StepType::InstanceStep(InstanceStep::PropertiesInstanceStep)
    }

    fn apply(&self, ctx: &mut StepContext<'_>, table: &Table) -> Result<(), ProcessorError> {
        let step = ctx.step;
        let vocabulary = ctx.graph.vocabulary();
        let class_iri = resolve_instance_type(vocabulary, ctx.model_base_iri, step)?
            .iri
            .clone();
        let defaults = [
            entity_id_default(vocabulary, &class_iri, step, &table.headers)?,
            SlotDefault::required(Symbol::PROPERTY_ID, "Property ID"),
            SlotDefault::required(Symbol::PROPERTY_VALUE, "Property Value"),
        ];
        let mut inference = InstancePropertyInference::new(
            vocabulary,
            &class_iri,
            ctx.model_base_iri,
            ctx.config.strict,
        );
        let mapping = ColumnMapper::new(step, &table.headers).map(&defaults, &mut inference)?;
        for warning in inference.into_warnings() {
            ctx.warn(warning);
        }

        ctx.for_each_row(table, &mapping, |ctx, row_index, row| {
            let vocabulary = ctx.graph.vocabulary();
            let resolver = IdentifierResolver::new(&mapping, vocabulary, ctx.model_base_iri);
            let key = resolver
                .from_row(&Symbol::ENTITY_ID, row)
                .ok_or_else(|| ctx.missing_identity(table, row_index, "$Entity.ID"))?;
            let property_ref = resolver
                .from_row(&Symbol::PROPERTY_ID, row)
                .ok_or_else(|| ctx.missing_identity(table, row_index, "$Property.ID"))?;

            let entity = entity_iri(vocabulary, ctx.instances_base_iri, &class_iri, &key);
            if ctx.graph.instance(&entity).is_none() {
                return Err(ProcessorError::Resolution(format!(
                    "Row {}: entity '{}' does not exist",
                    row_index, entity
                )));
            }

            let mut lookup =
                InstancePropertyInference::new(vocabulary, &class_iri, ctx.model_base_iri, true);
            let property = lookup.lookup(&class_iri, &property_ref).ok_or_else(|| {
                ProcessorError::Resolution(format!(
                    "Row {}: property '{}' is not declared",
                    row_index, property_ref
                ))
            })?;
            let property = binding(property);
            let mut warnings = lookup.into_warnings();

            let cell = mapping
                .slot(&Symbol::PROPERTY_VALUE)
                .and_then(|index| row.get(index))
                .map_or("", String::as_str);
            let values = ValueProcessor::new(vocabulary, ctx.instances_base_iri, ctx.config.strict);
            let mut attached = Vec::new();
            for value in cell_values(cell, step.delimit_values_on.as_deref()) {
                attached.push(values.process_value(
                    value,
                    &property,
                    &property_ref,
                    row_index,
                    &mut warnings,
                )?);
            }

            for warning in warnings {
                ctx.warn(warning);
            }
            for value in attached {
                ctx.graph.attach_value(&entity, &property.iri, value)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingState;
    use crate::graph::GraphState;
    use crate::processor::{CancellationFlag, ProcessorConfig};
    use crate::types::{ColumnOverride, IdOpt, PropertyDatatype, TermKind};

    const MODEL: &str = "https://example.com/model/";
    const DATA: &str = "https://example.com/data/";

    fn class(local: &str, parent: Option<&str>) -> VocabularyTerm {
        let mut term = VocabularyTerm::new(
            TermKind::Class,
            format!("{}{}", MODEL, local),
            IdOpt::String(local.into()),
        );
        term.sub_class_of = parent.map(|p| format!("{}{}", MODEL, p)).into_iter().collect();
        term
    }

    fn property(local: &str, label: &str, domain: &str, range: PropertyDatatype) -> VocabularyTerm {
        let mut term = VocabularyTerm::new(
            TermKind::Property,
            format!("{}{}", MODEL, local),
            IdOpt::String(label.into()),
        );
        term.label = Some(label.into());
        term.domain = vec![format!("{}{}", MODEL, domain)];
        term.range = vec![range];
        term
    }

    fn fixture_graph() -> GraphState {
        let mut graph = GraphState::new();
        graph.upsert_class(class("Material", None)).unwrap();
        graph.upsert_class(class("DRAM", Some("Material"))).unwrap();
        graph.upsert_class(class("BillOfMaterials", None)).unwrap();
        graph.upsert_class(class("BillOfMaterialsItem", None)).unwrap();
        graph
            .set_identifier(
                &format!("{}Material", MODEL),
                property("materialNumber", "Material Number", "Material", PropertyDatatype::String),
            )
            .unwrap();
        graph
            .set_identifier(
                &format!("{}BillOfMaterials", MODEL),
                property("bomNumber", "BOM Number", "BillOfMaterials", PropertyDatatype::String),
            )
            .unwrap();
        graph
            .upsert_property(property(
                "unitWeight",
                "Unit Weight",
                "Material",
                PropertyDatatype::Decimal,
            ))
            .unwrap();
        graph
            .upsert_property(property(
                "leadTime",
                "Lead Time",
                "Material",
                PropertyDatatype::Integer,
            ))
            .unwrap();
        graph
            .upsert_property(property(
                "hasItems",
                "hasItems",
                "BillOfMaterials",
                PropertyDatatype::URI(Some(format!("{}BillOfMaterialsItem", MODEL))),
            ))
            .unwrap();
        graph
            .upsert_property(property(
                "quantity",
                "quantity",
                "BillOfMaterialsItem",
                PropertyDatatype::Integer,
            ))
            .unwrap();
        graph
            .upsert_property(property(
                "hasMaterial",
                "has Material",
                "BillOfMaterialsItem",
                PropertyDatatype::URI(Some(format!("{}Material", MODEL))),
            ))
            .unwrap();
        graph.enter_instances_phase();
        graph
    }

    fn run(
        handler: &dyn StepHandler,
        step: &ImportStep,
        graph: &mut GraphState,
        csv: &str,
        config: ProcessorConfig,
    ) -> Result<ProcessingState, ProcessorError> {
        let mut state = ProcessingState::new();
        let cancellation = CancellationFlag::new();
        let table = Table::from_csv_bytes(format!("instances/{}", step.path), csv.as_bytes())?;
        let mut ctx = StepContext {
            step,
            model_base_iri: MODEL,
            instances_base_iri: DATA,
            graph,
            processing_state: &mut state,
            config: &config,
            cancellation: &cancellation,
        };
        handler.apply(&mut ctx, &table)?;
        Ok(state)
    }

    fn material_step() -> ImportStep {
        let mut step = ImportStep::new(
            "Material.csv",
            vec![StepType::InstanceStep(InstanceStep::SubClassInstanceStep)],
        );
        step.instance_type = "Material".into();
        step.sub_class_property = Some("has Material Class".into());
        step.ignore = Some(vec!["Internal Notes".into()]);
        step
    }

    const MATERIALS: &str = "\
Material Number,has Material Class,Unit Weight,Internal Notes
M1,DRAM,0.25,check supplier
M2,,1.5,
";

    #[test]
    fn test_subclass_instances() {
        let mut graph = fixture_graph();
        let handler = EntityStepHandler::new(InstanceStep::SubClassInstanceStep);
        run(&handler, &material_step(), &mut graph, MATERIALS, ProcessorConfig::default())
            .unwrap();

        let m1 = graph.instance(&format!("{}material/M1", DATA)).unwrap();
        assert_eq!(m1.types, vec![format!("{}DRAM", MODEL)]);
        assert_eq!(
            m1.values(&format!("{}unitWeight", MODEL)),
            &[InstanceValue::Literal(serde_json::json!(0.25))]
        );
        assert_eq!(
            m1.values(&format!("{}materialNumber", MODEL)),
            &[InstanceValue::Literal(serde_json::json!("M1"))]
        );

        let m2 = graph.instance(&format!("{}material/M2", DATA)).unwrap();
        assert_eq!(m2.types, vec![format!("{}Material", MODEL)]);
    }

    #[test]
    fn test_keys_with_path_syntax_stay_distinct() {
        let mut graph = fixture_graph();
        let handler = EntityStepHandler::new(InstanceStep::BasicInstanceStep);
        let mut step = ImportStep::new(
            "Material.csv",
            vec![StepType::InstanceStep(InstanceStep::BasicInstanceStep)],
        );
        step.instance_type = "Material".into();
        let csv = "Material Number,Unit Weight\nM1,1\nx/../M1,2\n..,3\n.,4\nA#1?b,5\n";
        run(&handler, &step, &mut graph, csv, ProcessorConfig::default()).unwrap();

        let ids: Vec<&str> = graph.instances().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                format!("{}material/M1", DATA),
                format!("{}material/x%2F..%2FM1", DATA),
                format!("{}material/..", DATA),
                format!("{}material/.", DATA),
                format!("{}material/A%231%3Fb", DATA),
            ]
        );

        let vocabulary = graph.vocabulary();
        let material = format!("{}Material", MODEL);
        assert_eq!(
            entity_iri(vocabulary, DATA, &material, " x/../M1 "),
            format!("{}material/x%2F..%2FM1", DATA)
        );
    }

    #[test]
    fn test_ignored_columns_never_become_properties() {
        let mut graph = fixture_graph();
        let handler = EntityStepHandler::new(InstanceStep::SubClassInstanceStep);
        let state = run(&handler, &material_step(), &mut graph, MATERIALS, ProcessorConfig::default())
            .unwrap();
        assert!(!state.has_warnings());
        for instance in graph.instances() {
            assert!(instance
                .properties
                .keys()
                .all(|key| !key.to_lowercase().contains("notes")));
        }
    }

    #[test]
    fn test_subclass_outside_instance_type_fails() {
        let mut graph = fixture_graph();
        let handler = EntityStepHandler::new(InstanceStep::SubClassInstanceStep);
        let csv = "Material Number,has Material Class\nM1,BillOfMaterials\n";
        let error = run(&handler, &material_step(), &mut graph, csv, ProcessorConfig::default())
            .unwrap_err();
        assert!(matches!(error, ProcessorError::Resolution(_)));
    }

    #[test]
    fn test_unknown_instance_type_fails() {
        let mut graph = GraphState::new();
        let handler = EntityStepHandler::new(InstanceStep::SubClassInstanceStep);
        let error = run(&handler, &material_step(), &mut graph, MATERIALS, ProcessorConfig::default())
            .unwrap_err();
        assert!(matches!(error, ProcessorError::Resolution(_)));
    }

    #[test]
    fn test_unknown_columns() {
        let csv = "Material Number,Color\nM1,red\n";
        let mut step = material_step();
        step.types = vec![StepType::InstanceStep(InstanceStep::BasicInstanceStep)];
        step.ignore = None;
        let handler = EntityStepHandler::new(InstanceStep::BasicInstanceStep);

        let mut graph = fixture_graph();
        let state = run(&handler, &step, &mut graph, csv, ProcessorConfig::default()).unwrap();
        assert!(state.has_warnings());

        let mut graph = fixture_graph();
        let strict = ProcessorConfig {
            strict: true,
            ..Default::default()
        };
        let error = run(&handler, &step, &mut graph, csv, strict).unwrap_err();
        assert!(matches!(error, ProcessorError::Resolution(_)));
    }

    #[test]
    fn test_missing_identity_can_be_skipped() {
        let mut step = material_step();
        step.types = vec![StepType::InstanceStep(InstanceStep::BasicInstanceStep)];
        step.ignore = None;
        let handler = EntityStepHandler::new(InstanceStep::BasicInstanceStep);
        let csv = "Material Number,Unit Weight\n,1.0\nM2,2.0\n";

        let mut graph = fixture_graph();
        let error = run(&handler, &step, &mut graph, csv, ProcessorConfig::default()).unwrap_err();
        assert!(matches!(error, ProcessorError::SourceRead { row: Some(1), .. }));

        let mut graph = fixture_graph();
        let lenient = ProcessorConfig {
            skip_malformed_rows: true,
            ..Default::default()
        };
        let state = run(&handler, &step, &mut graph, csv, lenient).unwrap();
        assert!(state.has_warnings());
        assert_eq!(graph.instances().len(), 1);
    }

    fn bom_step() -> ImportStep {
        let mut step = ImportStep::new(
            "BillOfMaterials.csv",
            vec![StepType::InstanceStep(InstanceStep::BasicInstanceStep)],
        );
        step.instance_type = "BillOfMaterials".into();
        step.pivot_columns = Some(vec![PivotColumn {
            instance_type: "BillOfMaterialsItem".into(),
            new_relationship_property: "hasItems".into(),
            columns: vec!["quantity".into(), "has Material".into()],
        }]);
        step
    }

    #[test]
    fn test_pivot_creates_one_child_per_group() {
        let mut graph = fixture_graph();
        let handler = EntityStepHandler::new(InstanceStep::BasicInstanceStep);
        let csv = "BOM Number,quantity,has Material\nB1,4,M1\n";
        run(&handler, &bom_step(), &mut graph, csv, ProcessorConfig::default()).unwrap();

        let items: Vec<_> = graph
            .instances()
            .iter()
            .filter(|i| i.types == vec![format!("{}BillOfMaterialsItem", MODEL)])
            .collect();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].values(&format!("{}quantity", MODEL)),
            &[InstanceValue::Literal(serde_json::json!(4))]
        );
        assert_eq!(
            items[0].values(&format!("{}hasMaterial", MODEL)),
            &[InstanceValue::Reference(format!("{}material/M1", DATA))]
        );

        let bom = graph.instance(&format!("{}bill-of-materials/B1", DATA)).unwrap();
        let links = bom.values(&format!("{}hasItems", MODEL));
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].as_reference(), Some(items[0].id.as_str()));
    }

    #[test]
    fn test_repeated_pivot_groups_and_empty_groups() {
        let mut graph = fixture_graph();
        let handler = EntityStepHandler::new(InstanceStep::BasicInstanceStep);
        let csv = "\
BOM Number,quantity,has Material,quantity,has Material,quantity,has Material
B1,4,M1,2,M2,,
";
        run(&handler, &bom_step(), &mut graph, csv, ProcessorConfig::default()).unwrap();
        let bom = graph.instance(&format!("{}bill-of-materials/B1", DATA)).unwrap();
        assert_eq!(bom.values(&format!("{}hasItems", MODEL)).len(), 2);
        assert_eq!(graph.instances().len(), 3);
    }

    #[test]
    fn test_pivot_rerun_is_idempotent() {
        let mut graph = fixture_graph();
        let handler = EntityStepHandler::new(InstanceStep::BasicInstanceStep);
        let csv = "BOM Number,quantity,has Material\nB1,4,M1\nB1,1,M2\n";
        run(&handler, &bom_step(), &mut graph, csv, ProcessorConfig::default()).unwrap();
        let first = graph.instances().to_vec();
        run(&handler, &bom_step(), &mut graph, csv, ProcessorConfig::default()).unwrap();
        assert_eq!(graph.instances(), first.as_slice());
    }

    #[test]
    fn test_undeclared_relationship_property() {
        let mut graph = fixture_graph();
        let handler = EntityStepHandler::new(InstanceStep::BasicInstanceStep);
        let mut step = bom_step();
        if let Some(pivots) = step.pivot_columns.as_mut() {
            pivots[0].new_relationship_property = "hasLines".into();
        }
        let csv = "BOM Number,quantity,has Material\nB1,4,M1\n";
        let error = run(&handler, &step, &mut graph, csv, ProcessorConfig::default()).unwrap_err();
        assert!(matches!(error, ProcessorError::Resolution(_)));
    }

    fn attributes_step() -> ImportStep {
        let mut step = ImportStep::new(
            "MaterialAttributes.csv",
            vec![StepType::InstanceStep(InstanceStep::PropertiesInstanceStep)],
        );
        step.instance_type = "Material".into();
        step.overrides = vec![
            ColumnOverride {
                column: "Attribute".into(),
                map_to: "$Property.ID".into(),
            },
            ColumnOverride {
                column: "Value".into(),
                map_to: "$Property.Value".into(),
            },
        ];
        step
    }

    #[test]
    fn test_properties_instance_step() {
        let mut graph = fixture_graph();
        run(
            &EntityStepHandler::new(InstanceStep::SubClassInstanceStep),
            &material_step(),
            &mut graph,
            MATERIALS,
            ProcessorConfig::default(),
        )
        .unwrap();

        let csv = "Material Number,Attribute,Value\nM1,Lead Time,12\n";
        run(
            &PropertiesInstanceHandler,
            &attributes_step(),
            &mut graph,
            csv,
            ProcessorConfig::default(),
        )
        .unwrap();

        let m1 = graph.instance(&format!("{}material/M1", DATA)).unwrap();
        assert_eq!(
            m1.values(&format!("{}leadTime", MODEL)),
            &[InstanceValue::Literal(serde_json::json!(12))]
        );
    }

    #[test]
    fn test_properties_instance_step_requires_existing_entity() {
        let mut graph = fixture_graph();
        let csv = "Material Number,Attribute,Value\nM9,Lead Time,12\n";
        let error = run(
            &PropertiesInstanceHandler,
            &attributes_step(),
            &mut graph,
            csv,
            ProcessorConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(error, ProcessorError::Resolution(_)));
    }
}
