use super::value_processor::{cell_values, ValueProcessor};
use crate::error::ProcessorError;
use crate::manifest::ImportStep;
use crate::mapping::{ColumnMapping, ColumnTarget};
use crate::types::{InstanceValue, JsonLdInstance, VocabularyMap};
use crate::utils::{expand_iri_with_base, local_name, to_kebab_case};
use uuid::Uuid;

/// A `pivotColumns` entry with its class and relationship resolved against the vocabulary.
#[derive(Debug, Clone)]
pub(crate) struct PivotPlan {
    pub class_iri: String,
    pub relationship_iri: String,
}

pub(crate) fn resolve_pivots(
    vocabulary: &VocabularyMap,
    model_base_iri: &str,
    step: &ImportStep,
) -> Result<Vec<PivotPlan>, ProcessorError> {
    step.pivots()
        .iter()
        .map(|pivot| {
            let class = vocabulary
                .find_class(&pivot.instance_type, model_base_iri)
                .ok_or_else(|| {
                    ProcessorError::Resolution(format!(
                        "Pivot instanceType '{}' is not a declared class",
                        pivot.instance_type
                    ))
                })?;
            let relationship = vocabulary
                .find_property(&pivot.new_relationship_property, model_base_iri)
                .ok_or_else(|| {
                    ProcessorError::Resolution(format!(
                        "Pivot newRelationshipProperty '{}' is not a declared property",
                        pivot.new_relationship_property
                    ))
                })?;
            tracing::debug!(
                "Pivot {} via {} -> {}",
                pivot.columns.join(", "),
                relationship.iri,
                class.iri
            );
            Ok(PivotPlan {
                class_iri: class.iri.clone(),
                relationship_iri: relationship.iri.clone(),
            })
        })
        .collect()
}

/// Deterministic IRI of the `group`-th child of pivot `pivot` in one row.
pub(crate) fn child_iri(
    instances_base_iri: &str,
    class_iri: &str,
    parent_iri: &str,
    step_path: &str,
    row_index: usize,
    pivot: usize,
    group: usize,
) -> String {
    let name = format!(
        "{}|{}|{}|{}|{}",
        parent_iri, step_path, row_index, pivot, group
    );
    let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes());
    expand_iri_with_base(
        instances_base_iri,
        &format!("{}/{}", to_kebab_case(local_name(class_iri)), id),
    )
}

/// Split the pivot columns of one row into child entities linked from `parent`.
/// Groups whose cells are all empty produce no child.
#[allow(clippy::too_many_arguments)]
pub(crate) fn expand_row(
    plans: &[PivotPlan],
    mapping: &ColumnMapping,
    values: &ValueProcessor<'_>,
    parent: &mut JsonLdInstance,
    step_path: &str,
    row_index: usize,
    row: &[String],
    warnings: &mut Vec<String>,
) -> Result<Vec<JsonLdInstance>, ProcessorError> {
    let mut children = Vec::new();

    for (pivot_index, plan) in plans.iter().enumerate() {
        for group in 0..mapping.pivot_groups(pivot_index) {
            let cells: Vec<_> = mapping
                .targets()
                .filter_map(|(index, column, target)| match target {
                    ColumnTarget::Pivot {
                        pivot,
                        group: target_group,
                        binding,
                    } if *pivot == pivot_index && *target_group == group => {
                        Some((column, binding, row.get(index).map_or("", String::as_str)))
                    }
                    _ => None,
                })
                .collect();
            if cells.iter().all(|(_, _, cell)| cell.trim().is_empty()) {
                continue;
            }

            let iri = child_iri(
                values.instances_base_iri,
                &plan.class_iri,
                &parent.id,
                step_path,
                row_index,
                pivot_index,
                group,
            );
            let mut child = JsonLdInstance::new(iri.clone(), plan.class_iri.clone());
            for (column, binding, cell) in cells {
                for value in cell_values(cell, None) {
                    let value = values.process_value(value, binding, column, row_index, warnings)?;
                    child.push_value(&binding.iri, value);
                }
            }

            parent.push_value(&plan.relationship_iri, InstanceValue::Reference(iri));
            children.push(child);
        }
    }

    Ok(children)
}
