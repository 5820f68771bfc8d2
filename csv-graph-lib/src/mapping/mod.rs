//! Maps a step's CSV header onto identity slots, attributes, properties and
//! pivot groups.

use crate::error::ProcessorError;
use crate::manifest::ImportStep;
use crate::resolver::Symbol;
use crate::types::{OnEntity, PivotColumn, PropertyDatatype};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBinding {
    pub iri: String,
    pub datatype: PropertyDatatype,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnTarget {
    /// Feeds an identity slot such as `$Class.ID`
    Slot(Symbol),
    /// Extra scalar attribute of the row's class or property
    Attribute { key: String, on: OnEntity },
    /// Value of a declared property on the row's entity
    Property(PropertyBinding),
    /// Value of a property on the `group`-th child of pivot `pivot`
    Pivot {
        pivot: usize,
        group: usize,
        binding: PropertyBinding,
    },
    /// Copied into the entity's label
    Label,
    Ignored,
}

/// Default column for an identity slot.
#[derive(Debug, Clone)]
pub struct SlotDefault {
    pub symbol: Symbol,
    pub column: String,
    pub required: bool,
}

impl SlotDefault {
    pub fn required(symbol: Symbol, column: impl Into<String>) -> Self {
        Self {
            symbol,
            column: column.into(),
            required: true,
        }
    }

    pub fn optional(symbol: Symbol, column: impl Into<String>) -> Self {
        Self {
            symbol,
            column: column.into(),
            required: false,
        }
    }
}

/// Decides what a column without an explicit rule maps to.
pub trait ColumnInference {
    fn infer(&mut self, column: &str) -> Result<ColumnTarget, ProcessorError>;

    fn pivot_property(
        &mut self,
        _pivot: &PivotColumn,
        column: &str,
    ) -> Result<PropertyBinding, ProcessorError> {
        Err(ProcessorError::InvalidManifest(format!(
            "Column '{}' cannot be pivoted in this step",
            column
        )))
    }
}

#[derive(Debug, Clone)]
pub struct ColumnMapping {
    headers: Vec<String>,
    targets: Vec<ColumnTarget>,
    slots: BTreeMap<Symbol, usize>,
    pivot_groups: Vec<usize>,
}

impl ColumnMapping {
    #[cfg(test)]
    pub(crate) fn for_slots(headers: Vec<String>, slots: &[(Symbol, usize)]) -> Self {
        let mut targets = vec![ColumnTarget::Ignored; headers.len()];
        for (symbol, index) in slots {
            targets[*index] = ColumnTarget::Slot(*symbol);
        }
        Self {
            headers,
            targets,
            slots: slots.iter().copied().collect(),
            pivot_groups: Vec::new(),
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = (usize, &str, &ColumnTarget)> {
        self.targets
            .iter()
            .enumerate()
            .map(|(i, target)| (i, self.headers[i].as_str(), target))
    }

    #[cfg(test)]
    pub fn target_of(&self, column: &str) -> Option<&ColumnTarget> {
        self.headers
            .iter()
            .position(|h| h == column)
            .map(|i| &self.targets[i])
    }

    pub fn slot(&self, symbol: &Symbol) -> Option<usize> {
        self.slots.get(symbol).copied()
    }

    /// Number of column groups found for pivot `pivot`.
    pub fn pivot_groups(&self, pivot: usize) -> usize {
        self.pivot_groups.get(pivot).copied().unwrap_or(0)
    }

    /// Reject rows whose arity differs from the header.
    pub fn check_row(&self, path: &str, row_index: usize, row: &[String]) -> Result<(), ProcessorError> {
        if row.len() != self.headers.len() {
            return Err(ProcessorError::SourceRead {
                path: path.to_string(),
                row: Some(row_index),
                message: format!(
                    "row has {} columns but the header has {}",
                    row.len(),
                    self.headers.len()
                ),
            });
        }
        Ok(())
    }
}

pub struct ColumnMapper<'a> {
    step: &'a ImportStep,
    headers: &'a [String],
}

impl<'a> ColumnMapper<'a> {
    pub fn new(step: &'a ImportStep, headers: &'a [String]) -> Self {
        Self { step, headers }
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    fn require_column(&self, column: &str, field: &str) -> Result<usize, ProcessorError> {
        self.position(column).ok_or_else(|| {
            tracing::error!(
                "Column '{}' referenced by {} not found in {:?}",
                column,
                field,
                self.headers
            );
            ProcessorError::InvalidManifest(format!(
                "Column '{}' referenced by {} in step '{}' not found in CSV headers",
                column, field, self.step.path
            ))
        })
    }

    pub fn map(
        &self,
        defaults: &[SlotDefault],
        inference: &mut impl ColumnInference,
    ) -> Result<ColumnMapping, ProcessorError> {
        let step = self.step;
        for column in step.ignored_columns() {
            self.require_column(column, "ignore")?;
        }
        for item in &step.extra_items {
            self.require_column(&item.column, "extraItems")?;
        }
        for override_ in &step.overrides {
            self.require_column(&override_.column, "overrides")?;
        }
        for pivot in step.pivots() {
            for column in &pivot.columns {
                self.require_column(column, "pivotColumns")?;
            }
        }
        if let Some(label_column) = &step.map_to_label {
            self.require_column(label_column, "mapToLabel")?;
        }

        let mut slot_columns: BTreeMap<Symbol, (String, bool)> = defaults
            .iter()
            .map(|d| (d.symbol, (d.column.clone(), d.required)))
            .collect();
        for override_ in &step.overrides {
            let symbol = Symbol::from_str(&override_.map_to)?;
            match slot_columns.get_mut(&symbol) {
                Some(entry) => entry.0 = override_.column.clone(),
                None => {
                    return Err(ProcessorError::InvalidManifest(format!(
                        "Override '{}' -> {} is not supported by step '{}' ({})",
                        override_.column,
                        symbol,
                        step.path,
                        step.types
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", ")
                    )))
                }
            }
        }

        let mut targets: Vec<Option<ColumnTarget>> = vec![None; self.headers.len()];
        let mut slots = BTreeMap::new();
        for (symbol, (column, required)) in &slot_columns {
            match self.position(column) {
                Some(index) => {
                    slots.insert(*symbol, index);
                    if targets[index].is_none() {
                        targets[index] = Some(ColumnTarget::Slot(*symbol));
                    }
                }
                None if *required => {
                    return Err(ProcessorError::InvalidManifest(format!(
                        "Required column '{}' ({}) not found in CSV headers of step '{}'",
                        column, symbol, step.path
                    )))
                }
                None => tracing::debug!("Optional column '{}' ({}) not present", column, symbol),
            }
        }

        for (index, header) in self.headers.iter().enumerate() {
            if step.ignored_columns().contains(header) {
                targets[index] = Some(ColumnTarget::Ignored);
            }
        }

        for item in &step.extra_items {
            if let Some(index) = self.position(&item.column) {
                targets[index] = Some(ColumnTarget::Attribute {
                    key: item.map_to.clone(),
                    on: item.on_entity,
                });
            }
        }
        slots.retain(|_, index| matches!(targets[*index], Some(ColumnTarget::Slot(_))));

        if let Some(index) = step.map_to_label.as_deref().and_then(|c| self.position(c)) {
            if targets[index].is_none() {
                targets[index] = Some(ColumnTarget::Label);
            }
        }

        let mut pivot_groups = Vec::with_capacity(step.pivots().len());
        for (pivot_index, pivot) in step.pivots().iter().enumerate() {
            let mut groups = 0;
            for column in &pivot.columns {
                let binding = inference.pivot_property(pivot, column)?;
                let occurrences = self
                    .headers
                    .iter()
                    .enumerate()
                    .filter(|(_, h)| *h == column)
                    .map(|(i, _)| i);
                for (group, index) in occurrences.enumerate() {
                    if targets[index].is_some() {
                        return Err(ProcessorError::InvalidManifest(format!(
                            "Pivot column '{}' in step '{}' is already mapped to {:?}",
                            column, step.path, targets[index]
                        )));
                    }
                    targets[index] = Some(ColumnTarget::Pivot {
                        pivot: pivot_index,
                        group,
                        binding: binding.clone(),
                    });
                    groups = groups.max(group + 1);
                }
            }
            pivot_groups.push(groups);
        }

        let mut resolved = Vec::with_capacity(targets.len());
        for (index, target) in targets.into_iter().enumerate() {
            let target = match target {
                Some(target) => target,
                None => inference.infer(&self.headers[index])?,
            };
            tracing::debug!("Column '{}' -> {:?}", self.headers[index], target);
            resolved.push(target);
        }

        Ok(ColumnMapping {
            headers: self.headers.to_vec(),
            targets: resolved,
            slots,
            pivot_groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ModelStep, StepType};
    use crate::types::{ColumnOverride, ExtraItem};

    struct AsAttribute;

    impl ColumnInference for AsAttribute {
        fn infer(&mut self, column: &str) -> Result<ColumnTarget, ProcessorError> {
            Ok(ColumnTarget::Attribute {
                key: column.to_lowercase(),
                on: OnEntity::Class,
            })
        }
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn step() -> ImportStep {
        ImportStep::new(
            "MaterialClass.csv",
            vec![StepType::ModelStep(ModelStep::SubClassVocabularyStep)],
        )
    }

    fn defaults() -> Vec<SlotDefault> {
        vec![
            SlotDefault::required(Symbol::CLASS_ID, "Class ID"),
            SlotDefault::optional(Symbol::CLASS_NAME, "Class Name"),
        ]
    }

    #[test]
    fn test_defaults_and_inference() {
        let headers = headers(&["Class ID", "Class Name", "Category"]);
        let step = step();
        let mapping = ColumnMapper::new(&step, &headers)
            .map(&defaults(), &mut AsAttribute)
            .unwrap();

        assert_eq!(mapping.slot(&Symbol::CLASS_ID), Some(0));
        assert_eq!(mapping.slot(&Symbol::CLASS_NAME), Some(1));
        assert_eq!(
            mapping.target_of("Category"),
            Some(&ColumnTarget::Attribute {
                key: "category".into(),
                on: OnEntity::Class
            })
        );
    }

    #[test]
    fn test_override_points_slot_at_other_column() {
        let headers = headers(&["Category", "Class Name"]);
        let mut step = step();
        step.overrides = vec![ColumnOverride {
            column: "Class Name".into(),
            map_to: "$Class.ID".into(),
        }];
        let mapping = ColumnMapper::new(&step, &headers)
            .map(&defaults(), &mut AsAttribute)
            .unwrap();
        assert_eq!(mapping.slot(&Symbol::CLASS_ID), Some(1));
    }

    #[test]
    fn test_missing_required_column() {
        let headers = headers(&["Class Name"]);
        let step = step();
        let error = ColumnMapper::new(&step, &headers)
            .map(&defaults(), &mut AsAttribute)
            .unwrap_err();
        assert!(matches!(error, ProcessorError::InvalidManifest(_)));
        assert!(error.to_string().contains("Class ID"));
    }

    #[test]
    fn test_unknown_columns_in_rules() {
        let headers = headers(&["Class ID"]);

        let mut ignoring = step();
        ignoring.ignore = Some(vec!["Notes".into()]);
        let error = ColumnMapper::new(&ignoring, &headers)
            .map(&defaults(), &mut AsAttribute)
            .unwrap_err();
        assert!(error.to_string().contains("Notes"));

        let mut extra = step();
        extra.extra_items = vec![ExtraItem {
            column: "Abbreviation".into(),
            map_to: "abbreviation".into(),
            on_entity: OnEntity::Class,
        }];
        assert!(ColumnMapper::new(&extra, &headers)
            .map(&defaults(), &mut AsAttribute)
            .is_err());
    }

    #[test]
    fn test_unsupported_override_symbol() {
        let headers = headers(&["Class ID", "Kind"]);
        let mut step = step();
        step.overrides = vec![ColumnOverride {
            column: "Kind".into(),
            map_to: "$Property.Type".into(),
        }];
        assert!(ColumnMapper::new(&step, &headers)
            .map(&defaults(), &mut AsAttribute)
            .is_err());
    }

    #[test]
    fn test_ignored_columns() {
        let headers = headers(&["Class ID", "Internal Notes"]);
        let mut step = step();
        step.ignore = Some(vec!["Internal Notes".into()]);
        let mapping = ColumnMapper::new(&step, &headers)
            .map(&defaults(), &mut AsAttribute)
            .unwrap();
        assert_eq!(mapping.target_of("Internal Notes"), Some(&ColumnTarget::Ignored));
    }

    #[test]
    fn test_row_arity() {
        let headers = headers(&["Class ID", "Class Name"]);
        let step = step();
        let mapping = ColumnMapper::new(&step, &headers)
            .map(&defaults(), &mut AsAttribute)
            .unwrap();
        assert!(mapping
            .check_row("a.csv", 1, &["DRAM".into(), "Dynamic RAM".into()])
            .is_ok());
        let error = mapping.check_row("a.csv", 2, &["DRAM".into()]).unwrap_err();
        assert!(matches!(error, ProcessorError::SourceRead { row: Some(2), .. }));
    }
}
