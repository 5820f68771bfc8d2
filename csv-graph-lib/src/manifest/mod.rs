use crate::contains_variant;
use crate::error::ProcessorError;
use crate::resolver::Symbol;
use crate::types::{ColumnOverride, ExtraItem, PivotColumn};
use json_comments::StripComments;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;
use std::{fmt, mem};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::enum_variant_names)]
pub enum ModelStep {
    BasicVocabularyStep,
    SubClassVocabularyStep,
    PropertiesVocabularyStep,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::enum_variant_names)]
pub enum InstanceStep {
    BasicInstanceStep,
    SubClassInstanceStep,
    PropertiesInstanceStep,
}

/// One tag of a step's `@type` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::enum_variant_names)]
pub enum StepType {
    CSVImportStep,
    ModelStep(ModelStep),
    InstanceStep(InstanceStep),
}

const STEP_TYPES: &[&str] = &[
    "CSVImportStep",
    "BasicVocabularyStep",
    "SubClassVocabularyStep",
    "PropertiesVocabularyStep",
    "BasicInstanceStep",
    "SubClassInstanceStep",
    "PropertiesInstanceStep",
];

impl FromStr for StepType {
    type Err = ProcessorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CSVImportStep" => Ok(StepType::CSVImportStep),
            "BasicVocabularyStep" => Ok(StepType::ModelStep(ModelStep::BasicVocabularyStep)),
            "SubClassVocabularyStep" => Ok(StepType::ModelStep(ModelStep::SubClassVocabularyStep)),
            "PropertiesVocabularyStep" => {
                Ok(StepType::ModelStep(ModelStep::PropertiesVocabularyStep))
            }
            "BasicInstanceStep" => Ok(StepType::InstanceStep(InstanceStep::BasicInstanceStep)),
            "SubClassInstanceStep" => Ok(StepType::InstanceStep(InstanceStep::SubClassInstanceStep)),
            "PropertiesInstanceStep" => {
                Ok(StepType::InstanceStep(InstanceStep::PropertiesInstanceStep))
            }
            _ => Err(ProcessorError::InvalidManifest(format!(
                "Unknown step type '{}'. Expected one of: {}",
                value,
                STEP_TYPES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepType::CSVImportStep => write!(f, "CSVImportStep"),
            StepType::ModelStep(step) => write!(f, "{:?}", step),
            StepType::InstanceStep(step) => write!(f, "{:?}", step),
        }
    }
}

impl<'de> Deserialize<'de> for StepType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StepTypeVisitor;

        impl<'de> Visitor<'de> for StepTypeVisitor {
            type Value = StepType;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a valid StepType string")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                StepType::from_str(value).map_err(|_| de::Error::unknown_variant(value, STEP_TYPES))
            }
        }

        deserializer.deserialize_str(StepTypeVisitor)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ImportStep {
    pub path: String,
    #[serde(rename = "@type")]
    pub types: Vec<StepType>,
    #[serde(default)]
    pub overrides: Vec<ColumnOverride>,
    #[serde(default, rename = "extraItems")]
    pub extra_items: Vec<ExtraItem>,
    #[serde(default, rename = "instanceType")]
    pub instance_type: String,
    pub ignore: Option<Vec<String>>,
    #[serde(rename = "replaceClassIdWith")]
    pub replace_class_id_with: Option<String>,
    #[serde(rename = "replacePropertyIdWith")]
    pub replace_property_id_with: Option<String>,
    // Required if the types include SubClassVocabularyStep
    #[serde(rename = "subClassOf")]
    pub sub_class_of: Option<Vec<String>>,
    // Required if the types include SubClassInstanceStep
    #[serde(rename = "subClassProperty")]
    pub sub_class_property: Option<String>,
    #[serde(rename = "pivotColumns")]
    pub pivot_columns: Option<Vec<PivotColumn>>,
    #[serde(rename = "delimitValuesOn")]
    pub delimit_values_on: Option<String>,
    #[serde(rename = "mapToLabel")]
    pub map_to_label: Option<String>,
}

impl ImportStep {
    pub fn new(path: impl Into<String>, types: Vec<StepType>) -> Self {
        Self {
            path: path.into(),
            types,
            overrides: Vec::new(),
            extra_items: Vec::new(),
            instance_type: String::new(),
            ignore: None,
            replace_class_id_with: None,
            replace_property_id_with: None,
            sub_class_of: None,
            sub_class_property: None,
            pivot_columns: None,
            delimit_values_on: None,
            map_to_label: None,
        }
    }

    pub fn model_steps(&self) -> impl Iterator<Item = ModelStep> + '_ {
        self.types.iter().filter_map(|t| match t {
            StepType::ModelStep(step) => Some(*step),
            _ => None,
        })
    }

    pub fn instance_steps(&self) -> impl Iterator<Item = InstanceStep> + '_ {
        self.types.iter().filter_map(|t| match t {
            StepType::InstanceStep(step) => Some(*step),
            _ => None,
        })
    }

    pub fn ignored_columns(&self) -> &[String] {
        self.ignore.as_deref().unwrap_or_default()
    }

    pub fn pivots(&self) -> &[PivotColumn] {
        self.pivot_columns.as_deref().unwrap_or_default()
    }

    fn invalid(&self, message: impl fmt::Display) -> ProcessorError {
        let message = format!("Step '{}': {}", self.path, message);
        tracing::error!("{}", message);
        ProcessorError::InvalidManifest(message)
    }

    /// Field-level checks shared by both phases.
    fn validate_common(&self) -> Result<(), ProcessorError> {
        if self.path.trim().is_empty() {
            return Err(self.invalid("path must not be empty"));
        }

        for override_ in &self.overrides {
            Symbol::from_str(&override_.map_to)
                .map_err(|e| self.invalid(format!("invalid override: {}", e)))?;
            if self
                .extra_items
                .iter()
                .any(|item| item.column == override_.column)
            {
                return Err(self.invalid(format!(
                    "column '{}' appears in both overrides and extraItems",
                    override_.column
                )));
            }
        }

        for ignored in self.ignored_columns() {
            let explicitly_mapped = self.overrides.iter().any(|o| &o.column == ignored)
                || self.extra_items.iter().any(|e| &e.column == ignored)
                || self.map_to_label.as_ref() == Some(ignored)
                || self.sub_class_property.as_ref() == Some(ignored)
                || self.pivots().iter().any(|p| p.columns.contains(ignored));
            if explicitly_mapped {
                return Err(self.invalid(format!(
                    "column '{}' is ignored but also explicitly mapped",
                    ignored
                )));
            }
        }

        for replacement in [&self.replace_class_id_with, &self.replace_property_id_with]
            .into_iter()
            .flatten()
        {
            Symbol::from_str(replacement)
                .map_err(|e| self.invalid(format!("invalid id replacement: {}", e)))?;
        }

        Ok(())
    }

    fn validate_model_step(&self) -> Result<(), ProcessorError> {
        self.validate_common()?;

        let model_steps: Vec<ModelStep> = self.model_steps().collect();
        if model_steps.is_empty() {
            return Err(self.invalid(
                "model sequence steps must include a ModelStep type: BasicVocabularyStep, SubClassVocabularyStep or PropertiesVocabularyStep",
            ));
        }
        if contains_variant!(self.types, StepType::InstanceStep(_)) {
            return Err(self.invalid("model sequence steps cannot carry InstanceStep types"));
        }
        if model_steps.contains(&ModelStep::SubClassVocabularyStep)
            && self.sub_class_of.as_ref().map_or(true, Vec::is_empty)
        {
            return Err(self.invalid("SubClassVocabularyStep requires subClassOf field"));
        }
        if self.pivot_columns.is_some() || self.delimit_values_on.is_some() {
            return Err(self.invalid(
                "pivotColumns and delimitValuesOn are only valid on instance steps",
            ));
        }
        Ok(())
    }

    fn validate_instance_step(&self) -> Result<(), ProcessorError> {
        self.validate_common()?;

        let instance_steps: Vec<InstanceStep> = self.instance_steps().collect();
        if instance_steps.is_empty() {
            return Err(self.invalid(
                "instance sequence steps must include an InstanceStep type: BasicInstanceStep, SubClassInstanceStep or PropertiesInstanceStep",
            ));
        }
        if contains_variant!(self.types, StepType::ModelStep(_)) {
            return Err(self.invalid("instance sequence steps cannot carry ModelStep types"));
        }
        if self.instance_type.trim().is_empty() {
            return Err(self.invalid("instance steps require instanceType"));
        }
        if instance_steps.contains(&InstanceStep::SubClassInstanceStep)
            && self
                .sub_class_property
                .as_ref()
                .map_or(true, |p| p.trim().is_empty())
        {
            return Err(self.invalid("SubClassInstanceStep requires subClassProperty field"));
        }
        if !self.extra_items.is_empty() {
            return Err(self.invalid("extraItems are only valid on model steps"));
        }
        if self.replace_class_id_with.is_some() || self.replace_property_id_with.is_some() {
            return Err(self.invalid(
                "replaceClassIdWith and replacePropertyIdWith are only valid on model steps",
            ));
        }
        if self.delimit_values_on.is_some() && self.pivot_columns.is_some() {
            return Err(
                self.invalid("cannot have both delimitValuesOn and pivotColumns in the same step")
            );
        }
        if matches!(&self.delimit_values_on, Some(delimiter) if delimiter.is_empty()) {
            return Err(self.invalid("delimitValuesOn must not be empty"));
        }
        for pivot in self.pivots() {
            if pivot.instance_type.trim().is_empty()
                || pivot.new_relationship_property.trim().is_empty()
            {
                return Err(self.invalid(
                    "pivotColumns entries require instanceType and newRelationshipProperty",
                ));
            }
            if pivot.columns.is_empty() {
                return Err(self.invalid(format!(
                    "pivot for '{}' must list at least one column",
                    pivot.instance_type
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ImportSection {
    #[serde(default, rename = "baseIRI")]
    pub base_iri: String,
    #[serde(default)]
    pub path: String,
    pub sequence: Vec<ImportStep>,
}

impl ImportSection {
    /// Drop steps that repeat an earlier step's path and types, returning the
    /// dropped steps.
    pub fn deduplicate_steps(&mut self) -> Result<(), Vec<ImportStep>> {
        let mut seen_steps = HashSet::new();
        let mut duplicate_steps = vec![];

        let sequence = mem::take(&mut self.sequence);

        let unique_steps: Vec<ImportStep> = sequence
            .into_iter()
            .filter_map(|step| {
                if !seen_steps.insert((step.path.clone(), step.types.clone())) {
                    duplicate_steps.push(step);
                    None
                } else {
                    Some(step)
                }
            })
            .collect();

        self.sequence = unique_steps;
        if !duplicate_steps.is_empty() {
            return Err(duplicate_steps);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(rename = "@id", default)]
    pub id: String,
    #[serde(rename = "@context", default)]
    pub context: serde_json::Value,
    #[serde(rename = "@type", default)]
    pub type_: String,
    #[serde(default)]
    pub ledger: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub model: ImportSection,
    pub instances: ImportSection,
}

/// Check for duplicate steps in either model or instances section
fn handle_step_deduplication(
    section: &mut ImportSection,
    section_type: &str,
    is_strict: bool,
) -> Result<Vec<String>, ProcessorError> {
    if let Err(duplicate_steps) = section.deduplicate_steps() {
        let message = format!(
            "Duplicate {} steps found for paths: {:?}",
            section_type,
            duplicate_steps
                .iter()
                .map(|s| &s.path)
                .collect::<Vec<&String>>()
        );
        if is_strict {
            tracing::error!("{}", message);
            return Err(ProcessorError::InvalidManifest(message));
        }
        tracing::warn!("{}", message);
        return Ok(vec![message]);
    };
    Ok(Vec::new())
}

impl Manifest {
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Result<Self, ProcessorError> {
        let path = path.into();
        tracing::info!("Loading manifest from {:?}", path);
        let file = std::fs::File::open(&path)?;
        let manifest = Self::from_reader(std::io::BufReader::new(file))?;
        tracing::info!("Successfully loaded manifest: {}", path.display());
        Ok(manifest)
    }

    /// Parse a manifest from JSON that may contain `//` and `/* */` comments.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ProcessorError> {
        let mut bytes_vec = Vec::new();
        let mut stripped_reader = StripComments::new(reader);
        stripped_reader.read_to_end(&mut bytes_vec)?;
        Ok(serde_json::from_slice(&bytes_vec)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ProcessorError> {
        Self::from_reader(json.as_bytes())
    }

    /// Validate the manifest before execution. Duplicate steps are an error in
    /// strict mode and are dropped otherwise; the returned messages describe
    /// what was dropped.
    pub fn validate(&mut self, is_strict: bool) -> Result<Vec<String>, ProcessorError> {
        tracing::info!("Validating manifest...");

        if !self.type_.is_empty() && self.type_ != "CSVImportManifest" {
            tracing::error!("Invalid manifest type: {}", self.type_);
            return Err(ProcessorError::InvalidManifest(
                "Manifest must have @type of CSVImportManifest".into(),
            ));
        }

        let mut warnings = handle_step_deduplication(&mut self.model, "model", is_strict)?;
        warnings.extend(handle_step_deduplication(
            &mut self.instances,
            "instance",
            is_strict,
        )?);

        for step in &self.model.sequence {
            step.validate_model_step()?;
        }

        for step in &self.instances.sequence {
            step.validate_instance_step()?;
        }

        tracing::info!("Manifest validation successful");
        Ok(warnings)
    }
}
