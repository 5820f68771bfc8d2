use super::entity_iri;
use crate::error::ProcessorError;
use crate::mapping::PropertyBinding;
use crate::types::{InstanceValue, PropertyDatatype, VocabularyMap};
use crate::utils::{expand_iri_with_base, is_absolute_iri, DATE_FORMATS, PARTIAL_DATE_FORMATS};
use chrono::NaiveDate;
use serde_json::{Number, Value as JsonValue};

/// The values held by a cell: none when empty, several when split on `delimiter`.
pub(crate) fn cell_values<'c>(cell: &'c str, delimiter: Option<&str>) -> Vec<&'c str> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Vec::new();
    }
    match delimiter {
        Some(delimiter) if !delimiter.is_empty() => cell
            .split(delimiter)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .collect(),
        _ => vec![cell],
    }
}

/// Parse a full date, a month-precision date (day defaults to the 1st) or a
/// bare year (January 1st).
pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            PARTIAL_DATE_FORMATS.iter().find_map(|fmt| {
                NaiveDate::parse_from_str(&format!("{} 01", value), &format!("{} %d", fmt)).ok()
            })
        })
        .or_else(|| {
            value
                .parse::<i32>()
                .ok()
                .filter(|year| (1000..=9999).contains(year))
                .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
        })
}

fn parse_boolean(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn clean_number(value: &str) -> String {
    value.replace(['$', '%', ','], "")
}

/// Coerces raw cells into typed values for one step.
pub(crate) struct ValueProcessor<'v> {
    pub vocabulary: &'v VocabularyMap,
    pub instances_base_iri: &'v str,
    strict: bool,
}

impl<'v> ValueProcessor<'v> {
    pub fn new(vocabulary: &'v VocabularyMap, instances_base_iri: &'v str, strict: bool) -> Self {
        Self {
            vocabulary,
            instances_base_iri,
            strict,
        }
    }

    /// Coerce `value` to the binding's datatype. Unparsable values fail in
    /// strict mode and are kept as raw strings with a warning otherwise.
    pub fn process_value(
        &self,
        value: &str,
        binding: &PropertyBinding,
        column: &str,
        row_index: usize,
        warnings: &mut Vec<String>,
    ) -> Result<InstanceValue, ProcessorError> {
        let coerced = match &binding.datatype {
            PropertyDatatype::ID | PropertyDatatype::String => {
                Some(JsonValue::String(value.to_string()))
            }
            PropertyDatatype::Integer => clean_number(value)
                .parse::<i64>()
                .ok()
                .map(|n| JsonValue::Number(Number::from(n))),
            PropertyDatatype::Decimal => clean_number(value)
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(JsonValue::Number),
            PropertyDatatype::Boolean => parse_boolean(value).map(JsonValue::Bool),
            PropertyDatatype::Date => parse_date(value)
                .map(|date| JsonValue::String(date.format("%Y-%m-%d").to_string())),
            PropertyDatatype::URI(Some(target_class)) => {
                return Ok(InstanceValue::Reference(entity_iri(
                    self.vocabulary,
                    self.instances_base_iri,
                    target_class,
                    value,
                )))
            }
            PropertyDatatype::URI(None) => {
                let iri = if is_absolute_iri(value) {
                    value.to_string()
                } else {
                    expand_iri_with_base(self.instances_base_iri, value)
                };
                return Ok(InstanceValue::Reference(iri));
            }
        };

        match coerced {
            Some(json) => Ok(InstanceValue::Literal(json)),
            None => {
                let message = format!(
                    "[Column: {}, Row: {}] Invalid {} value: {:?}",
                    column,
                    row_index,
                    binding.datatype.xsd_type(),
                    value
                );
                if self.strict {
                    return Err(ProcessorError::InvalidValue(message));
                }
                warnings.push(format!("{}, using raw value", message));
                Ok(InstanceValue::Literal(JsonValue::String(value.to_string())))
            }
        }
    }
}
