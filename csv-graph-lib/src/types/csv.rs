use crate::error::ProcessorError;
use serde::{Deserialize, Serialize, Serializer};
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ColumnOverride {
    pub column: String,
    #[serde(rename = "mapTo")]
    pub map_to: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum OnEntity {
    #[serde(rename = "CLASS")]
    Class,
    #[serde(rename = "PROPERTY")]
    Property,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExtraItem {
    pub column: String,
    #[serde(rename = "mapTo")]
    pub map_to: String,
    #[serde(rename = "onEntity")]
    pub on_entity: OnEntity,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PivotColumn {
    #[serde(rename = "instanceType")]
    pub instance_type: String,
    #[serde(rename = "newRelationshipProperty")]
    pub new_relationship_property: String,
    pub columns: Vec<String>,
}

/// Value type of a property as declared in a vocabulary CSV's `Type` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyDatatype {
    /// The class's identifier column
    ID,
    /// Relationship; carries the target class IRI when one is declared
    URI(Option<String>),
    String,
    Decimal,
    Integer,
    Date,
    Boolean,
}

impl PropertyDatatype {
    pub fn is_reference(&self) -> bool {
        matches!(self, PropertyDatatype::URI(_))
    }

    pub fn xsd_type(&self) -> &str {
        match self {
            PropertyDatatype::ID | PropertyDatatype::String => "xsd:string",
            PropertyDatatype::URI(Some(class_iri)) => class_iri,
            PropertyDatatype::URI(None) => "xsd:anyURI",
            PropertyDatatype::Decimal => "xsd:decimal",
            PropertyDatatype::Integer => "xsd:integer",
            PropertyDatatype::Date => "xsd:date",
            PropertyDatatype::Boolean => "xsd:boolean",
        }
    }
}

impl FromStr for PropertyDatatype {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "@id" | "primary key identifier" => Ok(PropertyDatatype::ID),
            "uri" | "foreign key reference" => Ok(PropertyDatatype::URI(None)),
            "" | "string" => Ok(PropertyDatatype::String),
            "float" | "decimal" => Ok(PropertyDatatype::Decimal),
            "integer" => Ok(PropertyDatatype::Integer),
            "date" | "date/time" => Ok(PropertyDatatype::Date),
            "boolean" => Ok(PropertyDatatype::Boolean),
            _ => Err(ProcessorError::InvalidValue(format!(
                "Invalid CSV datatype: {} [Expected: @id, URI, String, Float, Integer, Date, Boolean]",
                s
            ))),
        }
    }
}

impl Serialize for PropertyDatatype {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.xsd_type())
    }
}
