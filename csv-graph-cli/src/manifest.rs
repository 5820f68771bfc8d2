use clap::ValueEnum;

/// Manifest templates written by `generate-manifest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Template {
    /// One vocabulary step and one instance step
    Basic,
    /// Every step kind with its optional fields
    Full,
}

impl Template {
    pub fn contents(self) -> &'static str {
        match self {
            Template::Basic => BASIC_MANIFEST,
            Template::Full => FULL_MANIFEST,
        }
    }
}

const BASIC_MANIFEST: &str = r#"{
  // Must be CSVImportManifest
  "@type": "CSVImportManifest",
  // Unique identifier for this manifest
  "@id": "your-model-id",
  // Ledger the generated documents target
  "ledger": "your/ledger",
  // Human-readable name
  "name": "Your Model Name",
  // Description of what this manifest processes
  "description": "Description of your data model",

  // The model phase declares classes and properties
  "model": {
    // Namespace for class and property IRIs
    "baseIRI": "https://example.com/model/",
    // Directory the model CSV paths are relative to
    "path": "model",
    "sequence": [
      {
        "path": "vocabulary.csv",
        "@type": ["CSVImportStep", "BasicVocabularyStep"],
        // Map CSV column names to standard vocabulary fields
        "overrides": [
          { "column": "Class", "mapTo": "$Class.ID" },
          { "column": "Property", "mapTo": "$Property.ID" }
        ]
      }
    ]
  },

  // The instances phase creates entities of the declared classes
  "instances": {
    // Namespace for entity IRIs
    "baseIRI": "https://example.com/data/",
    "path": "data",
    "sequence": [
      {
        "path": "instances.csv",
        "@type": ["CSVImportStep", "BasicInstanceStep"],
        // The class to assign to entities from this CSV
        "instanceType": "YourType"
      }
    ]
  }
}"#;

const FULL_MANIFEST: &str = r#"{
  // Must be CSVImportManifest
  "@type": "CSVImportManifest",
  "@id": "your-model-id",
  "ledger": "your/ledger",
  "name": "Your Model Name",
  "description": "Description of your data model",

  "model": {
    "baseIRI": "https://example.com/model/",
    "path": "model",
    "sequence": [
      {
        // Declares classes and properties, one property per row.
        // Default columns: Class ID, Class Name, Class Description,
        // Property ID, Property Name, Property Description, Type, Class Range
        "path": "vocabulary.csv",
        "@type": ["CSVImportStep", "BasicVocabularyStep"],
        "overrides": [
          { "column": "Class", "mapTo": "$Class.ID" },
          { "column": "Property", "mapTo": "$Property.ID" }
        ],
        // Copy additional columns onto classes or properties under a new key.
        // Columns that are neither defaults nor overrides are copied too,
        // keyed by their camelCased header.
        "extraItems": [
          { "column": "Reasoning Logic", "mapTo": "reasoningLogic", "onEntity": "PROPERTY" }
        ],
        // Columns to skip entirely
        "ignore": ["Internal Notes"]
      },
      {
        // Declares one subclass per row under each class in subClassOf.
        // Required column: Class ID (or an override / replacement)
        "path": "subclasses.csv",
        "@type": ["CSVImportStep", "SubClassVocabularyStep"],
        "subClassOf": ["YourType"],
        // Build the class IRI from another column; the original ID stays
        // usable as an alias
        "replaceClassIdWith": "$Class.Name"
      },
      {
        // Declares properties onto existing classes.
        // Default columns: Class ID, Property ID, Property Name, Type
        "path": "properties.csv",
        "@type": ["CSVImportStep", "PropertiesVocabularyStep"],
        "replacePropertyIdWith": "$Property.Name"
      }
    ]
  },

  "instances": {
    "baseIRI": "https://example.com/data/",
    "path": "data",
    "sequence": [
      {
        // One entity per row, typed with instanceType. The identifier column
        // is the header matching the class's @id property.
        "path": "instances.csv",
        "@type": ["CSVImportStep", "BasicInstanceStep"],
        "instanceType": "YourType",
        // Column holding the entity's label
        "mapToLabel": "Name",
        // Split cells into several values
        "delimitValuesOn": ";"
      },
      {
        // One entity per row, typed with the subclass named in subClassProperty
        "path": "typed-instances.csv",
        "@type": ["CSVImportStep", "SubClassInstanceStep"],
        "instanceType": "YourType",
        "subClassProperty": "Subtype"
      },
      {
        // Split repeated column groups into child entities linked from the row's entity
        "path": "orders.csv",
        "@type": ["CSVImportStep", "BasicInstanceStep"],
        "instanceType": "Order",
        "pivotColumns": [
          {
            "instanceType": "OrderLine",
            "newRelationshipProperty": "hasLines",
            "columns": ["Product", "Quantity"]
          }
        ]
      },
      {
        // Attach one property/value pair per row to entities created earlier.
        // Default columns: the identifier column, Property ID, Property Value
        "path": "attributes.csv",
        "@type": ["CSVImportStep", "PropertiesInstanceStep"],
        "instanceType": "YourType",
        "overrides": [
          { "column": "Attribute", "mapTo": "$Property.ID" },
          { "column": "Value", "mapTo": "$Property.Value" }
        ]
      }
    ]
  }
}"#;
