//! CSV Graph Construction Library
//!
//! This library builds a linked-data graph (a vocabulary of classes and
//! properties plus the entities that instantiate it) from a collection of CSV
//! files, driven by a JSON manifest. The model phase runs first and declares
//! the vocabulary; the instances phase then creates and links entities.

mod error;
mod graph;
mod instance;
mod manifest;
mod mapping;
mod processor;
mod resolver;
mod sink;
mod source;
mod types;
mod utils;
mod vocabulary;

pub use error::{ErrorKind, ProcessingMessage, ProcessingOutcome, ProcessingState, ProcessorError};
pub use graph::{GraphState, Phase};
pub use manifest::{ImportSection, ImportStep, InstanceStep, Manifest, ModelStep, StepType};
pub use processor::{CancellationFlag, Processor, ProcessorBuilder, ProcessorConfig};
pub use resolver::{EntityKind, Field, Symbol};
pub use sink::{DocumentHeader, GraphSink, JsonLdSink};
pub use source::{CsvRowSource, InMemoryRowSource, RowSource, Table};
pub use types::{
    ColumnOverride, ExtraItem, IdOpt, InstanceValue, JsonLdInstance, JsonLdInstances,
    JsonLdVocabulary, OnEntity, PivotColumn, PropertyDatatype, TermKind, VocabularyMap,
    VocabularyTerm,
};
