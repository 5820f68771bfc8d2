use crate::error::{ProcessingState, ProcessorError};
use crate::graph::GraphState;
use crate::instance::{EntityStepHandler, PropertiesInstanceHandler};
use crate::manifest::{ImportStep, InstanceStep, StepType};
use crate::mapping::ColumnMapping;
use crate::source::Table;
use crate::vocabulary::{
    BasicVocabularyHandler, PropertiesVocabularyHandler, SubClassVocabularyHandler,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Fail on value coercion problems and unmatched instance columns
    pub strict: bool,
    /// Skip malformed rows with a warning instead of failing the run
    pub skip_malformed_rows: bool,
}

/// Shared flag for stopping a run at the next row boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<(), ProcessorError> {
        if self.is_cancelled() {
            return Err(ProcessorError::Cancelled);
        }
        Ok(())
    }
}

/// Everything a handler may read or write while applying one step.
pub(crate) struct StepContext<'a> {
    pub step: &'a ImportStep,
    pub model_base_iri: &'a str,
    pub instances_base_iri: &'a str,
    pub graph: &'a mut GraphState,
    pub processing_state: &'a mut ProcessingState,
    pub config: &'a ProcessorConfig,
    pub cancellation: &'a CancellationFlag,
}

impl<'a> StepContext<'a> {
    pub fn warn(&mut self, message: impl Into<String>) {
        self.processing_state
            .add_warning(message, Some(self.step.path.clone()));
    }

    pub fn missing_identity(&self, table: &Table, row_index: usize, what: &str) -> ProcessorError {
        ProcessorError::SourceRead {
            path: table.path.clone(),
            row: Some(row_index),
            message: format!("row has no value for {}", what),
        }
    }

    /// Run `f` over every row. Undecodable records and arity are checked
    /// first; row-level read failures are skipped with a warning when the run
    /// allows it.
    pub fn for_each_row<F>(
        &mut self,
        table: &Table,
        mapping: &ColumnMapping,
        mut f: F,
    ) -> Result<(), ProcessorError>
    where
        F: FnMut(&mut StepContext<'a>, usize, &[String]) -> Result<(), ProcessorError>,
    {
        for (row_index, row) in table.numbered_rows() {
            self.cancellation.check()?;
            let result = match table.row_error(row_index) {
                Some(e) => Err(e),
                None => match mapping.check_row(&table.path, row_index, row) {
                    Ok(()) => f(self, row_index, row),
                    Err(e) => Err(e),
                },
            };
            match result {
                Ok(()) => {}
                Err(e) if e.is_row_skippable() && self.config.skip_malformed_rows => {
                    self.warn(format!("Skipping malformed row: {}", e));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Applies the behaviour of one step tag to a table.
pub(crate) trait StepHandler: Send + Sync {
    fn step_type(&self) -> StepType;

    fn apply(&self, ctx: &mut StepContext<'_>, table: &Table) -> Result<(), ProcessorError>;
}

pub(crate) struct HandlerRegistry {
    handlers: Vec<Box<dyn StepHandler>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self {
            handlers: vec![
                Box::new(BasicVocabularyHandler),
                Box::new(SubClassVocabularyHandler),
                Box::new(PropertiesVocabularyHandler),
                Box::new(EntityStepHandler::new(InstanceStep::BasicInstanceStep)),
                Box::new(EntityStepHandler::new(InstanceStep::SubClassInstanceStep)),
                Box::new(PropertiesInstanceHandler),
            ],
        }
    }
}

impl HandlerRegistry {
    /// Handlers for the step's tags, in tag order. Marker tags have none.
    pub fn handlers_for(&self, step: &ImportStep) -> Vec<&dyn StepHandler> {
        step.types
            .iter()
            .filter_map(|step_type| {
                self.handlers
                    .iter()
                    .find(|handler| handler.step_type() == *step_type)
                    .map(|handler| handler.as_ref())
            })
            .collect()
    }
}
