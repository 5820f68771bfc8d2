mod context;

pub use context::{CancellationFlag, ProcessorConfig};
pub(crate) use context::{HandlerRegistry, StepContext, StepHandler};

use crate::error::{ProcessingOutcome, ProcessingState, ProcessorError};
use crate::graph::{GraphState, Phase};
use crate::manifest::{ImportSection, ImportStep, Manifest};
use crate::sink::{DocumentHeader, GraphSink, JsonLdSink};
use crate::source::{CsvRowSource, RowSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs a manifest against a row source, building one graph.
pub struct Processor<S: RowSource = CsvRowSource> {
    manifest: Arc<Manifest>,
    source: S,
    config: ProcessorConfig,
    cancellation: CancellationFlag,
    registry: HandlerRegistry,
    graph: GraphState,
    processing_state: ProcessingState,
}

impl<S: RowSource> Processor<S> {
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn graph(&self) -> &GraphState {
        &self.graph
    }

    pub fn into_graph(self) -> GraphState {
        self.graph
    }

    pub fn processing_state(&self) -> &ProcessingState {
        &self.processing_state
    }

    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Run the model sequence, then the instance sequence.
    pub async fn process(&mut self) -> Result<ProcessingOutcome, ProcessorError> {
        let manifest = Arc::clone(&self.manifest);
        tracing::info!("Starting processing with manifest: {}", manifest.name);

        tracing::info!("Processing model files...");
        for step in &manifest.model.sequence {
            self.process_model_step(step).await?;
        }

        tracing::info!("Processing instance files...");
        for step in &manifest.instances.sequence {
            self.process_instance_step(step).await?;
        }

        tracing::info!(
            "Processing completed: {} classes, {} properties, {} entities",
            self.graph.vocabulary().classes.len(),
            self.graph.vocabulary().properties.len(),
            self.graph.instances().len()
        );
        Ok(ProcessingOutcome::from_state(self.processing_state.clone()))
    }

    pub async fn process_model_step(&mut self, step: &ImportStep) -> Result<(), ProcessorError> {
        if self.graph.phase() == Phase::Instances {
            return Err(ProcessorError::InvalidManifest(format!(
                "Model step '{}' cannot run after the instance phase has started",
                step.path
            )));
        }
        if step.model_steps().next().is_none() {
            return Err(ProcessorError::InvalidManifest(format!(
                "Step '{}' has no model step type",
                step.path
            )));
        }
        let manifest = Arc::clone(&self.manifest);
        self.run_step(&manifest.model, step).await
    }

    pub async fn process_instance_step(
        &mut self,
        step: &ImportStep,
    ) -> Result<(), ProcessorError> {
        if step.instance_steps().next().is_none() {
            return Err(ProcessorError::InvalidManifest(format!(
                "Step '{}' has no instance step type",
                step.path
            )));
        }
        if self.graph.phase() == Phase::Model {
            tracing::debug!("Entering instance phase");
            self.graph.enter_instances_phase();
        }
        let manifest = Arc::clone(&self.manifest);
        self.run_step(&manifest.instances, step).await
    }

    async fn run_step(
        &mut self,
        section: &ImportSection,
        step: &ImportStep,
    ) -> Result<(), ProcessorError> {
        let location = Path::new(&section.path).join(&step.path);
        let step_name = location.to_string_lossy().to_string();
        self.apply_step(step, &location)
            .await
            .map_err(|e| e.in_step(&step_name))
    }

    /// Apply every handler of `step` to a staged copy of the graph and commit
    /// it only if all of them succeed.
    async fn apply_step(&mut self, step: &ImportStep, location: &Path) -> Result<(), ProcessorError> {
        self.cancellation.check()?;
        tracing::info!(
            "Processing step: {} (types: {})",
            location.display(),
            step.types
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let table = self.source.read_table(location).await?;
        let mut staged = self.graph.clone();
        let mut state = ProcessingState::new();
        {
            let mut ctx = StepContext {
                step,
                model_base_iri: &self.manifest.model.base_iri,
                instances_base_iri: &self.manifest.instances.base_iri,
                graph: &mut staged,
                processing_state: &mut state,
                config: &self.config,
                cancellation: &self.cancellation,
            };
            for handler in self.registry.handlers_for(step) {
                tracing::debug!("Applying {} to {}", handler.step_type(), location.display());
                handler.apply(&mut ctx, &table)?;
            }
        }

        self.graph = staged;
        self.processing_state.merge(state);
        Ok(())
    }

    pub fn emit<K: GraphSink + ?Sized>(&self, sink: &mut K) -> Result<(), ProcessorError> {
        self.graph.emit(sink)
    }

    /// Write `vocabulary.jsonld` and `instances.jsonld` to `output_dir`.
    pub async fn save(&self, output_dir: &Path) -> Result<(), ProcessorError> {
        let mut sink = JsonLdSink::new(DocumentHeader::from(self.manifest.as_ref()));
        self.emit(&mut sink)?;
        sink.save(output_dir).await
    }
}

pub struct ProcessorBuilder {
    manifest: Manifest,
    base_path: PathBuf,
    config: ProcessorConfig,
    cancellation: CancellationFlag,
}

impl ProcessorBuilder {
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            base_path: PathBuf::from("."),
            config: ProcessorConfig::default(),
            cancellation: CancellationFlag::new(),
        }
    }

    /// Load a manifest; step paths resolve against its directory.
    pub fn from_manifest_file<P: AsRef<Path>>(path: P) -> Result<Self, ProcessorError> {
        let path = path.as_ref();
        let manifest = Manifest::from_file(path)?;
        let base_path = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        tracing::info!("Creating processor with base path: {:?}", base_path);
        Ok(Self::new(manifest).with_base_path(base_path))
    }

    pub fn with_base_path<P: Into<PathBuf>>(mut self, base_path: P) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    pub fn with_skip_malformed_rows(mut self, skip: bool) -> Self {
        self.config.skip_malformed_rows = skip;
        self
    }

    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Build a processor reading CSV files under the base path.
    pub fn build(self) -> Result<Processor<CsvRowSource>, ProcessorError> {
        let source = CsvRowSource::new(self.base_path.clone());
        self.build_with_source(source)
    }

    /// Validate the manifest and build a processor reading from `source`.
    pub fn build_with_source<S: RowSource>(self, source: S) -> Result<Processor<S>, ProcessorError> {
        let mut manifest = self.manifest;
        let mut processing_state = ProcessingState::new();
        for warning in manifest.validate(self.config.strict)? {
            processing_state.add_warning(warning, Some("manifest".to_string()));
        }

        Ok(Processor {
            manifest: Arc::new(manifest),
            source,
            config: self.config,
            cancellation: self.cancellation,
            registry: HandlerRegistry::default(),
            graph: GraphState::new(),
            processing_state,
        })
    }
}
