// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Top-level context: registry state machine and slot lifecycle.
//!
//! ```text
//! Unconfigured ──configure──► Configured ──close──► Unconfigured
//!
//! per slot:  Empty ──load──► Loaded ──unload──► Empty
//!                              │
//!                              ├── run (repeatable)
//!                              └── runtime_metadata / metadata
//! ```
//!
//! There is no internal locking. `&mut self` serializes lifecycle calls;
//! callers wanting to drive different slots from different threads split
//! the arena through [`Registry::split_mut`].

use std::sync::Arc;

use crate::config::ContextConfig;
use crate::engine::{Clock, InferenceOp, RunResult};
use crate::error::{Result, TvmdpError};
use crate::models::{
    out_of_range, ArtifactBundle, GraphJson, LoadedModel, ModelId, ModelLabel, ModelMetadata,
    Registry, StagedModule, NAME_MAX_LEN,
};
use crate::runtime::{DeviceHandle, GraphExecutor, LayerBackend, TensorRuntime};
use crate::telemetry::{self, LifecycleSpan, SpanExt};

/// Optional inputs to [`Tvmdp::load`].
#[derive(Clone, Default)]
pub struct LoadOptions {
    /// Alternate-backend layer hooks, passed through to the runtime.
    pub backend: Option<Arc<dyn LayerBackend>>,
    /// Reported model name; `tvmdp_model_<id>` when unset.
    pub name: Option<String>,
    /// Reported model version; empty when unset.
    pub version: Option<String>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: Arc<dyn LayerBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    fn label(&self) -> Result<ModelLabel> {
        let check = |what: &str, value: &Option<String>| -> Result<String> {
            let value = value.clone().unwrap_or_default();
            if value.len() > NAME_MAX_LEN {
                return Err(TvmdpError::InvalidArgument(format!(
                    "model {what} '{value}' longer than {NAME_MAX_LEN} bytes"
                )));
            }
            Ok(value)
        };
        Ok(ModelLabel {
            name: check("name", &self.name)?,
            version: check("version", &self.version)?,
        })
    }
}

impl std::fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadOptions")
            .field("backend", &self.backend.is_some())
            .field("name", &self.name)
            .field("version", &self.version)
            .finish()
    }
}

/// Model lifecycle and dispatch context over a tensor runtime.
pub struct Tvmdp<R: TensorRuntime> {
    runtime: R,
    config: ContextConfig,
    registry: Option<Registry<R::Executor>>,
}

impl<R: TensorRuntime> Tvmdp<R> {
    /// Create an unconfigured context.
    pub fn new(runtime: R, config: ContextConfig) -> Self {
        Self {
            runtime,
            config,
            registry: None,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.registry.is_some()
    }

    pub fn registry(&self) -> Result<&Registry<R::Executor>> {
        self.registry.as_ref().ok_or(TvmdpError::NotConfigured)
    }

    pub fn registry_mut(&mut self) -> Result<&mut Registry<R::Executor>> {
        self.registry.as_mut().ok_or(TvmdpError::NotConfigured)
    }

    /// Allocate `nb_models` empty slots and install the clock source.
    ///
    /// A second call on a configured context succeeds without touching the
    /// existing slots or clock.
    pub fn configure<C: Clock + 'static>(&mut self, nb_models: u16, clock: C) -> Result<()> {
        if nb_models == 0 {
            return Err(TvmdpError::InvalidArgument("nb_models must be > 0".into()));
        }
        if let Some(registry) = &self.registry {
            tracing::warn!(
                requested = nb_models,
                configured = registry.nb_models(),
                "already configured, ignoring"
            );
            return Ok(());
        }

        self.registry = Some(Registry::allocate(nb_models, Box::new(clock))?);
        tracing::info!(nb_models, device = %self.config.device, "registry configured");
        Ok(())
    }

    /// Release the slot array. Fails while any slot is still loaded.
    pub fn close(&mut self) -> Result<()> {
        let registry = self.registry()?;
        let active = registry.loaded_count();
        if active > 0 {
            return Err(TvmdpError::SlotsStillActive { active });
        }
        self.registry = None;
        tracing::info!("registry closed");
        Ok(())
    }

    /// Load a bundle into an empty slot.
    ///
    /// The code artifact is staged to a temporary file for the runtime's
    /// path-based loader and removed as soon as the runtime has consumed it.
    /// On any failure the slot stays empty.
    pub fn load(
        &mut self,
        device: DeviceHandle,
        model_id: ModelId,
        bundle: &ArtifactBundle<'_>,
        options: LoadOptions,
    ) -> Result<()> {
        let span = LifecycleSpan::load(model_id);
        let _enter = span.enter();

        let result = self.load_inner(device, model_id, bundle, options);
        span.record_result(&result);

        if let Some(registry) = &self.registry {
            let loaded = registry.loaded_count();
            match &result {
                Ok(()) => tracing::info!(%model_id, loaded, "model loaded"),
                Err(e) if !e.is_state_violation() => {
                    tracing::warn!(%model_id, error = %e, "model load failed")
                }
                Err(_) => {}
            }
            telemetry::record_load(model_id, result.is_ok(), loaded);
        }
        result
    }

    fn load_inner(
        &mut self,
        device: DeviceHandle,
        model_id: ModelId,
        bundle: &ArtifactBundle<'_>,
        options: LoadOptions,
    ) -> Result<()> {
        let registry = self.registry.as_mut().ok_or(TvmdpError::NotConfigured)?;
        let slot = registry.slot_mut(model_id)?;
        if slot.is_loaded() {
            return Err(TvmdpError::AlreadyLoaded(model_id));
        }
        bundle.validate()?;
        let label = options.label()?;
        let graph_json = bundle.topology_str()?;
        let graph = GraphJson::parse(bundle.topology.data())?;

        let module = {
            let staged = StagedModule::create(&self.config.staging_dir, model_id, bundle.code.data())?;
            self.runtime.load_module(staged.path())?
        };

        let mut executor = self.runtime.create_executor(
            graph_json,
            module,
            self.config.device,
            options.backend.clone(),
        )?;
        executor.load_params(bundle.params.data())?;

        slot.install(LoadedModel {
            executor,
            graph,
            artifacts: bundle.info(),
            device,
            label,
            backend: options.backend,
        })
    }

    /// Release the runtime handle of a loaded slot.
    pub fn unload(&mut self, model_id: ModelId) -> Result<()> {
        let registry = self.registry_mut()?;
        let model = registry.slot_mut(model_id)?.release()?;
        drop(model);

        let loaded = registry.loaded_count();
        telemetry::record_unload(model_id, loaded);
        tracing::info!(%model_id, loaded, "model unloaded");
        Ok(())
    }

    /// Stage 2: input/output metadata from the live runtime.
    pub fn runtime_metadata(&self, model_id: ModelId) -> Result<ModelMetadata> {
        self.registry()?
            .slot(model_id)?
            .runtime_metadata(self.config.device)
    }

    /// Stage 1 and Stage 2 together for a loaded model.
    pub fn metadata(&self, model_id: ModelId) -> Result<ModelMetadata> {
        self.registry()?.slot(model_id)?.metadata(self.config.device)
    }

    /// Dispatch one inference on a loaded slot.
    ///
    /// `Err` means the op was not dispatched and its signal was not touched.
    /// Once dispatched, execution failures land in the op's result sink and
    /// the completion signal is always set.
    pub fn run(&mut self, model_id: ModelId, op: InferenceOp<'_, '_>) -> Result<RunResult> {
        let (clock, slots) = self.registry_mut()?.split_mut();
        let nb_models = slots.len();
        let slot = slots
            .get_mut(model_id.index())
            .ok_or_else(|| out_of_range(model_id, nb_models))?;
        slot.run(clock, op)
    }
}

impl<R: TensorRuntime> Drop for Tvmdp<R> {
    fn drop(&mut self) {
        if let Some(registry) = &self.registry {
            let loaded = registry.loaded_ids();
            if !loaded.is_empty() {
                tracing::debug!(?loaded, "releasing loaded models on teardown");
            }
        }
    }
}
