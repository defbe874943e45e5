// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity arena of model slots.
//!
//! Slots are addressed by [`ModelId`] and checked against the arena bounds.
//! A slot holds a [`LoadedModel`] exactly when it is loaded; the runtime
//! executor inside it is owned by the slot and dropped on unload or when
//! the registry is torn down.

use std::fmt;
use std::sync::Arc;

use super::artifact::ArtifactSet;
use super::extract;
use super::graph::GraphJson;
use super::metadata::ModelMetadata;
use crate::engine::{dispatch, Clock, InferenceOp, RunResult};
use crate::error::{Result, TvmdpError};
use crate::runtime::{Device, DeviceHandle, GraphExecutor, LayerBackend};

/// Index of a model slot, assigned by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(u16);

impl ModelId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u16 {
        self.0
    }

    pub fn index(&self) -> usize {
        usize::from(self.0)
    }
}

impl From<u16> for ModelId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Load state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Loaded,
}

/// Per-slot execution counters, in ticks of the configured clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub runs: u64,
    pub failures: u64,
    pub last_latency: u64,
}

/// Name and version reported in the model metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelLabel {
    pub name: String,
    pub version: String,
}

/// Everything a slot owns while loaded.
pub(crate) struct LoadedModel<E> {
    pub(crate) executor: E,
    pub(crate) graph: GraphJson,
    pub(crate) artifacts: ArtifactSet,
    pub(crate) device: DeviceHandle,
    pub(crate) label: ModelLabel,
    /// Kept alive for as long as the runtime may call into it.
    pub(crate) backend: Option<Arc<dyn LayerBackend>>,
}

/// One model slot.
pub struct ModelSlot<E> {
    id: ModelId,
    loaded: Option<LoadedModel<E>>,
    stats: RunStats,
}

impl<E> ModelSlot<E> {
    fn empty(id: ModelId) -> Self {
        Self {
            id,
            loaded: None,
            stats: RunStats::default(),
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn state(&self) -> SlotState {
        if self.loaded.is_some() {
            SlotState::Loaded
        } else {
            SlotState::Empty
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Driver device token recorded at load.
    pub fn device_handle(&self) -> Option<DeviceHandle> {
        self.loaded.as_ref().map(|m| m.device)
    }

    /// Descriptors of the bundle this slot was loaded from.
    pub fn artifacts(&self) -> Option<&ArtifactSet> {
        self.loaded.as_ref().map(|m| &m.artifacts)
    }

    pub fn label(&self) -> Option<&ModelLabel> {
        self.loaded.as_ref().map(|m| &m.label)
    }

    pub fn has_layer_backend(&self) -> bool {
        self.loaded.as_ref().is_some_and(|m| m.backend.is_some())
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub(crate) fn install(&mut self, model: LoadedModel<E>) -> Result<()> {
        if self.loaded.is_some() {
            return Err(TvmdpError::AlreadyLoaded(self.id));
        }
        self.loaded = Some(model);
        self.stats = RunStats::default();
        Ok(())
    }

    /// Take the loaded model out, leaving the slot empty.
    pub(crate) fn release(&mut self) -> Result<LoadedModel<E>> {
        let model = self.loaded.take().ok_or(TvmdpError::NotLoaded(self.id))?;
        self.stats = RunStats::default();
        Ok(model)
    }

    fn loaded(&self) -> Result<&LoadedModel<E>> {
        self.loaded.as_ref().ok_or(TvmdpError::NotLoaded(self.id))
    }
}

impl<E: GraphExecutor> ModelSlot<E> {
    /// Stage 2 metadata from the live runtime handle.
    pub fn runtime_metadata(&self, device: Device) -> Result<ModelMetadata> {
        extract::runtime_metadata(self.id, self.loaded()?, device)
    }

    /// Stage 1 and Stage 2 metadata combined.
    pub fn metadata(&self, device: Device) -> Result<ModelMetadata> {
        extract::full_metadata(self.id, self.loaded()?, device)
    }

    /// Bind the op's tensors, execute, and signal completion.
    ///
    /// Fails only on the slot precondition; execution failures are reported
    /// through the op's result sink.
    pub fn run(&mut self, clock: &dyn Clock, op: InferenceOp<'_, '_>) -> Result<RunResult> {
        let model = self.loaded.as_mut().ok_or(TvmdpError::NotLoaded(self.id))?;
        let result = dispatch::execute(self.id, &mut model.executor, clock, op);

        self.stats.runs += 1;
        self.stats.last_latency = result.latency();
        if !result.is_ok() {
            self.stats.failures += 1;
        }
        Ok(result)
    }
}

/// Slot arena plus the clock source, created by `configure`.
pub struct Registry<E> {
    slots: Box<[ModelSlot<E>]>,
    clock: Box<dyn Clock>,
}

impl<E> Registry<E> {
    pub(crate) fn allocate(nb_models: u16, clock: Box<dyn Clock>) -> Result<Self> {
        if nb_models == 0 {
            return Err(TvmdpError::InvalidArgument("nb_models must be > 0".into()));
        }
        let count = usize::from(nb_models);
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(count)
            .map_err(|e| TvmdpError::ResourceExhausted(format!("slot array: {e}")))?;
        slots.extend((0..nb_models).map(|id| ModelSlot::empty(ModelId(id))));

        Ok(Self {
            slots: slots.into_boxed_slice(),
            clock,
        })
    }

    pub fn nb_models(&self) -> usize {
        self.slots.len()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn slots(&self) -> &[ModelSlot<E>] {
        &self.slots
    }

    /// Clock and slot arena, borrowed separately so callers can split the
    /// slots across threads.
    pub fn split_mut(&mut self) -> (&dyn Clock, &mut [ModelSlot<E>]) {
        (self.clock.as_ref(), &mut self.slots)
    }

    pub fn slot(&self, id: ModelId) -> Result<&ModelSlot<E>> {
        let nb_models = self.slots.len();
        self.slots.get(id.index()).ok_or_else(|| out_of_range(id, nb_models))
    }

    pub fn slot_mut(&mut self, id: ModelId) -> Result<&mut ModelSlot<E>> {
        let nb_models = self.slots.len();
        self.slots
            .get_mut(id.index())
            .ok_or_else(|| out_of_range(id, nb_models))
    }

    pub fn loaded_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_loaded()).count()
    }

    pub fn loaded_ids(&self) -> Vec<ModelId> {
        self.slots.iter().filter(|s| s.is_loaded()).map(|s| s.id).collect()
    }
}

pub(crate) fn out_of_range(id: ModelId, nb_models: usize) -> TvmdpError {
    TvmdpError::InvalidArgument(format!("model_id {id} out of range (nb_models = {nb_models})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MonotonicClock;

    fn registry(n: u16) -> Registry<()> {
        Registry::allocate(n, Box::new(MonotonicClock::new())).unwrap()
    }

    #[test]
    fn test_allocate_zero_is_invalid() {
        let err = Registry::<()>::allocate(0, Box::new(MonotonicClock::new())).err().unwrap();
        assert!(matches!(err, TvmdpError::InvalidArgument(_)));
    }

    #[test]
    fn test_slots_start_empty_with_sequential_ids() {
        let reg = registry(4);
        assert_eq!(reg.nb_models(), 4);
        for (i, slot) in reg.slots().iter().enumerate() {
            assert_eq!(slot.id().index(), i);
            assert_eq!(slot.state(), SlotState::Empty);
            assert!(slot.device_handle().is_none());
        }
        assert_eq!(reg.loaded_count(), 0);
    }

    #[test]
    fn test_out_of_range_id() {
        let mut reg = registry(2);
        assert!(reg.slot(ModelId::new(1)).is_ok());
        assert!(matches!(reg.slot(ModelId::new(2)), Err(TvmdpError::InvalidArgument(_))));
        assert!(matches!(reg.slot_mut(ModelId::new(9)), Err(TvmdpError::InvalidArgument(_))));
    }

    #[test]
    fn test_release_empty_slot_is_not_loaded() {
        let mut reg = registry(1);
        let slot = reg.slot_mut(ModelId::new(0)).unwrap();
        assert!(matches!(slot.release(), Err(TvmdpError::NotLoaded(_))));
    }
}
