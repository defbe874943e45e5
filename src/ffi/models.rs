// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model lifecycle, metadata and run entry points for FFI.

use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::error::{null_argument, report, status};
use super::runtime::{CLayerBackend, TvmdpLayerCallbacks};
use super::types::{
    read_name, DLTensor, TvmdpArtifact, TvmdpModelMetadata, TvmdpModelObject, TvmdpResult,
};
use super::TvmdpContext;
use crate::context::{LoadOptions, Tvmdp};
use crate::engine::{CompletionSignal, InferenceOp, ResultSink};
use crate::error::{Result, TvmdpError};
use crate::models::{extract_structural, ArtifactBundle, ArtifactDescriptor, ModelId};
use crate::runtime::{DeviceHandle, TensorMut, TensorRef, TensorRuntime};

/// Value stored into the status word once a run's result is written.
pub const TVMDP_RUN_DONE: u64 = 1;

unsafe fn bytes<'a>(addr: *const c_void, size: u64, what: &str) -> Result<&'a [u8]> {
    let len = usize::try_from(size)
        .map_err(|_| TvmdpError::InvalidArgument(format!("{what} size {size} too large")))?;
    if len == 0 {
        return Ok(&[]);
    }
    if addr.is_null() {
        return Err(TvmdpError::InvalidArgument(format!("{what} address is null")));
    }
    Ok(std::slice::from_raw_parts(addr as *const u8, len))
}

unsafe fn descriptor<'a>(artifact: &TvmdpArtifact, what: &str) -> Result<ArtifactDescriptor<'a>> {
    let data = bytes(artifact.addr, artifact.size, what)?;
    Ok(ArtifactDescriptor::new(read_name(&artifact.name)?, data)?.with_offset(artifact.offset))
}

unsafe fn bundle<'a>(object: &TvmdpModelObject) -> Result<ArtifactBundle<'a>> {
    Ok(ArtifactBundle::new(
        descriptor(&object.so, "code")?,
        descriptor(&object.json, "topology")?,
        descriptor(&object.params, "params")?,
    ))
}

/// Report the state error a load would hit before looking at the bundle.
fn missing_bundle<R: TensorRuntime>(ctx: &Tvmdp<R>, model_id: ModelId) -> TvmdpError {
    let slot = match ctx.registry().and_then(|r| r.slot(model_id)) {
        Ok(slot) => slot,
        Err(e) => return e,
    };
    if slot.is_loaded() {
        return TvmdpError::AlreadyLoaded(model_id);
    }
    TvmdpError::InvalidArgument("null model object".into())
}

/// Load a model object into slot `model_id`.
///
/// `layers` may be null. When set, the callbacks are handed to the runtime
/// and must stay callable until the model is unloaded.
///
/// # Safety
/// `ctx` must be a live context; `object` must be null or point to a model
/// object whose artifact addresses are readable for their sizes.
#[no_mangle]
pub unsafe extern "C" fn tvmdp_model_load(
    ctx: *mut TvmdpContext,
    device: u64,
    model_id: u16,
    object: *const TvmdpModelObject,
    layers: *const TvmdpLayerCallbacks,
) -> i32 {
    let Some(ctx) = ctx.as_mut() else {
        return null_argument("ctx");
    };
    let model_id = ModelId::new(model_id);
    let Some(object) = object.as_ref() else {
        return report(&missing_bundle(&ctx.inner, model_id));
    };

    let bundle = match bundle(object) {
        Ok(b) => b,
        Err(e) => return report(&e),
    };
    let mut options = LoadOptions::new();
    if let Some(callbacks) = layers.as_ref() {
        options = options.with_backend(Arc::new(CLayerBackend::new(*callbacks)));
    }
    status(ctx.inner.load(DeviceHandle(device), model_id, &bundle, options))
}

/// # Safety
/// `ctx` must be a live context.
#[no_mangle]
pub unsafe extern "C" fn tvmdp_model_unload(ctx: *mut TvmdpContext, model_id: u16) -> i32 {
    let Some(ctx) = ctx.as_mut() else {
        return null_argument("ctx");
    };
    status(ctx.inner.unload(ModelId::new(model_id)))
}

/// Fill `out` with Stage 1 and Stage 2 metadata of a loaded model.
///
/// # Safety
/// `ctx` must be a live context; `out` must point to a writable record.
#[no_mangle]
pub unsafe extern "C" fn tvmdp_model_metadata_get(
    ctx: *mut TvmdpContext,
    model_id: u16,
    out: *mut TvmdpModelMetadata,
) -> i32 {
    let Some(ctx) = ctx.as_ref() else {
        return null_argument("ctx");
    };
    let Some(out) = out.as_mut() else {
        return null_argument("out");
    };
    let result = ctx
        .inner
        .metadata(ModelId::new(model_id))
        .and_then(|metadata| out.fill(&metadata));
    status(result)
}

/// Stage 1 metadata of a topology buffer, independent of any context.
///
/// Only the name, version and layer fields of `out` are populated; the
/// input and output sections are cleared.
///
/// # Safety
/// `buffer` must be readable for `size` bytes; `out` must be writable.
#[no_mangle]
pub unsafe extern "C" fn tvmdp_extract_structural(
    buffer: *const c_void,
    size: u64,
    out: *mut TvmdpModelMetadata,
) -> i32 {
    let Some(out) = out.as_mut() else {
        return null_argument("out");
    };
    let result = bytes(buffer, size, "topology")
        .and_then(extract_structural)
        .and_then(|metadata| out.fill(&metadata));
    status(result)
}

fn tensor_len(tensor: &DLTensor, shape: &[i64]) -> Result<usize> {
    let elements = shape.iter().try_fold(1usize, |acc, &d| {
        usize::try_from(d).ok().and_then(|d| acc.checked_mul(d))
    });
    elements
        .and_then(|n| n.checked_mul(crate::runtime::DataType::from(tensor.dtype).size_bytes()))
        .ok_or_else(|| TvmdpError::InvalidArgument(format!("invalid tensor shape {shape:?}")))
}

unsafe fn tensor_parts<'a>(tensor: &DLTensor) -> Result<(*mut u8, usize, &'a [i64])> {
    let ndim = usize::try_from(tensor.ndim)
        .map_err(|_| TvmdpError::InvalidArgument(format!("negative ndim {}", tensor.ndim)))?;
    let shape: &[i64] = if ndim == 0 {
        &[]
    } else if tensor.shape.is_null() {
        return Err(TvmdpError::InvalidArgument("tensor shape is null".into()));
    } else {
        std::slice::from_raw_parts(tensor.shape, ndim)
    };
    let len = tensor_len(tensor, shape)?;
    if len > 0 && tensor.data.is_null() {
        return Err(TvmdpError::InvalidArgument("tensor data is null".into()));
    }
    let data = (tensor.data as *mut u8).wrapping_add(tensor.byte_offset as usize);
    Ok((data, len, shape))
}

unsafe fn tensors<'a>(ptr: *const DLTensor, count: i32, what: &str) -> Result<&'a [DLTensor]> {
    let count = usize::try_from(count)
        .map_err(|_| TvmdpError::InvalidArgument(format!("negative {what} count {count}")))?;
    if count == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(TvmdpError::InvalidArgument(format!("{what} tensors are null")));
    }
    Ok(std::slice::from_raw_parts(ptr, count))
}

unsafe fn input_ref<'a>(tensor: &DLTensor) -> Result<TensorRef<'a>> {
    let (data, len, shape) = tensor_parts(tensor)?;
    let data: &[u8] = if len == 0 { &[] } else { std::slice::from_raw_parts(data, len) };
    Ok(TensorRef::new(data, shape, tensor.dtype.into()).with_device(tensor.device.try_into()?))
}

unsafe fn output_mut<'a>(tensor: &DLTensor) -> Result<TensorMut<'a>> {
    let (data, len, shape) = tensor_parts(tensor)?;
    let data: &mut [u8] = if len == 0 {
        &mut []
    } else {
        std::slice::from_raw_parts_mut(data, len)
    };
    Ok(TensorMut::new(data, shape, tensor.dtype.into()).with_device(tensor.device.try_into()?))
}

/// Run inference on a loaded model.
///
/// On a `0` return the result has been written to `result` and
/// [`TVMDP_RUN_DONE`] stored into `*status` with release ordering; pollers
/// must load it with acquire ordering before reading `result`. A negative
/// return means nothing was dispatched and neither is written.
///
/// # Safety
/// `ctx` must be a live context. Tensor arrays must hold `num_input` and
/// `num_output` records whose buffers stay valid and unaliased until the
/// status word is observed. `status` must be 8-byte aligned.
#[no_mangle]
pub unsafe extern "C" fn tvmdp_model_run(
    ctx: *mut TvmdpContext,
    model_id: u16,
    num_input: i32,
    input: *const DLTensor,
    num_output: i32,
    output: *const DLTensor,
    result: *mut TvmdpResult,
    status_word: *mut u64,
) -> i32 {
    let Some(ctx) = ctx.as_mut() else {
        return null_argument("ctx");
    };
    if result.is_null() {
        return null_argument("result");
    }
    if status_word.is_null() {
        return null_argument("status");
    }

    let bound = tensors(input, num_input, "input")
        .and_then(|ts| ts.iter().map(|t| input_ref(t)).collect::<Result<Vec<_>>>())
        .and_then(|inputs| {
            let outputs = tensors(output, num_output, "output")?
                .iter()
                .map(|t| output_mut(t))
                .collect::<Result<Vec<_>>>()?;
            Ok((inputs, outputs))
        });
    let (inputs, mut outputs) = match bound {
        Ok(b) => b,
        Err(e) => return report(&e),
    };

    let sink = ResultSink::new();
    let completion = CompletionSignal::new();
    let op = InferenceOp::new(&inputs, &mut outputs, &sink, &completion);
    match ctx.inner.run(ModelId::new(model_id), op) {
        Ok(run) => {
            result.write(run.into());
            // SAFETY: caller guarantees alignment; AtomicU64 has the layout
            // of u64.
            let word = &*(status_word as *const AtomicU64);
            word.store(TVMDP_RUN_DONE, Ordering::Release);
            0
        }
        Err(e) => report(&e),
    }
}
