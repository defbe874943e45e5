// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tensor runtime supplied by C as a table of function pointers.
//!
//! `TvmdpRuntimeOps` is copied and validated once at context creation.
//! Every callback returns `0` on success or a negative code; `ctx` is
//! passed back untouched.
//!
//! Layer callbacks go both ways: C callbacks handed to `tvmdp_model_load`
//! become a [`LayerBackend`], and whatever backend a slot carries is handed
//! to the C runtime as a `TvmdpLayerCallbacks` table that lives as long as
//! the executor.

use std::ffi::{c_char, c_void, CStr, CString};
use std::path::Path;
use std::sync::Arc;

use super::types::{DLDevice, DLTensor};
use crate::models::{ensure_capacity, ModelId, SHAPE_DIM_MAX};
use crate::runtime::{
    DataType, Device, GraphExecutor, LayerBackend, RuntimeError, TensorMut, TensorRef,
    TensorRuntime,
};

type LoadModuleFn =
    unsafe extern "C" fn(ctx: *mut c_void, path: *const c_char, out_module: *mut *mut c_void) -> i32;
type CreateExecutorFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    graph_json: *const c_char,
    module: *mut c_void,
    device: DLDevice,
    layers: *const TvmdpLayerCallbacks,
    out_executor: *mut *mut c_void,
) -> i32;
type LoadParamsFn =
    unsafe extern "C" fn(ctx: *mut c_void, executor: *mut c_void, data: *const u8, len: usize) -> i32;
type ContainsParamFn =
    unsafe extern "C" fn(ctx: *mut c_void, executor: *mut c_void, name: *const c_char) -> i32;
type NumOutputsFn = unsafe extern "C" fn(ctx: *mut c_void, executor: *mut c_void) -> i32;
type InputShapeFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    executor: *mut c_void,
    name: *const c_char,
    shape: *mut i64,
    capacity: i32,
    out_ndim: *mut i32,
) -> i32;
type OutputShapeFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    executor: *mut c_void,
    index: i32,
    shape: *mut i64,
    capacity: i32,
    out_ndim: *mut i32,
) -> i32;
type SetZeroCopyFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    executor: *mut c_void,
    index: i32,
    tensor: *const DLTensor,
) -> i32;
type RunFn = unsafe extern "C" fn(ctx: *mut c_void, executor: *mut c_void) -> i32;
type FreeExecutorFn = unsafe extern "C" fn(ctx: *mut c_void, executor: *mut c_void);

type LoadLayerFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    model_id: u16,
    layer: *const c_char,
    buffer: *const u8,
    size: usize,
) -> i32;
type UnloadLayerFn =
    unsafe extern "C" fn(ctx: *mut c_void, model_id: u16, layer: *const c_char) -> i32;

/// Runtime function table.
///
/// Ownership of a module passes to `create_executor`, which must release it
/// on failure. Executors are released through `free_executor`. The tensor
/// records passed to the zero-copy setters live only for the call; their
/// data pointers stay valid until the following `run` returns.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TvmdpRuntimeOps {
    pub ctx: *mut c_void,
    pub load_module: Option<LoadModuleFn>,
    pub create_executor: Option<CreateExecutorFn>,
    pub load_params: Option<LoadParamsFn>,
    pub contains_param: Option<ContainsParamFn>,
    pub num_outputs: Option<NumOutputsFn>,
    pub input_shape: Option<InputShapeFn>,
    pub output_shape: Option<OutputShapeFn>,
    pub set_input_zero_copy: Option<SetZeroCopyFn>,
    pub set_output_zero_copy: Option<SetZeroCopyFn>,
    pub run: Option<RunFn>,
    pub free_executor: Option<FreeExecutorFn>,
}

/// Alternate-backend layer callbacks.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TvmdpLayerCallbacks {
    pub ctx: *mut c_void,
    pub load_layer: Option<LoadLayerFn>,
    pub unload_layer: Option<UnloadLayerFn>,
}

/// Validated copy of [`TvmdpRuntimeOps`].
struct Ops {
    ctx: *mut c_void,
    load_module: LoadModuleFn,
    create_executor: CreateExecutorFn,
    load_params: LoadParamsFn,
    contains_param: ContainsParamFn,
    num_outputs: NumOutputsFn,
    input_shape: InputShapeFn,
    output_shape: OutputShapeFn,
    set_input_zero_copy: SetZeroCopyFn,
    set_output_zero_copy: SetZeroCopyFn,
    run: RunFn,
    free_executor: FreeExecutorFn,
}

// SAFETY: the C runtime contract requires `ctx` and the callbacks to be
// usable from any thread, one executor at a time.
unsafe impl Send for Ops {}
unsafe impl Sync for Ops {}

fn require<T>(f: Option<T>, name: &str) -> Result<T, RuntimeError> {
    f.ok_or_else(|| RuntimeError::new(format!("runtime op '{name}' is null")))
}

fn check(code: i32, what: &str) -> Result<(), RuntimeError> {
    if code < 0 {
        return Err(RuntimeError::new(format!("{what} failed with code {code}")));
    }
    Ok(())
}

fn c_string(s: &str) -> Result<CString, RuntimeError> {
    CString::new(s).map_err(|_| RuntimeError::new(format!("'{s}' contains a NUL byte")))
}

/// [`TensorRuntime`] backed by a C function table.
pub struct CRuntime {
    ops: Arc<Ops>,
}

impl CRuntime {
    pub fn new(ops: &TvmdpRuntimeOps) -> Result<Self, RuntimeError> {
        let ops = Ops {
            ctx: ops.ctx,
            load_module: require(ops.load_module, "load_module")?,
            create_executor: require(ops.create_executor, "create_executor")?,
            load_params: require(ops.load_params, "load_params")?,
            contains_param: require(ops.contains_param, "contains_param")?,
            num_outputs: require(ops.num_outputs, "num_outputs")?,
            input_shape: require(ops.input_shape, "input_shape")?,
            output_shape: require(ops.output_shape, "output_shape")?,
            set_input_zero_copy: require(ops.set_input_zero_copy, "set_input_zero_copy")?,
            set_output_zero_copy: require(ops.set_output_zero_copy, "set_output_zero_copy")?,
            run: require(ops.run, "run")?,
            free_executor: require(ops.free_executor, "free_executor")?,
        };
        Ok(Self { ops: Arc::new(ops) })
    }
}

/// Module handle returned by `load_module`.
pub struct CModule(*mut c_void);

impl TensorRuntime for CRuntime {
    type Module = CModule;
    type Executor = CExecutor;

    fn load_module(&self, path: &Path) -> Result<CModule, RuntimeError> {
        let path = path
            .to_str()
            .ok_or_else(|| RuntimeError::new("staging path is not valid UTF-8"))?;
        let path = c_string(path)?;
        let mut module = std::ptr::null_mut();
        // SAFETY: path is NUL-terminated and outlives the call.
        let code = unsafe { (self.ops.load_module)(self.ops.ctx, path.as_ptr(), &mut module) };
        check(code, "load_module")?;
        Ok(CModule(module))
    }

    fn create_executor(
        &self,
        graph_json: &str,
        module: CModule,
        device: Device,
        backend: Option<Arc<dyn LayerBackend>>,
    ) -> Result<CExecutor, RuntimeError> {
        let graph_json = c_string(graph_json)?;
        let bridge = backend.map(LayerBridge::new);
        let layers = bridge
            .as_ref()
            .map_or(std::ptr::null(), |b| &*b.callbacks as *const TvmdpLayerCallbacks);

        let mut executor = std::ptr::null_mut();
        // SAFETY: graph_json is NUL-terminated for the call; `layers` points
        // into `bridge`, which the executor keeps alive.
        let code = unsafe {
            (self.ops.create_executor)(
                self.ops.ctx,
                graph_json.as_ptr(),
                module.0,
                device.into(),
                layers,
                &mut executor,
            )
        };
        check(code, "create_executor")?;
        Ok(CExecutor {
            ops: Arc::clone(&self.ops),
            handle: executor,
            _bridge: bridge,
        })
    }
}

/// Executor handle returned by `create_executor`; freed on drop.
pub struct CExecutor {
    ops: Arc<Ops>,
    handle: *mut c_void,
    _bridge: Option<LayerBridge>,
}

// SAFETY: see `Ops`; the handle is only used through `&mut self` or by
// read-only queries the runtime contract allows from any thread.
unsafe impl Send for CExecutor {}

impl CExecutor {
    fn shape_with(
        &self,
        what: &str,
        query: impl Fn(*mut i64, i32, *mut i32) -> i32,
    ) -> crate::Result<Vec<i64>> {
        let mut shape = vec![0i64; SHAPE_DIM_MAX];
        let mut ndim = 0i32;
        check(query(shape.as_mut_ptr(), shape.len() as i32, &mut ndim), what)?;
        let ndim = usize::try_from(ndim)
            .map_err(|_| RuntimeError::new(format!("{what} returned ndim {ndim}")))?;
        ensure_capacity("tensor rank", ndim, SHAPE_DIM_MAX)?;
        shape.truncate(ndim);
        Ok(shape)
    }

    fn index(index: usize) -> Result<i32, RuntimeError> {
        i32::try_from(index).map_err(|_| RuntimeError::new(format!("tensor index {index} too large")))
    }
}

fn dl_tensor(data: *mut c_void, shape: &[i64], dtype: DataType, device: Device) -> DLTensor {
    DLTensor {
        data,
        device: device.into(),
        ndim: shape.len() as i32,
        dtype: dtype.into(),
        shape: shape.as_ptr() as *mut i64,
        strides: std::ptr::null_mut(),
        byte_offset: 0,
    }
}

impl GraphExecutor for CExecutor {
    fn load_params(&mut self, params: &[u8]) -> Result<(), RuntimeError> {
        // SAFETY: params is valid for len bytes during the call.
        let code = unsafe {
            (self.ops.load_params)(self.ops.ctx, self.handle, params.as_ptr(), params.len())
        };
        check(code, "load_params")
    }

    fn contains_param(&self, name: &str) -> Result<bool, RuntimeError> {
        let name = c_string(name)?;
        // SAFETY: name is NUL-terminated for the call.
        let code = unsafe { (self.ops.contains_param)(self.ops.ctx, self.handle, name.as_ptr()) };
        check(code, "contains_param")?;
        Ok(code > 0)
    }

    fn num_outputs(&self) -> Result<usize, RuntimeError> {
        // SAFETY: handle is a live executor.
        let n = unsafe { (self.ops.num_outputs)(self.ops.ctx, self.handle) };
        check(n, "num_outputs")?;
        Ok(n as usize)
    }

    fn input_shape(&self, name: &str) -> crate::Result<Vec<i64>> {
        let name = c_string(name)?;
        self.shape_with("input_shape", |shape, capacity, ndim| {
            // SAFETY: shape has `capacity` writable slots; ndim is writable.
            unsafe {
                (self.ops.input_shape)(self.ops.ctx, self.handle, name.as_ptr(), shape, capacity, ndim)
            }
        })
    }

    fn output_shape(&self, index: usize) -> crate::Result<Vec<i64>> {
        let index = Self::index(index)?;
        self.shape_with("output_shape", |shape, capacity, ndim| {
            // SAFETY: shape has `capacity` writable slots; ndim is writable.
            unsafe { (self.ops.output_shape)(self.ops.ctx, self.handle, index, shape, capacity, ndim) }
        })
    }

    fn set_input_zero_copy(&mut self, index: usize, tensor: &TensorRef<'_>) -> Result<(), RuntimeError> {
        let dl = dl_tensor(tensor.as_ptr() as *mut c_void, tensor.shape(), tensor.dtype(), tensor.device());
        // SAFETY: `dl` lives for the call; its data pointer is the caller's
        // buffer, valid until the next run returns.
        let code = unsafe {
            (self.ops.set_input_zero_copy)(self.ops.ctx, self.handle, Self::index(index)?, &dl)
        };
        check(code, "set_input_zero_copy")
    }

    fn set_output_zero_copy(
        &mut self,
        index: usize,
        tensor: &mut TensorMut<'_>,
    ) -> Result<(), RuntimeError> {
        let dl = dl_tensor(
            tensor.as_mut_ptr() as *mut c_void,
            tensor.shape(),
            tensor.dtype(),
            tensor.device(),
        );
        // SAFETY: as for inputs.
        let code = unsafe {
            (self.ops.set_output_zero_copy)(self.ops.ctx, self.handle, Self::index(index)?, &dl)
        };
        check(code, "set_output_zero_copy")
    }

    fn run(&mut self) -> Result<(), RuntimeError> {
        // SAFETY: handle is a live executor with its tensors bound.
        let code = unsafe { (self.ops.run)(self.ops.ctx, self.handle) };
        check(code, "run")
    }
}

impl Drop for CExecutor {
    fn drop(&mut self) {
        // SAFETY: handle came from create_executor and is freed exactly once.
        unsafe { (self.ops.free_executor)(self.ops.ctx, self.handle) };
    }
}

/// Layer callbacks from C, exposed as a [`LayerBackend`].
pub struct CLayerBackend {
    callbacks: TvmdpLayerCallbacks,
}

// SAFETY: callers of `tvmdp_model_load` promise thread-safe callbacks.
unsafe impl Send for CLayerBackend {}
unsafe impl Sync for CLayerBackend {}

impl CLayerBackend {
    pub fn new(callbacks: TvmdpLayerCallbacks) -> Self {
        Self { callbacks }
    }
}

impl LayerBackend for CLayerBackend {
    fn load_layer(&self, model_id: ModelId, layer: &str, buffer: &[u8]) -> Result<(), RuntimeError> {
        let f = require(self.callbacks.load_layer, "load_layer")?;
        let layer = c_string(layer)?;
        // SAFETY: layer and buffer are valid for the call.
        let code = unsafe {
            f(self.callbacks.ctx, model_id.get(), layer.as_ptr(), buffer.as_ptr(), buffer.len())
        };
        check(code, "load_layer")
    }

    fn unload_layer(&self, model_id: ModelId, layer: &str) -> Result<(), RuntimeError> {
        let f = require(self.callbacks.unload_layer, "unload_layer")?;
        let layer = c_string(layer)?;
        // SAFETY: layer is valid for the call.
        let code = unsafe { f(self.callbacks.ctx, model_id.get(), layer.as_ptr()) };
        check(code, "unload_layer")
    }
}

/// C view of a slot's [`LayerBackend`].
struct LayerBridge {
    callbacks: Box<TvmdpLayerCallbacks>,
    // Target of `callbacks.ctx`.
    _backend: Box<Arc<dyn LayerBackend>>,
}

impl LayerBridge {
    fn new(backend: Arc<dyn LayerBackend>) -> Self {
        let backend = Box::new(backend);
        let callbacks = Box::new(TvmdpLayerCallbacks {
            ctx: &*backend as *const Arc<dyn LayerBackend> as *mut c_void,
            load_layer: Some(bridge_load_layer),
            unload_layer: Some(bridge_unload_layer),
        });
        Self {
            callbacks,
            _backend: backend,
        }
    }
}

unsafe fn bridge_backend<'a>(ctx: *mut c_void) -> &'a Arc<dyn LayerBackend> {
    &*(ctx as *const Arc<dyn LayerBackend>)
}

unsafe fn bridge_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

unsafe extern "C" fn bridge_load_layer(
    ctx: *mut c_void,
    model_id: u16,
    layer: *const c_char,
    buffer: *const u8,
    size: usize,
) -> i32 {
    let Some(layer) = bridge_str(layer) else {
        return -crate::error::errno::EINVAL;
    };
    let buffer = if buffer.is_null() || size == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(buffer, size)
    };
    match bridge_backend(ctx).load_layer(ModelId::new(model_id), layer, buffer) {
        Ok(()) => 0,
        Err(_) => -crate::error::errno::EIO,
    }
}

unsafe extern "C" fn bridge_unload_layer(ctx: *mut c_void, model_id: u16, layer: *const c_char) -> i32 {
    let Some(layer) = bridge_str(layer) else {
        return -crate::error::errno::EINVAL;
    };
    match bridge_backend(ctx).unload_layer(ModelId::new(model_id), layer) {
        Ok(()) => 0,
        Err(_) => -crate::error::errno::EIO,
    }
}
