// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! C ABI for dataplane drivers.
//!
//! ```text
//! tvmdp_context_create(ops, device, staging_dir, &ctx)
//! tvmdp_configure(ctx, nb_models, clock)
//!   tvmdp_model_load / tvmdp_model_metadata_get / tvmdp_model_run / tvmdp_model_unload
//! tvmdp_close(ctx)
//! tvmdp_context_destroy(ctx)
//! ```
//!
//! All functions return `0` on success or a negative errno value; the
//! message for the last failure on the calling thread is available from
//! `tvmdp_get_last_error`. A context is not internally synchronized.

mod error;
mod models;
mod runtime;
mod types;

use std::ffi::{c_char, CStr};
use std::path::PathBuf;

pub use error::{tvmdp_clear_last_error, tvmdp_get_last_error};
pub use models::{
    tvmdp_extract_structural, tvmdp_model_load, tvmdp_model_metadata_get, tvmdp_model_run,
    tvmdp_model_unload, TVMDP_RUN_DONE,
};
pub use runtime::{CExecutor, CLayerBackend, CModule, CRuntime, TvmdpLayerCallbacks, TvmdpRuntimeOps};
pub use types::{
    DLDataType, DLDevice, DLTensor, TvmdpArtifact, TvmdpIoInfo, TvmdpLayerInfo,
    TvmdpModelMetadata, TvmdpModelObject, TvmdpResult, TVMDP_NAME_STRLEN,
};

use self::error::{null_argument, report, set_last_error, status};
use crate::config;
use crate::context::Tvmdp;
use crate::engine::MonotonicClock;
use crate::error::TvmdpError;
use crate::runtime::Device;
use crate::telemetry;

/// Clock callback: monotonically non-decreasing tick count.
pub type TvmdpClockFn = extern "C" fn() -> u64;

/// Opaque context handle.
pub struct TvmdpContext {
    inner: Tvmdp<CRuntime>,
}

/// Print the library greeting.
#[no_mangle]
pub extern "C" fn tvmdp_hello() -> i32 {
    crate::hello();
    0
}

/// Install the tracing subscriber from `TVMDP_LOG_*` variables.
#[no_mangle]
pub extern "C" fn tvmdp_init_logging() -> i32 {
    match telemetry::init_logging(&config::load().log) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(e.to_string());
            -crate::error::errno::EINVAL
        }
    }
}

/// Slot count from `TVMDP_NB_MODELS`, for drivers without their own.
/// Always at least 1.
#[no_mangle]
pub extern "C" fn tvmdp_default_nb_models() -> u16 {
    config::load().nb_models
}

/// Create an unconfigured context over a C runtime.
///
/// `staging_dir` may be null to use `TVMDP_STAGING_DIR` or the OS temp dir.
///
/// # Safety
/// `ops` and `out_ctx` must be valid pointers; `staging_dir` must be null or
/// a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tvmdp_context_create(
    ops: *const TvmdpRuntimeOps,
    device: DLDevice,
    staging_dir: *const c_char,
    out_ctx: *mut *mut TvmdpContext,
) -> i32 {
    if ops.is_null() {
        return null_argument("ops");
    }
    if out_ctx.is_null() {
        return null_argument("out_ctx");
    }

    let runtime = match CRuntime::new(&*ops) {
        Ok(r) => r,
        Err(e) => return report(&TvmdpError::InvalidArgument(e.to_string())),
    };
    let device = match Device::try_from(device) {
        Ok(d) => d,
        Err(e) => return report(&e),
    };

    let mut context = config::load().context_config();
    context.device = device;
    if !staging_dir.is_null() {
        match CStr::from_ptr(staging_dir).to_str() {
            Ok(dir) => context.staging_dir = PathBuf::from(dir),
            Err(_) => {
                return report(&TvmdpError::InvalidArgument(
                    "staging_dir is not valid UTF-8".into(),
                ))
            }
        }
    }

    let ctx = Box::new(TvmdpContext {
        inner: Tvmdp::new(runtime, context),
    });
    *out_ctx = Box::into_raw(ctx);
    0
}

/// Destroy a context, releasing any models still loaded.
///
/// # Safety
/// `ctx` must be null or a pointer from `tvmdp_context_create` not yet
/// destroyed.
#[no_mangle]
pub unsafe extern "C" fn tvmdp_context_destroy(ctx: *mut TvmdpContext) {
    if !ctx.is_null() {
        drop(Box::from_raw(ctx));
    }
}

/// Allocate `nb_models` slots. `clock` may be null for a monotonic
/// nanosecond clock. Idempotent once configured.
///
/// # Safety
/// `ctx` must be a live context.
#[no_mangle]
pub unsafe extern "C" fn tvmdp_configure(
    ctx: *mut TvmdpContext,
    nb_models: u16,
    clock: Option<TvmdpClockFn>,
) -> i32 {
    let Some(ctx) = ctx.as_mut() else {
        return null_argument("ctx");
    };
    let result = match clock {
        Some(clock) => ctx.inner.configure(nb_models, move || clock()),
        None => ctx.inner.configure(nb_models, MonotonicClock::new()),
    };
    status(result)
}

/// Release the slot array. Fails with `-EBUSY` while models are loaded.
///
/// # Safety
/// `ctx` must be a live context.
#[no_mangle]
pub unsafe extern "C" fn tvmdp_close(ctx: *mut TvmdpContext) -> i32 {
    let Some(ctx) = ctx.as_mut() else {
        return null_argument("ctx");
    };
    status(ctx.inner.close())
}
