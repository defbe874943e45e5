// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Zero-copy inference dispatch.
//!
//! A run records the start tick, binds every caller tensor into the
//! executor without copying, executes, records the end tick, writes the
//! result sink and only then sets the completion signal.

use super::clock::Clock;
use super::completion::{CompletionSignal, ResultSink, RunResult};
use crate::error::errno;
use crate::models::ModelId;
use crate::runtime::{GraphExecutor, RuntimeError, TensorMut, TensorRef};
use crate::telemetry::{self, LifecycleSpan, SpanExt};

/// One inference request.
///
/// The caller must not read `result` or touch the tensor buffers again
/// until it has observed `completion`.
pub struct InferenceOp<'op, 't> {
    pub inputs: &'op [TensorRef<'t>],
    pub outputs: &'op mut [TensorMut<'t>],
    pub result: &'op ResultSink,
    pub completion: &'op CompletionSignal,
}

impl<'op, 't> InferenceOp<'op, 't> {
    pub fn new(
        inputs: &'op [TensorRef<'t>],
        outputs: &'op mut [TensorMut<'t>],
        result: &'op ResultSink,
        completion: &'op CompletionSignal,
    ) -> Self {
        Self {
            inputs,
            outputs,
            result,
            completion,
        }
    }
}

fn bind_and_run<E: GraphExecutor>(
    executor: &mut E,
    inputs: &[TensorRef<'_>],
    outputs: &mut [TensorMut<'_>],
) -> Result<(), RuntimeError> {
    for (index, tensor) in inputs.iter().enumerate() {
        executor.set_input_zero_copy(index, tensor)?;
    }
    for (index, tensor) in outputs.iter_mut().enumerate() {
        executor.set_output_zero_copy(index, tensor)?;
    }
    executor.run()
}

pub(crate) fn execute<E: GraphExecutor>(
    model_id: ModelId,
    executor: &mut E,
    clock: &dyn Clock,
    op: InferenceOp<'_, '_>,
) -> RunResult {
    let span = LifecycleSpan::run(model_id);
    let _enter = span.enter();

    let start = clock.now();
    let status = bind_and_run(executor, op.inputs, op.outputs);
    let end = clock.now();
    span.record_result(&status);

    let error_code = match &status {
        Ok(()) => 0,
        Err(e) => {
            tracing::warn!(%model_id, error = %e, "inference failed");
            -errno::EIO
        }
    };
    let result = RunResult { error_code, start, end };

    op.result.store(result);
    op.completion.set();

    telemetry::record_run(model_id, &result);
    result
}
