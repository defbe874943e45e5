// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! `#[repr(C)]` records exchanged across the C ABI.

use std::ffi::{c_char, c_void};

use crate::engine::RunResult;
use crate::error::{Result, TvmdpError};
use crate::models::{
    ensure_capacity, IoTensorSpec, LayerInfo, ModelMetadata, INPUT_OUTPUT_MAX, LAYERS_MAX,
    NAME_MAX_LEN, SHAPE_DIM_MAX,
};
use crate::runtime::{DataType, Device, DeviceKind};

/// Size of every fixed name field, NUL terminator included.
pub const TVMDP_NAME_STRLEN: usize = NAME_MAX_LEN + 1;

/// DLPack `DLDevice`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DLDevice {
    pub device_type: i32,
    pub device_id: i32,
}

/// DLPack `DLDataType`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DLDataType {
    pub code: u8,
    pub bits: u8,
    pub lanes: u16,
}

/// DLPack `DLTensor`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DLTensor {
    pub data: *mut c_void,
    pub device: DLDevice,
    pub ndim: i32,
    pub dtype: DLDataType,
    pub shape: *mut i64,
    pub strides: *mut i64,
    pub byte_offset: u64,
}

impl From<Device> for DLDevice {
    fn from(device: Device) -> Self {
        Self {
            device_type: device.kind as i32,
            device_id: device.id,
        }
    }
}

impl TryFrom<DLDevice> for Device {
    type Error = TvmdpError;

    fn try_from(device: DLDevice) -> Result<Self> {
        let kind = DeviceKind::from_raw(device.device_type).ok_or_else(|| {
            TvmdpError::InvalidArgument(format!("unknown device type {}", device.device_type))
        })?;
        Ok(Device {
            kind,
            id: device.device_id,
        })
    }
}

impl From<DataType> for DLDataType {
    fn from(dtype: DataType) -> Self {
        Self {
            code: dtype.code,
            bits: dtype.bits,
            lanes: dtype.lanes,
        }
    }
}

impl From<DLDataType> for DataType {
    fn from(dtype: DLDataType) -> Self {
        Self {
            code: dtype.code,
            bits: dtype.bits,
            lanes: dtype.lanes,
        }
    }
}

/// One artifact of a model object: a named span of caller memory.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TvmdpArtifact {
    pub name: [c_char; TVMDP_NAME_STRLEN],
    pub size: u64,
    pub offset: u64,
    pub addr: *const c_void,
}

/// The three artifacts handed to `tvmdp_model_load`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TvmdpModelObject {
    pub so: TvmdpArtifact,
    pub json: TvmdpArtifact,
    pub params: TvmdpArtifact,
}

/// Result sink filled by `tvmdp_model_run` before the status word is set.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TvmdpResult {
    pub error_code: i32,
    pub start_cycle: u64,
    pub end_cycle: u64,
}

impl From<RunResult> for TvmdpResult {
    fn from(result: RunResult) -> Self {
        Self {
            error_code: result.error_code,
            start_cycle: result.start,
            end_cycle: result.end,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TvmdpLayerInfo {
    pub name: [c_char; TVMDP_NAME_STRLEN],
    pub backend: [c_char; TVMDP_NAME_STRLEN],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TvmdpIoInfo {
    pub name: [c_char; TVMDP_NAME_STRLEN],
    pub format: u8,
    pub ndim: u32,
    pub shape: [i64; SHAPE_DIM_MAX],
    pub datatype: DLDataType,
    pub model_datatype: DLDataType,
    pub scale: f32,
    pub device: DLDevice,
}

/// Fixed-capacity metadata record filled by `tvmdp_model_metadata_get`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TvmdpModelMetadata {
    pub name: [c_char; TVMDP_NAME_STRLEN],
    pub version: [c_char; TVMDP_NAME_STRLEN],
    pub num_input: u32,
    pub num_output: u32,
    pub num_layers: u32,
    pub layer: [TvmdpLayerInfo; LAYERS_MAX],
    pub input: [TvmdpIoInfo; INPUT_OUTPUT_MAX],
    pub output: [TvmdpIoInfo; INPUT_OUTPUT_MAX],
}

/// Copy `s` into a NUL-terminated fixed field, zero-filling the rest.
pub(crate) fn write_name(dst: &mut [c_char; TVMDP_NAME_STRLEN], s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > NAME_MAX_LEN || bytes.contains(&0) {
        return Err(TvmdpError::InvalidArgument(format!(
            "'{s}' does not fit a {TVMDP_NAME_STRLEN}-byte name field"
        )));
    }
    dst.fill(0);
    for (d, &b) in dst.iter_mut().zip(bytes) {
        *d = b as c_char;
    }
    Ok(())
}

/// Read a NUL-terminated fixed field. A field without a terminator is
/// read in full.
pub(crate) fn read_name(src: &[c_char; TVMDP_NAME_STRLEN]) -> Result<String> {
    let bytes: Vec<u8> = src.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8(bytes)
        .map_err(|_| TvmdpError::InvalidArgument("name field is not valid UTF-8".into()))
}

impl TvmdpLayerInfo {
    fn fill(&mut self, layer: &LayerInfo) -> Result<()> {
        write_name(&mut self.name, &layer.name)?;
        write_name(&mut self.backend, &layer.backend)
    }
}

impl TvmdpIoInfo {
    fn fill(&mut self, spec: &IoTensorSpec) -> Result<()> {
        write_name(&mut self.name, &spec.name)?;
        self.format = spec.format as u8;
        self.ndim = spec.shape.len() as u32;
        self.shape = [0; SHAPE_DIM_MAX];
        self.shape[..spec.shape.len()].copy_from_slice(&spec.shape);
        self.datatype = spec.datatype.into();
        self.model_datatype = spec.model_datatype.into();
        self.scale = spec.scale;
        self.device = spec.device.into();
        Ok(())
    }
}

impl TvmdpModelMetadata {
    fn zeroed() -> Box<Self> {
        // SAFETY: every field is an integer, float or array of them, so
        // all-zero bytes are a valid record.
        Box::new(unsafe { std::mem::zeroed() })
    }

    /// Overwrite this record with `metadata`.
    ///
    /// Lists are already bounded by the record capacities when built; a
    /// record that does not fit is rejected rather than truncated. The
    /// record is only written on success, and entries past the reported
    /// counts are zeroed.
    pub(crate) fn fill(&mut self, metadata: &ModelMetadata) -> Result<()> {
        let model = &metadata.model;
        ensure_capacity("layers", model.layers.len(), LAYERS_MAX)?;
        ensure_capacity("inputs", metadata.input.len(), INPUT_OUTPUT_MAX)?;
        ensure_capacity("outputs", metadata.output.len(), INPUT_OUTPUT_MAX)?;
        for spec in metadata.input.iter().chain(&metadata.output) {
            ensure_capacity("tensor rank", spec.shape.len(), SHAPE_DIM_MAX)?;
        }

        let mut record = Self::zeroed();
        write_name(&mut record.name, &model.name)?;
        write_name(&mut record.version, &model.version)?;
        record.num_input = model.num_input as u32;
        record.num_output = model.num_output as u32;
        record.num_layers = model.layers.len() as u32;
        for (dst, layer) in record.layer.iter_mut().zip(&model.layers) {
            dst.fill(layer)?;
        }
        for (dst, spec) in record.input.iter_mut().zip(&metadata.input) {
            dst.fill(spec)?;
        }
        for (dst, spec) in record.output.iter_mut().zip(&metadata.output) {
            dst.fill(spec)?;
        }
        *self = *record;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelInfo;

    fn zeroed() -> Box<TvmdpModelMetadata> {
        TvmdpModelMetadata::zeroed()
    }

    #[test]
    fn test_name_round_trip_and_limit() {
        let mut field = [0 as c_char; TVMDP_NAME_STRLEN];
        write_name(&mut field, "tvmdp_model_3").unwrap();
        assert_eq!(read_name(&field).unwrap(), "tvmdp_model_3");
        assert_eq!(field[13], 0);

        let long = "x".repeat(NAME_MAX_LEN + 1);
        assert!(matches!(write_name(&mut field, &long), Err(TvmdpError::InvalidArgument(_))));
        write_name(&mut field, &"y".repeat(NAME_MAX_LEN)).unwrap();
        assert_eq!(field[NAME_MAX_LEN], 0);
    }

    #[test]
    fn test_fill_metadata_record() {
        let metadata = ModelMetadata {
            model: ModelInfo {
                name: "resnet".into(),
                version: "1.0".into(),
                num_input: 1,
                num_output: 1,
                layers: vec![LayerInfo::new("L1", "mrvl").unwrap()],
            },
            input: vec![IoTensorSpec::new("x", vec![1, 3, 224, 224], Device::cpu(0)).unwrap()],
            output: vec![IoTensorSpec::new("output_0", vec![1, 1000], Device::cpu(0)).unwrap()],
        };
        let mut record = zeroed();
        record.fill(&metadata).unwrap();

        assert_eq!(read_name(&record.name).unwrap(), "resnet");
        assert_eq!(read_name(&record.version).unwrap(), "1.0");
        assert_eq!(record.num_layers, 1);
        assert_eq!(read_name(&record.layer[0].backend).unwrap(), "mrvl");
        assert_eq!(record.input[0].ndim, 4);
        assert_eq!(&record.input[0].shape[..4], &[1, 3, 224, 224]);
        assert_eq!(record.input[0].datatype, DLDataType { code: 2, bits: 32, lanes: 1 });
        assert_eq!(record.input[0].scale, 1.0);
        assert_eq!(record.output[0].device, DLDevice { device_type: 1, device_id: 0 });
    }

    #[test]
    fn test_oversized_metadata_rejected() {
        let mut metadata = ModelMetadata::default();
        metadata.model.layers = (0..=LAYERS_MAX)
            .map(|i| LayerInfo::new(format!("L{i}"), "llvm").unwrap())
            .collect();
        let mut record = zeroed();
        assert!(matches!(
            record.fill(&metadata),
            Err(TvmdpError::CapacityExceeded { what: "layers", .. })
        ));
    }

    #[test]
    fn test_failed_fill_leaves_record_untouched() {
        let mut first = ModelMetadata::default();
        first.model.name = "first".into();
        first.model.num_input = 2;
        first.input = vec![
            IoTensorSpec::new("a", vec![1], Device::cpu(0)).unwrap(),
            IoTensorSpec::new("b", vec![2], Device::cpu(0)).unwrap(),
        ];
        let mut record = zeroed();
        record.fill(&first).unwrap();

        let mut bad = first.clone();
        bad.model.name = "second".into();
        bad.input[1].name = "b\0c".into();
        assert!(matches!(record.fill(&bad), Err(TvmdpError::InvalidArgument(_))));
        assert_eq!(read_name(&record.name).unwrap(), "first");
        assert_eq!(read_name(&record.input[1].name).unwrap(), "b");

        let mut smaller = ModelMetadata::default();
        smaller.model.name = "second".into();
        smaller.model.num_input = 1;
        smaller.input = vec![IoTensorSpec::new("c", vec![3], Device::cpu(0)).unwrap()];
        record.fill(&smaller).unwrap();
        assert_eq!(record.num_input, 1);
        assert_eq!(read_name(&record.input[0].name).unwrap(), "c");
        assert_eq!(read_name(&record.input[1].name).unwrap(), "");
        assert_eq!(record.input[1].shape[0], 0);
    }

    #[test]
    fn test_device_conversion() {
        let dl: DLDevice = Device { kind: DeviceKind::ExtDev, id: 2 }.into();
        assert_eq!(dl.device_type, 12);
        assert_eq!(Device::try_from(dl).unwrap().id, 2);
        assert!(Device::try_from(DLDevice { device_type: 99, device_id: 0 }).is_err());
    }
}
