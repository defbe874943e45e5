// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! DLPack-shaped value types shared with the tensor runtime.
//!
//! Tensors handed to the dispatcher borrow caller-owned memory. Nothing here
//! copies tensor data; runtimes receive the caller's pointers directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Device family, numbered as in DLPack's `DLDeviceType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum DeviceKind {
    Cpu = 1,
    Cuda = 2,
    OpenCl = 4,
    Vulkan = 7,
    Metal = 8,
    ExtDev = 12,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::OpenCl => "opencl",
            Self::Vulkan => "vulkan",
            Self::Metal => "metal",
            Self::ExtDev => "ext_dev",
        }
    }

    /// Map a raw DLPack device type back to a kind.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Self::Cpu),
            2 => Some(Self::Cuda),
            4 => Some(Self::OpenCl),
            7 => Some(Self::Vulkan),
            8 => Some(Self::Metal),
            12 => Some(Self::ExtDev),
            _ => None,
        }
    }
}

/// Device a runtime executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    pub kind: DeviceKind,
    pub id: i32,
}

impl Device {
    pub const fn cpu(id: i32) -> Self {
        Self { kind: DeviceKind::Cpu, id }
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::cpu(0)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

impl FromStr for Device {
    type Err = String;

    /// Parses `kind[:id]`, e.g. `cpu`, `cuda:1`, `ext_dev:0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = match s.split_once(':') {
            Some((kind, id)) => {
                let id = id
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| format!("invalid device id in '{s}'"))?;
                (kind, id)
            }
            None => (s, 0),
        };
        let kind = match kind.trim().to_ascii_lowercase().as_str() {
            "cpu" | "llvm" => DeviceKind::Cpu,
            "cuda" | "gpu" => DeviceKind::Cuda,
            "opencl" => DeviceKind::OpenCl,
            "vulkan" => DeviceKind::Vulkan,
            "metal" => DeviceKind::Metal,
            "ext_dev" => DeviceKind::ExtDev,
            other => return Err(format!("unknown device kind '{other}'")),
        };
        if id < 0 {
            return Err(format!("negative device id in '{s}'"));
        }
        Ok(Self { kind, id })
    }
}

/// Element type, laid out as DLPack's `DLDataType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataType {
    /// Type code: 0 = int, 1 = uint, 2 = float, 4 = bfloat.
    pub code: u8,
    pub bits: u8,
    pub lanes: u16,
}

impl DataType {
    pub const I8: Self = Self { code: 0, bits: 8, lanes: 1 };
    pub const I32: Self = Self { code: 0, bits: 32, lanes: 1 };
    pub const U8: Self = Self { code: 1, bits: 8, lanes: 1 };
    pub const F16: Self = Self { code: 2, bits: 16, lanes: 1 };
    pub const F32: Self = Self { code: 2, bits: 32, lanes: 1 };

    /// Size of one element in bytes (rounded up).
    pub fn size_bytes(&self) -> usize {
        (usize::from(self.bits) * usize::from(self.lanes)).div_ceil(8)
    }
}

impl Default for DataType {
    fn default() -> Self {
        Self::F32
    }
}

/// Opaque driver-side device token recorded per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceHandle(pub u64);

/// Borrowed, read-only tensor bound as an inference input.
#[derive(Debug, Clone, Copy)]
pub struct TensorRef<'a> {
    data: &'a [u8],
    shape: &'a [i64],
    dtype: DataType,
    device: Device,
}

impl<'a> TensorRef<'a> {
    pub fn new(data: &'a [u8], shape: &'a [i64], dtype: DataType) -> Self {
        Self {
            data,
            shape,
            dtype,
            device: Device::default(),
        }
    }

    /// View an `f32` buffer as an input tensor without copying.
    pub fn from_f32(data: &'a [f32], shape: &'a [i64]) -> Self {
        // SAFETY: u8 has alignment 1 and f32 has no padding bytes, so the
        // byte view covers exactly the same initialized memory.
        let bytes = unsafe {
            std::slice::from_raw_parts(data.as_ptr().cast::<u8>(), std::mem::size_of_val(data))
        };
        Self::new(bytes, shape, DataType::F32)
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn shape(&self) -> &'a [i64] {
        self.shape
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

/// Borrowed, writable tensor bound as an inference output.
#[derive(Debug)]
pub struct TensorMut<'a> {
    data: &'a mut [u8],
    shape: &'a [i64],
    dtype: DataType,
    device: Device,
}

impl<'a> TensorMut<'a> {
    pub fn new(data: &'a mut [u8], shape: &'a [i64], dtype: DataType) -> Self {
        Self {
            data,
            shape,
            dtype,
            device: Device::default(),
        }
    }

    /// View an `f32` buffer as an output tensor without copying.
    pub fn from_f32(data: &'a mut [f32], shape: &'a [i64]) -> Self {
        let len = std::mem::size_of_val(data);
        // SAFETY: every byte pattern is a valid f32, and the exclusive borrow
        // of `data` is moved into the byte view for the same lifetime.
        let bytes = unsafe { std::slice::from_raw_parts_mut(data.as_mut_ptr().cast::<u8>(), len) };
        Self::new(bytes, shape, DataType::F32)
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.data.as_mut_ptr()
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn shape(&self) -> &'a [i64] {
        self.shape
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn device(&self) -> Device {
        self.device
    }
}
