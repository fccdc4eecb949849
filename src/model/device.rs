// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/model/device.rs - 推理设备
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::fmt;
use std::str::FromStr;

use ort::execution_providers::{
  CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
  OpenVINOExecutionProvider, TensorRTExecutionProvider,
};
use thiserror::Error;
use tracing::debug;

const OPENVINO_DEFAULT_DEVICE: &str = "CPU";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeviceError {
  #[error("未知的推理设备: {0}")]
  UnknownDevice(String),
  #[error("设备编号无效: {0}")]
  InvalidDeviceId(String),
}

/// 推理设备，格式为 `NAME` 或 `NAME:参数`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Device {
  #[default]
  Cpu,
  Cuda(i32),
  TensorRt(i32),
  /// OpenVINO 设备类型，例如 `CPU`、`GPU`、`NPU`
  OpenVino(String),
}

impl FromStr for Device {
  type Err = DeviceError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (name, param) = match s.split_once(':') {
      Some((name, param)) => (name, Some(param)),
      None => (s, None),
    };

    let device_id = |param: Option<&str>| -> Result<i32, DeviceError> {
      match param {
        None => Ok(0),
        Some(id) => id
          .parse::<i32>()
          .ok()
          .filter(|id| *id >= 0)
          .ok_or_else(|| DeviceError::InvalidDeviceId(s.to_string())),
      }
    };

    match name.to_ascii_uppercase().as_str() {
      "CPU" if param.is_none() => Ok(Device::Cpu),
      "CUDA" | "GPU" => Ok(Device::Cuda(device_id(param)?)),
      "TENSORRT" => Ok(Device::TensorRt(device_id(param)?)),
      "OPENVINO" => Ok(Device::OpenVino(
        param
          .filter(|p| !p.is_empty())
          .unwrap_or(OPENVINO_DEFAULT_DEVICE)
          .to_ascii_uppercase(),
      )),
      _ => Err(DeviceError::UnknownDevice(s.to_string())),
    }
  }
}

impl fmt::Display for Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Device::Cpu => write!(f, "CPU"),
      Device::Cuda(id) => write!(f, "CUDA:{}", id),
      Device::TensorRt(id) => write!(f, "TENSORRT:{}", id),
      Device::OpenVino(kind) => write!(f, "OPENVINO:{}", kind),
    }
  }
}

impl Device {
  // 加速设备注册失败即报错，不静默回退到 CPU
  fn providers(&self) -> Vec<(&'static str, ExecutionProviderDispatch)> {
    let mut providers = Vec::with_capacity(2);
    match self {
      Device::Cpu => {}
      Device::Cuda(id) => providers.push((
        "CUDA",
        CUDAExecutionProvider::default()
          .with_device_id(*id)
          .build()
          .error_on_failure(),
      )),
      Device::TensorRt(id) => providers.push((
        "TensorRT",
        TensorRTExecutionProvider::default()
          .with_device_id(*id)
          .build()
          .error_on_failure(),
      )),
      Device::OpenVino(kind) => providers.push((
        "OpenVINO",
        OpenVINOExecutionProvider::default()
          .with_device_type(kind)
          .build()
          .error_on_failure(),
      )),
    }
    providers.push(("CPU", CPUExecutionProvider::default().build()));
    providers
  }

  /// 执行提供者列表，CPU 始终位于最后用于未分配的层
  pub fn execution_providers(&self) -> Vec<ExecutionProviderDispatch> {
    let providers = self.providers();
    debug!(
      "执行提供者: {:?}",
      providers.iter().map(|(name, _)| *name).collect::<Vec<_>>()
    );
    providers.into_iter().map(|(_, provider)| provider).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_plain_names() {
    assert_eq!("CPU".parse::<Device>().unwrap(), Device::Cpu);
    assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
    assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda(0));
    assert_eq!("GPU".parse::<Device>().unwrap(), Device::Cuda(0));
    assert_eq!("TensorRT".parse::<Device>().unwrap(), Device::TensorRt(0));
    assert_eq!(
      "openvino".parse::<Device>().unwrap(),
      Device::OpenVino("CPU".to_string())
    );
  }

  #[test]
  fn parses_parameters() {
    assert_eq!("CUDA:1".parse::<Device>().unwrap(), Device::Cuda(1));
    assert_eq!("gpu:2".parse::<Device>().unwrap(), Device::Cuda(2));
    assert_eq!("tensorrt:2".parse::<Device>().unwrap(), Device::TensorRt(2));
    assert_eq!(
      "OPENVINO:npu".parse::<Device>().unwrap(),
      Device::OpenVino("NPU".to_string())
    );
  }

  #[test]
  fn rejects_unknown_devices() {
    assert_eq!(
      "MYRIAD".parse::<Device>(),
      Err(DeviceError::UnknownDevice("MYRIAD".to_string()))
    );
    assert_eq!(
      "CPU:0".parse::<Device>(),
      Err(DeviceError::UnknownDevice("CPU:0".to_string()))
    );
    assert_eq!(
      "CUDA:x".parse::<Device>(),
      Err(DeviceError::InvalidDeviceId("CUDA:x".to_string()))
    );
    assert_eq!(
      "CUDA:-1".parse::<Device>(),
      Err(DeviceError::InvalidDeviceId("CUDA:-1".to_string()))
    );
  }

  #[test]
  fn cpu_uses_a_single_provider() {
    let names: Vec<_> = Device::Cpu.providers().iter().map(|(n, _)| *n).collect();
    assert_eq!(names, vec!["CPU"]);
    assert_eq!(Device::Cpu.execution_providers().len(), 1);
  }

  #[test]
  fn accelerators_keep_cpu_last() {
    for (device, accelerator) in [
      (Device::Cuda(0), "CUDA"),
      (Device::TensorRt(1), "TensorRT"),
      (Device::OpenVino("GPU".to_string()), "OpenVINO"),
    ] {
      let names: Vec<_> = device.providers().iter().map(|(n, _)| *n).collect();
      assert_eq!(names, vec![accelerator, "CPU"], "{}", device);
      assert_eq!(device.execution_providers().len(), 2);
    }
  }

  #[test]
  fn display_round_trips() {
    for device in [
      Device::Cpu,
      Device::Cuda(3),
      Device::TensorRt(0),
      Device::OpenVino("GPU".to_string()),
    ] {
      assert_eq!(device.to_string().parse::<Device>().unwrap(), device);
    }
  }
}
