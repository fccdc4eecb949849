// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/model.rs - 模型
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

use image::RgbImage;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
  Left,
  Right,
}

impl Eye {
  pub fn as_str(&self) -> &'static str {
    match self {
      Eye::Left => "left",
      Eye::Right => "right",
    }
  }
}

impl fmt::Display for Eye {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 单只眼睛的预测结果，坐标均为原图像素坐标
#[derive(Debug, Clone)]
pub struct EyeRegion {
  pub eye: Eye,
  pub center: [i32; 2],
  pub bbox: [i32; 4], // [x_min, y_min, x_max, y_max]，未按图像边界截断
  pub crop_rect: [u32; 4], // bbox 与图像的交集
  pub crop: RgbImage,
}

#[derive(Debug, Clone)]
pub struct EyeLandmarks {
  pub left: EyeRegion,
  pub right: EyeRegion,
  /// 模型输出的全部归一化关键点 (x, y)，前两个为左右眼
  pub points: Box<[[f32; 2]]>,
}

impl EyeLandmarks {
  /// 左右眼的 `[x_min, y_min, x_max, y_max]`
  pub fn eye_coords(&self) -> [[i32; 4]; 2] {
    [self.left.bbox, self.right.bbox]
  }

  pub fn regions(&self) -> [&EyeRegion; 2] {
    [&self.left, &self.right]
  }
}

pub mod device;
pub mod network;
mod onnx;

mod landmarks;
pub use self::device::{Device, DeviceError};
pub use self::landmarks::{
  DEFAULT_EYE_RADIUS, FacialLandmarks, FacialLandmarksBuilder, FacialLandmarksError, LayerSupport,
  check_model,
};
pub use self::network::{Layer, ModelFiles, NetworkDescription, NetworkError};
pub(crate) use self::landmarks::scale_point;
