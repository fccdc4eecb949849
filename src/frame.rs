// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/frame.rs - 帧与 NCHW 张量定义
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

use std::borrow::Cow;
use std::str::FromStr;

use image::{RgbImage, imageops::FilterType};
use ndarray::{Array4, ShapeError};

const RGB_CHANNELS: usize = 3;

/// 模型期望的通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
  Rgb,
  #[default]
  Bgr,
}

impl FromStr for ChannelOrder {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "rgb" => Ok(ChannelOrder::Rgb),
      "bgr" => Ok(ChannelOrder::Bgr),
      other => Err(format!("未知的通道顺序: {}", other)),
    }
  }
}

impl ChannelOrder {
  // 目标通道 c 对应的 RGB 像素分量
  fn source_channel(self, c: usize) -> usize {
    match self {
      ChannelOrder::Rgb => c,
      ChannelOrder::Bgr => RGB_CHANNELS - 1 - c,
    }
  }
}

/// 一帧原始图像，保持原始尺寸
#[derive(Debug, Clone)]
pub struct Frame {
  name: String,
  image: RgbImage,
}

impl Frame {
  pub fn new(name: impl Into<String>, image: RgbImage) -> Self {
    Self {
      name: name.into(),
      image,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn is_empty(&self) -> bool {
    self.image.width() == 0 || self.image.height() == 0
  }
}

impl From<RgbImage> for Frame {
  fn from(image: RgbImage) -> Self {
    Frame::new("memory", image)
  }
}

/// 批大小为 1 的 NCHW 浮点张量，数值范围 0..=255
#[derive(Debug, Clone)]
pub struct NchwTensor {
  data: Box<[f32]>,
  height: usize,
  width: usize,
}

impl NchwTensor {
  pub fn with_shape(height: usize, width: usize) -> Self {
    let data = vec![0f32; RGB_CHANNELS * height * width].into_boxed_slice();
    Self {
      data,
      height,
      width,
    }
  }

  /// 缩放到 `width` x `height`，按 `order` 重排通道，HWC 转置为 CHW
  pub fn from_image(image: &RgbImage, width: u32, height: u32, order: ChannelOrder) -> Self {
    let resized: Cow<'_, RgbImage> = if image.dimensions() == (width, height) {
      Cow::Borrowed(image)
    } else {
      Cow::Owned(image::imageops::resize(
        image,
        width,
        height,
        FilterType::Triangle,
      ))
    };

    let mut tensor = NchwTensor::with_shape(height as usize, width as usize);
    let plane = tensor.height * tensor.width;
    let row = tensor.width;
    let slice = tensor.as_mut();

    for (x, y, pixel) in resized.enumerate_pixels() {
      let offset = (y as usize) * row + (x as usize);
      for c in 0..RGB_CHANNELS {
        slice[c * plane + offset] = f32::from(pixel[order.source_channel(c)]);
      }
    }
    tensor
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  /// `[N, C, H, W]`
  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.height, self.width]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn to_array(&self) -> Result<Array4<f32>, ShapeError> {
    let [n, c, h, w] = self.shape();
    Array4::from_shape_vec((n, c, h, w), self.data.to_vec())
  }
}

impl AsMut<[f32]> for NchwTensor {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 200]))
  }

  #[test]
  fn tensor_shape_follows_network_input() {
    let image = gradient(640, 480);
    let tensor = NchwTensor::from_image(&image, 48, 48, ChannelOrder::Bgr);
    assert_eq!(tensor.shape(), [1, 3, 48, 48]);
    assert_eq!(tensor.as_slice().len(), 3 * 48 * 48);

    let array = tensor.to_array().unwrap();
    assert_eq!(array.shape(), &[1, 3, 48, 48]);
  }

  #[test]
  fn non_square_target_keeps_height_then_width() {
    let image = gradient(100, 100);
    let tensor = NchwTensor::from_image(&image, 60, 30, ChannelOrder::Rgb);
    assert_eq!(tensor.shape(), [1, 3, 30, 60]);
  }

  #[test]
  fn planes_are_transposed_from_hwc() {
    let image = gradient(4, 3);
    let tensor = NchwTensor::from_image(&image, 4, 3, ChannelOrder::Rgb);
    let data = tensor.as_slice();
    let plane = 4 * 3;
    // 像素 (x=2, y=1)
    let offset = 4 + 2;
    assert_eq!(data[offset], 2.0);
    assert_eq!(data[plane + offset], 1.0);
    assert_eq!(data[2 * plane + offset], 200.0);

    let array = tensor.to_array().unwrap();
    assert_eq!(array[[0, 0, 1, 2]], 2.0);
    assert_eq!(array[[0, 1, 1, 2]], 1.0);
    assert_eq!(array[[0, 2, 1, 2]], 200.0);
  }

  #[test]
  fn bgr_order_swaps_outer_planes() {
    let image = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));
    let tensor = NchwTensor::from_image(&image, 2, 2, ChannelOrder::Bgr);
    let data = tensor.as_slice();
    assert_eq!(&data[0..4], &[30.0; 4]);
    assert_eq!(&data[4..8], &[20.0; 4]);
    assert_eq!(&data[8..12], &[10.0; 4]);
  }

  #[test]
  fn channel_order_parses_case_insensitively() {
    assert_eq!("BGR".parse::<ChannelOrder>().unwrap(), ChannelOrder::Bgr);
    assert_eq!("rgb".parse::<ChannelOrder>().unwrap(), ChannelOrder::Rgb);
    assert!("yuv".parse::<ChannelOrder>().is_err());
    assert_eq!(ChannelOrder::default(), ChannelOrder::Bgr);
  }

  #[test]
  fn frame_reports_original_dimensions() {
    let frame = Frame::new("a.png", gradient(7, 5));
    assert_eq!((frame.width(), frame.height()), (7, 5));
    assert_eq!(frame.name(), "a.png");
    assert!(!frame.is_empty());
    assert!(Frame::from(RgbImage::new(0, 3)).is_empty());
  }
}
