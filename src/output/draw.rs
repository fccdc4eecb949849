// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/output/draw.rs - 眼睛区域与关键点可视化
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

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::{
  frame::Frame,
  model::{EyeLandmarks, EyeRegion, scale_point},
};

const EYE_BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const LANDMARK_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const LANDMARK_RADIUS: i32 = 2;
const EYE_BOX_THICKNESS: i32 = 2;

pub struct Draw {
  eye_box_color: [u8; 3],
  landmark_color: [u8; 3],
  landmark_radius: i32,
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      eye_box_color: EYE_BOX_COLOR,
      landmark_color: LANDMARK_COLOR,
      landmark_radius: LANDMARK_RADIUS,
      thickness: EYE_BOX_THICKNESS,
    }
  }
}

impl Draw {
  // 边框画在裁剪区域外侧，不覆盖眼睛像素
  fn draw_eye_box(&self, image: &mut RgbImage, region: &EyeRegion) {
    let [x_min, y_min, x_max, y_max] = region.crop_rect;
    let (width, height) = (x_max - x_min, y_max - y_min);

    for t in 1..=self.thickness {
      let rect = Rect::at(x_min as i32 - t, y_min as i32 - t)
        .of_size(width + 2 * t as u32, height + 2 * t as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.eye_box_color));
    }
  }

  pub fn draw_on_image(&self, image: &mut RgbImage, result: &EyeLandmarks) {
    let (w, h) = image.dimensions();
    for region in result.regions() {
      self.draw_eye_box(image, region);
    }
    for point in result.points.iter() {
      let [x, y] = scale_point(*point, w, h);
      draw_filled_circle_mut(image, (x, y), self.landmark_radius, Rgb(self.landmark_color));
    }
  }

  pub fn draw_landmarks(&self, frame: &Frame, result: &EyeLandmarks) -> RgbImage {
    let mut image = frame.image().clone();
    self.draw_on_image(&mut image, result);
    image
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::FacialLandmarks;

  #[test]
  fn boxes_surround_crops_without_touching_them() {
    let frame = Frame::from(RgbImage::from_pixel(100, 100, Rgb([0, 0, 0])));
    let result = FacialLandmarks::postprocess(&[0.25, 0.25, 0.75, 0.25], &frame, 10).unwrap();
    let image = Draw::default().draw_landmarks(&frame, &result);

    // 左眼 crop_rect = [15, 15, 35, 35]
    assert_eq!(image.get_pixel(14, 20), &Rgb(EYE_BOX_COLOR));
    assert_eq!(image.get_pixel(13, 20), &Rgb(EYE_BOX_COLOR));
    assert_eq!(image.get_pixel(15, 15), &Rgb([0, 0, 0]));
    // 关键点
    assert_eq!(image.get_pixel(25, 25), &Rgb(LANDMARK_COLOR));
    // 原图不变
    assert_eq!(frame.image().get_pixel(14, 20), &Rgb([0, 0, 0]));
  }
}
