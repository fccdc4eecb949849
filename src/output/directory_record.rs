// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{Datelike, Utc};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{EyeLandmarks, EyeRegion},
  output::{Render, draw::Draw},
  url_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

fn region_json(region: &EyeRegion) -> Value {
  json!({
    "center": region.center,
    "bbox": region.bbox,
    "crop_rect": region.crop_rect,
  })
}

/// 单帧预测结果的 JSON 记录
pub fn record_json(frame: &Frame, result: &EyeLandmarks) -> Value {
  json!({
    "source": frame.name(),
    "width": frame.width(),
    "height": frame.height(),
    "eye_coords": result.eye_coords(),
    "left": region_json(&result.left),
    "right": region_json(&result.right),
    "points": result.points,
  })
}

pub enum DrawWrapper {
  Draw(Box<Draw>),
  Record,
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &Frame,
    result: &EyeLandmarks,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.draw_landmarks(frame, result).save(path)?;
      }
      DrawWrapper::Record => {
        frame.image().save(path)?;
      }
    };

    let record = serde_json::to_string_pretty(&record_json(frame, result))?;
    std::fs::write(path.with_extension("json"), record)?;
    Ok(())
  }
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: AtomicU16,
  crops: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri.query_pairs().any(|(k, _)| k == "record");
    let crops = uri.query_pairs().any(|(k, _)| k == "crops");

    Ok(DirectoryRecordOutput {
      directory: url_path(uri),
      draw: if record {
        DrawWrapper::Record
      } else {
        DrawWrapper::Draw(Box::new(Draw::default()))
      },
      frame_counter: AtomicU16::new(0),
      crops,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  /// `<目录>/<年>/<月>/<日>/<时-分-秒>-<序号>.png`
  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn save_crops(&self, path: &Path, result: &EyeLandmarks) -> Result<(), DirectoryRecordOutputError> {
    let stem = path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_default();
    for region in result.regions() {
      let crop_path = path.with_file_name(format!("{}-{}.png", stem, region.eye));
      region.crop.save(&crop_path)?;
    }
    Ok(())
  }
}

impl Render<Frame, EyeLandmarks> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &EyeLandmarks) -> Result<(), Self::Error> {
    let path = self.frame_path()?;
    self.draw.save_result(&path, frame, result)?;
    if self.crops {
      self.save_crops(&path, result)?;
    }
    debug!("记录 {} 到 {}", frame.name(), path.display());
    Ok(())
  }
}
