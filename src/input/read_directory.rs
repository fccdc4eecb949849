// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/input/read_directory.rs - 目录图像输入
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

use std::path::PathBuf;

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, input::is_valid_image, url_path};

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("不是目录: {0}")]
  NotADirectory(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按文件名顺序逐个读取目录中的图像
pub struct DirectoryInput {
  files: Vec<PathBuf>,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemeMismatch);
    }

    let directory = url_path(url);
    if !directory.is_dir() {
      return Err(DirectoryInputError::NotADirectory(directory));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      if is_valid_image(&path) {
        files.push(path);
      }
    }
    files.sort();
    info!("目录 {} 中共有 {} 张图像", directory.display(), files.len());

    Ok(DirectoryInput { files })
  }
}

impl DirectoryInput {
  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }
}

impl IntoIterator for DirectoryInput {
  type Item = Frame;
  type IntoIter = DirectoryInputIter;

  fn into_iter(self) -> Self::IntoIter {
    DirectoryInputIter {
      files: self.files.into_iter(),
    }
  }
}

pub struct DirectoryInputIter {
  files: std::vec::IntoIter<PathBuf>,
}

impl Iterator for DirectoryInputIter {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    // 无法解码的文件跳过
    for path in self.files.by_ref() {
      let decoded = ImageReader::open(&path)
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.with_guessed_format().map_err(image::ImageError::IoError))
        .and_then(|reader| reader.decode());
      match decoded {
        Ok(image) => return Some(Frame::new(path.display().to_string(), image.into_rgb8())),
        Err(e) => error!("无法读取图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::input::tests::write_image;

  #[test]
  fn lists_images_sorted_and_skips_others() {
    let dir = tempfile::tempdir().unwrap();
    write_image(dir.path(), "b.png", 5, 5);
    write_image(dir.path(), "a.png", 3, 3);
    std::fs::write(dir.path().join("c.txt"), b"not an image").unwrap();
    std::fs::write(dir.path().join("d.jpg"), b"").unwrap();

    let url = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let input = DirectoryInput::from_url(&url).unwrap();
    assert_eq!(input.len(), 2);

    let names: Vec<String> = input.into_iter().map(|f| f.name().to_string()).collect();
    assert!(names[0].ends_with("a.png"));
    assert!(names[1].ends_with("b.png"));
  }

  #[test]
  fn undecodable_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.jpg"), b"garbage bytes").unwrap();
    write_image(dir.path(), "b.png", 2, 2);

    let url = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let frames: Vec<Frame> = DirectoryInput::from_url(&url).unwrap().into_iter().collect();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].name().ends_with("b.png"));
  }

  #[test]
  fn file_is_not_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "a.png", 2, 2);
    let url = Url::parse(&format!("folder://{}", path.display())).unwrap();
    assert!(matches!(
      DirectoryInput::from_url(&url),
      Err(DirectoryInputError::NotADirectory(_))
    ));
  }
}
