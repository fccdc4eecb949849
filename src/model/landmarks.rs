// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/model/landmarks.rs - 面部关键点模型
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

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::RgbImage;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{ChannelOrder, Frame, NchwTensor},
  model::{
    Eye, EyeLandmarks, EyeRegion, Model,
    device::{Device, DeviceError},
    network::{ModelFiles, NetworkDescription, NetworkError},
  },
  url_path,
};

const LANDMARKS_SCHEME: &str = "landmarks";
const DEFAULT_THRESHOLD: f32 = 0.6;
/// 眼睛裁剪框半径（像素）
pub const DEFAULT_EYE_RADIUS: i32 = 10;
// 左右眼共 4 个坐标
const MIN_OUTPUT_VALUES: usize = 4;

#[derive(Error, Debug)]
pub enum FacialLandmarksError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型参数无效: {0}")]
  InvalidParameter(String),
  #[error("网络错误: {0}")]
  NetworkError(#[from] NetworkError),
  #[error("设备错误: {0}")]
  DeviceError(#[from] DeviceError),
  #[error("存在不受支持的层: {}", .layers.join(", "))]
  UnsupportedLayers {
    layers: Vec<String>,
    detail: Option<String>,
  },
  #[error("推理会话错误: {0}")]
  SessionError(String),
  #[error("推理错误: {0}")]
  InferenceError(String),
  #[error("模型输出无效: {0}")]
  OutputShape(String),
  #[error("输入图像为空")]
  EmptyImage,
  #[error("{eye} 眼区域 {bbox:?} 完全位于图像之外")]
  EyeOutsideImage { eye: Eye, bbox: [i32; 4] },
}

impl FacialLandmarksError {
  fn session(msg: &str, e: impl std::fmt::Display) -> Self {
    FacialLandmarksError::SessionError(format!("{}: {}", msg, e))
  }

  fn inference(msg: &str, e: impl std::fmt::Display) -> Self {
    FacialLandmarksError::InferenceError(format!("{}: {}", msg, e))
  }
}

/// 层支持检查的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerSupport {
  Native,
  /// 需要扩展库提供 `pending` 中的层，由推理引擎在编译时确认
  Extension { path: PathBuf, pending: Vec<String> },
}

/// 检查网络中所有层是否受支持，必要时要求扩展库
pub fn check_model(
  network: &NetworkDescription,
  extension: Option<&Path>,
) -> Result<LayerSupport, FacialLandmarksError> {
  let unsupported: Vec<String> = network
    .unsupported_layers()
    .iter()
    .map(|l| l.to_string())
    .collect();

  if unsupported.is_empty() {
    info!("所有层均受支持");
    return Ok(LayerSupport::Native);
  }

  info!("发现不受支持的层: {:?}", unsupported);
  match extension {
    Some(path) => {
      if !path.is_file() {
        error!("扩展库不存在: {}", path.display());
        return Err(FacialLandmarksError::InvalidParameter(format!(
          "扩展库不存在: {}",
          path.display()
        )));
      }
      info!("添加扩展库: {}", path.display());
      Ok(LayerSupport::Extension {
        path: path.to_path_buf(),
        pending: unsupported,
      })
    }
    None => {
      info!("请提供扩展库路径");
      Err(FacialLandmarksError::UnsupportedLayers {
        layers: unsupported,
        detail: None,
      })
    }
  }
}

pub struct FacialLandmarksBuilder {
  stem: PathBuf,
  device: Device,
  threshold: f32,
  extension: Option<PathBuf>,
  radius: i32,
  order: ChannelOrder,
}

impl FromUrlWithScheme for FacialLandmarksBuilder {
  const SCHEME: &'static str = LANDMARKS_SCHEME;
}

impl FromUrl for FacialLandmarksBuilder {
  type Error = FacialLandmarksError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(FacialLandmarksError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let stem = url_path(url);
    if stem.as_os_str().is_empty() || stem == Path::new("/") {
      return Err(FacialLandmarksError::ModelPathError(
        "模型路径为空".to_string(),
      ));
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (k.into_owned(), v.into_owned()))
      .collect();

    let mut builder = FacialLandmarksBuilder::new(stem);

    if let Some(device) = query.get("device") {
      builder = builder.device(device.parse()?);
    }
    if let Some(threshold) = query.get("threshold") {
      let threshold = threshold
        .parse::<f32>()
        .ok()
        .filter(|t| (0.0..=1.0).contains(t))
        .ok_or_else(|| {
          FacialLandmarksError::InvalidParameter(format!("阈值必须位于 0.0 - 1.0: {}", threshold))
        })?;
      builder = builder.threshold(threshold);
    }
    if let Some(extension) = query.get("extension").filter(|e| !e.is_empty()) {
      builder = builder.extension(Some(PathBuf::from(extension)));
    }
    if let Some(radius) = query.get("radius") {
      let radius = radius
        .parse::<i32>()
        .ok()
        .filter(|r| *r > 0)
        .ok_or_else(|| {
          FacialLandmarksError::InvalidParameter(format!("裁剪半径必须为正整数: {}", radius))
        })?;
      builder = builder.radius(radius);
    }
    if let Some(order) = query.get("order") {
      builder = builder.channel_order(
        order
          .parse()
          .map_err(FacialLandmarksError::InvalidParameter)?,
      );
    }

    Ok(builder)
  }
}

impl FacialLandmarksBuilder {
  pub fn new(stem: impl Into<PathBuf>) -> Self {
    FacialLandmarksBuilder {
      stem: stem.into(),
      device: Device::default(),
      threshold: DEFAULT_THRESHOLD,
      extension: None,
      radius: DEFAULT_EYE_RADIUS,
      order: ChannelOrder::default(),
    }
  }

  pub fn device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  pub fn threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn extension(mut self, extension: Option<PathBuf>) -> Self {
    self.extension = extension;
    self
  }

  pub fn radius(mut self, radius: i32) -> Self {
    self.radius = radius;
    self
  }

  pub fn channel_order(mut self, order: ChannelOrder) -> Self {
    self.order = order;
    self
  }

  pub fn build(self) -> Result<FacialLandmarks, FacialLandmarksError> {
    info!("解析模型文件: {}", self.stem.display());
    let files = ModelFiles::from_stem(&self.stem)?;
    info!("拓扑文件: {}", files.topology.display());
    match &files.weights {
      Some(weights) => info!("权重文件: {}", weights.display()),
      None => debug!("权重内嵌于拓扑文件"),
    }

    let network = NetworkDescription::from_files(&files).inspect_err(|e| {
      error!("无法初始化网络: {}", e);
    })?;
    let (input_width, input_height) = network.image_input_size()?;
    let input_name = network.input()?.name.clone();
    let output_name = network.output()?.name.clone();
    debug!(
      "网络输入: {} {}x{}, 输出: {}, 层数: {}",
      input_name,
      input_width,
      input_height,
      output_name,
      network.layers.len()
    );

    let support = check_model(&network, self.extension.as_deref())?;

    info!("在 {} 上编译模型", self.device);
    let session = self.load(&files, &support)?;
    info!("模型加载完成");

    Ok(FacialLandmarks {
      session,
      network,
      files,
      input_name,
      output_name,
      input_width,
      input_height,
      device: self.device,
      threshold: self.threshold,
      radius: self.radius,
      order: self.order,
    })
  }

  fn load(
    &self,
    files: &ModelFiles,
    support: &LayerSupport,
  ) -> Result<Session, FacialLandmarksError> {
    let mut builder = Session::builder()
      .map_err(|e| FacialLandmarksError::session("无法创建会话", e))?
      .with_execution_providers(self.device.execution_providers())
      .map_err(|e| FacialLandmarksError::session("无法注册推理设备", e))?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(|e| FacialLandmarksError::session("无法设置优化级别", e))?;

    if let LayerSupport::Extension { path, .. } = support {
      builder = builder
        .with_operator_library(path.to_string_lossy().into_owned())
        .map_err(|e| FacialLandmarksError::session("无法添加扩展库", e))?;
    }

    match builder.commit_from_file(&files.topology) {
      Ok(session) => {
        if let LayerSupport::Extension { .. } = support {
          info!("添加扩展库后问题已解决");
        }
        Ok(session)
      }
      Err(e) => Err(compile_error(support, e.to_string())),
    }
  }
}

// 注册扩展库后编译失败，视为扩展库未能提供缺失的层
fn compile_error(support: &LayerSupport, detail: String) -> FacialLandmarksError {
  match support {
    LayerSupport::Extension { pending, .. } => {
      error!("添加扩展库后仍存在不受支持的层: {}", detail);
      FacialLandmarksError::UnsupportedLayers {
        layers: pending.clone(),
        detail: Some(detail),
      }
    }
    LayerSupport::Native => FacialLandmarksError::session("无法加载模型", detail),
  }
}

/// 已加载的面部关键点模型，单个推理请求槽
pub struct FacialLandmarks {
  session: Session,
  network: NetworkDescription,
  files: ModelFiles,
  input_name: String,
  output_name: String,
  input_width: u32,
  input_height: u32,
  device: Device,
  threshold: f32,
  radius: i32,
  order: ChannelOrder,
}

impl FacialLandmarks {
  pub fn network(&self) -> &NetworkDescription {
    &self.network
  }

  pub fn files(&self) -> &ModelFiles {
    &self.files
  }

  pub fn device(&self) -> &Device {
    &self.device
  }

  /// 配置中的置信度阈值，关键点回归模型不使用
  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  pub fn radius(&self) -> i32 {
    self.radius
  }

  /// 网络输入的 `(宽, 高)`
  pub fn input_size(&self) -> (u32, u32) {
    (self.input_width, self.input_height)
  }

  pub fn preprocess(&self, frame: &Frame) -> NchwTensor {
    NchwTensor::from_image(
      frame.image(),
      self.input_width,
      self.input_height,
      self.order,
    )
  }

  pub fn predict(&mut self, frame: &Frame) -> Result<EyeLandmarks, FacialLandmarksError> {
    if frame.is_empty() {
      return Err(FacialLandmarksError::EmptyImage);
    }

    let tensor = self.preprocess(frame);
    debug!("输入张量形状: {:?}", tensor.shape());

    let values = self.run(&tensor)?;
    debug!("模型原始输出: {:?}", values);

    Self::postprocess(&values, frame, self.radius)
  }

  fn run(&mut self, tensor: &NchwTensor) -> Result<Vec<f32>, FacialLandmarksError> {
    let input = tensor
      .to_array()
      .map_err(|e| FacialLandmarksError::inference("无法构造输入张量", e))?;
    let input = input.as_standard_layout();
    let input_tensor = TensorRef::from_array_view(&input)
      .map_err(|e| FacialLandmarksError::inference("无法构造输入张量", e))?;

    let outputs = self
      .session
      .run(ort::inputs![self.input_name.as_str() => input_tensor])
      .map_err(|e| FacialLandmarksError::inference("推理失败", e))?;

    let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
      FacialLandmarksError::OutputShape(format!("找不到输出 {}", self.output_name))
    })?;
    let (shape, data) = output
      .try_extract_tensor::<f32>()
      .map_err(|e| FacialLandmarksError::inference("无法读取输出", e))?;
    let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    debug!("模型输出形状: {:?}", shape);

    Ok(data.to_vec())
  }

  /// 将归一化输出换算为原图坐标并裁剪左右眼
  pub fn postprocess(
    values: &[f32],
    frame: &Frame,
    radius: i32,
  ) -> Result<EyeLandmarks, FacialLandmarksError> {
    if values.len() < MIN_OUTPUT_VALUES {
      return Err(FacialLandmarksError::OutputShape(format!(
        "期望至少 {} 个输出值，实际为 {}",
        MIN_OUTPUT_VALUES,
        values.len()
      )));
    }

    let points: Box<[[f32; 2]]> = values.chunks_exact(2).map(|p| [p[0], p[1]]).collect();
    let (width, height) = (frame.width(), frame.height());

    let left = eye_region(
      frame.image(),
      Eye::Left,
      scale_point(points[0], width, height),
      radius,
    )?;
    let right = eye_region(
      frame.image(),
      Eye::Right,
      scale_point(points[1], width, height),
      radius,
    )?;

    Ok(EyeLandmarks {
      left,
      right,
      points,
    })
  }
}

impl Model for FacialLandmarks {
  type Input = Frame;
  type Output = EyeLandmarks;
  type Error = FacialLandmarksError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.predict(input)
  }
}

/// 归一化坐标乘以图像宽高，向零截断
pub(crate) fn scale_point(point: [f32; 2], width: u32, height: u32) -> [i32; 2] {
  [
    (f64::from(point[0]) * f64::from(width)) as i32,
    (f64::from(point[1]) * f64::from(height)) as i32,
  ]
}

pub(crate) fn eye_box(center: [i32; 2], radius: i32) -> [i32; 4] {
  [
    center[0].saturating_sub(radius),
    center[1].saturating_sub(radius),
    center[0].saturating_add(radius),
    center[1].saturating_add(radius),
  ]
}

/// bbox 与 `[0, width) x [0, height)` 的交集，为空时返回 None
pub(crate) fn clamp_box(bbox: [i32; 4], width: u32, height: u32) -> Option<[u32; 4]> {
  let (w, h) = (i64::from(width), i64::from(height));
  let x_min = i64::from(bbox[0]).clamp(0, w);
  let y_min = i64::from(bbox[1]).clamp(0, h);
  let x_max = i64::from(bbox[2]).clamp(0, w);
  let y_max = i64::from(bbox[3]).clamp(0, h);

  if x_min >= x_max || y_min >= y_max {
    return None;
  }
  Some([x_min as u32, y_min as u32, x_max as u32, y_max as u32])
}

fn eye_region(
  image: &RgbImage,
  eye: Eye,
  center: [i32; 2],
  radius: i32,
) -> Result<EyeRegion, FacialLandmarksError> {
  let bbox = eye_box(center, radius);
  let crop_rect = clamp_box(bbox, image.width(), image.height()).ok_or_else(|| {
    warn!("{} 眼中心 {:?} 位于图像之外", eye, center);
    FacialLandmarksError::EyeOutsideImage { eye, bbox }
  })?;

  let [x_min, y_min, x_max, y_max] = crop_rect;
  if (x_max - x_min) as i64 != i64::from(bbox[2]) - i64::from(bbox[0])
    || (y_max - y_min) as i64 != i64::from(bbox[3]) - i64::from(bbox[1])
  {
    debug!("{} 眼区域 {:?} 超出图像边界，截断为 {:?}", eye, bbox, crop_rect);
  }

  let crop = image::imageops::crop_imm(image, x_min, y_min, x_max - x_min, y_max - y_min).to_image();

  Ok(EyeRegion {
    eye,
    center,
    bbox,
    crop_rect,
    crop,
  })
}
