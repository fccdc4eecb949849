// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/model/network.rs - 网络描述与层支持查询
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

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use prost::Message;
use thiserror::Error;
use tracing::debug;

use super::onnx::{ModelProto, ValueInfoProto};

const TOPOLOGY_EXTENSION: &str = "onnx";
const WEIGHTS_EXTENSION: &str = "bin";

/// 推理引擎内置支持的算子域
pub const BUILTIN_DOMAINS: &[&str] = &[
  "",
  "ai.onnx",
  "ai.onnx.ml",
  "ai.onnx.preview.training",
  "com.microsoft",
  "com.microsoft.nchwc",
];

#[derive(Error, Debug)]
pub enum NetworkError {
  #[error("模型文件不存在: {0}")]
  ModelFilesMissing(PathBuf),
  #[error("模型读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无法初始化网络，请检查模型路径是否正确: {0}")]
  ModelInvalid(String),
  #[error("模型输入形状无效: {0}")]
  InputShape(String),
}

impl From<prost::DecodeError> for NetworkError {
  fn from(err: prost::DecodeError) -> Self {
    NetworkError::ModelInvalid(err.to_string())
  }
}

/// 拓扑文件与权重文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
  pub topology: PathBuf,
  /// 外部权重文件，权重内嵌于拓扑文件时为空
  pub weights: Option<PathBuf>,
}

impl ModelFiles {
  /// `stem` 可以带或不带 `.onnx` 后缀
  pub fn from_stem(stem: impl AsRef<Path>) -> Result<Self, NetworkError> {
    let stem = stem.as_ref();
    let stem = match stem.extension().and_then(|ext| ext.to_str()) {
      Some(ext) if ext.eq_ignore_ascii_case(TOPOLOGY_EXTENSION) => stem.with_extension(""),
      _ => stem.to_path_buf(),
    };

    let topology = append_extension(&stem, TOPOLOGY_EXTENSION);
    if !topology.is_file() {
      return Err(NetworkError::ModelFilesMissing(topology));
    }

    let weights = Some(append_extension(&stem, WEIGHTS_EXTENSION)).filter(|p| p.is_file());

    Ok(ModelFiles { topology, weights })
  }
}

// 不能用 with_extension，模型名中可能带点，例如 landmarks-regression-retail-0009.fp16
fn append_extension(stem: &Path, ext: &str) -> PathBuf {
  let mut name = stem.as_os_str().to_os_string();
  name.push(".");
  name.push(ext);
  PathBuf::from(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
  pub name: String,
  pub op_type: String,
  pub domain: String,
}

impl Layer {
  pub fn is_builtin(&self) -> bool {
    BUILTIN_DOMAINS.contains(&self.domain.as_str())
  }
}

impl fmt::Display for Layer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.domain.is_empty() {
      write!(f, "{}({})", self.name, self.op_type)
    } else {
      write!(f, "{}({}::{})", self.name, self.domain, self.op_type)
    }
  }
}

/// 张量名称与形状，符号维度为 `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
  pub name: String,
  pub shape: Vec<Option<i64>>,
}

impl TensorInfo {
  fn from_value_info(info: &ValueInfoProto) -> Self {
    let shape = info
      .r#type
      .as_ref()
      .and_then(|t| t.tensor_type.as_ref())
      .and_then(|t| t.shape.as_ref())
      .map(|shape| {
        shape
          .dim
          .iter()
          .map(|d| d.dim_value.filter(|v| *v > 0))
          .collect()
      })
      .unwrap_or_default();

    TensorInfo {
      name: info.name.clone(),
      shape,
    }
  }
}

#[derive(Debug, Clone)]
pub struct NetworkDescription {
  pub producer: String,
  pub opsets: Vec<(String, i64)>,
  pub layers: Vec<Layer>,
  pub inputs: Vec<TensorInfo>,
  pub outputs: Vec<TensorInfo>,
}

impl NetworkDescription {
  pub fn from_files(files: &ModelFiles) -> Result<Self, NetworkError> {
    let data = std::fs::read(&files.topology)?;
    debug!(
      "拓扑文件大小: {:.2} MB",
      data.len() as f64 / (1024.0 * 1024.0)
    );
    Self::from_bytes(&data)
  }

  pub fn from_bytes(data: &[u8]) -> Result<Self, NetworkError> {
    let model = ModelProto::decode(data)?;
    let graph = model
      .graph
      .ok_or_else(|| NetworkError::ModelInvalid("模型中没有计算图".to_string()))?;
    if graph.node.is_empty() {
      return Err(NetworkError::ModelInvalid("计算图中没有任何层".to_string()));
    }

    let initializers: HashSet<&str> = graph.initializer.iter().map(|t| t.name.as_str()).collect();

    let layers = graph
      .node
      .iter()
      .enumerate()
      .map(|(idx, node)| Layer {
        name: if node.name.is_empty() {
          format!("#{}", idx)
        } else {
          node.name.clone()
        },
        op_type: node.op_type.clone(),
        domain: node.domain.clone(),
      })
      .collect();

    let inputs = graph
      .input
      .iter()
      .filter(|i| !initializers.contains(i.name.as_str()))
      .map(TensorInfo::from_value_info)
      .collect();
    let outputs = graph.output.iter().map(TensorInfo::from_value_info).collect();

    Ok(NetworkDescription {
      producer: model.producer_name,
      opsets: model
        .opset_import
        .into_iter()
        .map(|o| (o.domain, o.version))
        .collect(),
      layers,
      inputs,
      outputs,
    })
  }

  pub fn input(&self) -> Result<&TensorInfo, NetworkError> {
    self
      .inputs
      .first()
      .ok_or_else(|| NetworkError::ModelInvalid("网络没有输入".to_string()))
  }

  pub fn output(&self) -> Result<&TensorInfo, NetworkError> {
    self
      .outputs
      .first()
      .ok_or_else(|| NetworkError::ModelInvalid("网络没有输出".to_string()))
  }

  /// 图像输入的 `(宽, 高)`，要求形状为 `[N, 3, H, W]`
  pub fn image_input_size(&self) -> Result<(u32, u32), NetworkError> {
    let input = self.input()?;
    match input.shape.as_slice() {
      [_, Some(3), Some(h), Some(w)] => {
        let h = u32::try_from(*h).map_err(|e| NetworkError::InputShape(e.to_string()))?;
        let w = u32::try_from(*w).map_err(|e| NetworkError::InputShape(e.to_string()))?;
        Ok((w, h))
      }
      shape => Err(NetworkError::InputShape(format!(
        "输入 {} 期望形状 [N, 3, H, W]，实际为 {:?}",
        input.name, shape
      ))),
    }
  }

  /// 不在内置算子域中的层
  pub fn unsupported_layers(&self) -> Vec<&Layer> {
    self.layers.iter().filter(|l| !l.is_builtin()).collect()
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::model::onnx::{
    Dimension, GraphProto, NodeProto, OperatorSetIdProto, TensorProto, TensorShapeProto,
    TensorTypeProto, TypeProto,
  };

  fn value_info(name: &str, dims: &[Option<i64>]) -> ValueInfoProto {
    ValueInfoProto {
      name: name.to_string(),
      r#type: Some(TypeProto {
        tensor_type: Some(TensorTypeProto {
          elem_type: 1,
          shape: Some(TensorShapeProto {
            dim: dims
              .iter()
              .map(|d| Dimension {
                dim_value: *d,
                dim_param: if d.is_none() {
                  Some("batch".to_string())
                } else {
                  None
                },
              })
              .collect(),
          }),
        }),
      }),
    }
  }

  fn node(name: &str, op_type: &str, domain: &str) -> NodeProto {
    NodeProto {
      input: vec!["data".to_string()],
      output: vec![format!("{}_out", name)],
      name: name.to_string(),
      op_type: op_type.to_string(),
      domain: domain.to_string(),
    }
  }

  /// 类似 landmarks-regression-retail-0009 的最小网络
  pub(crate) fn landmarks_model(extra: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut nodes = vec![
      node("conv1", "Conv", ""),
      node("relu1", "Relu", ""),
      node("fc", "Gemm", "ai.onnx"),
    ];
    nodes.extend(extra.iter().map(|(n, op, d)| node(n, op, d)));

    ModelProto {
      ir_version: 8,
      producer_name: "pytorch".to_string(),
      producer_version: "2.1".to_string(),
      graph: Some(GraphProto {
        node: nodes,
        name: "landmarks".to_string(),
        initializer: vec![TensorProto {
          name: "conv1.weight".to_string(),
        }],
        input: vec![
          value_info("data", &[None, Some(3), Some(48), Some(48)]),
          value_info("conv1.weight", &[Some(16), Some(3), Some(3), Some(3)]),
        ],
        output: vec![value_info("landmarks", &[Some(1), Some(10), Some(1), Some(1)])],
      }),
      opset_import: vec![OperatorSetIdProto {
        domain: String::new(),
        version: 17,
      }],
    }
    .encode_to_vec()
  }

  #[test]
  fn decodes_inputs_outputs_and_layers() {
    let network = NetworkDescription::from_bytes(&landmarks_model(&[])).unwrap();
    assert_eq!(network.producer, "pytorch");
    assert_eq!(network.opsets, vec![(String::new(), 17)]);
    assert_eq!(network.layers.len(), 3);
    assert_eq!(network.inputs.len(), 1, "initializers are not inputs");

    let input = network.input().unwrap();
    assert_eq!(input.name, "data");
    assert_eq!(input.shape, vec![None, Some(3), Some(48), Some(48)]);
    assert_eq!(network.output().unwrap().name, "landmarks");
    assert_eq!(network.image_input_size().unwrap(), (48, 48));
  }

  #[test]
  fn builtin_domains_are_supported() {
    let network = NetworkDescription::from_bytes(&landmarks_model(&[])).unwrap();
    assert!(network.unsupported_layers().is_empty());
  }

  #[test]
  fn custom_domain_layers_are_reported() {
    let data = landmarks_model(&[
      ("norm", "ChannelNorm", "org.example.custom"),
      ("", "Grid", "org.example.custom"),
    ]);
    let network = NetworkDescription::from_bytes(&data).unwrap();
    let unsupported: Vec<String> = network
      .unsupported_layers()
      .iter()
      .map(|l| l.to_string())
      .collect();
    assert_eq!(
      unsupported,
      vec![
        "norm(org.example.custom::ChannelNorm)".to_string(),
        "#4(org.example.custom::Grid)".to_string(),
      ]
    );
  }

  #[test]
  fn garbage_is_not_a_network() {
    let err = NetworkDescription::from_bytes(b"\xff\xff\xff\xff not onnx").unwrap_err();
    assert!(matches!(err, NetworkError::ModelInvalid(_)));

    let empty = ModelProto::default().encode_to_vec();
    let err = NetworkDescription::from_bytes(&empty).unwrap_err();
    assert!(matches!(err, NetworkError::ModelInvalid(_)));
  }

  #[test]
  fn non_image_input_is_rejected() {
    let mut model = ModelProto::decode(landmarks_model(&[]).as_slice()).unwrap();
    if let Some(graph) = model.graph.as_mut() {
      graph.input[0] = value_info("data", &[Some(1), Some(1), Some(48), Some(48)]);
    }
    let network = NetworkDescription::from_bytes(&model.encode_to_vec()).unwrap();
    assert!(matches!(
      network.image_input_size(),
      Err(NetworkError::InputShape(_))
    ));
  }

  #[test]
  fn model_files_resolve_pair_from_stem() {
    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("landmarks-regression-retail-0009");
    std::fs::write(dir.path().join("landmarks-regression-retail-0009.onnx"), b"x").unwrap();

    let files = ModelFiles::from_stem(&stem).unwrap();
    assert_eq!(
      files.topology,
      dir.path().join("landmarks-regression-retail-0009.onnx")
    );
    assert_eq!(files.weights, None);

    std::fs::write(dir.path().join("landmarks-regression-retail-0009.bin"), b"w").unwrap();
    let with_suffix = dir.path().join("landmarks-regression-retail-0009.onnx");
    let files = ModelFiles::from_stem(&with_suffix).unwrap();
    assert_eq!(
      files.weights,
      Some(dir.path().join("landmarks-regression-retail-0009.bin"))
    );
  }

  #[test]
  fn missing_topology_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = ModelFiles::from_stem(dir.path().join("nothing")).unwrap_err();
    assert!(matches!(err, NetworkError::ModelFilesMissing(p) if p.ends_with("nothing.onnx")));
  }
}
