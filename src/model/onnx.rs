// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/model/onnx.rs - ONNX 模型结构（仅解码所需字段）
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

// 字段编号与 onnx.proto3 保持一致，未声明的字段在解码时跳过

#[derive(Clone, PartialEq, prost::Message)]
pub struct ModelProto {
  #[prost(int64, tag = "1")]
  pub ir_version: i64,
  #[prost(string, tag = "2")]
  pub producer_name: String,
  #[prost(string, tag = "3")]
  pub producer_version: String,
  #[prost(message, optional, tag = "7")]
  pub graph: Option<GraphProto>,
  #[prost(message, repeated, tag = "8")]
  pub opset_import: Vec<OperatorSetIdProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OperatorSetIdProto {
  #[prost(string, tag = "1")]
  pub domain: String,
  #[prost(int64, tag = "2")]
  pub version: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GraphProto {
  #[prost(message, repeated, tag = "1")]
  pub node: Vec<NodeProto>,
  #[prost(string, tag = "2")]
  pub name: String,
  #[prost(message, repeated, tag = "5")]
  pub initializer: Vec<TensorProto>,
  #[prost(message, repeated, tag = "11")]
  pub input: Vec<ValueInfoProto>,
  #[prost(message, repeated, tag = "12")]
  pub output: Vec<ValueInfoProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NodeProto {
  #[prost(string, repeated, tag = "1")]
  pub input: Vec<String>,
  #[prost(string, repeated, tag = "2")]
  pub output: Vec<String>,
  #[prost(string, tag = "3")]
  pub name: String,
  #[prost(string, tag = "4")]
  pub op_type: String,
  #[prost(string, tag = "7")]
  pub domain: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TensorProto {
  #[prost(string, tag = "8")]
  pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ValueInfoProto {
  #[prost(string, tag = "1")]
  pub name: String,
  #[prost(message, optional, tag = "2")]
  pub r#type: Option<TypeProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TypeProto {
  #[prost(message, optional, tag = "1")]
  pub tensor_type: Option<TensorTypeProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TensorTypeProto {
  #[prost(int32, tag = "1")]
  pub elem_type: i32,
  #[prost(message, optional, tag = "2")]
  pub shape: Option<TensorShapeProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TensorShapeProto {
  #[prost(message, repeated, tag = "1")]
  pub dim: Vec<Dimension>,
}

/// `dim_value` 与 `dim_param` 在 onnx.proto 中是 oneof，线格式与两个可选字段相同
#[derive(Clone, PartialEq, prost::Message)]
pub struct Dimension {
  #[prost(int64, optional, tag = "1")]
  pub dim_value: Option<i64>,
  #[prost(string, optional, tag = "2")]
  pub dim_param: Option<String>,
}
