// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::{Parser, ValueEnum};
use url::Url;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
  /// 单帧推理
  Oneshot,
  /// 单帧重复推理，统计平均耗时
  Repeat,
  /// 连续处理全部输入帧
  Continuous,
}

/// Yanjing 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型，例如 landmarks:///models/facial-landmarks-35?device=CPU
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源
  /// 支持格式:
  /// - 图片: image:///path/face.jpg
  /// - 目录: folder:///path/faces
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// 支持格式:
  /// - 图片: image:///path/out.png
  /// - 目录: folder:///path/records?record&crops
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 任务类型
  #[arg(long, value_enum, default_value_t = TaskKind::Continuous)]
  pub task: TaskKind,

  /// 重复推理次数（仅对 repeat 有效）
  #[arg(long, default_value_t = 1000, value_name = "COUNT")]
  pub repeat: usize,

  /// 最大处理帧数（仅对 continuous 有效，0 表示无限制）
  #[arg(long, default_value_t = 0, value_name = "COUNT")]
  pub max_frames: usize,

  /// 日志级别
  #[arg(long, default_value = "info", value_name = "LEVEL")]
  pub log_level: tracing::Level,
}
