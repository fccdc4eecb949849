// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use args::{Args, TaskKind};
use yanjing::{
  FromUrl,
  input::InputWrapper,
  model::FacialLandmarksBuilder,
  output::OutputWrapper,
  task::{ContinuousTask, OneShotTask, RepeatShotTask, Task},
};

fn main() -> Result<()> {
  let args = Args::parse();
  tracing_subscriber::fmt()
    .with_max_level(args.log_level)
    .init();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let model = FacialLandmarksBuilder::from_url(&args.model)?.build()?;
  info!(
    "模型加载完成，输入 {}x{}，设备 {}",
    model.input_size().0,
    model.input_size().1,
    model.device()
  );
  let input = InputWrapper::from_url(&args.input)?.into_iter();
  let output = OutputWrapper::from_url(&args.output)?;

  match args.task {
    TaskKind::Oneshot => OneShotTask.run_task(input, model, output),
    TaskKind::Repeat => RepeatShotTask::default()
      .with_times(args.repeat)
      .run_task(input, model, output),
    TaskKind::Continuous => ContinuousTask::default()
      .with_frame_number(Some(args.max_frames))
      .run_task(input, model, output),
  }
}
