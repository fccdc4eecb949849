// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/task.rs - 推理任务
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

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::{thread, time::Duration};
use tracing::{error, info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

const DEFAULT_REPEAT_TIMES: usize = 1000;
const WARMUP_TIMES: usize = 2;

#[derive(Debug)]
pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self {
      times: DEFAULT_REPEAT_TIMES,
    }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理 {} 次...", self.times);
    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = std::time::Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      info!("({})渲染完成，耗时: {:.2?}", i, now.elapsed());
      times.push(elapsed);
    }

    if times.len() > WARMUP_TIMES {
      warn!(
        "平均推理时间: {:.2?}",
        times.iter().skip(WARMUP_TIMES).sum::<Duration>() / (times.len() - WARMUP_TIMES) as u32
      );
    } else {
      warn!("推理次数不足 {}，不计算平均推理时间", WARMUP_TIMES + 1);
    }

    Ok(())
  }
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INTERRUPT_HANDLER: OnceLock<Result<(), String>> = OnceLock::new();

// 每个进程只能注册一次中断处理
fn install_interrupt_handler() {
  let installed = INTERRUPT_HANDLER.get_or_init(|| {
    ctrlc::set_handler(|| {
      info!("收到中断信号，准备退出...");
      INTERRUPTED.store(true, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .map_err(|e| e.to_string())
  });

  if let Err(e) = installed {
    warn!("无法设置中断处理: {}", e);
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number.filter(|n| *n > 0);
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    install_interrupt_handler();
    INTERRUPTED.store(false, Ordering::SeqCst);

    let mut frame_index = 0usize;
    let mut failed = 0usize;
    let mut now = std::time::Instant::now();
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      info!("处理第 {} 帧图像", frame_index);
      match model.infer(&frame) {
        Ok(result) => {
          let elapsed_a = now.elapsed();
          output.render_result(&frame, &result)?;
          let elapsed_b = now.elapsed();
          info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
        }
        Err(e) => {
          failed += 1;
          error!("第 {} 帧推理失败，跳过: {}", frame_index, e);
        }
      }
      now = std::time::Instant::now();

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if INTERRUPTED.load(Ordering::SeqCst) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!(
      "任务完成，共处理 {} 帧，成功 {} 帧，失败 {} 帧",
      frame_index,
      frame_index - failed,
      failed
    );
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::rc::Rc;
  use thiserror::Error;

  #[derive(Error, Debug)]
  #[error("无法处理 {0}")]
  struct MockError(String);

  #[derive(Default)]
  struct MockModel {
    calls: usize,
  }

  impl Model for MockModel {
    type Input = String;
    type Output = usize;
    type Error = MockError;

    fn infer(&mut self, input: &String) -> Result<usize, MockError> {
      self.calls += 1;
      if input.starts_with("bad") {
        return Err(MockError(input.clone()));
      }
      Ok(input.len())
    }
  }

  #[derive(Default, Clone)]
  struct Recorder(Rc<RefCell<Vec<(String, usize)>>>);

  impl Render<String, usize> for Recorder {
    type Error = MockError;

    fn render_result(&self, frame: &String, result: &usize) -> Result<(), MockError> {
      self.0.borrow_mut().push((frame.clone(), *result));
      Ok(())
    }
  }

  fn frames(names: &[&str]) -> std::vec::IntoIter<String> {
    names
      .iter()
      .map(|s| s.to_string())
      .collect::<Vec<_>>()
      .into_iter()
  }

  #[test]
  fn one_shot_renders_first_frame_only() {
    let recorder = Recorder::default();
    OneShotTask
      .run_task(frames(&["a", "bb"]), MockModel::default(), recorder.clone())
      .unwrap();
    assert_eq!(*recorder.0.borrow(), vec![("a".to_string(), 1)]);
  }

  #[test]
  fn one_shot_fails_without_frames() {
    let result = OneShotTask.run_task(frames(&[]), MockModel::default(), Recorder::default());
    assert!(result.is_err());
  }

  #[test]
  fn repeat_shot_renders_each_run() {
    let recorder = Recorder::default();
    RepeatShotTask::default()
      .with_times(5)
      .run_task(frames(&["abc"]), MockModel::default(), recorder.clone())
      .unwrap();
    assert_eq!(recorder.0.borrow().len(), 5);
  }

  #[test]
  fn repeat_shot_propagates_inference_errors() {
    let result = RepeatShotTask::default().with_times(3).run_task(
      frames(&["bad"]),
      MockModel::default(),
      Recorder::default(),
    );
    assert!(result.is_err());
  }

  #[test]
  fn continuous_skips_failed_frames() {
    let recorder = Recorder::default();
    ContinuousTask::default()
      .run_task(
        frames(&["a", "bad1", "ccc", "bad2", "dd"]),
        MockModel::default(),
        recorder.clone(),
      )
      .unwrap();
    let rendered: Vec<String> = recorder.0.borrow().iter().map(|(f, _)| f.clone()).collect();
    assert_eq!(rendered, vec!["a", "ccc", "dd"]);
  }

  #[test]
  fn continuous_stops_at_frame_limit() {
    let recorder = Recorder::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(frames(&["a", "b", "c"]), MockModel::default(), recorder.clone())
      .unwrap();
    assert_eq!(recorder.0.borrow().len(), 2);
  }

  #[test]
  fn zero_frame_limit_means_unlimited() {
    let recorder = Recorder::default();
    ContinuousTask::default()
      .with_frame_number(Some(0))
      .run_task(frames(&["a", "b", "c"]), MockModel::default(), recorder.clone())
      .unwrap();
    assert_eq!(recorder.0.borrow().len(), 3);
  }
}
