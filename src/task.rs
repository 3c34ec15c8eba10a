// 该文件是 Beifeng （北风） 项目的一部分。
// src/task.rs - 任务循环
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

use std::{thread, time::Duration};
use tracing::{error, info, warn};

use crate::{cancel::CancelToken, model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 对同一帧重复推理，用来测量平均耗时
pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { times: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times.max(1);
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

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
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

    // 前两次包含预热，次数足够时不计入平均
    let warmup = if times.len() > 2 { 2 } else { 0 };
    let measured = &times[warmup..];
    warn!(
      "平均推理时间: {:.2?}",
      measured.iter().sum::<Duration>() / measured.len() as u32
    );

    Ok(())
  }
}

/// 逐帧处理直到输入耗尽、达到帧数上限或被取消
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  cancel: CancelToken,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
    self.cancel = cancel;
    self
  }

  /// 收到 Ctrl-C 时触发取消令牌，30 秒内未退出则强制结束进程
  pub fn with_interrupt_handler(mut self) -> Self {
    self.handle_interrupt = true;
    self
  }

  fn install_interrupt_handler(&self) -> anyhow::Result<()> {
    let cancel = self.cancel.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      cancel.cancel();
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(())
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

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    if self.handle_interrupt {
      self.install_interrupt_handler()?;
    }

    let mut frame_index = 0usize;
    let mut now = std::time::Instant::now();
    for frame in input {
      if self.cancel.is_cancelled() {
        warn!("任务已取消，退出任务循环");
        break;
      }
      frame_index += 1;
      info!("处理第 {} 帧图像", frame_index);
      let result = match model.infer_cancellable(&frame, &self.cancel) {
        Ok(result) => result,
        Err(e) if self.cancel.is_cancelled() => {
          warn!("推理被取消: {}", e);
          break;
        }
        Err(e) => return Err(e.into()),
      };
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = std::time::Instant::now();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

/// 多个工作线程共享同一个模型并行推理，按输入顺序渲染
#[derive(Debug)]
pub struct ParallelTask {
  workers: usize,
}

impl Default for ParallelTask {
  fn default() -> Self {
    let workers = thread::available_parallelism()
      .map(|n| n.get())
      .unwrap_or(1);
    Self { workers }
  }
}

impl ParallelTask {
  pub fn with_workers(mut self, workers: usize) -> Self {
    self.workers = workers.max(1);
    self
  }
}

impl<
  F: Sync,
  D: Send,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME> + Sync,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ParallelTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务，工作线程数 {}", self.workers);
    let frames: Vec<F> = input.collect();
    if frames.is_empty() {
      return Err(anyhow::anyhow!("没有输入帧"));
    }

    let now = std::time::Instant::now();
    let mut results: Vec<Option<Result<D, ME>>> = Vec::with_capacity(frames.len());
    results.resize_with(frames.len(), || None);

    let chunk = frames.len().div_ceil(self.workers);
    thread::scope(|scope| {
      for (frames, slots) in frames.chunks(chunk).zip(results.chunks_mut(chunk)) {
        let model = &model;
        scope.spawn(move || {
          for (frame, slot) in frames.iter().zip(slots.iter_mut()) {
            *slot = Some(model.infer(frame));
          }
        });
      }
    });
    info!("{} 帧推理完成，耗时: {:.2?}", frames.len(), now.elapsed());

    for (index, (frame, result)) in frames.iter().zip(results).enumerate() {
      match result {
        Some(Ok(result)) => output.render_result(frame, &result)?,
        Some(Err(e)) => return Err(e.into()),
        None => error!("第 {} 帧没有推理结果", index),
      }
    }

    info!("任务完成");
    Ok(())
  }
}
