// 该文件是 Beifeng （北风） 项目的一部分。
// src/bin/simple_parallelshot.rs - 多线程共享同一个检测器处理整个目录
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use beifeng::{
  FromUrl,
  args::DetectorArgs,
  input::InputWrapper,
  model::{Detector, TensorFileExecutor},
  output::OutputWrapper,
  task::{ParallelTask, Task},
};

/// 并行处理
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub detector: DetectorArgs,

  /// 工作线程数，默认等于可用核心数
  #[arg(long, value_name = "WORKERS")]
  pub workers: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型执行器: {}", args.detector.model);
  info!("输入来源: {}", args.detector.input);
  info!("输出路径: {}", args.detector.output);

  let input = InputWrapper::from_url(&args.detector.input)?;
  let executor = TensorFileExecutor::from_url(&args.detector.model)?;
  let model = Detector::new(args.detector.detector_config(), executor)?;
  let output = OutputWrapper::from_url(&args.detector.output)?;

  let mut task = ParallelTask::default();
  if let Some(workers) = args.workers {
    task = task.with_workers(workers);
  }
  task.run_task(input, model, output)?;

  Ok(())
}
