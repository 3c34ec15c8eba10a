// 该文件是 Beifeng （北风） 项目的一部分。
// src/bin/simple_repeatshot.rs - 重复推理同一张图像，测量平均耗时
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
  task::{RepeatShotTask, Task},
};

/// 重复推理基准
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub detector: DetectorArgs,

  /// 重复次数
  #[arg(long, default_value_t = 1000, value_name = "TIMES")]
  pub times: usize,
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

  RepeatShotTask::default()
    .with_times(args.times)
    .run_task(input, model, output)?;

  Ok(())
}
