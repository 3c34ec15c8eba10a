// 该文件是 Beifeng （北风） 项目的一部分。
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use beifeng::{
  FromUrl,
  args::DetectorArgs,
  input::InputWrapper,
  model::{Detector, LabelTable, Model, TensorFileExecutor},
  output::{OutputWrapper, Render},
};

/// Beifeng 目标检测后处理
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub detector: DetectorArgs,

  /// 最大处理帧数（0 表示无限制）
  #[arg(long, default_value = "0", value_name = "COUNT")]
  pub max_frames: u64,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型执行器: {}", args.detector.model);
  info!("输入来源: {}", args.detector.input);
  info!("输出: {}", args.detector.output);

  let executor = TensorFileExecutor::from_url(&args.detector.model)?;
  let detector = Detector::new(args.detector.detector_config(), executor)?;
  info!("检测器配置: {:?}", detector.config());

  let input = InputWrapper::from_url(&args.detector.input)?;
  let output = OutputWrapper::from_url(&args.detector.output)?;
  let labels = LabelTable::default();

  let mut frame_count = 0u64;
  let mut total_detections = 0usize;
  for frame in input {
    if args.max_frames > 0 && frame_count >= args.max_frames {
      info!("已达到最大帧数限制: {}", args.max_frames);
      break;
    }

    let result = detector.infer(&frame)?;
    total_detections += result.len();
    info!(
      "帧 {} ({}): 检测到 {} 个对象",
      frame.index,
      frame.name,
      result.len()
    );
    for det in &result {
      let [y1, x1, y2, x2] = det.bbox.0;
      info!(
        "  - {}: {:.2}% at [{:.0}, {:.0}, {:.0}, {:.0}]",
        labels.name(det.class_id),
        det.score * 100.0,
        y1,
        x1,
        y2,
        x2
      );
    }

    output.render_result(&frame, &result)?;
    frame_count += 1;
  }

  info!("处理完成: {} 帧, {} 个检测", frame_count, total_detections);
  Ok(())
}
