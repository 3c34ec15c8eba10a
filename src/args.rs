// 该文件是 Beifeng （北风） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::Args;
use url::Url;

use crate::model::{DetectorConfig, SuppressionPolicy, TensorLayout};

/// 各个程序共用的检测参数
#[derive(Args, Debug, Clone)]
pub struct DetectorArgs {
  /// 模型执行器，例如 tensor:///path/out.json 或 tensor:///path/out.bin?shape=1,84,8400
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源: image:///path/a.jpg 或 folder:///path/dir
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出: image:///out.png, json:///out.json 或 folder:///dir
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.2, value_name = "THRESHOLD")]
  pub conf: f32,

  /// NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.45, value_name = "THRESHOLD")]
  pub iou: f32,

  /// 最多保留的检测框数
  #[arg(long, default_value_t = 500, value_name = "COUNT")]
  pub max_det: usize,

  /// 模型输入尺寸（正方形）
  #[arg(long, default_value_t = 640, value_name = "PIXELS")]
  pub imgsz: u32,

  /// 模型类别数
  #[arg(long, default_value_t = 80, value_name = "COUNT")]
  pub num_classes: usize,

  /// 输出张量布局: channels-first 或 anchors-first
  #[arg(long, default_value_t = TensorLayout::ChannelsFirst, value_name = "LAYOUT")]
  pub layout: TensorLayout,

  /// 按类别分别做 NMS
  #[arg(long)]
  pub per_class: bool,
}

impl DetectorArgs {
  pub fn detector_config(&self) -> DetectorConfig {
    let policy = if self.per_class {
      SuppressionPolicy::PerClass
    } else {
      SuppressionPolicy::ClassAgnostic
    };

    DetectorConfig::default()
      .with_input_size(self.imgsz, self.imgsz)
      .with_num_classes(self.num_classes)
      .with_max_outputs(self.max_det)
      .with_iou_threshold(self.iou)
      .with_score_threshold(self.conf)
      .with_layout(self.layout)
      .with_policy(policy)
  }
}

#[cfg(test)]
mod tests {
  use clap::Parser;

  use super::*;

  #[derive(Parser)]
  struct Cli {
    #[command(flatten)]
    detector: DetectorArgs,
  }

  #[test]
  fn test_defaults_match_detector_config() {
    let cli = Cli::try_parse_from([
      "beifeng",
      "--model",
      "tensor:///tmp/out.json",
      "--input",
      "image:///tmp/a.jpg",
      "--output",
      "json:///tmp/out.json",
    ])
    .unwrap();
    assert_eq!(cli.detector.detector_config(), DetectorConfig::default());
  }

  #[test]
  fn test_flags() {
    let cli = Cli::try_parse_from([
      "beifeng",
      "--model",
      "tensor:///tmp/out.bin?shape=1,300,6",
      "--input",
      "folder:///tmp/images",
      "--output",
      "folder:///tmp/out",
      "--conf",
      "0.5",
      "--imgsz",
      "320",
      "--layout",
      "anchors-first",
      "--per-class",
    ])
    .unwrap();
    let config = cli.detector.detector_config();
    assert_eq!(config.nms.score_threshold, 0.5);
    assert_eq!(config.input.width, 320);
    assert_eq!(config.layout, TensorLayout::AnchorsFirst);
    assert_eq!(config.policy, SuppressionPolicy::PerClass);
  }
}
