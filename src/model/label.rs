// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/label.rs - 类别标签与显示颜色
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

use std::{collections::BTreeMap, path::Path};

use thiserror::Error;
use tracing::debug;

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

const UNKNOWN_LABEL: &str = "unknown";

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("标签格式错误: {0}")]
  FormatError(String),
}

/// 类别名称与显示颜色
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
  pub name: String,
  pub color: [u8; 3],
}

/// 类别号到标签的映射，只供渲染使用
#[derive(Debug, Clone)]
pub struct LabelTable {
  labels: BTreeMap<u32, Label>,
}

impl Default for LabelTable {
  fn default() -> Self {
    Self::coco()
  }
}

impl LabelTable {
  pub fn coco() -> Self {
    Self::from_names(
      COCO_CLASSES
        .iter()
        .enumerate()
        .map(|(id, name)| (id as u32, name.to_string())),
    )
  }

  pub fn from_names<I>(names: I) -> Self
  where
    I: IntoIterator<Item = (u32, String)>,
  {
    let labels = names
      .into_iter()
      .map(|(id, name)| {
        (
          id,
          Label {
            name,
            color: class_color(id),
          },
        )
      })
      .collect();
    Self { labels }
  }

  /// 解析 `{"0": "person", "1": "bicycle"}` 形式的类别表
  pub fn from_json_str(text: &str) -> Result<Self, LabelError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    // 兼容把类别表放在 "names" 字段下的元数据文件
    let names = value
      .get("names")
      .unwrap_or(&value)
      .as_object()
      .ok_or_else(|| LabelError::FormatError("类别表必须是 JSON 对象".to_string()))?;

    let mut entries = Vec::with_capacity(names.len());
    for (key, name) in names {
      let id = key
        .parse::<u32>()
        .map_err(|_| LabelError::FormatError(format!("类别号无效: '{}'", key)))?;
      let name = name
        .as_str()
        .ok_or_else(|| LabelError::FormatError(format!("类别 {} 的名称不是字符串", id)))?;
      entries.push((id, name.to_string()));
    }

    debug!("读取到 {} 个类别标签", entries.len());
    Ok(Self::from_names(entries))
  }

  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let text = std::fs::read_to_string(path)?;
    Self::from_json_str(&text)
  }

  pub fn get(&self, class_id: u32) -> Option<&Label> {
    self.labels.get(&class_id)
  }

  pub fn name(&self, class_id: u32) -> &str {
    self
      .labels
      .get(&class_id)
      .map(|label| label.name.as_str())
      .unwrap_or(UNKNOWN_LABEL)
  }

  pub fn color(&self, class_id: u32) -> [u8; 3] {
    self
      .labels
      .get(&class_id)
      .map(|label| label.color)
      .unwrap_or_else(|| class_color(class_id))
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}

/// 按类别号生成固定的深色，黄金角分布色相避免相邻类别颜色接近
pub fn class_color(class_id: u32) -> [u8; 3] {
  let hue = (class_id as f32 * 137.507_77) % 360.0;
  hsv_to_rgb(hue, 0.8, 0.6)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  [
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ]
}
