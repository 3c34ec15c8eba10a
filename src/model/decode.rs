// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/decode.rs - 原始输出张量解码
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

use std::{fmt, str::FromStr};

use tracing::debug;

use crate::{error::DetectError, model::geometry::BoundingBox};

/// 每个锚点前四个通道为 `cx, cy, w, h`
const BOX_CHANNELS: usize = 4;

/// 原始输出张量的内存布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
  /// `[1, 4 + C, N]`，YOLOv8 系列导出模型的默认布局
  #[default]
  ChannelsFirst,
  /// `[1, N, 4 + C]`
  AnchorsFirst,
}

impl FromStr for TensorLayout {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "channels-first" | "cf" => Ok(TensorLayout::ChannelsFirst),
      "anchors-first" | "af" => Ok(TensorLayout::AnchorsFirst),
      _ => Err(format!(
        "未知张量布局 '{}', 可选 channels-first / anchors-first",
        s
      )),
    }
  }
}

impl fmt::Display for TensorLayout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TensorLayout::ChannelsFirst => write!(f, "channels-first"),
      TensorLayout::AnchorsFirst => write!(f, "anchors-first"),
    }
  }
}

/// 模型输出的稠密张量
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetectionTensor {
  data: Box<[f32]>,
  shape: Box<[usize]>,
}

impl RawDetectionTensor {
  /// 形状在解码时才校验
  pub fn new(data: impl Into<Box<[f32]>>, shape: impl Into<Box<[usize]>>) -> Self {
    Self {
      data: data.into(),
      shape: shape.into(),
    }
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }
}

/// 逐锚点解码结果，三个数组按同一下标对齐
#[derive(Debug, Clone, Default)]
pub struct Decoded {
  boxes: Vec<BoundingBox>,
  scores: Vec<f32>,
  classes: Vec<u32>,
}

impl Decoded {
  fn with_capacity(capacity: usize) -> Self {
    Self {
      boxes: Vec::with_capacity(capacity),
      scores: Vec::with_capacity(capacity),
      classes: Vec::with_capacity(capacity),
    }
  }

  fn push(&mut self, bbox: BoundingBox, score: f32, class_id: u32) {
    self.boxes.push(bbox);
    self.scores.push(score);
    self.classes.push(class_id);
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  pub fn boxes(&self) -> &[BoundingBox] {
    &self.boxes
  }

  pub fn scores(&self) -> &[f32] {
    &self.scores
  }

  pub fn classes(&self) -> &[u32] {
    &self.classes
  }

  /// 同一下标同时取出框、分数和类别
  pub fn get(&self, index: usize) -> Option<(BoundingBox, f32, u32)> {
    Some((
      *self.boxes.get(index)?,
      *self.scores.get(index)?,
      *self.classes.get(index)?,
    ))
  }
}

/// 按布局跨步读取，不做转置拷贝
struct TensorView<'a> {
  data: &'a [f32],
  anchors: usize,
  channels: usize,
  layout: TensorLayout,
}

impl TensorView<'_> {
  fn at(&self, anchor: usize, channel: usize) -> f32 {
    match self.layout {
      TensorLayout::ChannelsFirst => self.data[channel * self.anchors + anchor],
      TensorLayout::AnchorsFirst => self.data[anchor * self.channels + channel],
    }
  }
}

fn tensor_view(
  tensor: &RawDetectionTensor,
  num_classes: usize,
  layout: TensorLayout,
) -> Result<TensorView<'_>, DetectError> {
  let channels = BOX_CHANNELS + num_classes;
  let shape = tensor.shape();
  let len = tensor.data().len();
  let expected = match layout {
    TensorLayout::ChannelsFirst => format!("[1, {}, N]", channels),
    TensorLayout::AnchorsFirst => format!("[1, N, {}]", channels),
  };

  // 批大小只能为 1，也允许省略批维度
  let (a, b) = match *shape {
    [1, a, b] | [a, b] => (a, b),
    _ => return Err(DetectError::mismatch(expected, shape, len)),
  };

  let anchors = match layout {
    TensorLayout::ChannelsFirst if a == channels => b,
    TensorLayout::AnchorsFirst if b == channels => a,
    _ => return Err(DetectError::mismatch(expected, shape, len)),
  };

  if anchors.checked_mul(channels) != Some(len) {
    return Err(DetectError::mismatch(expected, shape, len));
  }

  Ok(TensorView {
    data: tensor.data(),
    anchors,
    channels,
    layout,
  })
}

/// 把原始张量逐锚点解码为角点框、最高分和对应类别。
///
/// 不做任何过滤：N 个锚点一定得到 N 条结果，顺序不变。
/// 宽高为负或为零的锚点照常解码，交给抑制阶段处理。
pub fn decode(
  tensor: &RawDetectionTensor,
  num_classes: usize,
  layout: TensorLayout,
) -> Result<Decoded, DetectError> {
  if num_classes == 0 {
    return Err(DetectError::InvalidConfig("类别数必须大于 0".to_string()));
  }

  let view = tensor_view(tensor, num_classes, layout)?;
  debug!(
    "解码张量: 形状 {:?}, 布局 {}, 锚点 {}, 类别 {}",
    tensor.shape(),
    layout,
    view.anchors,
    num_classes
  );

  let mut decoded = Decoded::with_capacity(view.anchors);
  for anchor in 0..view.anchors {
    let bbox = BoundingBox::from_center(
      view.at(anchor, 0),
      view.at(anchor, 1),
      view.at(anchor, 2),
      view.at(anchor, 3),
    );

    // 相同最大值取最小类别号；NaN 只有在全部为 NaN 时才会留下
    let mut class_id = 0usize;
    let mut score = view.at(anchor, BOX_CHANNELS);
    for class in 1..num_classes {
      let value = view.at(anchor, BOX_CHANNELS + class);
      if value > score || (score.is_nan() && !value.is_nan()) {
        score = value;
        class_id = class;
      }
    }

    decoded.push(bbox, score, class_id as u32);
  }

  Ok(decoded)
}
