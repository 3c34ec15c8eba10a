// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/geometry.rs - 信箱填充比例与边界框几何
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

use crate::error::DetectError;

/// 模型输入尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInputSpec {
  pub width: u32,
  pub height: u32,
}

impl ModelInputSpec {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub fn validate(&self) -> Result<(), DetectError> {
    if self.width == 0 || self.height == 0 {
      return Err(DetectError::InvalidDimension {
        what: "模型输入",
        width: self.width,
        height: self.height,
      });
    }
    Ok(())
  }
}

impl Default for ModelInputSpec {
  fn default() -> Self {
    Self::new(640, 640)
  }
}

/// 从模型输入坐标还原到原图坐标的缩放比例
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxRatio {
  x_ratio: f32,
  y_ratio: f32,
}

impl LetterboxRatio {
  pub fn x_ratio(&self) -> f32 {
    self.x_ratio
  }

  pub fn y_ratio(&self) -> f32 {
    self.y_ratio
  }
}

/// 计算信箱填充比例。
///
/// 图像只在右侧和下侧补齐为 `max(W, H)` 的正方形，左上角原点不动，
/// 因此还原坐标只需要乘以比例，不需要减去偏移。
pub fn compute_letterbox(
  width: u32,
  height: u32,
  model_width: u32,
  model_height: u32,
) -> Result<LetterboxRatio, DetectError> {
  if width == 0 || height == 0 {
    return Err(DetectError::InvalidDimension {
      what: "图像",
      width,
      height,
    });
  }
  ModelInputSpec::new(model_width, model_height).validate()?;

  let max_size = width.max(height) as f32;
  Ok(LetterboxRatio {
    x_ratio: max_size / model_width as f32,
    y_ratio: max_size / model_height as f32,
  })
}

/// 轴对齐边界框，坐标顺序固定为 `[y1, x1, y2, x2]`（行优先，y 在前）。
///
/// IoU 等计算按位置读取坐标，顺序不能调换。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox(pub [f32; 4]);

impl BoundingBox {
  pub const fn new(y1: f32, x1: f32, y2: f32, x2: f32) -> Self {
    Self([y1, x1, y2, x2])
  }

  /// 中心点格式转角点格式
  pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    Self::new(y1, x1, y1 + h, x1 + w)
  }

  pub fn y1(&self) -> f32 {
    self.0[0]
  }

  pub fn x1(&self) -> f32 {
    self.0[1]
  }

  pub fn y2(&self) -> f32 {
    self.0[2]
  }

  pub fn x2(&self) -> f32 {
    self.0[3]
  }

  pub fn width(&self) -> f32 {
    self.x2() - self.x1()
  }

  pub fn height(&self) -> f32 {
    self.y2() - self.y1()
  }

  /// 任一方向跨度不为正即为退化框
  pub fn is_degenerate(&self) -> bool {
    !(self.width() > 0.0 && self.height() > 0.0)
  }

  pub fn area(&self) -> f32 {
    if self.is_degenerate() {
      0.0
    } else {
      self.width() * self.height()
    }
  }

  /// 裁剪到 `[0, width] x [0, height]`，供绘制使用
  pub fn clamp(&self, width: f32, height: f32) -> Self {
    Self::new(
      self.y1().clamp(0.0, height),
      self.x1().clamp(0.0, width),
      self.y2().clamp(0.0, height),
      self.x2().clamp(0.0, width),
    )
  }
}

/// 把模型输入空间中的框还原到原图空间，不做裁剪
pub fn rescale(bbox: &BoundingBox, ratio: &LetterboxRatio) -> BoundingBox {
  BoundingBox::new(
    bbox.y1() * ratio.y_ratio,
    bbox.x1() * ratio.x_ratio,
    bbox.y2() * ratio.y_ratio,
    bbox.x2() * ratio.x_ratio,
  )
}
