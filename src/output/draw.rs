// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::debug;

use crate::model::{Detection, DetectionSet, LabelError, LabelTable};

const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体加载错误: {0}")]
  FontError(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签加载错误: {0}")]
  LabelError(#[from] LabelError),
}

/// 在原图上画框；只有给了字体时才绘制 `类别 分数` 文本
#[derive(Clone)]
pub struct Draw {
  labels: LabelTable,
  font: Option<FontArc>,
  font_size: f32,
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      labels: LabelTable::default(),
      font: None,
      font_size: LABEL_FONT_SIZE,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  /// 从 URL 查询参数 `font` 与 `labels` 构造
  pub fn from_url_query(url: &url::Url) -> Result<Self, DrawError> {
    let mut draw = Draw::default();
    if let Some(font) = crate::url_query(url, "font") {
      draw = draw.with_font_file(font)?;
    }
    if let Some(labels) = crate::url_query(url, "labels") {
      draw = draw.with_labels(LabelTable::from_json_file(labels)?);
    }
    Ok(draw)
  }

  pub fn with_labels(mut self, labels: LabelTable) -> Self {
    self.labels = labels;
    self
  }

  pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path.as_ref())?;
    let font = FontArc::try_from_vec(data).map_err(|e| DrawError::FontError(e.to_string()))?;
    debug!("加载字体: {}", path.as_ref().display());
    self.font = Some(font);
    Ok(self)
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }

  pub fn draw_detections(&self, result: &DetectionSet) -> RgbImage {
    let mut image = RgbImage::clone(result.image());
    for detection in result {
      self.draw_bbox_with_label(&mut image, detection);
    }
    image
  }

  fn draw_bbox_with_label(&self, image: &mut RgbImage, detection: &Detection) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    let bbox = detection.bbox.clamp(w, h);

    let x_min = bbox.x1().floor() as i32;
    let y_min = bbox.y1().floor() as i32;
    let x_max = (bbox.x2().ceil() as i32).min(w as i32 - 1);
    let y_max = (bbox.y2().ceil() as i32).min(h as i32 - 1);
    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = Rgb(self.labels.color(detection.class_id));
    for t in 0..self.thickness {
      let width = x_max - x_min - 2 * t;
      let height = y_max - y_min - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32 + 1, height as u32 + 1);
      draw_hollow_rect_mut(image, rect, color);
    }

    let Some(font) = &self.font else {
      return;
    };

    let label = format!(
      "{} {:.2}",
      self.labels.name(detection.class_id),
      detection.score
    );
    let scale = PxScale::from(self.font_size);
    let Some(rect) = label_rect(x_min, y_min, text_size(scale, font, &label), image.width()) else {
      return;
    };

    draw_filled_rect_mut(image, rect, color);
    draw_text_mut(
      image,
      TEXT_COLOR,
      rect.left() + LABEL_TEXT_PADDING,
      rect.top() + LABEL_TEXT_PADDING,
      scale,
      font,
      &label,
    );
  }
}

/// 标签背景放在框上方，放不下时放进框内；超出右边界的部分裁掉
fn label_rect(x_min: i32, y_min: i32, text: (u32, u32), image_width: u32) -> Option<Rect> {
  let (text_width, text_height) = text;
  let box_height = text_height as i32 + 2 * LABEL_TEXT_PADDING;
  let label_y = if y_min >= box_height {
    y_min - box_height
  } else {
    y_min
  };
  let label_width = (text_width as i32 + 2 * LABEL_TEXT_PADDING).min(image_width as i32 - x_min);
  if label_width <= 0 {
    return None;
  }
  Some(Rect::at(x_min, label_y).of_size(label_width as u32, box_height as u32))
}
