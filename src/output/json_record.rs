// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/json_record.rs - 检测结果 JSON 记录
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

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{DetectionSet, LabelError, LabelTable},
  output::Render,
};

#[derive(Error, Debug)]
pub enum JsonRecordError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("标签加载错误: {0}")]
  LabelError(#[from] LabelError),
}

/// 检测结果转 JSON，框坐标按 `y1, x1, y2, x2` 输出
pub fn detection_set_to_json(frame: &Frame, result: &DetectionSet, labels: &LabelTable) -> Value {
  let detections: Vec<Value> = result
    .iter()
    .map(|d| {
      json!({
        "class_id": d.class_id,
        "label": labels.name(d.class_id),
        "score": d.score,
        "bbox": {
          "y1": d.bbox.y1(),
          "x1": d.bbox.x1(),
          "y2": d.bbox.y2(),
          "x2": d.bbox.x2(),
        },
      })
    })
    .collect();

  json!({
    "name": frame.name,
    "index": frame.index,
    "width": result.image().width(),
    "height": result.image().height(),
    "x_ratio": result.ratio().x_ratio(),
    "y_ratio": result.ratio().y_ratio(),
    "detections": detections,
  })
}

pub(crate) fn write_json_record(
  path: &Path,
  frame: &Frame,
  result: &DetectionSet,
  labels: &LabelTable,
) -> Result<(), JsonRecordError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  let value = detection_set_to_json(frame, result, labels);
  std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
  Ok(())
}

/// 把每帧的检测结果写到同一个 JSON 文件，后一帧覆盖前一帧
pub struct JsonRecordOutput {
  path: PathBuf,
  labels: LabelTable,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonRecordError::SchemeMismatch);
    }

    let labels = match crate::url_query(url, "labels") {
      Some(path) => LabelTable::from_json_file(path)?,
      None => LabelTable::default(),
    };

    Ok(JsonRecordOutput {
      path: crate::url_path(url),
      labels,
    })
  }
}

impl Render<Frame, DetectionSet> for JsonRecordOutput {
  type Error = JsonRecordError;

  fn render_result(&self, frame: &Frame, result: &DetectionSet) -> Result<(), Self::Error> {
    write_json_record(&self.path, frame, result, &self.labels)?;
    info!("保存检测记录到文件: {}", self.path.display());
    Ok(())
  }
}
