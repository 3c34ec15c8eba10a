// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::DetectionSet,
  output::{
    Render,
    draw::{Draw, DrawError},
    json_record::{JsonRecordError, write_json_record},
    save_image_file::{SaveImageFileError, save_image},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("未知的记录格式: {0}，目前只支持 json")]
  UnknownRecordKind(String),
  #[error("图像保存错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("记录保存错误: {0}")]
  JsonRecordError(#[from] JsonRecordError),
  #[error("绘制配置错误: {0}")]
  DrawError(#[from] DrawError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

enum RecordKind {
  /// `<name>.png`，画好框的图像
  Draw,
  /// `<name>.png` 原图加 `<name>.json` 检测记录
  Record,
}

/// 每帧一个文件，文件名取自帧名称；默认只保存有检测结果的帧
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  kind: RecordKind,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = match crate::url_query(uri, "record").as_deref() {
      Some("json") => RecordKind::Record,
      Some(other) => return Err(DirectoryRecordOutputError::UnknownRecordKind(other.to_string())),
      None => RecordKind::Draw,
    };
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    let directory = crate::url_path(uri);
    std::fs::create_dir_all(&directory)?;

    Ok(DirectoryRecordOutput {
      directory,
      draw: Draw::from_url_query(uri)?,
      kind,
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_path(&self, frame: &Frame, extension: &str) -> PathBuf {
    let stem = if frame.name.is_empty() {
      format!("{:06}", frame.index)
    } else {
      frame.name.clone()
    };
    self.directory.join(format!("{}.{}", stem, extension))
  }
}

impl Render<Frame, DetectionSet> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &DetectionSet) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("第 {} 帧没有检测结果, 跳过保存", frame.index);
      return Ok(());
    }

    let image_path = self.frame_path(frame, "png");
    match self.kind {
      RecordKind::Draw => {
        save_image(&image_path, &self.draw.draw_detections(result))?;
      }
      RecordKind::Record => {
        save_image(&image_path, &frame.image)?;
        write_json_record(
          &self.frame_path(frame, "json"),
          frame,
          result,
          self.draw.labels(),
        )?;
      }
    }
    debug!("保存第 {} 帧到 {}", frame.index, image_path.display());
    Ok(())
  }
}
