// 该文件是 Beifeng （北风） 项目的一部分。
// src/input/read_directory.rs - 目录图像输入
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

use std::{path::PathBuf, vec::IntoIter};

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按文件名顺序逐张读取目录中的图像，无法解码的文件跳过
pub struct DirectoryInput {
  files: IntoIter<PathBuf>,
  index: u64,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(DirectoryInputError::SchemeMismatch);
    }

    let directory = crate::url_path(url);
    let mut files = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
          IMAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false);
      if path.is_file() && is_image {
        files.push(path);
      }
    }
    files.sort();

    info!("目录 {} 中找到 {} 张图像", directory.display(), files.len());
    Ok(DirectoryInput {
      files: files.into_iter(),
      index: 0,
    })
  }
}

impl Iterator for DirectoryInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      let image = match ImageReader::open(&path).and_then(|r| r.with_guessed_format()) {
        Ok(reader) => reader.decode(),
        Err(e) => {
          warn!("无法打开 {}: {}", path.display(), e);
          continue;
        }
      };
      match image {
        Ok(image) => {
          let frame = Frame::new(image.into_rgb8(), self.index, super::frame_name(&path));
          self.index += 1;
          return Some(frame);
        }
        Err(e) => {
          warn!("跳过无法解码的文件 {}: {}", path.display(), e);
        }
      }
    }
    None
  }
}
