// 该文件是 Beifeng （北风） 项目的一部分。
// src/input.rs - 图像输入
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, frame::Frame};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "read_directory")]
mod read_directory;
#[cfg(feature = "read_directory")]
pub use self::read_directory::{DirectoryInput, DirectoryInputError};

/// 取文件名去掉扩展名作为帧名称
#[cfg(any(feature = "read_image_file", feature = "read_directory"))]
fn frame_name(path: &std::path::Path) -> String {
  path
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_else(|| "frame".to_string())
}

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "read_directory")]
  #[error("目录输入错误: {0}")]
  DirectoryInputError(#[from] DirectoryInputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "read_directory")]
  ReadDirectory(DirectoryInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
    }
    #[cfg(feature = "read_directory")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == DirectoryInput::SCHEME {
        let input = DirectoryInput::from_url(url)?;
        return Ok(InputWrapper::ReadDirectory(input));
      }
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl Iterator for InputWrapper {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next(),
      #[cfg(feature = "read_directory")]
      InputWrapper::ReadDirectory(input) => input.next(),
      #[allow(unreachable_patterns)]
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unknown_scheme() {
    let url = Url::parse("rtsp://camera/stream").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch(scheme)) if scheme == "rtsp"
    ));
  }

  #[cfg(feature = "read_directory")]
  #[test]
  fn test_folder_dispatch() {
    let dir = std::env::temp_dir().join(format!("beifeng-input-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    image::RgbImage::new(4, 2).save(dir.join("b.png")).unwrap();
    image::RgbImage::new(3, 3).save(dir.join("a.png")).unwrap();

    let url = Url::from_directory_path(&dir).unwrap();
    let url = Url::parse(&url.as_str().replacen("file", "folder", 1)).unwrap();
    let frames: Vec<Frame> = InputWrapper::from_url(&url).unwrap().collect();
    let names: Vec<&str> = frames.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(frames[1].index, 1);

    std::fs::remove_dir_all(dir).unwrap();
  }
}
