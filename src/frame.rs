// 该文件是 Beifeng （北风） 项目的一部分。
// src/frame.rs - 输入帧与 NHWC 模型输入
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

use std::sync::Arc;

use image::{Rgb, RgbImage, imageops};
use tracing::debug;

use crate::{error::DetectError, model::ModelInputSpec};

const RGB_CHANNELS: usize = 3;

/// 一个输入单元：原图、序号与名称（通常是文件名去掉扩展名）
#[derive(Debug, Clone)]
pub struct Frame {
  pub image: Arc<RgbImage>,
  pub index: u64,
  pub name: String,
}

impl Frame {
  pub fn new(image: impl Into<Arc<RgbImage>>, index: u64, name: impl Into<String>) -> Self {
    Self {
      image: image.into(),
      index,
      name: name.into(),
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// 模型输入：运行时尺寸的 HWC `u8` 缓冲
#[derive(Debug, Clone, PartialEq)]
pub struct RgbNhwcFrame {
  width: usize,
  height: usize,
  data: Box<[u8]>,
}

impl RgbNhwcFrame {
  pub fn with_shape(height: usize, width: usize) -> Self {
    let data = vec![0u8; RGB_CHANNELS * width * height].into_boxed_slice();
    Self {
      width,
      height,
      data,
    }
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }

  /// 归一化到 `[0, 1]` 的 `f32`，布局不变
  pub fn to_normalized(&self) -> Vec<f32> {
    self.data.iter().map(|&v| v as f32 / 255.0).collect()
  }
}

impl AsMut<[u8]> for RgbNhwcFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl From<RgbImage> for RgbNhwcFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    // RgbImage 本身就是按行存储的 HWC
    Self {
      width: width as usize,
      height: height as usize,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

/// 把原图补齐为 `max(W, H)` 的正方形（右侧与下侧填黑），再缩放到模型输入尺寸
pub fn letterbox_frame(
  image: &RgbImage,
  spec: ModelInputSpec,
  filter: imageops::FilterType,
) -> Result<RgbNhwcFrame, DetectError> {
  let (width, height) = image.dimensions();
  if width == 0 || height == 0 {
    return Err(DetectError::InvalidDimension {
      what: "图像",
      width,
      height,
    });
  }
  spec.validate()?;

  let max_size = width.max(height);
  let padded = if width == height {
    None
  } else {
    let mut canvas = RgbImage::from_pixel(max_size, max_size, Rgb([0, 0, 0]));
    imageops::replace(&mut canvas, image, 0, 0);
    Some(canvas)
  };
  let square = padded.as_ref().unwrap_or(image);

  let resized = if max_size == spec.width && max_size == spec.height {
    square.clone()
  } else {
    imageops::resize(square, spec.width, spec.height, filter)
  };

  debug!(
    "信箱填充: {}x{} -> {}x{} -> {}x{}",
    width, height, max_size, max_size, spec.width, spec.height
  );
  Ok(RgbNhwcFrame::from(resized))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_rgb_image_is_hwc() {
    let mut image = RgbImage::new(2, 1);
    image.put_pixel(0, 0, Rgb([1, 2, 3]));
    image.put_pixel(1, 0, Rgb([4, 5, 6]));
    let frame = RgbNhwcFrame::from(image);
    assert_eq!((frame.height(), frame.width(), frame.channels()), (1, 2, 3));
    assert_eq!(frame.as_nhwc(), &[1, 2, 3, 4, 5, 6]);
  }

  #[test]
  fn test_to_normalized() {
    let mut frame = RgbNhwcFrame::with_shape(1, 1);
    frame.as_mut().copy_from_slice(&[0, 255, 51]);
    assert_eq!(frame.to_normalized(), vec![0.0, 1.0, 0.2]);
  }

  #[test]
  fn test_letterbox_pads_bottom_right() {
    let image = RgbImage::from_pixel(64, 32, Rgb([200, 100, 50]));
    let frame = letterbox_frame(
      &image,
      ModelInputSpec::new(64, 64),
      imageops::FilterType::Nearest,
    )
    .unwrap();
    assert_eq!((frame.width(), frame.height()), (64, 64));

    let pixel = |x: usize, y: usize| {
      let offset = (y * 64 + x) * 3;
      &frame.as_nhwc()[offset..offset + 3]
    };
    assert_eq!(pixel(0, 0), &[200, 100, 50]);
    assert_eq!(pixel(63, 31), &[200, 100, 50]);
    assert_eq!(pixel(0, 32), &[0, 0, 0]);
    assert_eq!(pixel(63, 63), &[0, 0, 0]);
  }

  #[test]
  fn test_letterbox_resizes_to_model_input() {
    let image = RgbImage::from_pixel(300, 100, Rgb([255, 255, 255]));
    let frame = letterbox_frame(
      &image,
      ModelInputSpec::new(60, 30),
      imageops::FilterType::Triangle,
    )
    .unwrap();
    assert_eq!((frame.width(), frame.height()), (60, 30));
    assert_eq!(frame.as_nhwc().len(), 60 * 30 * 3);
  }

  #[test]
  fn test_letterbox_rejects_empty_image() {
    let image = RgbImage::new(0, 10);
    assert!(matches!(
      letterbox_frame(&image, ModelInputSpec::default(), imageops::FilterType::Triangle),
      Err(DetectError::InvalidDimension { .. })
    ));
  }
}
