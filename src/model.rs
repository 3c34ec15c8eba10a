// 该文件是 Beifeng （北风） 项目的一部分。
// src/model.rs - 模型
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

use image::RgbImage;

use crate::{cancel::CancelToken, error::DetectError};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;

  /// 支持取消的推理，默认忽略取消令牌
  fn infer_cancellable(
    &self,
    input: &Self::Input,
    _cancel: &CancelToken,
  ) -> Result<Self::Output, Self::Error> {
    self.infer(input)
  }
}

impl<M: Model + ?Sized> Model for &M {
  type Input = M::Input;
  type Output = M::Output;
  type Error = M::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }

  fn infer_cancellable(
    &self,
    input: &Self::Input,
    cancel: &CancelToken,
  ) -> Result<Self::Output, Self::Error> {
    (**self).infer_cancellable(input, cancel)
  }
}

/// 单个检测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub bbox: BoundingBox, // [y1, x1, y2, x2]
  pub score: f32,
  pub class_id: u32,
}

/// 一张图像的全部检测结果，构造后不可修改。
///
/// 顺序即 NMS 保留顺序，不再按分数重排。
#[derive(Debug, Clone)]
pub struct DetectionSet {
  image: Arc<RgbImage>,
  ratio: LetterboxRatio,
  items: Box<[Detection]>,
}

impl DetectionSet {
  /// 用同一组下标同时收集框、分数和类别，并把框还原到原图坐标。
  ///
  /// 任何越界下标都会让整个结果作废，不做部分收集。
  pub fn assemble(
    image: Arc<RgbImage>,
    ratio: LetterboxRatio,
    decoded: &Decoded,
    keep: &[usize],
  ) -> Result<Self, DetectError> {
    let items: Box<[Detection]> = keep
      .iter()
      .map(|&index| {
        let (bbox, score, class_id) = decoded.get(index).ok_or_else(|| {
          let len = decoded.len();
          DetectError::mismatch(format!("保留下标 < {}", len), &[index], len)
        })?;
        Ok(Detection {
          bbox: rescale(&bbox, &ratio),
          score,
          class_id,
        })
      })
      .collect::<Result<_, DetectError>>()?;

    Ok(Self {
      image,
      ratio,
      items,
    })
  }

  pub fn image(&self) -> &Arc<RgbImage> {
    &self.image
  }

  pub fn ratio(&self) -> LetterboxRatio {
    self.ratio
  }

  pub fn items(&self) -> &[Detection] {
    &self.items
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

impl<'a> IntoIterator for &'a DetectionSet {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

mod decode;
mod detector;
mod executor;
mod geometry;
mod label;
mod suppress;

pub use self::decode::{Decoded, RawDetectionTensor, TensorLayout, decode};
pub use self::detector::{Detector, DetectorConfig};
pub use self::executor::{ModelExecutor, TensorFileError, TensorFileExecutor};
pub use self::geometry::{BoundingBox, LetterboxRatio, ModelInputSpec, compute_letterbox, rescale};
pub use self::label::{COCO_CLASSES, Label, LabelError, LabelTable, class_color};
pub use self::suppress::{NmsParams, SuppressionPolicy, iou, suppress, suppress_per_class};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_assemble_gathers_in_lockstep() {
    let rows: [[f32; 7]; 3] = [
      [10.0, 10.0, 4.0, 4.0, 0.9, 0.1, 0.0],
      [50.0, 50.0, 4.0, 4.0, 0.1, 0.2, 0.6],
      [90.0, 90.0, 4.0, 4.0, 0.3, 0.8, 0.1],
    ];
    let data: Vec<f32> = rows.iter().flatten().copied().collect();
    let tensor = RawDetectionTensor::new(data, vec![1, 3, 7]);
    let decoded = decode(&tensor, 3, TensorLayout::AnchorsFirst).unwrap();
    let ratio = compute_letterbox(200, 100, 100, 100).unwrap();
    let image = Arc::new(RgbImage::new(200, 100));

    let set = DetectionSet::assemble(image, ratio, &decoded, &[2, 0, 1]).unwrap();
    let got: Vec<(u32, f32)> = set.iter().map(|d| (d.class_id, d.score)).collect();
    assert_eq!(got, vec![(1, 0.8), (0, 0.9), (2, 0.6)]);
    // x 和 y 都乘 2
    assert_eq!(set.items()[0].bbox, BoundingBox::new(176.0, 176.0, 184.0, 184.0));
    assert_eq!(set.image().dimensions(), (200, 100));
  }

  #[test]
  fn test_assemble_empty_keep() {
    let decoded = Decoded::default();
    let ratio = compute_letterbox(10, 10, 10, 10).unwrap();
    let set =
      DetectionSet::assemble(Arc::new(RgbImage::new(10, 10)), ratio, &decoded, &[]).unwrap();
    assert!(set.is_empty());
    assert_eq!(set.ratio(), ratio);
  }

  #[test]
  fn test_assemble_rejects_out_of_range_index() {
    let tensor = RawDetectionTensor::new(vec![5.0, 5.0, 2.0, 2.0, 0.9, 0.1], vec![1, 6]);
    let decoded = decode(&tensor, 2, TensorLayout::AnchorsFirst).unwrap();
    let ratio = compute_letterbox(10, 10, 10, 10).unwrap();
    let image = Arc::new(RgbImage::new(10, 10));

    let err = DetectionSet::assemble(image, ratio, &decoded, &[0, 1]).unwrap_err();
    match err {
      DetectError::ShapeMismatch { actual, len, .. } => {
        assert_eq!(actual, vec![1]);
        assert_eq!(len, 1);
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }
}
