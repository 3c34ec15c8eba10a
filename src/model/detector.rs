// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/detector.rs - 检测流水线
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

use std::{sync::Arc, time::Instant};

use image::{RgbImage, imageops::FilterType};
use tracing::debug;

use crate::{
  cancel::CancelToken,
  error::DetectError,
  frame::{Frame, letterbox_frame},
  model::{
    DetectionSet, LetterboxRatio, Model, ModelExecutor, ModelInputSpec, NmsParams,
    RawDetectionTensor, SuppressionPolicy, TensorLayout, compute_letterbox, decode, suppress,
    suppress_per_class,
  },
};

/// 检测器配置，构造后不再改变
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
  pub input: ModelInputSpec,
  pub num_classes: usize,
  pub nms: NmsParams,
  pub layout: TensorLayout,
  pub policy: SuppressionPolicy,
  pub filter: FilterType,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      input: ModelInputSpec::default(),
      num_classes: 80,
      nms: NmsParams::default(),
      layout: TensorLayout::default(),
      policy: SuppressionPolicy::default(),
      filter: FilterType::Triangle,
    }
  }
}

impl DetectorConfig {
  pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
    self.input = ModelInputSpec::new(width, height);
    self
  }

  pub fn with_num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = num_classes;
    self
  }

  pub fn with_max_outputs(mut self, max_outputs: usize) -> Self {
    self.nms.max_outputs = max_outputs;
    self
  }

  pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
    self.nms.iou_threshold = iou_threshold;
    self
  }

  pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
    self.nms.score_threshold = score_threshold;
    self
  }

  pub fn with_layout(mut self, layout: TensorLayout) -> Self {
    self.layout = layout;
    self
  }

  pub fn with_policy(mut self, policy: SuppressionPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn with_filter(mut self, filter: FilterType) -> Self {
    self.filter = filter;
    self
  }

  pub fn validate(&self) -> Result<(), DetectError> {
    self.input.validate()?;
    if self.num_classes == 0 {
      return Err(DetectError::InvalidConfig("类别数必须大于 0".to_string()));
    }
    self.nms.validate()
  }
}

/// 目标检测器：信箱填充、执行模型、解码、抑制、还原坐标。
///
/// 每次调用只使用自己的临时缓冲，`&self` 可以在多个线程间共享。
pub struct Detector<E> {
  config: DetectorConfig,
  executor: E,
}

impl<E: ModelExecutor> Detector<E> {
  pub fn new(config: DetectorConfig, executor: E) -> Result<Self, DetectError> {
    config.validate()?;
    debug!("创建检测器: {:?}", config);
    Ok(Self { config, executor })
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn detect(&self, image: Arc<RgbImage>) -> Result<DetectionSet, DetectError> {
    self.detect_with_cancel(image, &CancelToken::default())
  }

  /// 在各阶段之间检查取消令牌；模型执行本身不会被打断
  pub fn detect_with_cancel(
    &self,
    image: Arc<RgbImage>,
    cancel: &CancelToken,
  ) -> Result<DetectionSet, DetectError> {
    cancel.check()?;
    let input = self.config.input;
    let ratio = compute_letterbox(image.width(), image.height(), input.width, input.height)?;

    let now = Instant::now();
    let frame = letterbox_frame(&image, input, self.config.filter)?;
    debug!("预处理耗时: {:.2?}", now.elapsed());

    cancel.check()?;
    let now = Instant::now();
    let tensor = self
      .executor
      .execute(&frame)
      .map_err(DetectError::executor)?;
    debug!("模型执行耗时: {:.2?}", now.elapsed());

    cancel.check()?;
    self.postprocess(image, ratio, &tensor)
  }

  /// 从原始张量得到最终结果
  pub fn postprocess(
    &self,
    image: Arc<RgbImage>,
    ratio: LetterboxRatio,
    tensor: &RawDetectionTensor,
  ) -> Result<DetectionSet, DetectError> {
    let now = Instant::now();
    let decoded = decode(tensor, self.config.num_classes, self.config.layout)?;
    let keep = match self.config.policy {
      SuppressionPolicy::ClassAgnostic => {
        suppress(decoded.boxes(), decoded.scores(), &self.config.nms)?
      }
      SuppressionPolicy::PerClass => suppress_per_class(
        decoded.boxes(),
        decoded.scores(),
        decoded.classes(),
        &self.config.nms,
      )?,
    };
    let result = DetectionSet::assemble(image, ratio, &decoded, &keep)?;
    debug!(
      "后处理耗时: {:.2?}, {} 个锚点保留 {} 个",
      now.elapsed(),
      decoded.len(),
      result.len()
    );
    Ok(result)
  }
}

impl<E: ModelExecutor> Model for Detector<E> {
  type Input = Frame;
  type Output = DetectionSet;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(Arc::clone(&input.image))
  }

  fn infer_cancellable(
    &self,
    input: &Self::Input,
    cancel: &CancelToken,
  ) -> Result<Self::Output, Self::Error> {
    self.detect_with_cancel(Arc::clone(&input.image), cancel)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::RgbNhwcFrame;

  fn empty_executor(_: &RgbNhwcFrame) -> Result<RawDetectionTensor, std::io::Error> {
    Ok(RawDetectionTensor::new(vec![0.0; 6 * 2], vec![1, 6, 2]))
  }

  #[test]
  fn test_config_defaults() {
    let config = DetectorConfig::default();
    assert_eq!(config.input, ModelInputSpec::new(640, 640));
    assert_eq!(config.nms.max_outputs, 500);
    assert_eq!(config.nms.iou_threshold, 0.45);
    assert_eq!(config.nms.score_threshold, 0.2);
    assert_eq!(config.layout, TensorLayout::ChannelsFirst);
    assert_eq!(config.policy, SuppressionPolicy::ClassAgnostic);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_config_validation() {
    let bad = [
      DetectorConfig::default().with_num_classes(0),
      DetectorConfig::default().with_input_size(0, 640),
      DetectorConfig::default().with_iou_threshold(1.5),
      DetectorConfig::default().with_score_threshold(-0.1),
    ];
    for config in bad {
      assert!(Detector::new(config, empty_executor).is_err(), "{config:?}");
    }
  }

  #[test]
  fn test_low_scores_give_empty_result() {
    let config = DetectorConfig::default()
      .with_input_size(32, 32)
      .with_num_classes(2);
    let detector = Detector::new(config, empty_executor).unwrap();
    let result = detector.detect(Arc::new(RgbImage::new(64, 48))).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.ratio().x_ratio(), 2.0);
  }

  #[test]
  fn test_cancelled_before_start() {
    let detector = Detector::new(
      DetectorConfig::default().with_num_classes(2),
      empty_executor,
    )
    .unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(matches!(
      detector.detect_with_cancel(Arc::new(RgbImage::new(8, 8)), &cancel),
      Err(DetectError::Cancelled)
    ));
  }
}
