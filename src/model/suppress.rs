// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/suppress.rs - 非极大值抑制
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

/// NMS 参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NmsParams {
  /// 最多保留的框数
  pub max_outputs: usize,
  /// IoU 严格大于该值的框被抑制
  pub iou_threshold: f32,
  /// 分数低于该值的框直接丢弃
  pub score_threshold: f32,
}

impl Default for NmsParams {
  fn default() -> Self {
    Self {
      max_outputs: 500,
      iou_threshold: 0.45,
      score_threshold: 0.2,
    }
  }
}

impl NmsParams {
  pub fn validate(&self) -> Result<(), DetectError> {
    for (name, value) in [
      ("IoU 阈值", self.iou_threshold),
      ("分数阈值", self.score_threshold),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(DetectError::InvalidConfig(format!(
          "{} 必须在 [0, 1] 之间, 实际为 {}",
          name, value
        )));
      }
    }
    Ok(())
  }
}

/// 抑制策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuppressionPolicy {
  /// 所有框一起抑制，不区分类别
  #[default]
  ClassAgnostic,
  /// 只在同一类别内抑制
  PerClass,
}

impl FromStr for SuppressionPolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "class-agnostic" | "agnostic" => Ok(SuppressionPolicy::ClassAgnostic),
      "per-class" => Ok(SuppressionPolicy::PerClass),
      _ => Err(format!(
        "未知抑制策略 '{}', 可选 class-agnostic / per-class",
        s
      )),
    }
  }
}

impl fmt::Display for SuppressionPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SuppressionPolicy::ClassAgnostic => write!(f, "class-agnostic"),
      SuppressionPolicy::PerClass => write!(f, "per-class"),
    }
  }
}

/// 计算两个 `[y1, x1, y2, x2]` 框的交并比，退化框与任何框的 IoU 都为 0
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
  let area_a = a.area();
  let area_b = b.area();
  if area_a <= 0.0 || area_b <= 0.0 {
    return 0.0;
  }

  let y1 = a.y1().max(b.y1());
  let x1 = a.x1().max(b.x1());
  let y2 = a.y2().min(b.y2());
  let x2 = a.x2().min(b.x2());

  let intersection = (y2 - y1).max(0.0) * (x2 - x1).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 不区分类别的贪心 NMS，返回按保留顺序排列的原始下标
pub fn suppress(
  boxes: &[BoundingBox],
  scores: &[f32],
  params: &NmsParams,
) -> Result<Vec<usize>, DetectError> {
  if boxes.len() != scores.len() {
    return Err(DetectError::mismatch(
      format!("{} 个分数", boxes.len()),
      &[scores.len()],
      scores.len(),
    ));
  }
  params.validate()?;

  Ok(greedy(boxes, scores, params, |_, _| true))
}

/// 按类别分组的贪心 NMS，已保留的框只抑制同类别的框
pub fn suppress_per_class(
  boxes: &[BoundingBox],
  scores: &[f32],
  classes: &[u32],
  params: &NmsParams,
) -> Result<Vec<usize>, DetectError> {
  if boxes.len() != scores.len() || boxes.len() != classes.len() {
    return Err(DetectError::mismatch(
      format!("{} 个分数和类别", boxes.len()),
      &[scores.len(), classes.len()],
      scores.len(),
    ));
  }
  params.validate()?;

  Ok(greedy(boxes, scores, params, |kept, candidate| {
    classes[kept] == classes[candidate]
  }))
}

/// 单线程顺序执行，同样的输入永远得到同样的下标序列
fn greedy<F>(boxes: &[BoundingBox], scores: &[f32], params: &NmsParams, same_group: F) -> Vec<usize>
where
  F: Fn(usize, usize) -> bool,
{
  if params.max_outputs == 0 {
    return Vec::new();
  }

  // NaN 不满足 >=，在这里一并丢弃
  let mut order: Vec<usize> = (0..scores.len())
    .filter(|&i| scores[i] >= params.score_threshold)
    .collect();
  // 加 0.0 把 -0.0 变成 +0.0，两者视为同分按下标排序
  order.sort_by(|&a, &b| {
    (scores[b] + 0.0)
      .total_cmp(&(scores[a] + 0.0))
      .then(a.cmp(&b))
  });

  let mut keep: Vec<usize> = Vec::with_capacity(params.max_outputs.min(order.len()));
  for &candidate in &order {
    let suppressed = keep.iter().any(|&kept| {
      same_group(kept, candidate) && iou(&boxes[kept], &boxes[candidate]) > params.iou_threshold
    });
    if suppressed {
      continue;
    }

    keep.push(candidate);
    if keep.len() >= params.max_outputs {
      break;
    }
  }

  debug!(
    "NMS: 输入 {} 个框, 通过分数阈值 {} 个, 保留 {} 个",
    scores.len(),
    order.len(),
    keep.len()
  );

  keep
}

#[cfg(test)]
mod tests {
  use super::*;

  fn params(max_outputs: usize, iou_threshold: f32, score_threshold: f32) -> NmsParams {
    NmsParams {
      max_outputs,
      iou_threshold,
      score_threshold,
    }
  }

  #[test]
  fn test_iou_overlapping() {
    let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BoundingBox::new(1.0, 1.0, 11.0, 11.0);
    let value = iou(&a, &b);
    assert!((value - 81.0 / 119.0).abs() < 1e-6);
    assert!((value - 0.68).abs() < 0.01);
    assert_eq!(value, iou(&b, &a));
  }

  #[test]
  fn test_iou_disjoint_and_degenerate() {
    let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    assert_eq!(iou(&a, &BoundingBox::new(20.0, 20.0, 30.0, 30.0)), 0.0);
    assert_eq!(iou(&a, &BoundingBox::new(5.0, 5.0, 5.0, 8.0)), 0.0);
    // 负宽度解码出的框视为零面积
    let flipped = BoundingBox::from_center(5.0, 5.0, -10.0, 10.0);
    assert_eq!(iou(&a, &flipped), 0.0);
    assert_eq!(iou(&flipped, &flipped), 0.0);
  }

  #[test]
  fn test_overlapping_pair_keeps_higher_score() {
    let boxes = [
      BoundingBox::new(0.0, 0.0, 10.0, 10.0),
      BoundingBox::new(1.0, 1.0, 11.0, 11.0),
    ];
    let keep = suppress(&boxes, &[0.9, 0.8], &params(500, 0.45, 0.2)).unwrap();
    assert_eq!(keep, vec![0]);
  }

  #[test]
  fn test_disjoint_boxes_kept_in_score_order() {
    let boxes = [
      BoundingBox::new(0.0, 0.0, 10.0, 10.0),
      BoundingBox::new(100.0, 100.0, 110.0, 110.0),
    ];
    let keep = suppress(&boxes, &[0.5, 0.95], &NmsParams::default()).unwrap();
    assert_eq!(keep, vec![1, 0]);
  }

  #[test]
  fn test_score_threshold_one_drops_everything_below() {
    let boxes = [
      BoundingBox::new(0.0, 0.0, 10.0, 10.0),
      BoundingBox::new(50.0, 50.0, 60.0, 60.0),
    ];
    let keep = suppress(&boxes, &[0.999, 0.3], &params(500, 0.45, 1.0)).unwrap();
    assert!(keep.is_empty());
  }

  #[test]
  fn test_score_equal_to_threshold_is_kept() {
    let boxes = [BoundingBox::new(0.0, 0.0, 10.0, 10.0)];
    let keep = suppress(&boxes, &[0.2], &params(500, 0.45, 0.2)).unwrap();
    assert_eq!(keep, vec![0]);
  }

  #[test]
  fn test_iou_threshold_one_only_filters_and_sorts() {
    let boxes = [
      BoundingBox::new(0.0, 0.0, 10.0, 10.0),
      BoundingBox::new(0.0, 0.0, 10.0, 10.0),
      BoundingBox::new(1.0, 1.0, 11.0, 11.0),
      BoundingBox::new(2.0, 2.0, 12.0, 12.0),
    ];
    let scores = [0.3, 0.9, 0.1, 0.6];
    let keep = suppress(&boxes, &scores, &params(500, 1.0, 0.2)).unwrap();
    assert_eq!(keep, vec![1, 3, 0]);
  }

  #[test]
  fn test_ties_break_on_lower_index() {
    let boxes = [
      BoundingBox::new(0.0, 0.0, 10.0, 10.0),
      BoundingBox::new(0.0, 0.0, 10.0, 10.0),
      BoundingBox::new(50.0, 50.0, 60.0, 60.0),
    ];
    let scores = [0.7, 0.7, 0.7];
    let expected = vec![0, 2];
    for _ in 0..16 {
      let keep = suppress(&boxes, &scores, &NmsParams::default()).unwrap();
      assert_eq!(keep, expected);
    }
  }

  #[test]
  fn test_signed_zero_scores_tie_by_index() {
    let boxes = [
      BoundingBox::new(0.0, 0.0, 10.0, 10.0),
      BoundingBox::new(50.0, 50.0, 60.0, 60.0),
    ];
    let keep = suppress(&boxes, &[-0.0, 0.0], &params(500, 0.45, 0.0)).unwrap();
    assert_eq!(keep, vec![0, 1]);
    let keep = suppress(&boxes, &[0.0, -0.0], &params(500, 0.45, 0.0)).unwrap();
    assert_eq!(keep, vec![0, 1]);
  }

  #[test]
  fn test_deterministic_on_many_ties() {
    let boxes: Vec<BoundingBox> = (0..200)
      .map(|i| {
        let offset = (i % 17) as f32 * 3.0;
        BoundingBox::new(offset, offset, offset + 10.0, offset + 10.0)
      })
      .collect();
    let scores: Vec<f32> = (0..200).map(|i| ((i % 5) as f32) / 5.0 + 0.1).collect();
    let first = suppress(&boxes, &scores, &NmsParams::default()).unwrap();
    for _ in 0..8 {
      assert_eq!(suppress(&boxes, &scores, &NmsParams::default()).unwrap(), first);
    }
  }

  #[test]
  fn test_idempotent_on_kept_subset() {
    let boxes: Vec<BoundingBox> = (0..60)
      .map(|i| {
        let x = (i % 8) as f32 * 7.0;
        let y = (i / 8) as f32 * 7.0;
        BoundingBox::new(y, x, y + 12.0, x + 12.0)
      })
      .collect();
    let scores: Vec<f32> = (0..60).map(|i| ((i * 37) % 100) as f32 / 100.0).collect();
    let nms = NmsParams::default();
    let keep = suppress(&boxes, &scores, &nms).unwrap();
    assert!(!keep.is_empty());

    let kept_boxes: Vec<BoundingBox> = keep.iter().map(|&i| boxes[i]).collect();
    let kept_scores: Vec<f32> = keep.iter().map(|&i| scores[i]).collect();
    let again = suppress(&kept_boxes, &kept_scores, &nms).unwrap();
    assert_eq!(again, (0..keep.len()).collect::<Vec<_>>());
  }

  #[test]
  fn test_max_outputs_caps_result() {
    let boxes: Vec<BoundingBox> = (0..10)
      .map(|i| {
        let x = i as f32 * 20.0;
        BoundingBox::new(0.0, x, 10.0, x + 10.0)
      })
      .collect();
    let scores: Vec<f32> = (0..10).map(|i| 0.5 + i as f32 * 0.01).collect();
    let keep = suppress(&boxes, &scores, &params(3, 0.45, 0.2)).unwrap();
    assert_eq!(keep, vec![9, 8, 7]);
    assert!(suppress(&boxes, &scores, &params(0, 0.45, 0.2)).unwrap().is_empty());
  }

  #[test]
  fn test_nan_scores_discarded() {
    let boxes = [
      BoundingBox::new(0.0, 0.0, 10.0, 10.0),
      BoundingBox::new(50.0, 50.0, 60.0, 60.0),
    ];
    let keep = suppress(&boxes, &[f32::NAN, 0.5], &params(500, 0.45, 0.0)).unwrap();
    assert_eq!(keep, vec![1]);
  }

  #[test]
  fn test_suppression_is_not_transitive_through_removed_boxes() {
    // b 被 a 抑制后不再抑制 c
    let boxes = [
      BoundingBox::new(0.0, 0.0, 10.0, 10.0),
      BoundingBox::new(0.0, 4.0, 10.0, 14.0),
      BoundingBox::new(0.0, 8.0, 10.0, 18.0),
    ];
    let keep = suppress(&boxes, &[0.9, 0.8, 0.7], &params(500, 0.3, 0.2)).unwrap();
    assert_eq!(keep, vec![0, 2]);
  }

  #[test]
  fn test_per_class_only_suppresses_same_class() {
    let boxes = [
      BoundingBox::new(0.0, 0.0, 10.0, 10.0),
      BoundingBox::new(1.0, 1.0, 11.0, 11.0),
      BoundingBox::new(0.5, 0.5, 10.5, 10.5),
    ];
    let scores = [0.9, 0.8, 0.7];
    let classes = [0, 1, 0];
    let keep = suppress_per_class(&boxes, &scores, &classes, &NmsParams::default()).unwrap();
    assert_eq!(keep, vec![0, 1]);

    let agnostic = suppress(&boxes, &scores, &NmsParams::default()).unwrap();
    assert_eq!(agnostic, vec![0]);
  }

  #[test]
  fn test_empty_input() {
    assert!(suppress(&[], &[], &NmsParams::default()).unwrap().is_empty());
  }

  #[test]
  fn test_invalid_input_rejected() {
    let boxes = [BoundingBox::new(0.0, 0.0, 10.0, 10.0)];
    assert!(matches!(
      suppress(&boxes, &[0.5, 0.6], &NmsParams::default()),
      Err(DetectError::ShapeMismatch { .. })
    ));
    assert!(matches!(
      suppress(&boxes, &[0.5], &params(10, 1.5, 0.2)),
      Err(DetectError::InvalidConfig(_))
    ));
    assert!(matches!(
      suppress(&boxes, &[0.5], &params(10, 0.45, f32::NAN)),
      Err(DetectError::InvalidConfig(_))
    ));
  }

  #[test]
  fn test_policy_parse() {
    assert_eq!(
      "per-class".parse::<SuppressionPolicy>(),
      Ok(SuppressionPolicy::PerClass)
    );
    assert_eq!(SuppressionPolicy::default().to_string(), "class-agnostic");
  }
}
