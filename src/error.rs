// 该文件是 Beifeng （北风） 项目的一部分。
// src/error.rs - 检测流水线错误定义
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

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 检测流水线的错误。任何一步失败都会使整次检测失败，不返回部分结果。
#[derive(Error, Debug)]
pub enum DetectError {
  #[error("尺寸无效: {what} 为 {width}x{height}")]
  InvalidDimension {
    what: &'static str,
    width: u32,
    height: u32,
  },
  #[error("张量形状不匹配: 期望 {expected}, 实际形状 {actual:?}, 数据长度 {len}")]
  ShapeMismatch {
    expected: String,
    actual: Vec<usize>,
    len: usize,
  },
  #[error("模型执行失败: {0}")]
  ExecutorFailure(#[source] BoxError),
  #[error("配置无效: {0}")]
  InvalidConfig(String),
  #[error("检测已取消")]
  Cancelled,
}

impl DetectError {
  pub fn executor<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    DetectError::ExecutorFailure(Box::new(err))
  }

  pub fn mismatch(expected: impl Into<String>, actual: &[usize], len: usize) -> Self {
    DetectError::ShapeMismatch {
      expected: expected.into(),
      actual: actual.to_vec(),
      len,
    }
  }
}
