// 该文件是 Beifeng （北风） 项目的一部分。
// src/cancel.rs - 取消令牌
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

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use crate::error::DetectError;

/// 尽力而为的取消标记，克隆后共享同一个状态
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
  cancelled: Arc<AtomicBool>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::SeqCst)
  }

  /// 已取消时返回 `DetectError::Cancelled`
  pub fn check(&self) -> Result<(), DetectError> {
    if self.is_cancelled() {
      Err(DetectError::Cancelled)
    } else {
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_clones_share_state() {
    let token = CancelToken::new();
    let other = token.clone();
    assert!(token.check().is_ok());
    other.cancel();
    assert!(token.is_cancelled());
    assert!(matches!(token.check(), Err(DetectError::Cancelled)));
  }
}
