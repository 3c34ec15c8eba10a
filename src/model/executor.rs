// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/executor.rs - 模型执行器
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
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbNhwcFrame, model::RawDetectionTensor};

/// 执行模型前向计算，输入为信箱填充后的帧，输出为原始检测张量。
///
/// 调用是阻塞的；超时、重试等由实现自己决定，失败原样返回。
pub trait ModelExecutor {
  type Error: std::error::Error + Send + Sync + 'static;

  fn execute(&self, input: &RgbNhwcFrame) -> Result<RawDetectionTensor, Self::Error>;
}

impl<F, E> ModelExecutor for F
where
  F: Fn(&RgbNhwcFrame) -> Result<RawDetectionTensor, E>,
  E: std::error::Error + Send + Sync + 'static,
{
  type Error = E;

  fn execute(&self, input: &RgbNhwcFrame) -> Result<RawDetectionTensor, Self::Error> {
    self(input)
  }
}

#[derive(Error, Debug)]
pub enum TensorFileError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("张量文件格式错误: {0}")]
  FormatError(String),
  #[error("原始 f32 文件需要 shape 参数")]
  MissingShape,
}

#[derive(Debug, Clone, PartialEq)]
enum TensorFileFormat {
  /// `{"shape": [...], "data": [...]}`
  Json,
  /// 小端 `f32` 序列
  Raw { shape: Vec<usize> },
}

/// 从文件回放预先计算好的模型输出，忽略输入帧内容
#[derive(Debug, Clone)]
pub struct TensorFileExecutor {
  path: PathBuf,
  format: TensorFileFormat,
}

impl FromUrlWithScheme for TensorFileExecutor {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorFileExecutor {
  type Error = TensorFileError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorFileError::SchemeMismatch);
    }

    let path = crate::url_path(url);
    let is_json = path
      .extension()
      .map(|ext| ext.eq_ignore_ascii_case("json"))
      .unwrap_or(false);

    let format = if is_json {
      TensorFileFormat::Json
    } else {
      let shape = crate::url_query(url, "shape").ok_or(TensorFileError::MissingShape)?;
      TensorFileFormat::Raw {
        shape: parse_shape(&shape)?,
      }
    };

    info!("张量文件: {} ({:?})", path.display(), format);
    Ok(Self { path, format })
  }
}

impl TensorFileExecutor {
  pub fn json(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      format: TensorFileFormat::Json,
    }
  }

  pub fn raw(path: impl Into<PathBuf>, shape: Vec<usize>) -> Self {
    Self {
      path: path.into(),
      format: TensorFileFormat::Raw { shape },
    }
  }

  fn load(&self) -> Result<RawDetectionTensor, TensorFileError> {
    let (data, shape) = match &self.format {
      TensorFileFormat::Json => read_json_tensor(&std::fs::read_to_string(&self.path)?)?,
      TensorFileFormat::Raw { shape } => {
        let bytes = std::fs::read(&self.path)?;
        if bytes.len() % 4 != 0 {
          return Err(TensorFileError::FormatError(format!(
            "文件长度 {} 不是 4 的倍数",
            bytes.len()
          )));
        }
        let data = bytes
          .chunks_exact(4)
          .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
          .collect::<Vec<_>>();
        (data, shape.clone())
      }
    };

    let expected: usize = shape.iter().product();
    if expected != data.len() {
      return Err(TensorFileError::FormatError(format!(
        "形状 {:?} 需要 {} 个元素, 实际 {} 个",
        shape,
        expected,
        data.len()
      )));
    }

    debug!("读取张量: 形状 {:?}", shape);
    Ok(RawDetectionTensor::new(data, shape))
  }
}

impl ModelExecutor for TensorFileExecutor {
  type Error = TensorFileError;

  fn execute(&self, _input: &RgbNhwcFrame) -> Result<RawDetectionTensor, Self::Error> {
    self.load()
  }
}

fn parse_shape(text: &str) -> Result<Vec<usize>, TensorFileError> {
  text
    .split(',')
    .map(|dim| {
      dim
        .trim()
        .parse::<usize>()
        .map_err(|_| TensorFileError::FormatError(format!("形状维度无效: '{}'", dim)))
    })
    .collect()
}

fn read_json_tensor(text: &str) -> Result<(Vec<f32>, Vec<usize>), TensorFileError> {
  let value: serde_json::Value = serde_json::from_str(text)?;

  let shape = value
    .get("shape")
    .and_then(|v| v.as_array())
    .ok_or_else(|| TensorFileError::FormatError("缺少 shape 数组".to_string()))?
    .iter()
    .map(|dim| {
      dim
        .as_u64()
        .map(|d| d as usize)
        .ok_or_else(|| TensorFileError::FormatError(format!("形状维度无效: {}", dim)))
    })
    .collect::<Result<Vec<_>, _>>()?;

  let data = value
    .get("data")
    .and_then(|v| v.as_array())
    .ok_or_else(|| TensorFileError::FormatError("缺少 data 数组".to_string()))?
    .iter()
    .map(|v| {
      v.as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| TensorFileError::FormatError(format!("数据不是数字: {}", v)))
    })
    .collect::<Result<Vec<_>, _>>()?;

  Ok((data, shape))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("beifeng-{}-{}", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    path
  }

  #[test]
  fn test_closure_executor() {
    let executor = |frame: &RgbNhwcFrame| -> Result<RawDetectionTensor, std::io::Error> {
      Ok(RawDetectionTensor::new(vec![frame.width() as f32], vec![1]))
    };
    let tensor = executor.execute(&RgbNhwcFrame::with_shape(2, 3)).unwrap();
    assert_eq!(tensor.data(), &[3.0]);
  }

  #[test]
  fn test_json_tensor_file() {
    let path = temp_file(
      "tensor.json",
      br#"{"shape": [1, 2, 3], "data": [1, 2, 3, 4, 5, 6.5]}"#,
    );
    let tensor = TensorFileExecutor::json(&path)
      .execute(&RgbNhwcFrame::with_shape(1, 1))
      .unwrap();
    assert_eq!(tensor.shape(), &[1, 2, 3]);
    assert_eq!(tensor.data()[5], 6.5);
    std::fs::remove_file(path).unwrap();
  }

  #[test]
  fn test_raw_tensor_file_from_url() {
    let bytes: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0]
      .iter()
      .flat_map(|v| v.to_le_bytes())
      .collect();
    let path = temp_file("tensor.bin", &bytes);
    let url = Url::parse(&format!("tensor://{}?shape=2,2", path.display())).unwrap();
    let executor = TensorFileExecutor::from_url(&url).unwrap();
    let tensor = executor.execute(&RgbNhwcFrame::with_shape(1, 1)).unwrap();
    assert_eq!(tensor.shape(), &[2, 2]);
    assert_eq!(tensor.data(), &[1.0, 2.0, 3.0, 4.0]);
    std::fs::remove_file(path).unwrap();
  }

  #[test]
  fn test_tensor_file_errors() {
    let url = Url::parse("file:///tmp/out.json").unwrap();
    assert!(matches!(
      TensorFileExecutor::from_url(&url),
      Err(TensorFileError::SchemeMismatch)
    ));

    let url = Url::parse("tensor:///tmp/out.bin").unwrap();
    assert!(matches!(
      TensorFileExecutor::from_url(&url),
      Err(TensorFileError::MissingShape)
    ));

    let path = temp_file("short.json", br#"{"shape": [2, 2], "data": [1]}"#);
    assert!(matches!(
      TensorFileExecutor::json(&path).execute(&RgbNhwcFrame::with_shape(1, 1)),
      Err(TensorFileError::FormatError(_))
    ));
    std::fs::remove_file(path).unwrap();

    let missing = TensorFileExecutor::json("/nonexistent/beifeng.json");
    assert!(matches!(
      missing.execute(&RgbNhwcFrame::with_shape(1, 1)),
      Err(TensorFileError::IoError(_))
    ));
  }
}
