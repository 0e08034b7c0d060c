// 该文件是 Maoche （猫车） 项目的一部分。
// src/model.rs - 模型执行器
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

use crate::{
  FromUrl,
  tensor::{InputContract, NormalizedTensor, OutputContract, ScoreTensor},
};

/// 未能从模型中读出输入尺寸时使用的默认边长。
pub const DEFAULT_INPUT_SIZE: u32 = 260;
/// 未能从模型中读出类别数量时使用的默认值。
pub const DEFAULT_CLASS_NUM: usize = 1000;

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("推理错误: {0}")]
  InferenceError(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl ModelError {
  pub fn invalid(msg: impl Into<String>) -> Self {
    ModelError::ModelInvalid(msg.into())
  }

  /// 推理阶段之前的错误（加载、校验）都归为加载失败。
  pub fn is_load_error(&self) -> bool {
    !matches!(self, ModelError::InferenceError(_))
  }
}

/// 已加载的模型句柄。输入输出约定在加载时确定，之后不变。
///
/// 句柄在 `Drop` 时释放。
pub trait ModelExecutor {
  fn input_contract(&self) -> InputContract;
  fn output_contract(&self) -> OutputContract;
  fn run(&self, input: &NormalizedTensor) -> Result<ScoreTensor, ModelError>;
}

/// 模型构建器：每次调用 `load` 都得到一个全新的执行器。
pub trait LoadModel {
  type Executor: ModelExecutor;

  fn load(&self) -> Result<Self::Executor, ModelError>;
}

#[cfg(feature = "tract")]
mod tract_onnx;
#[cfg(feature = "tract")]
pub use self::tract_onnx::{TractOnnx, TractOnnxBuilder};

#[cfg(feature = "rknpu")]
mod rknn;
#[cfg(feature = "rknpu")]
pub use self::rknn::{Rknn, RknnBuilder};

/// 按 URL 方案选择推理后端。
pub enum ModelWrapper {
  #[cfg(feature = "tract")]
  TractOnnx(TractOnnxBuilder),
  #[cfg(feature = "rknpu")]
  Rknn(RknnBuilder),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "tract")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == TractOnnxBuilder::SCHEME {
        return Ok(ModelWrapper::TractOnnx(TractOnnxBuilder::from_url(url)?));
      }
    }
    #[cfg(feature = "rknpu")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == RknnBuilder::SCHEME {
        return Ok(ModelWrapper::Rknn(RknnBuilder::from_url(url)?));
      }
    }
    Err(ModelError::SchemeMismatch(url.scheme().to_string()))
  }
}

pub enum ModelWrapperExecutor {
  #[cfg(feature = "tract")]
  TractOnnx(TractOnnx),
  #[cfg(feature = "rknpu")]
  Rknn(Rknn),
}

impl LoadModel for ModelWrapper {
  type Executor = ModelWrapperExecutor;

  fn load(&self) -> Result<Self::Executor, ModelError> {
    match self {
      #[cfg(feature = "tract")]
      ModelWrapper::TractOnnx(builder) => builder.load().map(ModelWrapperExecutor::TractOnnx),
      #[cfg(feature = "rknpu")]
      ModelWrapper::Rknn(builder) => builder.load().map(ModelWrapperExecutor::Rknn),
    }
  }
}

impl ModelExecutor for ModelWrapperExecutor {
  fn input_contract(&self) -> InputContract {
    match self {
      #[cfg(feature = "tract")]
      ModelWrapperExecutor::TractOnnx(model) => model.input_contract(),
      #[cfg(feature = "rknpu")]
      ModelWrapperExecutor::Rknn(model) => model.input_contract(),
    }
  }

  fn output_contract(&self) -> OutputContract {
    match self {
      #[cfg(feature = "tract")]
      ModelWrapperExecutor::TractOnnx(model) => model.output_contract(),
      #[cfg(feature = "rknpu")]
      ModelWrapperExecutor::Rknn(model) => model.output_contract(),
    }
  }

  fn run(&self, input: &NormalizedTensor) -> Result<ScoreTensor, ModelError> {
    match self {
      #[cfg(feature = "tract")]
      ModelWrapperExecutor::TractOnnx(model) => model.run(input),
      #[cfg(feature = "rknpu")]
      ModelWrapperExecutor::Rknn(model) => model.run(input),
    }
  }
}

/// 读取 URL 查询参数，例如 `?size=260`。
pub(crate) fn query_param<T: std::str::FromStr>(
  url: &Url,
  key: &str,
) -> Result<Option<T>, ModelError> {
  match url.query_pairs().find(|(k, _)| k == key) {
    Some((_, value)) => value
      .parse()
      .map(Some)
      .map_err(|_| ModelError::ModelPathError(format!("参数 {} 无效: {}", key, value))),
    None => Ok(None),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn query_param_parses_numbers() {
    let url = Url::parse("rknn:///models/cat.rknn?size=224&classes=1001").unwrap();
    assert_eq!(query_param::<u32>(&url, "size").unwrap(), Some(224));
    assert_eq!(query_param::<usize>(&url, "classes").unwrap(), Some(1001));
    assert_eq!(query_param::<u32>(&url, "missing").unwrap(), None);
  }

  #[test]
  fn query_param_rejects_garbage() {
    let url = Url::parse("rknn:///models/cat.rknn?size=big").unwrap();
    assert!(matches!(
      query_param::<u32>(&url, "size"),
      Err(ModelError::ModelPathError(_))
    ));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("tflite:///models/2.tflite").unwrap();
    assert!(matches!(
      ModelWrapper::from_url(&url),
      Err(ModelError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn inference_errors_are_not_load_errors() {
    assert!(!ModelError::InferenceError("boom".into()).is_load_error());
    assert!(ModelError::invalid("bad output").is_load_error());
  }
}
