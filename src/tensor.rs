// 该文件是 Maoche （猫车） 项目的一部分。
// src/tensor.rs - 张量与输入输出约定
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

use std::fmt;

use thiserror::Error;

use crate::frame::RGB_CHANNELS;

/// 约定被违反，属于打包错误，不做任何截断或填充。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractMismatch {
  #[error("标签数量 {labels} 与输出长度 {outputs} 不一致")]
  LabelCount { labels: usize, outputs: usize },
  #[error("张量长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  TensorLength { expected: usize, actual: usize },
  #[error("张量类型不匹配: 期望 {expected}, 实际 {actual}")]
  ElementType {
    expected: ElementType,
    actual: ElementType,
  },
  #[error("得分向量为空")]
  EmptyScores,
  #[error("输入尺寸过大: {size}x{size}")]
  InputTooLarge { size: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
  UInt8,
  Float32,
}

impl fmt::Display for ElementType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ElementType::UInt8 => write!(f, "uint8"),
      ElementType::Float32 => write!(f, "float32"),
    }
  }
}

/// 模型声明的输入约定：正方形空间尺寸、元素数量与元素类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputContract {
  pub size: u32,
  pub element_count: usize,
  pub element_type: ElementType,
}

impl InputContract {
  /// 单张 RGB 正方形输入，元素数量为 `size * size * 3`。
  pub fn square(size: u32, element_type: ElementType) -> Result<Self, ContractMismatch> {
    let element_count = (size as usize)
      .checked_mul(size as usize)
      .and_then(|n| n.checked_mul(RGB_CHANNELS))
      .ok_or(ContractMismatch::InputTooLarge { size })?;
    Ok(Self {
      size,
      element_count,
      element_type,
    })
  }
}

/// 模型声明的输出约定：类别数量与元素类型（始终为 32 位浮点得分）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputContract {
  pub length: usize,
  pub element_type: ElementType,
}

impl OutputContract {
  pub fn scores(length: usize) -> Self {
    Self {
      length,
      element_type: ElementType::Float32,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
  UInt8(Box<[u8]>),
  Float32(Box<[f32]>),
}

/// 按行优先、通道交错（NHWC）排列的模型输入。
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
  size: u32,
  data: TensorData,
}

impl NormalizedTensor {
  /// 构造时校验长度与类型，与约定不一致即返回错误。
  pub fn new(contract: &InputContract, data: TensorData) -> Result<Self, ContractMismatch> {
    let tensor = Self {
      size: contract.size,
      data,
    };

    if tensor.element_type() != contract.element_type {
      return Err(ContractMismatch::ElementType {
        expected: contract.element_type,
        actual: tensor.element_type(),
      });
    }

    if tensor.len() != contract.element_count {
      return Err(ContractMismatch::TensorLength {
        expected: contract.element_count,
        actual: tensor.len(),
      });
    }

    Ok(tensor)
  }

  pub fn size(&self) -> u32 {
    self.size
  }

  pub fn len(&self) -> usize {
    match &self.data {
      TensorData::UInt8(data) => data.len(),
      TensorData::Float32(data) => data.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn element_type(&self) -> ElementType {
    match &self.data {
      TensorData::UInt8(_) => ElementType::UInt8,
      TensorData::Float32(_) => ElementType::Float32,
    }
  }

  pub fn data(&self) -> &TensorData {
    &self.data
  }

  pub fn as_u8(&self) -> Option<&[u8]> {
    match &self.data {
      TensorData::UInt8(data) => Some(data),
      TensorData::Float32(_) => None,
    }
  }

  pub fn as_f32(&self) -> Option<&[f32]> {
    match &self.data {
      TensorData::Float32(data) => Some(data),
      TensorData::UInt8(_) => None,
    }
  }
}

/// 每个类别一个原始得分，不保证为概率分布。
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTensor {
  scores: Box<[f32]>,
}

impl ScoreTensor {
  pub fn as_slice(&self) -> &[f32] {
    &self.scores
  }

  pub fn len(&self) -> usize {
    self.scores.len()
  }

  pub fn is_empty(&self) -> bool {
    self.scores.is_empty()
  }

  /// 检查得分长度是否符合输出约定。
  pub fn check(self, contract: &OutputContract) -> Result<Self, ContractMismatch> {
    if self.len() != contract.length {
      return Err(ContractMismatch::TensorLength {
        expected: contract.length,
        actual: self.len(),
      });
    }
    Ok(self)
  }
}

impl From<Vec<f32>> for ScoreTensor {
  fn from(scores: Vec<f32>) -> Self {
    Self {
      scores: scores.into_boxed_slice(),
    }
  }
}

impl AsRef<[f32]> for ScoreTensor {
  fn as_ref(&self) -> &[f32] {
    &self.scores
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn square_contract_counts_rgb_elements() {
    let contract = InputContract::square(260, ElementType::Float32).unwrap();
    assert_eq!(contract.element_count, 260 * 260 * 3);
  }

  #[test]
  fn square_contract_rejects_overflowing_size() {
    assert_eq!(
      InputContract::square(u32::MAX, ElementType::Float32),
      Err(ContractMismatch::InputTooLarge { size: u32::MAX })
    );
  }

  #[test]
  fn tensor_rejects_short_buffer() {
    let contract = InputContract::square(2, ElementType::UInt8).unwrap();
    let err = NormalizedTensor::new(&contract, TensorData::UInt8(vec![0; 11].into())).unwrap_err();
    assert_eq!(
      err,
      ContractMismatch::TensorLength {
        expected: 12,
        actual: 11
      }
    );
  }

  #[test]
  fn tensor_rejects_wrong_element_type() {
    let contract = InputContract::square(1, ElementType::UInt8).unwrap();
    let err =
      NormalizedTensor::new(&contract, TensorData::Float32(vec![0.0; 3].into())).unwrap_err();
    assert_eq!(
      err,
      ContractMismatch::ElementType {
        expected: ElementType::UInt8,
        actual: ElementType::Float32
      }
    );
  }

  #[test]
  fn scores_checked_against_output_contract() {
    let scores = ScoreTensor::from(vec![0.1, 0.2]);
    assert!(scores.clone().check(&OutputContract::scores(2)).is_ok());
    assert_eq!(
      scores.check(&OutputContract::scores(3)).unwrap_err(),
      ContractMismatch::TensorLength {
        expected: 3,
        actual: 2
      }
    );
  }
}
