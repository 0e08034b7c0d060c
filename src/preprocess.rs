// 该文件是 Maoche （猫车） 项目的一部分。
// src/preprocess.rs - 图像预处理
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

use image::imageops::{self, FilterType};
use tracing::debug;

use crate::{
  frame::RawImage,
  tensor::{ContractMismatch, ElementType, InputContract, NormalizedTensor, TensorData},
};

/// 逐元素归一化 `(v - mean) / std`，不改变长度与顺序。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
  pub mean: f32,
  pub std: f32,
}

/// 浮点模型使用的缩放：mean = 0, std = 255，输出范围为 `[0.0, 1.0]`。
pub const PIXEL_SCALE: Normalize = Normalize {
  mean: 0.0,
  std: 255.0,
};

impl Normalize {
  pub fn apply(&self, pixels: &[u8]) -> Box<[f32]> {
    pixels
      .iter()
      .map(|&v| (v as f32 - self.mean) / self.std)
      .collect()
  }
}

/// 双线性缩放到约定的正方形尺寸（不保持宽高比），再按约定的元素类型输出。
///
/// 缩放使用 `FilterType::Triangle`：缩小时核宽随比例放大（带抗锯齿），
/// 与只取相邻两点的双线性插值结果不同。
///
/// 输出长度与约定不一致时返回 [`ContractMismatch`]，不会截断或填充。
pub fn preprocess(
  image: &RawImage,
  contract: &InputContract,
) -> Result<NormalizedTensor, ContractMismatch> {
  let size = contract.size;
  debug!(
    "预处理: {}x{} -> {}x{} ({})",
    image.width(),
    image.height(),
    size,
    size,
    contract.element_type
  );

  let resized = imageops::resize(image.as_rgb8(), size, size, FilterType::Triangle);
  let pixels = resized.into_raw();

  let data = match contract.element_type {
    ElementType::UInt8 => TensorData::UInt8(pixels.into_boxed_slice()),
    ElementType::Float32 => TensorData::Float32(PIXEL_SCALE.apply(&pixels)),
  };

  NormalizedTensor::new(contract, data)
}
