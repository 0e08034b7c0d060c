// 该文件是 Maoche （猫车） 项目的一部分。
// src/classify.rs - 分类入口
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
use tracing::{debug, error, info};

use crate::{
  category::{CategoryTable, IMAGENET_CAT_OR_CAR},
  frame::{ImageDecodeError, RawImage},
  interpret::{ClassificationResult, interpret},
  labels::{LabelError, LabelList},
  model::{LoadModel, ModelError, ModelExecutor},
  preprocess::preprocess,
  tensor::{ContractMismatch, ElementType},
};

#[derive(Error, Debug)]
pub enum ClassifyError {
  #[error("模型加载错误: {0}")]
  ModelLoad(ModelError),
  #[error("约定不匹配: {0}")]
  ContractMismatch(#[from] ContractMismatch),
  #[error("图像无效: {0}")]
  ImageDecode(#[from] ImageDecodeError),
  #[error("推理错误: {0}")]
  Inference(ModelError),
  #[error("标签错误: {0}")]
  Labels(#[from] LabelError),
}

impl From<ModelError> for ClassifyError {
  fn from(err: ModelError) -> Self {
    if err.is_load_error() {
      ClassifyError::ModelLoad(err)
    } else {
      ClassifyError::Inference(err)
    }
  }
}

/// 使用已加载的执行器完成一次分类，不负责执行器的生命周期。
pub fn classify_with<E: ModelExecutor + ?Sized>(
  image: &RawImage,
  executor: &E,
  labels: &LabelList,
  table: &CategoryTable,
) -> Result<ClassificationResult, ClassifyError> {
  image.ensure_not_empty()?;

  let input = executor.input_contract();
  let output = executor.output_contract();

  if output.element_type != ElementType::Float32 {
    error!("模型输出类型必须为 float32, 实际为 {}", output.element_type);
    return Err(
      ContractMismatch::ElementType {
        expected: ElementType::Float32,
        actual: output.element_type,
      }
      .into(),
    );
  }

  if labels.len() != output.length {
    error!(
      "标签数量 {} 与模型输出长度 {} 不一致",
      labels.len(),
      output.length
    );
    return Err(
      ContractMismatch::LabelCount {
        labels: labels.len(),
        outputs: output.length,
      }
      .into(),
    );
  }

  let tensor = preprocess(image, &input)?;

  let now = std::time::Instant::now();
  let scores = executor.run(&tensor)?.check(&output)?;
  debug!("推理完成，耗时: {:.2?}", now.elapsed());

  Ok(interpret(&scores, labels, table)?)
}

/// 唯一入口：加载模型、推理、解析，模型句柄在返回前释放（含错误路径）。
pub fn classify<L: LoadModel>(
  image: &RawImage,
  loader: &L,
  labels: &LabelList,
) -> Result<ClassificationResult, ClassifyError> {
  load_and_classify(image, loader, labels, &IMAGENET_CAT_OR_CAR)
}

fn load_and_classify<L: LoadModel>(
  image: &RawImage,
  loader: &L,
  labels: &LabelList,
  table: &CategoryTable,
) -> Result<ClassificationResult, ClassifyError> {
  image.ensure_not_empty()?;

  let executor = loader.load().map_err(ClassifyError::ModelLoad)?;
  let result = classify_with(image, &executor, labels, table);
  drop(executor);

  match &result {
    Ok(result) => info!(
      "预测: {} (得分={}) -> {}",
      result.top_label, result.confidence, result.category
    ),
    Err(e) => error!("分类失败: {}", e),
  }

  result
}

/// 模型来源与标签的组合，每次调用都按需加载模型。
pub struct Classifier<L> {
  loader: L,
  labels: LabelList,
  table: CategoryTable,
}

impl<L: LoadModel> Classifier<L> {
  pub fn new(loader: L, labels: LabelList) -> Self {
    Self {
      loader,
      labels,
      table: IMAGENET_CAT_OR_CAR,
    }
  }

  pub fn with_table(mut self, table: CategoryTable) -> Self {
    self.table = table;
    self
  }

  pub fn labels(&self) -> &LabelList {
    &self.labels
  }

  pub fn classify(&self, image: &RawImage) -> Result<ClassificationResult, ClassifyError> {
    load_and_classify(image, &self.loader, &self.labels, &self.table)
  }
}
