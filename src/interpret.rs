// 该文件是 Maoche （猫车） 项目的一部分。
// src/interpret.rs - 推理结果解析
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

use tracing::{debug, error};

use crate::{
  category::{Category, CategoryTable},
  labels::LabelList,
  tensor::{ContractMismatch, ScoreTensor},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
  pub index: usize,
  pub top_label: String,
  /// 模型给出的原始得分，未经 softmax。
  pub confidence: f32,
  pub category: Category,
}

/// 从左到右扫描取最大值，相等时保留最先出现的索引。
pub fn top1(scores: &[f32]) -> Option<(usize, f32)> {
  let (&first, rest) = scores.split_first()?;
  let mut max_idx = 0;
  let mut max_score = first;

  for (offset, &score) in rest.iter().enumerate() {
    if score > max_score {
      max_idx = offset + 1;
      max_score = score;
    }
  }

  Some((max_idx, max_score))
}

/// 取 top-1 标签与得分，并按类别表映射为 Car / Cat / Other。
pub fn interpret(
  scores: &ScoreTensor,
  labels: &LabelList,
  table: &CategoryTable,
) -> Result<ClassificationResult, ContractMismatch> {
  if scores.len() != labels.len() {
    error!(
      "标签数量 {} 与得分长度 {} 不一致",
      labels.len(),
      scores.len()
    );
    return Err(ContractMismatch::LabelCount {
      labels: labels.len(),
      outputs: scores.len(),
    });
  }

  debug!("全部得分: {:?}", scores.as_slice());

  let (index, confidence) = top1(scores.as_slice()).ok_or(ContractMismatch::EmptyScores)?;
  let top_label = labels
    .get(index)
    .ok_or(ContractMismatch::LabelCount {
      labels: labels.len(),
      outputs: scores.len(),
    })?
    .to_string();
  let category = table.categorize(index);

  debug!(
    "Top label: {} (index={}, score={}, category={})",
    top_label, index, confidence, category
  );

  Ok(ClassificationResult {
    index,
    top_label,
    confidence,
    category,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::category::IMAGENET_CAT_OR_CAR;

  fn imagenet_like(hot: usize) -> (ScoreTensor, LabelList) {
    let mut scores = vec![0.0f32; 1000];
    scores[hot] = 3.5;
    let labels = (0..1000).map(|i| format!("class-{i}")).collect();
    (scores.into(), labels)
  }

  #[test]
  fn tie_break_keeps_first_index() {
    assert_eq!(top1(&[0.5, 0.5, 0.3]), Some((0, 0.5)));
    assert_eq!(top1(&[0.1, 0.7, 0.7, 0.7]), Some((1, 0.7)));
  }

  #[test]
  fn top1_of_empty_is_none() {
    assert_eq!(top1(&[]), None);
  }

  #[test]
  fn negative_scores_are_valid() {
    assert_eq!(top1(&[-3.0, -1.5, -2.0]), Some((1, -1.5)));
  }

  #[test]
  fn confidence_is_the_raw_max() {
    let scores = ScoreTensor::from(vec![1.0, 7.25, -2.0, 3.0]);
    let labels: LabelList = ["a", "b", "c", "d"].into_iter().collect();
    let result = interpret(&scores, &labels, &IMAGENET_CAT_OR_CAR).unwrap();

    let max = scores.as_slice().iter().cloned().fold(f32::MIN, f32::max);
    assert_eq!(result.confidence, max);
    assert_eq!(result.top_label, "b");
    assert_eq!(result.index, 1);
    assert_eq!(result.category, Category::Other);
  }

  #[test]
  fn categories_follow_the_table() {
    for (hot, category) in [
      (436, Category::Car),
      (285, Category::Cat),
      (383, Category::Cat),
      (0, Category::Other),
      (294, Category::Other),
    ] {
      let (scores, labels) = imagenet_like(hot);
      let result = interpret(&scores, &labels, &IMAGENET_CAT_OR_CAR).unwrap();
      assert_eq!(result.index, hot);
      assert_eq!(result.category, category);
      assert_eq!(result.top_label, format!("class-{hot}"));
    }
  }

  #[test]
  fn label_count_mismatch_is_rejected() {
    let scores = ScoreTensor::from(vec![0.1, 0.9, 0.3]);
    let labels: LabelList = ["a", "b"].into_iter().collect();
    assert_eq!(
      interpret(&scores, &labels, &IMAGENET_CAT_OR_CAR).unwrap_err(),
      ContractMismatch::LabelCount {
        labels: 2,
        outputs: 3
      }
    );
  }

  #[test]
  fn empty_scores_are_rejected() {
    let scores = ScoreTensor::from(Vec::new());
    let labels = LabelList::parse("");
    assert_eq!(
      interpret(&scores, &labels, &IMAGENET_CAT_OR_CAR).unwrap_err(),
      ContractMismatch::EmptyScores
    );
  }
}
