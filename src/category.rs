// 该文件是 Maoche （猫车） 项目的一部分。
// src/category.rs - 类别索引表
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

use std::{fmt, ops::Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
  Car,
  Cat,
  Other,
}

impl Category {
  pub fn as_str(&self) -> &'static str {
    match self {
      Category::Car => "car",
      Category::Cat => "cat",
      Category::Other => "neither",
    }
  }

  /// 面向用户的判定语句。
  pub fn verdict(&self) -> &'static str {
    match self {
      Category::Car => "It is a car!",
      Category::Cat => "It is a cat!",
      Category::Other => "It is neither a cat nor a car.",
    }
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 离散索引与半开区间的并集。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSet {
  pub indices: &'static [usize],
  pub ranges: &'static [Range<usize>],
}

impl IndexSet {
  pub fn contains(&self, index: usize) -> bool {
    self.indices.contains(&index) || self.ranges.iter().any(|r| r.contains(&index))
  }

  /// 按升序列出全部索引。
  pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
    let mut all: Vec<usize> = self
      .indices
      .iter()
      .copied()
      .chain(self.ranges.iter().cloned().flatten())
      .collect();
    all.sort_unstable();
    all.dedup();
    all.into_iter()
  }
}

/// 将类别索引空间划分为 Car / Cat / Other。Other 为补集，不显式存储。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryTable {
  pub car: IndexSet,
  pub cat: IndexSet,
}

impl CategoryTable {
  /// 按 Car、Cat 的优先级判定，对任意索引都有唯一结果。
  pub fn categorize(&self, index: usize) -> Category {
    if self.car.contains(index) {
      Category::Car
    } else if self.cat.contains(index) {
      Category::Cat
    } else {
      Category::Other
    }
  }
}

/// ImageNet 1000 类上的猫 / 车划分。
pub const IMAGENET_CAT_OR_CAR: CategoryTable = CategoryTable {
  car: IndexSet {
    // cab, convertible, ..., sports car
    indices: &[436, 468, 511, 609, 619, 656, 661, 705, 717, 751, 757, 817],
    ranges: &[],
  },
  cat: IndexSet {
    // 281..=293 家猫与大型猫科，外加 383 (Madagascar cat)
    indices: &[383],
    ranges: &[281..294],
  },
};
