// 该文件是 Maoche （猫车） 项目的一部分。
// src/output/json.rs - JSON 行输出
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

use std::io::Write;

use serde_json::{Value, json};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RawImage,
  interpret::ClassificationResult,
  output::{OutputError, Render},
};

/// 每个结果输出一行 JSON 到标准输出。
pub struct JsonOutput;

impl FromUrlWithScheme for JsonOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch);
    }
    Ok(JsonOutput)
  }
}

pub(crate) fn to_json(frame: &RawImage, result: &ClassificationResult) -> Value {
  json!({
    "category": result.category.as_str(),
    "label": result.top_label,
    "index": result.index,
    "confidence": result.confidence,
    "image": {
      "width": frame.width(),
      "height": frame.height(),
    },
  })
}

impl Render<RawImage, ClassificationResult> for JsonOutput {
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &RawImage,
    result: &ClassificationResult,
  ) -> Result<(), Self::Error> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    serde_json::to_writer(&mut lock, &to_json(frame, result))?;
    writeln!(lock)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::category::Category;
  use image::{Rgb, RgbImage};

  #[test]
  fn json_carries_all_fields() {
    let frame: RawImage = RgbImage::from_pixel(640, 480, Rgb([0, 0, 0])).into();
    let result = ClassificationResult {
      index: 281,
      top_label: "tabby".to_string(),
      confidence: 0.75,
      category: Category::Cat,
    };

    let value = to_json(&frame, &result);
    assert_eq!(value["category"], "cat");
    assert_eq!(value["label"], "tabby");
    assert_eq!(value["index"], 281);
    assert_eq!(value["confidence"], 0.75);
    assert_eq!(value["image"]["width"], 640);
    assert_eq!(value["image"]["height"], 480);
  }
}
