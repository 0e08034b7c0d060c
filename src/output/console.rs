// 该文件是 Maoche （猫车） 项目的一部分。
// src/output/console.rs - 终端文本输出
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

use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RawImage,
  interpret::ClassificationResult,
  output::{OutputError, Render},
};

/// 以文字形式打印判定结果与置信度。
pub struct ConsoleOutput;

impl FromUrlWithScheme for ConsoleOutput {
  const SCHEME: &'static str = "console";
}

impl FromUrl for ConsoleOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch);
    }
    Ok(ConsoleOutput)
  }
}

impl ConsoleOutput {
  pub fn write_result(
    &self,
    writer: &mut impl Write,
    result: &ClassificationResult,
  ) -> Result<(), OutputError> {
    writeln!(writer, "{}", result.category.verdict())?;
    writeln!(writer, "{}", result.top_label)?;
    writeln!(writer, "(Confidence: {})", result.confidence)?;
    Ok(())
  }
}

impl Render<RawImage, ClassificationResult> for ConsoleOutput {
  type Error = OutputError;

  fn render_result(
    &self,
    _frame: &RawImage,
    result: &ClassificationResult,
  ) -> Result<(), Self::Error> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    self.write_result(&mut lock, result)?;
    lock.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::category::Category;

  #[test]
  fn writes_verdict_label_and_confidence() {
    let result = ClassificationResult {
      index: 817,
      top_label: "sports car".to_string(),
      confidence: 9.5,
      category: Category::Car,
    };

    let mut buffer = Vec::new();
    ConsoleOutput.write_result(&mut buffer, &result).unwrap();
    assert_eq!(
      String::from_utf8(buffer).unwrap(),
      "It is a car!\nsports car\n(Confidence: 9.5)\n"
    );
  }
}
