// 该文件是 Maoche （猫车） 项目的一部分。
// src/bin/classify_oneshot.rs - 单张图像分类
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use maoche::{
  Classifier, FromUrl, LabelList,
  input::ImageFileInput,
  model::ModelWrapper,
  output::OutputWrapper,
  task::{OneShotTask, Task},
};

/// Maoche 单张图像分类
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型路径，例如 tract:///models/cat_or_car.onnx 或 rknn:///models/2.rknn?size=260
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 标签文件，例如 file:///models/labels.txt
  #[arg(long, value_name = "LABELS")]
  pub labels: Url,
  /// 输入图像，例如 image:///photos/cat.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出方式：console:// 或 json://
  #[arg(long, value_name = "OUTPUT", default_value = "console://")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("标签文件路径: {}", args.labels);
  info!("输入来源: {}", args.input);
  info!("输出方式: {}", args.output);

  let input = ImageFileInput::from_url(&args.input)?;
  let labels = LabelList::from_url(&args.labels)?;
  let model = ModelWrapper::from_url(&args.model)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let classifier = Classifier::new(model, labels);
  let result = OneShotTask.run_task(input, &classifier, output)?;
  info!("分类结果: {} ({})", result.category, result.top_label);

  Ok(())
}
