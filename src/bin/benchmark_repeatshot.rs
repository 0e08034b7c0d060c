// 该文件是 Maoche （猫车） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复分类基准测试
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
  task::{RepeatShotTask, Task},
};

/// Maoche 重复分类基准测试
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型路径
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 标签文件
  #[arg(long, value_name = "LABELS")]
  pub labels: Url,
  /// 输入图像
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出方式
  #[arg(long, value_name = "OUTPUT", default_value = "console://")]
  pub output: Url,
  /// 重复次数
  #[arg(long, default_value = "100", value_name = "COUNT")]
  pub repeat: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("重复次数: {}", args.repeat);

  let input = ImageFileInput::from_url(&args.input)?;
  let labels = LabelList::from_url(&args.labels)?;
  let model = ModelWrapper::from_url(&args.model)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let classifier = Classifier::new(model, labels);
  let report = RepeatShotTask::default()
    .with_repeat_times(args.repeat)
    .run_task(input, &classifier, output)?;

  info!(
    "共 {} 次, 平均耗时 {:.2?}, 分类结果: {}",
    report.runs, report.mean, report.result.category
  );

  Ok(())
}
