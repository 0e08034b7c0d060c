// 该文件是 Maoche （猫车） 项目的一部分。
// src/task.rs - 分类任务
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

use std::time::Duration;
use tracing::{info, warn};

use crate::{
  classify::Classifier, frame::RawImage, interpret::ClassificationResult, model::LoadModel,
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  type Output;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

pub struct OneShotTask;

impl<
  'a,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RawImage>,
  L: LoadModel,
  O: Render<RawImage, ClassificationResult, Error = RE>,
> Task<I, &'a Classifier<L>, O> for OneShotTask
{
  type Error = anyhow::Error;
  type Output = ClassificationResult;

  fn run_task(
    self,
    mut input: I,
    model: &'a Classifier<L>,
    output: O,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    info!("输入图像获取成功，开始分类...");
    let now = std::time::Instant::now();
    let result = model.classify(&frame)?;
    let elapsed = now.elapsed();
    info!("分类完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;

    Ok(result)
  }
}

/// 对同一张图像重复分类，统计平均耗时并校验结果一致。
#[derive(Debug)]
pub struct RepeatShotTask {
  repeat_times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat_times: 100 }
  }
}

impl RepeatShotTask {
  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times.max(1);
    self
  }
}

#[derive(Debug, Clone)]
pub struct RepeatShotReport {
  pub result: ClassificationResult,
  pub runs: usize,
  pub mean: Duration,
}

/// 前两次调用包含预热开销，次数足够时不计入平均值。
fn mean_latency(times: &[Duration]) -> Duration {
  let warm = if times.len() > 2 { &times[2..] } else { times };
  if warm.is_empty() {
    return Duration::ZERO;
  }
  warm.iter().sum::<Duration>() / warm.len() as u32
}

impl<
  'a,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RawImage>,
  L: LoadModel,
  O: Render<RawImage, ClassificationResult, Error = RE>,
> Task<I, &'a Classifier<L>, O> for RepeatShotTask
{
  type Error = anyhow::Error;
  type Output = RepeatShotReport;

  fn run_task(
    self,
    mut input: I,
    model: &'a Classifier<L>,
    output: O,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    info!("输入图像获取成功，开始分类...");

    let mut times = Vec::with_capacity(self.repeat_times);
    let mut first: Option<ClassificationResult> = None;
    for i in 0..self.repeat_times {
      let now = std::time::Instant::now();
      let result = model.classify(&frame)?;
      let elapsed = now.elapsed();
      info!("({})分类完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);

      if let Some(expected) = &first {
        if *expected != result {
          anyhow::bail!(
            "第 {} 次分类结果不一致: {:?} != {:?}",
            i,
            result,
            expected
          );
        }
      } else {
        output.render_result(&frame, &result)?;
        first = Some(result);
      }
    }

    let mean = mean_latency(&times);
    warn!("平均分类时间: {:.2?}", mean);

    let result = first.ok_or_else(|| anyhow::anyhow!("没有分类结果"))?;
    Ok(RepeatShotReport {
      result,
      runs: times.len(),
      mean,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mean_skips_warmup_runs() {
    let times = [
      Duration::from_millis(100),
      Duration::from_millis(50),
      Duration::from_millis(10),
      Duration::from_millis(20),
    ];
    assert_eq!(mean_latency(&times), Duration::from_millis(15));
  }

  #[test]
  fn mean_of_few_runs_uses_all() {
    let times = [Duration::from_millis(4), Duration::from_millis(6)];
    assert_eq!(mean_latency(&times), Duration::from_millis(5));
    assert_eq!(mean_latency(&[]), Duration::ZERO);
  }

  #[test]
  fn repeat_times_is_at_least_one() {
    assert_eq!(RepeatShotTask::default().with_repeat_times(0).repeat_times, 1);
  }
}
