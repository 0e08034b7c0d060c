// 该文件是 Maoche （猫车） 项目的一部分。
// src/model/rknn.rs - RKNPU 推理后端
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

use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{
    DEFAULT_CLASS_NUM, DEFAULT_INPUT_SIZE, LoadModel, ModelError, ModelExecutor, query_param,
  },
  tensor::{ElementType, InputContract, NormalizedTensor, OutputContract, ScoreTensor},
};

const RKNN_NUM_INPUTS: u32 = 1;

/// RKNN 模型的输入为 uint8 NHWC，归一化已编译进模型。
pub struct Rknn {
  model_path: String,
  context: Context,
  input: InputContract,
  output: OutputContract,
}

pub struct RknnBuilder {
  model_path: String,
  size: u32,
  classes: usize,
  flags: InitFlags,
}

impl FromUrlWithScheme for RknnBuilder {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for RknnBuilder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(RknnBuilder {
      model_path: url.path().to_string(),
      size: query_param(url, "size")?.unwrap_or(DEFAULT_INPUT_SIZE),
      classes: query_param(url, "classes")?.unwrap_or(DEFAULT_CLASS_NUM),
      flags: InitFlags::default(),
    })
  }
}

fn rknn_err(msg: &str) -> impl Fn(rknpu::Error) -> ModelError + '_ {
  move |e| ModelError::invalid(format!("{}: {}", msg, e))
}

impl RknnBuilder {
  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  fn build(&self) -> Result<Rknn, ModelError> {
    info!("加载模型文件: {}", self.model_path);
    let mode_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      mode_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&mode_data, self.flags).map_err(rknn_err("无法创建推理上下文"))?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!(" 查询 SDK 版本失败: {}", e);
        return Err(ModelError::invalid(format!("无法查询 SDK 版本: {}", e)));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(rknn_err("无法获取输入数量"))?;
    let num_outputs = context
      .num_outputs()
      .map_err(rknn_err("无法获取输出数量"))?;

    if num_inputs != RKNN_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        RKNN_NUM_INPUTS, num_inputs
      );
      return Err(ModelError::invalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        RKNN_NUM_INPUTS, num_inputs
      )));
    }

    if num_outputs < 1 {
      error!("模型没有输出");
      return Err(ModelError::invalid("模型没有输出"));
    }

    debug!("模型输入数量: {}", num_inputs);
    debug!("模型输出数量: {}", num_outputs);
    let input = InputContract::square(self.size, ElementType::UInt8)
      .map_err(|e| ModelError::invalid(e.to_string()))?;
    info!("模型加载完成");

    Ok(Rknn {
      model_path: self.model_path.clone(),
      context,
      input,
      output: OutputContract::scores(self.classes),
    })
  }
}

impl LoadModel for RknnBuilder {
  type Executor = Rknn;

  fn load(&self) -> Result<Self::Executor, ModelError> {
    self.build()
  }
}

impl ModelExecutor for Rknn {
  fn input_contract(&self) -> InputContract {
    self.input
  }

  fn output_contract(&self) -> OutputContract {
    self.output
  }

  fn run(&self, input: &NormalizedTensor) -> Result<ScoreTensor, ModelError> {
    let data = input.as_u8().ok_or_else(|| {
      ModelError::InferenceError(format!("RKNN 只接受 uint8 输入, 实际为 {}", input.element_type()))
    })?;

    debug!("设置模型输入");
    self
      .context
      .set_input(0, data, TensorFormat::NHWC, TensorType::UInt8)
      .map_err(|e| ModelError::InferenceError(e.to_string()))?;

    debug!("执行模型推理");
    self
      .context
      .run()
      .map_err(|e| ModelError::InferenceError(e.to_string()))?;

    debug!("获取模型输出");
    let output = self
      .context
      .get_outputs()
      .map_err(|e| ModelError::InferenceError(e.to_string()))?;
    let scores = output
      .get_f32(0)
      .map_err(|e| ModelError::InferenceError(e.to_string()))?;

    Ok(ScoreTensor::from(scores.to_vec()))
  }
}

impl Drop for Rknn {
  fn drop(&mut self) {
    debug!("释放 RKNN 推理上下文: {}", self.model_path);
  }
}
