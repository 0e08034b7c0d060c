// 该文件是 Maoche （猫车） 项目的一部分。
// src/model/tract_onnx.rs - 基于 tract 的 ONNX 推理后端
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

use tracing::{debug, error, info};
use tract_onnx::prelude::*;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RGB_CHANNELS,
  model::{LoadModel, ModelError, ModelExecutor, query_param},
  tensor::{ElementType, InputContract, NormalizedTensor, OutputContract, ScoreTensor, TensorData},
};

const TRACT_NUM_INPUTS: usize = 1;

type TractPlan = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
  Nhwc,
  Nchw,
}

impl Layout {
  fn shape(&self, size: usize) -> [usize; 4] {
    match self {
      Layout::Nhwc => [1, size, size, RGB_CHANNELS],
      Layout::Nchw => [1, RGB_CHANNELS, size, size],
    }
  }
}

/// 模型输入为动态形状时，通过 URL 参数固定输入。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PinnedInput {
  size: u32,
  layout: Layout,
  element_type: ElementType,
}

pub struct TractOnnx {
  model_path: String,
  plan: TractPlan,
  layout: Layout,
  input: InputContract,
  output: OutputContract,
}

pub struct TractOnnxBuilder {
  model_path: String,
  pinned: Option<PinnedInput>,
}

impl FromUrlWithScheme for TractOnnxBuilder {
  const SCHEME: &'static str = "tract";
}

impl FromUrl for TractOnnxBuilder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let pinned = match query_param::<u32>(url, "size")? {
      Some(size) => {
        let layout = match query_param::<String>(url, "layout")?.as_deref() {
          None | Some("nchw") => Layout::Nchw,
          Some("nhwc") => Layout::Nhwc,
          Some(other) => {
            return Err(ModelError::ModelPathError(format!("未知的输入布局: {}", other)));
          }
        };
        let element_type = match query_param::<String>(url, "dtype")?.as_deref() {
          None | Some("f32") => ElementType::Float32,
          Some("u8") => ElementType::UInt8,
          Some(other) => {
            return Err(ModelError::ModelPathError(format!("未知的输入类型: {}", other)));
          }
        };
        Some(PinnedInput {
          size,
          layout,
          element_type,
        })
      }
      None => None,
    };

    Ok(TractOnnxBuilder {
      model_path: url.path().to_string(),
      pinned,
    })
  }
}

fn tract_err(msg: &str) -> impl Fn(TractError) -> ModelError + '_ {
  move |e| ModelError::invalid(format!("{}: {}", msg, e))
}

fn element_type_of(datum_type: DatumType) -> Option<ElementType> {
  match datum_type {
    DatumType::U8 => Some(ElementType::UInt8),
    DatumType::F32 => Some(ElementType::Float32),
    _ => None,
  }
}

/// 根据输入形状推断布局与边长，只接受批大小为 1 的正方形 RGB 输入。
fn layout_of(shape: &[usize]) -> Option<(Layout, usize)> {
  match *shape {
    [1, h, w, RGB_CHANNELS] if h == w => Some((Layout::Nhwc, h)),
    [1, RGB_CHANNELS, h, w] if h == w => Some((Layout::Nchw, h)),
    _ => None,
  }
}

impl TractOnnxBuilder {
  pub fn new(model_path: impl Into<String>) -> Self {
    Self {
      model_path: model_path.into(),
      pinned: None,
    }
  }

  fn build(&self) -> Result<TractOnnx, ModelError> {
    info!("加载模型文件: {}", self.model_path);
    let metadata = std::fs::metadata(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      metadata.len() as f64 / (1024.0 * 1024.0)
    );

    let mut model = tract_onnx::onnx()
      .model_for_path(&self.model_path)
      .map_err(tract_err("无法解析 ONNX 模型"))?;

    if let Some(pinned) = self.pinned {
      let shape = pinned.layout.shape(pinned.size as usize);
      let fact = match pinned.element_type {
        ElementType::UInt8 => u8::fact(shape),
        ElementType::Float32 => f32::fact(shape),
      };
      debug!("固定模型输入: {:?} {}", shape, pinned.element_type);
      model = model
        .with_input_fact(0, fact.into())
        .map_err(tract_err("无法固定模型输入"))?;
    }

    let model = model
      .into_optimized()
      .map_err(tract_err("模型优化失败"))?;

    let num_inputs = model.inputs.len();
    if num_inputs != TRACT_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        TRACT_NUM_INPUTS, num_inputs
      );
      return Err(ModelError::invalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        TRACT_NUM_INPUTS, num_inputs
      )));
    }
    debug!("模型输出数量: {}", model.outputs.len());

    let input_fact = model.input_fact(0).map_err(tract_err("无法获取输入信息"))?;
    let input_shape = input_fact
      .shape
      .as_concrete()
      .ok_or_else(|| ModelError::invalid("不支持动态输入形状，请通过 ?size= 固定输入"))?;
    let (layout, size) = layout_of(input_shape)
      .ok_or_else(|| ModelError::invalid(format!("不支持的输入形状: {:?}", input_shape)))?;
    let input_type = element_type_of(input_fact.datum_type).ok_or_else(|| {
      ModelError::invalid(format!("不支持的输入类型: {:?}", input_fact.datum_type))
    })?;
    let size = u32::try_from(size)
      .map_err(|_| ModelError::invalid(format!("输入尺寸过大: {}", size)))?;
    let input =
      InputContract::square(size, input_type).map_err(|e| ModelError::invalid(e.to_string()))?;

    let output_fact = model.output_fact(0).map_err(tract_err("无法获取输出信息"))?;
    let output_shape = output_fact
      .shape
      .as_concrete()
      .ok_or_else(|| ModelError::invalid("不支持动态输出形状"))?;
    if output_fact.datum_type != DatumType::F32 {
      return Err(ModelError::invalid(format!(
        "模型输出类型必须为 f32, 实际为 {:?}",
        output_fact.datum_type
      )));
    }
    let output = OutputContract::scores(output_shape.iter().product());

    debug!("模型输入: {:?} {:?} {}", layout, input_shape, input.element_type);
    debug!("模型输出: {:?} ({} 类)", output_shape, output.length);

    let plan = model
      .into_runnable()
      .map_err(tract_err("无法创建推理计划"))?;
    info!("模型加载完成");

    Ok(TractOnnx {
      model_path: self.model_path.clone(),
      plan,
      layout,
      input,
      output,
    })
  }
}

impl LoadModel for TractOnnxBuilder {
  type Executor = TractOnnx;

  fn load(&self) -> Result<Self::Executor, ModelError> {
    self.build()
  }
}

impl TractOnnx {
  fn to_tract_tensor(&self, input: &NormalizedTensor) -> TractResult<Tensor> {
    let nhwc = Layout::Nhwc.shape(input.size() as usize);
    let tensor = match input.data() {
      TensorData::UInt8(data) => Tensor::from_shape(&nhwc, &data[..])?,
      TensorData::Float32(data) => Tensor::from_shape(&nhwc, &data[..])?,
    };

    match self.layout {
      Layout::Nhwc => Ok(tensor),
      Layout::Nchw => tensor.permute_axes(&[0, 3, 1, 2]),
    }
  }
}

impl ModelExecutor for TractOnnx {
  fn input_contract(&self) -> InputContract {
    self.input
  }

  fn output_contract(&self) -> OutputContract {
    self.output
  }

  fn run(&self, input: &NormalizedTensor) -> Result<ScoreTensor, ModelError> {
    debug!("设置模型输入");
    let tensor = self
      .to_tract_tensor(input)
      .map_err(|e| ModelError::InferenceError(format!("无法构造输入张量: {}", e)))?;

    debug!("执行模型推理");
    let outputs = self
      .plan
      .run(tvec!(tensor.into_tvalue()))
      .map_err(|e| ModelError::InferenceError(e.to_string()))?;

    debug!("获取模型输出");
    let scores = outputs
      .first()
      .ok_or_else(|| ModelError::InferenceError("模型没有输出".to_string()))?
      .as_slice::<f32>()
      .map_err(|e| ModelError::InferenceError(e.to_string()))?;

    Ok(ScoreTensor::from(scores.to_vec()))
  }
}

impl Drop for TractOnnx {
  fn drop(&mut self) {
    debug!("释放模型: {}", self.model_path);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn layout_detection() {
    assert_eq!(layout_of(&[1, 260, 260, 3]), Some((Layout::Nhwc, 260)));
    assert_eq!(layout_of(&[1, 3, 224, 224]), Some((Layout::Nchw, 224)));
    assert_eq!(layout_of(&[1, 3, 224, 200]), None);
    assert_eq!(layout_of(&[2, 3, 224, 224]), None);
    assert_eq!(layout_of(&[1, 224, 224]), None);
  }

  #[test]
  fn builder_reads_pinned_input() {
    let url = Url::parse("tract:///models/mobilenet.onnx?size=224&layout=nhwc&dtype=u8").unwrap();
    let builder = TractOnnxBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "/models/mobilenet.onnx");
    assert_eq!(
      builder.pinned,
      Some(PinnedInput {
        size: 224,
        layout: Layout::Nhwc,
        element_type: ElementType::UInt8,
      })
    );
  }

  #[test]
  fn builder_rejects_unknown_layout() {
    let url = Url::parse("tract:///models/mobilenet.onnx?size=224&layout=chw").unwrap();
    assert!(matches!(
      TractOnnxBuilder::from_url(&url),
      Err(ModelError::ModelPathError(_))
    ));
  }

  /// 输出直接连到输入的内存模型，用于观察送入推理计划的数据排列。
  fn passthrough(layout: Layout, element_type: ElementType) -> TractOnnx {
    let shape = layout.shape(2);
    let fact = match element_type {
      ElementType::Float32 => f32::fact(shape),
      ElementType::UInt8 => u8::fact(shape),
    };
    let mut model = TypedModel::default();
    let source = model.add_source("input", fact).unwrap();
    model.set_output_outlets(&[source]).unwrap();

    TractOnnx {
      model_path: "memory".to_string(),
      plan: model.into_runnable().unwrap(),
      layout,
      input: InputContract::square(2, element_type).unwrap(),
      output: OutputContract::scores(2 * 2 * RGB_CHANNELS),
    }
  }

  fn interleaved(contract: &InputContract) -> NormalizedTensor {
    let data: Vec<f32> = (0..contract.element_count).map(|v| v as f32).collect();
    NormalizedTensor::new(contract, TensorData::Float32(data.into())).unwrap()
  }

  #[test]
  fn nchw_model_receives_channel_planes() {
    let model = passthrough(Layout::Nchw, ElementType::Float32);
    let scores = model.run(&interleaved(&model.input_contract())).unwrap();
    assert_eq!(
      scores.as_slice(),
      &[0.0, 3.0, 6.0, 9.0, 1.0, 4.0, 7.0, 10.0, 2.0, 5.0, 8.0, 11.0]
    );
    assert!(scores.check(&model.output_contract()).is_ok());
  }

  #[test]
  fn nhwc_model_receives_interleaved_pixels() {
    let model = passthrough(Layout::Nhwc, ElementType::Float32);
    let input = interleaved(&model.input_contract());
    let scores = model.run(&input).unwrap();
    assert_eq!(scores.as_slice(), input.as_f32().unwrap());
  }

  #[test]
  fn non_float_output_is_an_inference_error() {
    let model = passthrough(Layout::Nhwc, ElementType::UInt8);
    let contract = model.input_contract();
    let input =
      NormalizedTensor::new(&contract, TensorData::UInt8(vec![7; contract.element_count].into()))
        .unwrap();
    assert!(matches!(
      model.run(&input),
      Err(ModelError::InferenceError(_))
    ));
  }

  #[test]
  fn missing_model_file_fails_to_load() {
    let builder = TractOnnxBuilder::new("/definitely/not/here.onnx");
    assert!(matches!(
      builder.load(),
      Err(ModelError::ModelLoadError(_))
    ));
  }
}
