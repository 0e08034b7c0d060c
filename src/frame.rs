// 该文件是 Maoche （猫车） 项目的一部分。
// src/frame.rs - 原始 RGB 图像定义
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

use std::path::Path;

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::debug;

pub const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum ImageDecodeError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  DecodeError(#[from] image::ImageError),
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  BufferSize { expected: usize, actual: usize },
  #[error("图像尺寸为空: {width}x{height}")]
  Empty { width: u32, height: u32 },
  #[error("图像尺寸过大: {width}x{height}")]
  TooLarge { width: u32, height: u32 },
}

/// 已解码的 8 位 RGB 图像，原点位于左上角。
///
/// 由调用方持有，流水线只以引用方式读取。
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
  image: RgbImage,
}

impl RawImage {
  /// 从交错排列的 RGB 字节构造图像，长度必须等于 `width * height * 3`。
  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ImageDecodeError> {
    let expected = RGB_CHANNELS
      .checked_mul(width as usize)
      .and_then(|n| n.checked_mul(height as usize))
      .ok_or(ImageDecodeError::TooLarge { width, height })?;
    if data.len() != expected {
      return Err(ImageDecodeError::BufferSize {
        expected,
        actual: data.len(),
      });
    }

    let actual = data.len();
    RgbImage::from_raw(width, height, data)
      .map(Self::from)
      .ok_or(ImageDecodeError::BufferSize { expected, actual })
  }

  /// 从内存中的编码数据（PNG / JPEG）解码。
  pub fn decode(bytes: &[u8]) -> Result<Self, ImageDecodeError> {
    let image = image::load_from_memory(bytes)?;
    debug!("解码图像: {}x{}", image.width(), image.height());
    Ok(image.into_rgb8().into())
  }

  /// 打开并解码图像文件。
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageDecodeError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    debug!("读取图像文件: {}x{}", image.width(), image.height());
    Ok(image.into_rgb8().into())
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn is_empty(&self) -> bool {
    self.image.width() == 0 || self.image.height() == 0
  }

  /// 空图像无法缩放，在预处理开始前拒绝。
  pub fn ensure_not_empty(&self) -> Result<(), ImageDecodeError> {
    if self.is_empty() {
      return Err(ImageDecodeError::Empty {
        width: self.width(),
        height: self.height(),
      });
    }
    Ok(())
  }

  pub fn as_rgb8(&self) -> &RgbImage {
    &self.image
  }
}

impl From<RgbImage> for RawImage {
  fn from(image: RgbImage) -> Self {
    Self { image }
  }
}

impl AsRef<[u8]> for RawImage {
  fn as_ref(&self) -> &[u8] {
    self.image.as_raw()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_raw_rejects_wrong_length() {
    let err = RawImage::from_raw(2, 2, vec![0u8; 11]).unwrap_err();
    assert!(matches!(
      err,
      ImageDecodeError::BufferSize {
        expected: 12,
        actual: 11
      }
    ));
  }

  #[test]
  fn from_raw_rejects_overflowing_dimensions() {
    let err = RawImage::from_raw(u32::MAX, u32::MAX, Vec::new()).unwrap_err();
    assert!(matches!(
      err,
      ImageDecodeError::TooLarge {
        width: u32::MAX,
        height: u32::MAX
      }
    ));
  }

  #[test]
  fn from_raw_keeps_interleaved_layout() {
    let data = vec![1, 2, 3, 4, 5, 6];
    let image = RawImage::from_raw(2, 1, data.clone()).unwrap();
    assert_eq!(image.width(), 2);
    assert_eq!(image.height(), 1);
    assert_eq!(image.as_ref(), data.as_slice());
  }

  #[test]
  fn empty_image_is_rejected() {
    let image = RawImage::from_raw(0, 5, Vec::new()).unwrap();
    assert!(matches!(
      image.ensure_not_empty(),
      Err(ImageDecodeError::Empty {
        width: 0,
        height: 5
      })
    ));
  }

  #[test]
  fn decode_garbage_fails() {
    assert!(matches!(
      RawImage::decode(b"definitely not an image"),
      Err(ImageDecodeError::DecodeError(_))
    ));
  }

  #[test]
  fn decode_png_round_trip() {
    let mut buffer = std::io::Cursor::new(Vec::new());
    RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]))
      .write_to(&mut buffer, image::ImageFormat::Png)
      .unwrap();

    let image = RawImage::decode(buffer.get_ref()).unwrap();
    assert_eq!((image.width(), image.height()), (3, 2));
    assert_eq!(&image.as_ref()[..3], &[10, 20, 30]);
  }
}
