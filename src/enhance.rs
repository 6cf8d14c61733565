// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/enhance.rs - 亮度/对比度增强
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

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  api::{ApiClient, ApiError, Transport},
  frame::{DEFAULT_JPEG_QUALITY, FrameError, SampleFrame},
};

const MID_GREY: f32 = 128.0;

#[derive(Error, Debug)]
pub enum EnhanceError {
  #[error("图像解码失败: {0}")]
  Decode(image::ImageError),
  #[error("图像编码失败: {0}")]
  Encode(image::ImageError),
  #[error("图像尺寸无法编码: {0}x{1}")]
  Dimensions(u32, u32),
  #[error("I/O 错误: {0}")]
  Io(std::io::Error),
  #[error("远程处理失败: {0}")]
  Remote(#[from] ApiError),
}

impl From<FrameError> for EnhanceError {
  fn from(err: FrameError) -> Self {
    match err {
      FrameError::Decode(e) => EnhanceError::Decode(e),
      FrameError::Encode(e) => EnhanceError::Encode(e),
      FrameError::Dimensions(w, h) => EnhanceError::Dimensions(w, h),
      FrameError::Io(e) => EnhanceError::Io(e),
    }
  }
}

/// 亮度与对比度倍率
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhanceParams {
  pub brightness: f32,
  pub contrast: f32,
}

impl Default for EnhanceParams {
  fn default() -> Self {
    Self {
      brightness: 1.2,
      contrast: 1.3,
    }
  }
}

impl EnhanceParams {
  pub fn identity() -> Self {
    Self {
      brightness: 1.0,
      contrast: 1.0,
    }
  }

  pub fn is_identity(&self) -> bool {
    self.brightness == 1.0 && self.contrast == 1.0
  }
}

/// 单通道变换：先乘亮度，再围绕 128 拉伸对比度，最后截断到 [0, 255]
#[inline]
pub fn adjust_channel(value: u8, params: EnhanceParams) -> u8 {
  let brightened = value as f32 * params.brightness;
  let contrasted = (brightened - MID_GREY) * params.contrast + MID_GREY;
  contrasted.round().clamp(0.0, 255.0) as u8
}

/// 原地调整 RGB 通道，alpha 不变
pub fn adjust_brightness_contrast(image: &mut image::RgbaImage, params: EnhanceParams) {
  if params.is_identity() {
    return;
  }
  // 256 项查找表，避免逐像素浮点运算
  let mut lut = [0u8; 256];
  for (value, slot) in lut.iter_mut().enumerate() {
    *slot = adjust_channel(value as u8, params);
  }
  for pixel in image.pixels_mut() {
    for channel in pixel.0.iter_mut().take(3) {
      *channel = lut[*channel as usize];
    }
  }
}

/// 解码 -> 调整 -> 重新编码为 JPEG
pub fn enhance_jpeg(bytes: &[u8], params: EnhanceParams, quality: u8) -> Result<Vec<u8>, EnhanceError> {
  let mut frame = SampleFrame::decode(bytes)?;
  adjust_brightness_contrast(frame.as_rgba_mut(), params);
  Ok(frame.encode_jpeg(quality)?)
}

pub trait Enhancer {
  fn enhance(&self, frame: &SampleFrame) -> Result<SampleFrame, EnhanceError>;
}

/// 本地像素级增强
#[derive(Debug, Clone, Default)]
pub struct LocalEnhancer {
  params: EnhanceParams,
  max_dimension: Option<u32>,
}

impl LocalEnhancer {
  pub fn new(params: EnhanceParams) -> Self {
    Self {
      params,
      max_dimension: None,
    }
  }

  pub fn max_dimension(mut self, max_dimension: Option<u32>) -> Self {
    self.max_dimension = max_dimension;
    self
  }
}

impl Enhancer for LocalEnhancer {
  fn enhance(&self, frame: &SampleFrame) -> Result<SampleFrame, EnhanceError> {
    let mut out = match self.max_dimension {
      Some(max) => frame.clone().fit_within(max),
      None => frame.clone(),
    };
    adjust_brightness_contrast(out.as_rgba_mut(), self.params);
    debug!(
      "本地增强完成: 亮度 {:.2}, 对比度 {:.2}",
      self.params.brightness, self.params.contrast
    );
    Ok(out)
  }
}

/// 交由服务端处理的增强，参数以表单字段上传
pub struct RemoteEnhancer<T> {
  client: Arc<ApiClient<T>>,
  params: EnhanceParams,
  quality: u8,
}

impl<T: Transport> RemoteEnhancer<T> {
  pub fn new(client: Arc<ApiClient<T>>, params: EnhanceParams) -> Self {
    Self {
      client,
      params,
      quality: DEFAULT_JPEG_QUALITY,
    }
  }

  pub fn quality(mut self, quality: u8) -> Self {
    self.quality = quality;
    self
  }
}

impl<T: Transport> Enhancer for RemoteEnhancer<T> {
  fn enhance(&self, frame: &SampleFrame) -> Result<SampleFrame, EnhanceError> {
    let jpeg = frame.encode_jpeg(self.quality)?;
    info!("上传图像到服务端增强: {} 字节", jpeg.len());
    let processed = self.client.process_image(&jpeg, self.params)?;
    let mut out = SampleFrame::decode(&processed)?.with_captured_at(frame.captured_at());
    if let Some(source) = frame.source() {
      out = out.with_source(source);
    }
    Ok(out)
  }
}

/// 按配置选择的增强器
pub enum EnhancerWrapper<T> {
  Off,
  Local(LocalEnhancer),
  Remote(RemoteEnhancer<T>),
}

impl<T: Transport> Enhancer for EnhancerWrapper<T> {
  fn enhance(&self, frame: &SampleFrame) -> Result<SampleFrame, EnhanceError> {
    match self {
      EnhancerWrapper::Off => Ok(frame.clone()),
      EnhancerWrapper::Local(enhancer) => enhancer.enhance(frame),
      EnhancerWrapper::Remote(enhancer) => enhancer.enhance(frame),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgba, RgbaImage};

  #[test]
  fn test_identity_params_keep_every_value() {
    let params = EnhanceParams::identity();
    for c in 0..=255u8 {
      assert_eq!(adjust_channel(c, params), c);
    }
  }

  #[test]
  fn test_output_is_clamped() {
    let hot = EnhanceParams {
      brightness: 2.0,
      contrast: 2.0,
    };
    assert_eq!(adjust_channel(255, hot), 255);
    assert_eq!(adjust_channel(0, hot), 0);

    let dark = EnhanceParams {
      brightness: 0.1,
      contrast: 4.0,
    };
    assert_eq!(adjust_channel(200, dark), 0);
  }

  #[test]
  fn test_default_params_on_known_values() {
    let params = EnhanceParams::default();
    // 100 * 1.2 = 120 -> (120 - 128) * 1.3 + 128 = 117.6
    assert_eq!(adjust_channel(100, params), 118);
    // 128 * 1.2 = 153.6 -> 25.6 * 1.3 + 128 = 161.28
    assert_eq!(adjust_channel(128, params), 161);
  }

  #[test]
  fn test_alpha_untouched() {
    let mut image = RgbaImage::from_pixel(2, 2, Rgba([10, 100, 200, 37]));
    adjust_brightness_contrast(&mut image, EnhanceParams::default());
    for pixel in image.pixels() {
      assert_eq!(pixel[3], 37);
      assert_eq!(pixel[1], adjust_channel(100, EnhanceParams::default()));
    }
  }

  #[test]
  fn test_enhance_jpeg_rejects_garbage() {
    let err = enhance_jpeg(&[0xFF, 0x00, 0x12], EnhanceParams::default(), 90).unwrap_err();
    assert!(matches!(err, EnhanceError::Decode(_)));
  }

  #[test]
  fn test_local_enhancer_keeps_dimensions() {
    let frame = SampleFrame::from(RgbaImage::from_pixel(16, 8, Rgba([50, 50, 50, 255])));
    let out = LocalEnhancer::new(EnhanceParams::default())
      .enhance(&frame)
      .unwrap();
    assert_eq!((out.width(), out.height()), (16, 8));
    assert_eq!(out.as_rgba().get_pixel(0, 0)[0], adjust_channel(50, EnhanceParams::default()));
  }
}
