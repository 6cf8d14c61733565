// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/frame.rs - 样本图像帧定义
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

use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbaImage};
use thiserror::Error;
use tracing::debug;

/// 上传时使用的 JPEG 质量（0-100）
pub const DEFAULT_JPEG_QUALITY: u8 = 90;
const JPEG_MAX_DIMENSION: u32 = 65535;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("图像解码错误: {0}")]
  Decode(image::ImageError),
  #[error("图像编码错误: {0}")]
  Encode(image::ImageError),
  #[error("JPEG 不支持的图像尺寸: {0}x{1}")]
  Dimensions(u32, u32),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

/// 一张待检测的样本图像，像素统一为 RGBA8
#[derive(Debug, Clone)]
pub struct SampleFrame {
  image: RgbaImage,
  source: Option<PathBuf>,
  captured_at: DateTime<Utc>,
}

impl From<RgbaImage> for SampleFrame {
  fn from(image: RgbaImage) -> Self {
    Self {
      image,
      source: None,
      captured_at: Utc::now(),
    }
  }
}

impl From<DynamicImage> for SampleFrame {
  fn from(image: DynamicImage) -> Self {
    Self::from(image.to_rgba8())
  }
}

impl SampleFrame {
  /// 从内存中的已编码图像解码，并按 EXIF 方向摆正像素
  pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
      .with_guessed_format()?
      .into_decoder()
      .map_err(FrameError::Decode)?;
    let orientation = decoder.orientation().map_err(FrameError::Decode)?;
    let mut image = DynamicImage::from_decoder(decoder).map_err(FrameError::Decode)?;
    image.apply_orientation(orientation);
    debug!("解码图像: {}x{}", image.width(), image.height());
    Ok(Self::from(image))
  }

  /// 读取并解码图像文件
  pub fn open(path: &Path) -> Result<Self, FrameError> {
    let bytes = std::fs::read(path)?;
    Ok(Self::decode(&bytes)?.with_source(path))
  }

  pub fn with_source(mut self, path: &Path) -> Self {
    self.source = Some(path.to_path_buf());
    self
  }

  pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
    self.captured_at = captured_at;
    self
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn source(&self) -> Option<&Path> {
    self.source.as_deref()
  }

  pub fn captured_at(&self) -> DateTime<Utc> {
    self.captured_at
  }

  pub fn as_rgba(&self) -> &RgbaImage {
    &self.image
  }

  pub fn as_rgba_mut(&mut self) -> &mut RgbaImage {
    &mut self.image
  }

  pub fn into_rgba(self) -> RgbaImage {
    self.image
  }

  /// 替换像素数据，保留来源与采集时间
  pub fn map_image<F>(self, f: F) -> Self
  where
    F: FnOnce(RgbaImage) -> RgbaImage,
  {
    Self {
      image: f(self.image),
      source: self.source,
      captured_at: self.captured_at,
    }
  }

  /// 长边超过 `max_dimension` 时等比缩小
  pub fn fit_within(self, max_dimension: u32) -> Self {
    let (w, h) = self.image.dimensions();
    if w.max(h) <= max_dimension || max_dimension == 0 {
      return self;
    }
    self.map_image(|image| {
      DynamicImage::ImageRgba8(image)
        .resize(max_dimension, max_dimension, FilterType::Triangle)
        .to_rgba8()
    })
  }

  /// 编码为 JPEG（丢弃 alpha 通道）
  pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, FrameError> {
    let (width, height) = self.image.dimensions();
    if !(1..=JPEG_MAX_DIMENSION).contains(&width) || !(1..=JPEG_MAX_DIMENSION).contains(&height) {
      return Err(FrameError::Dimensions(width, height));
    }
    let rgb = DynamicImage::ImageRgba8(self.image.clone()).to_rgb8();
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder).map_err(FrameError::Encode)?;
    debug!("编码 JPEG: {} 字节", buffer.len());
    Ok(buffer)
  }
}
