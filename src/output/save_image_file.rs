// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/output/save_image_file.rs - 保存样本图像到文件
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

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::api::TestResult;
use crate::frame::{DEFAULT_JPEG_QUALITY, FrameError, SampleFrame};
use crate::output::Render;
use crate::{FromUrl, FromUrlWithScheme, url_to_path};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("图像编码错误: {0}")]
  FrameError(#[from] FrameError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无效的保存路径: {0}")]
  InvalidPath(String),
}

/// 将（增强后的）样本图像写到固定路径；`.png` 无损保存，其余按 JPEG 编码
pub struct SaveImageFileOutput {
  path: PathBuf,
  quality: u8,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let path = url_to_path(uri).ok_or_else(|| SaveImageFileError::InvalidPath(uri.to_string()))?;
    let query_pairs: HashMap<_, _> = uri.query_pairs().collect();
    let quality = query_pairs
      .get("quality")
      .and_then(|v| v.parse::<u8>().ok())
      .filter(|q| (1..=100).contains(q))
      .unwrap_or(DEFAULT_JPEG_QUALITY);

    Ok(SaveImageFileOutput { path, quality })
  }
}

impl SaveImageFileOutput {
  pub fn new(path: &Path) -> Self {
    Self {
      path: path.to_path_buf(),
      quality: DEFAULT_JPEG_QUALITY,
    }
  }

  fn is_png(&self) -> bool {
    self
      .path
      .extension()
      .and_then(|e| e.to_str())
      .is_some_and(|e| e.eq_ignore_ascii_case("png"))
  }

  fn save_image(&self, frame: &SampleFrame) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    if self.is_png() {
      frame.as_rgba().save(&self.path)?;
    } else {
      std::fs::write(&self.path, frame.encode_jpeg(self.quality)?)?;
    }

    info!("保存图像到文件: {}", self.path.display());
    Ok(())
  }
}

impl Render<SampleFrame, TestResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &SampleFrame, _result: &TestResult) -> Result<(), Self::Error> {
    self.save_image(frame)
  }
}
