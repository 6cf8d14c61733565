// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/input/read_image_file.rs - 单张图像文件输入
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

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::frame::{FrameError, SampleFrame};
use crate::{FromUrl, FromUrlWithScheme, url_to_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("无效的图像路径: {0}")]
  InvalidPath(String),
  #[error("没有读取 {0} 的权限")]
  PermissionDenied(PathBuf),
  #[error("图像加载错误: {0}")]
  Load(FrameError),
}

impl From<FrameError> for ImageFileInputError {
  fn from(err: FrameError) -> Self {
    ImageFileInputError::Load(err)
  }
}

/// 读取图像文件，权限不足时单独归类
pub(crate) fn load_frame(path: &Path) -> Result<SampleFrame, ImageFileInputError> {
  SampleFrame::open(path).map_err(|e| match e {
    FrameError::Io(io) if io.kind() == ErrorKind::PermissionDenied => {
      ImageFileInputError::PermissionDenied(path.to_path_buf())
    }
    other => ImageFileInputError::Load(other),
  })
}

/// `image://` 输入：产出一帧后结束
pub struct ImageFileInput {
  path: PathBuf,
  frame: Option<SampleFrame>,
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch);
    }

    let path = url_to_path(url).ok_or_else(|| ImageFileInputError::InvalidPath(url.to_string()))?;
    Self::open(&path)
  }
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl ImageFileInput {
  pub fn open(path: &Path) -> Result<Self, ImageFileInputError> {
    let frame = load_frame(path)?;
    info!(
      "读取图像 {}: {}x{}",
      path.display(),
      frame.width(),
      frame.height()
    );
    Ok(Self {
      path: path.to_path_buf(),
      frame: Some(frame),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Iterator for ImageFileInput {
  type Item = Result<SampleFrame, ImageFileInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take().map(Ok)
  }
}
