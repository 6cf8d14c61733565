// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/input.rs - 图像输入
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

mod gallery;
mod read_image_file;

use thiserror::Error;

use crate::frame::SampleFrame;
use crate::{FromUrl, FromUrlWithScheme};

pub use self::gallery::{GalleryInput, GalleryInputError};
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("Gallery input error: {0}")]
  GalleryInputError(#[from] GalleryInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

impl InputError {
  /// 权限不足时需要提示用户，而不是当作普通错误
  pub fn is_permission_denied(&self) -> bool {
    matches!(
      self,
      InputError::ImageFileInputError(ImageFileInputError::PermissionDenied(_))
        | InputError::GalleryInputError(GalleryInputError::PermissionDenied(_))
        | InputError::GalleryInputError(GalleryInputError::Image(
          ImageFileInputError::PermissionDenied(_)
        ))
    )
  }
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  Gallery(GalleryInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() == ImageFileInput::SCHEME {
      let input = ImageFileInput::from_url(url)?;
      return Ok(InputWrapper::ReadImageFile(input));
    }
    if url.scheme() == GalleryInput::SCHEME {
      let input = GalleryInput::from_url(url)?;
      return Ok(InputWrapper::Gallery(input));
    }
    Err(InputError::SchemeMismatch)
  }
}

impl Iterator for InputWrapper {
  type Item = Result<SampleFrame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ReadImageFile(input) => input.next().map(|r| r.map_err(InputError::from)),
      InputWrapper::Gallery(input) => input.next().map(|r| r.map_err(InputError::from)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  #[test]
  fn test_dispatch_by_scheme() {
    let url = url::Url::parse("rtsp://camera/stream").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch)
    ));

    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("gallery://{}", dir.path().display())).unwrap();
    let mut input = InputWrapper::from_url(&url).unwrap();
    assert!(matches!(input, InputWrapper::Gallery(_)));
    assert!(input.next().is_none());
  }

  #[test]
  fn test_permission_classification() {
    let denied = InputError::from(GalleryInputError::PermissionDenied(PathBuf::from("/x")));
    assert!(denied.is_permission_denied());
    assert!(!InputError::SchemeMismatch.is_permission_denied());
  }
}
