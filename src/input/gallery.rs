// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/input/gallery.rs - 图库目录输入
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

use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use super::read_image_file::{ImageFileInputError, load_frame};
use crate::frame::SampleFrame;
use crate::{FromUrl, FromUrlWithScheme, url_to_path};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum GalleryInputError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("无效的图库路径: {0}")]
  InvalidPath(String),
  #[error("没有访问图库 {0} 的权限")]
  PermissionDenied(PathBuf),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  Image(#[from] ImageFileInputError),
}

/// `gallery://` 输入：按文件名顺序逐张读取目录中的图像
///
/// 查询参数 `limit` 限制读取数量。单张图像读取失败不会中断迭代。
pub struct GalleryInput {
  root: PathBuf,
  pending: VecDeque<PathBuf>,
}

impl FromUrl for GalleryInput {
  type Error = GalleryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(GalleryInputError::SchemeMismatch);
    }

    let root = url_to_path(url).ok_or_else(|| GalleryInputError::InvalidPath(url.to_string()))?;
    let query_pairs: HashMap<_, _> = url.query_pairs().collect();
    let limit = query_pairs.get("limit").and_then(|v| v.parse::<usize>().ok());
    Self::open(&root, limit)
  }
}

impl FromUrlWithScheme for GalleryInput {
  const SCHEME: &'static str = "gallery";
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl GalleryInput {
  pub fn open(root: &Path, limit: Option<usize>) -> Result<Self, GalleryInputError> {
    let entries = std::fs::read_dir(root).map_err(|e| {
      if e.kind() == ErrorKind::PermissionDenied {
        GalleryInputError::PermissionDenied(root.to_path_buf())
      } else {
        GalleryInputError::Io(e)
      }
    })?;

    let mut files = Vec::new();
    for entry in entries {
      let path = entry?.path();
      if path.is_file() && is_image(&path) {
        files.push(path);
      }
    }
    files.sort();
    if let Some(limit) = limit {
      files.truncate(limit);
    }

    info!("图库 {}: {} 张图像", root.display(), files.len());
    Ok(Self {
      root: root.to_path_buf(),
      pending: files.into(),
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn remaining(&self) -> usize {
    self.pending.len()
  }
}

impl Iterator for GalleryInput {
  type Item = Result<SampleFrame, GalleryInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.pending.pop_front()?;
    Some(load_frame(&path).map_err(|e| {
      warn!("读取 {} 失败: {}", path.display(), e);
      GalleryInputError::Image(e)
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgba, RgbaImage};

  fn gallery() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.png", "a.PNG", "c.jpg"] {
      let path = dir.path().join(name);
      let image = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));
      if name.ends_with(".jpg") {
        image::DynamicImage::ImageRgba8(image).to_rgb8().save(&path).unwrap();
      } else {
        image.save_with_format(&path, image::ImageFormat::Png).unwrap();
      }
    }
    std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();
    std::fs::write(dir.path().join("d.jpeg"), "broken").unwrap();
    dir
  }

  #[test]
  fn test_lists_images_in_order() {
    let dir = gallery();
    let input = GalleryInput::open(dir.path(), None).unwrap();
    assert_eq!(input.remaining(), 4);

    let names: Vec<String> = input
      .pending
      .iter()
      .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
      .collect();
    assert_eq!(names, vec!["a.PNG", "b.png", "c.jpg", "d.jpeg"]);
  }

  #[test]
  fn test_broken_image_does_not_stop_iteration() {
    let dir = gallery();
    let results: Vec<_> = GalleryInput::open(dir.path(), None).unwrap().collect();
    assert_eq!(results.len(), 4);
    assert!(results[..3].iter().all(|r| r.is_ok()));
    assert!(results[3].is_err());
  }

  #[test]
  fn test_limit_from_url() {
    let dir = gallery();
    let url = Url::parse(&format!("gallery://{}?limit=2", dir.path().display())).unwrap();
    let input = GalleryInput::from_url(&url).unwrap();
    assert_eq!(input.remaining(), 2);
  }

  #[test]
  fn test_missing_directory() {
    assert!(matches!(
      GalleryInput::open(Path::new("/definitely/not/a/gallery"), None),
      Err(GalleryInputError::Io(_))
    ));
  }
}
