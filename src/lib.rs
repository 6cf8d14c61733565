// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/lib.rs - 库主文件
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

use std::path::PathBuf;

pub mod api;
pub mod calibration;
pub mod config;
pub mod dialog;
pub mod enhance;
pub mod frame;
pub mod history;
pub mod input;
pub mod model;
pub mod monitor;
pub mod output;
pub mod session;
pub mod settings;
pub mod task;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 将 `scheme://host/path` 形式的地址还原为本地路径
///
/// `image:///data/a.jpg` 为绝对路径；`image://data/a.jpg` 视为相对路径 `data/a.jpg`。
/// 路径中的百分号编码会被解码。
pub fn url_to_path(url: &url::Url) -> Option<PathBuf> {
  let path = urlencoding::decode(url.path()).ok()?;
  let joined = match url.host_str() {
    Some(host) if !host.is_empty() => {
      let host = urlencoding::decode(host).ok()?;
      format!("{}{}", host, path)
    }
    _ => path.into_owned(),
  };
  if joined.is_empty() {
    return None;
  }
  Some(PathBuf::from(joined))
}
