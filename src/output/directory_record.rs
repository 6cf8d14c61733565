// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/output/directory_record.rs - 按日期分目录记录分析结果
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

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::TestResult;
use crate::frame::{DEFAULT_JPEG_QUALITY, FrameError, SampleFrame};
use crate::output::Render;
use crate::{FromUrl, FromUrlWithScheme, url_to_path};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无效的记录目录: {0}")]
  InvalidPath(String),
  #[error("图像编码错误: {0}")]
  FrameError(#[from] FrameError),
  #[error("记录序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// `folder://` 输出：`<目录>/YYYY/MM/DD/HH-MM-SS-XXXX.{jpg,json}`
///
/// 查询参数：`retention=<天数>` 写入后清理过期的日期目录；`image=false` 只写 JSON。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counter: AtomicU16,
  retention_days: Option<u32>,
  save_image: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let directory =
      url_to_path(uri).ok_or_else(|| DirectoryRecordOutputError::InvalidPath(uri.to_string()))?;
    let mut output = DirectoryRecordOutput::new(&directory);
    for (k, v) in uri.query_pairs() {
      match k.as_ref() {
        "retention" => output.retention_days = v.parse().ok(),
        "image" => output.save_image = v != "false" && v != "0",
        _ => {}
      }
    }
    Ok(output)
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: &Path) -> Self {
    Self {
      directory: directory.to_path_buf(),
      frame_counter: AtomicU16::new(0),
      retention_days: None,
      save_image: true,
    }
  }

  pub fn retention_days(mut self, days: Option<u32>) -> Self {
    self.retention_days = days;
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  /// 记录文件的路径（不含扩展名），按结果接收时间分目录
  fn record_stem(&self, at: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(at.year().to_string())
      .join(format!("{:02}", at.month()))
      .join(format!("{:02}", at.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }
    Ok(directory.join(format!("{}-{:04X}", at.format("%H-%M-%S"), self.frame_id())))
  }

  /// 删除早于 `now - retention_days` 的日期目录，返回删除的天数
  pub fn prune(&self, retention_days: u32, now: DateTime<Utc>) -> Result<usize, DirectoryRecordOutputError> {
    let cutoff = (now - Duration::days(retention_days as i64)).date_naive();
    let mut removed = 0;

    for (year_dir, year) in numbered_dirs(&self.directory)? {
      for (month_dir, month) in numbered_dirs(&year_dir)? {
        for (day_dir, day) in numbered_dirs(&month_dir)? {
          let Some(date) = NaiveDate::from_ymd_opt(year as i32, month, day) else {
            continue;
          };
          if date < cutoff {
            debug!("删除过期记录目录: {}", day_dir.display());
            std::fs::remove_dir_all(&day_dir)?;
            removed += 1;
          }
        }
        remove_if_empty(&month_dir)?;
      }
      remove_if_empty(&year_dir)?;
    }

    if removed > 0 {
      info!("已清理 {} 天的过期记录 (保留 {} 天)", removed, retention_days);
    }
    Ok(removed)
  }
}

fn numbered_dirs(parent: &Path) -> Result<Vec<(PathBuf, u32)>, std::io::Error> {
  if !parent.is_dir() {
    return Ok(Vec::new());
  }
  let mut dirs = Vec::new();
  for entry in std::fs::read_dir(parent)? {
    let path = entry?.path();
    if !path.is_dir() {
      continue;
    }
    if let Some(number) = path
      .file_name()
      .and_then(|n| n.to_str())
      .and_then(|n| n.parse::<u32>().ok())
    {
      dirs.push((path, number));
    }
  }
  Ok(dirs)
}

fn remove_if_empty(dir: &Path) -> Result<(), std::io::Error> {
  if std::fs::read_dir(dir)?.next().is_none() {
    std::fs::remove_dir(dir)?;
  }
  Ok(())
}

impl Render<SampleFrame, TestResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &SampleFrame, result: &TestResult) -> Result<(), Self::Error> {
    let stem = self.record_stem(result.received_at)?;
    if self.save_image {
      std::fs::write(stem.with_extension("jpg"), frame.encode_jpeg(DEFAULT_JPEG_QUALITY)?)?;
    }
    std::fs::write(
      stem.with_extension("json"),
      serde_json::to_string_pretty(result)?,
    )?;
    info!("记录分析结果: {}", stem.display());

    if let Some(days) = self.retention_days
      && let Err(e) = self.prune(days, Utc::now())
    {
      warn!("清理过期记录失败: {}", e);
    }
    Ok(())
  }
}
