// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/config.rs - 客户端配置
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
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::calibration::LinearCalibration;
use crate::enhance::EnhanceParams;
use crate::frame::DEFAULT_JPEG_QUALITY;

pub const DEFAULT_BASE_URL: &str = "https://test3.xessglobal.net/";
pub const DEFAULT_PROCESS_IMAGE_URL: &str = "https://helpdesk.xessglobal.net/api/process-image";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("配置格式错误: {0}")]
  Format(#[from] serde_json::Error),
  #[error("无效的 URL '{0}': {1}")]
  InvalidUrl(String, url::ParseError),
  #[error("无效的配置项 {0}: {1}")]
  Invalid(&'static str, String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnhanceMode {
  Off,
  #[default]
  Local,
  Remote,
}

impl FromStr for EnhanceMode {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "off" | "none" => Ok(EnhanceMode::Off),
      "local" => Ok(EnhanceMode::Local),
      "remote" | "server" => Ok(EnhanceMode::Remote),
      other => Err(ConfigError::Invalid("enhance_mode", other.to_string())),
    }
  }
}

/// 颜色预检未通过时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
  /// 询问用户是否继续
  #[default]
  Ask,
  /// 直接结束本次分析
  Abort,
}

impl FromStr for ValidationPolicy {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "ask" => Ok(ValidationPolicy::Ask),
      "abort" => Ok(ValidationPolicy::Abort),
      other => Err(ConfigError::Invalid("on_rejected", other.to_string())),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
  pub base_url: String,
  pub process_image_url: String,
  /// 连通性报告中额外探测的地址
  pub reference_url: Option<String>,
  pub timeout_secs: u64,
  pub poll_interval_secs: u64,
  pub enhance_mode: EnhanceMode,
  pub enhance: EnhanceParams,
  pub jpeg_quality: u8,
  pub max_dimension: Option<u32>,
  pub on_rejected: ValidationPolicy,
  pub calibration: LinearCalibration,
  pub settings_path: Option<PathBuf>,
  /// 开启自动保存时记录结果的目录
  pub record_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      process_image_url: DEFAULT_PROCESS_IMAGE_URL.to_string(),
      reference_url: None,
      timeout_secs: 30,
      poll_interval_secs: 30,
      enhance_mode: EnhanceMode::default(),
      enhance: EnhanceParams::default(),
      jpeg_quality: DEFAULT_JPEG_QUALITY,
      max_dimension: None,
      on_rejected: ValidationPolicy::default(),
      calibration: LinearCalibration::default(),
      settings_path: None,
      record_dir: None,
    }
  }
}

impl ClientConfig {
  pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Self = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
  }

  pub fn to_json_file(&self, path: &Path) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(self)?;
    std::fs::write(path, json)?;
    Ok(())
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    self.base_url()?;
    parse_url(&self.process_image_url)?;
    if let Some(reference) = &self.reference_url {
      parse_url(reference)?;
    }
    if !(1..=100).contains(&self.jpeg_quality) {
      return Err(ConfigError::Invalid("jpeg_quality", self.jpeg_quality.to_string()));
    }
    if self.poll_interval_secs == 0 {
      return Err(ConfigError::Invalid("poll_interval_secs", "0".to_string()));
    }
    let EnhanceParams {
      brightness,
      contrast,
    } = self.enhance;
    if !brightness.is_finite() || brightness < 0.0 || !contrast.is_finite() || contrast < 0.0 {
      return Err(ConfigError::Invalid(
        "enhance",
        format!("brightness {}, contrast {}", brightness, contrast),
      ));
    }
    Ok(())
  }

  /// 服务端根地址，保证以 `/` 结尾以便拼接相对路径
  pub fn base_url(&self) -> Result<Url, ConfigError> {
    let raw = if self.base_url.ends_with('/') {
      self.base_url.clone()
    } else {
      format!("{}/", self.base_url)
    };
    parse_url(&raw)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs)
  }

  /// 设置文件位置：配置项优先，其次为系统配置目录下的 `andan/settings.json`
  pub fn settings_path(&self) -> PathBuf {
    if let Some(path) = &self.settings_path {
      return path.clone();
    }
    if let Some(config_dir) = dirs::config_dir() {
      return config_dir.join("andan").join("settings.json");
    }
    match dirs::home_dir() {
      Some(home) => home.join(".andan").join("settings.json"),
      None => PathBuf::from(".andan").join("settings.json"),
    }
  }
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
  Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(raw.to_string(), e))
}
