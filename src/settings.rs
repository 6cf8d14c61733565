// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/settings.rs - 应用设置与登录状态
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

mod migrations;
mod store;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub use self::migrations::{CURRENT_SCHEMA_VERSION, ensure_schema};
pub use self::store::{FileStore, KeyValueStore, MemoryStore, StoreError};

/// 存储中使用的键名
pub mod keys {
  pub const IS_AUTHENTICATED: &str = "isAuthenticated";
  pub const THEME: &str = "theme";
  pub const APP_SETTINGS: &str = "appSettings";
  pub const SCHEMA_VERSION: &str = "schemaVersion";
}

/// 可选的数据保留天数
pub const RETENTION_CHOICES: [u32; 3] = [7, 30, 90];

#[derive(Error, Debug)]
pub enum SettingsError {
  #[error("存储错误: {0}")]
  Store(#[from] StoreError),
  #[error("设置序列化错误: {0}")]
  Serialize(#[from] serde_json::Error),
  #[error("未知的设置项: {0}")]
  UnknownKey(String),
  #[error("设置项 {key} 的值无效: {value}")]
  InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
  Light,
  Dark,
  #[default]
  System,
}

impl Theme {
  pub fn as_str(&self) -> &'static str {
    match self {
      Theme::Light => "light",
      Theme::Dark => "dark",
      Theme::System => "system",
    }
  }

  pub fn is_dark(&self, system_dark: bool) -> bool {
    match self {
      Theme::Light => false,
      Theme::Dark => true,
      Theme::System => system_dark,
    }
  }
}

impl FromStr for Theme {
  type Err = SettingsError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "light" => Ok(Theme::Light),
      "dark" => Ok(Theme::Dark),
      "system" => Ok(Theme::System),
      other => Err(SettingsError::InvalidValue {
        key: keys::THEME.to_string(),
        value: other.to_string(),
      }),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
  #[default]
  Metric,
  Imperial,
}

/// 1 格令/美制加仑 = 17.118 mg/L
const MG_PER_L_PER_GRAIN_PER_GALLON: f64 = 17.118;

impl Units {
  pub fn concentration_label(&self) -> &'static str {
    match self {
      Units::Metric => "mg/L",
      Units::Imperial => "gr/gal",
    }
  }

  pub fn convert_mg_per_l(&self, value: f64) -> f64 {
    match self {
      Units::Metric => value,
      Units::Imperial => value / MG_PER_L_PER_GRAIN_PER_GALLON,
    }
  }
}

/// `appSettings` 键下保存的 JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
  pub notifications: bool,
  pub auto_save: bool,
  pub data_retention: u32,
  pub language: String,
  pub units: Units,
}

impl Default for AppSettings {
  fn default() -> Self {
    Self {
      notifications: true,
      auto_save: true,
      data_retention: 30,
      language: "English".to_string(),
      units: Units::Metric,
    }
  }
}

impl AppSettings {
  /// 按名称修改单个设置项（命令行 `settings set` 使用）
  pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
    let invalid = || SettingsError::InvalidValue {
      key: key.to_string(),
      value: value.to_string(),
    };
    match key {
      "notifications" => self.notifications = value.parse().map_err(|_| invalid())?,
      "autoSave" | "auto_save" => self.auto_save = value.parse().map_err(|_| invalid())?,
      "dataRetention" | "data_retention" => {
        let days: u32 = value.parse().map_err(|_| invalid())?;
        if !RETENTION_CHOICES.contains(&days) {
          return Err(invalid());
        }
        self.data_retention = days;
      }
      "language" => {
        if value.trim().is_empty() {
          return Err(invalid());
        }
        self.language = value.trim().to_string();
      }
      "units" => {
        self.units = match value.to_ascii_lowercase().as_str() {
          "metric" => Units::Metric,
          "imperial" => Units::Imperial,
          _ => return Err(invalid()),
        }
      }
      other => return Err(SettingsError::UnknownKey(other.to_string())),
    }
    Ok(())
  }
}

/// 存储内容的类型化缓存
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
  pub theme: Theme,
  pub app: AppSettings,
  pub authenticated: bool,
}

/// 设置与登录状态服务：启动时 `load`，修改时立即写回
pub struct SettingsService<S> {
  store: S,
  cache: Preferences,
}

impl<S: KeyValueStore> SettingsService<S> {
  pub fn new(store: S) -> Self {
    Self {
      store,
      cache: Preferences::default(),
    }
  }

  /// 执行迁移并读取全部设置；无法解析的值回退为默认值
  pub fn load(&mut self) -> Result<&Preferences, SettingsError> {
    ensure_schema(&mut self.store)?;

    let theme = match self.store.get(keys::THEME)? {
      Some(raw) => raw.parse().unwrap_or_else(|e| {
        warn!("读取主题失败: {}", e);
        Theme::default()
      }),
      None => Theme::default(),
    };
    let app = match self.store.get(keys::APP_SETTINGS)? {
      Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("读取 appSettings 失败: {}", e);
        AppSettings::default()
      }),
      None => AppSettings::default(),
    };
    let authenticated = self.store.get(keys::IS_AUTHENTICATED)?.as_deref() == Some("true");

    self.cache = Preferences {
      theme,
      app,
      authenticated,
    };
    info!(
      "设置已加载: 主题 {}, 已登录 {}",
      theme.as_str(),
      authenticated
    );
    Ok(&self.cache)
  }

  /// 将缓存全部写回存储
  pub fn save(&mut self) -> Result<(), SettingsError> {
    self.store.set(keys::THEME, self.cache.theme.as_str())?;
    self
      .store
      .set(keys::APP_SETTINGS, &serde_json::to_string(&self.cache.app)?)?;
    if self.cache.authenticated {
      self.store.set(keys::IS_AUTHENTICATED, "true")?;
    } else {
      self.store.remove(keys::IS_AUTHENTICATED)?;
    }
    Ok(())
  }

  pub fn preferences(&self) -> &Preferences {
    &self.cache
  }

  pub fn set_theme(&mut self, theme: Theme) -> Result<(), SettingsError> {
    if self.cache.theme == theme {
      return Ok(());
    }
    self.store.set(keys::THEME, theme.as_str())?;
    self.cache.theme = theme;
    Ok(())
  }

  pub fn update_app<F>(&mut self, update: F) -> Result<(), SettingsError>
  where
    F: FnOnce(&mut AppSettings) -> Result<(), SettingsError>,
  {
    let mut next = self.cache.app.clone();
    update(&mut next)?;
    if next != self.cache.app {
      self
        .store
        .set(keys::APP_SETTINGS, &serde_json::to_string(&next)?)?;
      self.cache.app = next;
    }
    Ok(())
  }

  pub fn sign_in(&mut self) -> Result<(), SettingsError> {
    self.store.set(keys::IS_AUTHENTICATED, "true")?;
    self.cache.authenticated = true;
    Ok(())
  }

  /// 退出登录同时清除应用设置
  pub fn sign_out(&mut self) -> Result<(), SettingsError> {
    self.store.remove(keys::IS_AUTHENTICATED)?;
    self.store.remove(keys::APP_SETTINGS)?;
    self.cache.authenticated = false;
    self.cache.app = AppSettings::default();
    Ok(())
  }

  pub fn into_store(self) -> S {
    self.store
  }
}
