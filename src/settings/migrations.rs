// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/settings/migrations.rs - 本地存储结构版本迁移
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

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::settings::store::{KeyValueStore, StoreError};
use crate::settings::{AppSettings, Theme, keys};

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

type Migration = fn(&mut dyn KeyValueStore) -> Result<(), StoreError>;

const MIGRATIONS: &[(u32, Migration)] = &[(1, migrate_v1)];

/// 依次执行高于已记录版本的迁移，每步完成后写回版本号
pub fn ensure_schema(store: &mut dyn KeyValueStore) -> Result<u32, StoreError> {
  let current = match store.get(keys::SCHEMA_VERSION)? {
    Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
      warn!("无法识别的存储版本 '{}', 按 0 处理", raw);
      0
    }),
    None => 0,
  };

  let mut version = current;
  for (target, migration) in MIGRATIONS {
    if *target <= version {
      continue;
    }
    info!("迁移本地存储: v{} -> v{}", version, target);
    migration(store)?;
    store.set(keys::SCHEMA_VERSION, &target.to_string())?;
    version = *target;
  }
  Ok(version)
}

/// v0 -> v1：
/// - 旧版 appSettings.darkMode 在未设置 theme 时折算为 theme
/// - appSettings 缺失字段补默认值，无法解析时整体重置
/// - 非法的 theme 值删除
fn migrate_v1(store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
  if let Some(raw) = store.get(keys::APP_SETTINGS)? {
    let mut object = match serde_json::from_str::<Value>(&raw) {
      Ok(Value::Object(object)) => object,
      _ => {
        warn!("appSettings 无法解析, 重置为默认值");
        Map::new()
      }
    };

    if let Some(dark) = object.remove("darkMode").and_then(|v| v.as_bool())
      && store.get(keys::THEME)?.is_none()
    {
      let theme = if dark { Theme::Dark } else { Theme::Light };
      store.set(keys::THEME, theme.as_str())?;
    }

    let defaults = serde_json::to_value(AppSettings::default())?;
    if let Value::Object(defaults) = defaults {
      for (key, value) in defaults {
        object.entry(key).or_insert(value);
      }
    }
    store.set(keys::APP_SETTINGS, &Value::Object(object).to_string())?;
  }

  if let Some(theme) = store.get(keys::THEME)?
    && theme.parse::<Theme>().is_err()
  {
    warn!("删除非法的 theme 值 '{}'", theme);
    store.remove(keys::THEME)?;
  }
  Ok(())
}
