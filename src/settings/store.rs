// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/settings/store.rs - 本地键值存储
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

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("存储文件格式错误: {0}")]
  Format(#[from] serde_json::Error),
}

/// 字符串键值存储，语义与移动端 AsyncStorage 相同
pub trait KeyValueStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
  fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
  fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
  entries: BTreeMap<String, String>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, key: &str, value: &str) -> Self {
    self.entries.insert(key.to_string(), value.to_string());
    self
  }
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    Ok(self.entries.get(key).cloned())
  }

  fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
    self.entries.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&mut self, key: &str) -> Result<(), StoreError> {
    self.entries.remove(key);
    Ok(())
  }
}

/// 单个 JSON 对象文件；每次写入先写临时文件再改名
#[derive(Debug)]
pub struct FileStore {
  path: PathBuf,
  entries: BTreeMap<String, String>,
}

impl FileStore {
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    let entries = if path.exists() {
      let content = std::fs::read_to_string(path)?;
      if content.trim().is_empty() {
        BTreeMap::new()
      } else {
        serde_json::from_str(&content)?
      }
    } else {
      BTreeMap::new()
    };
    debug!("打开键值存储 {}: {} 项", path.display(), entries.len());
    Ok(Self {
      path: path.to_path_buf(),
      entries,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn flush(&self) -> Result<(), StoreError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let tmp = self.path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(&self.entries)?)?;
    std::fs::rename(&tmp, &self.path)?;
    Ok(())
  }
}

impl KeyValueStore for FileStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    Ok(self.entries.get(key).cloned())
  }

  fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
    self.entries.insert(key.to_string(), value.to_string());
    self.flush()
  }

  fn remove(&mut self, key: &str) -> Result<(), StoreError> {
    if self.entries.remove(key).is_some() {
      self.flush()?;
    }
    Ok(())
  }
}
