// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/api/model.rs - 服务端响应结构与边界校验
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

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
  pub r: u8,
  pub g: u8,
  pub b: u8,
}

impl Rgb {
  /// 解析 `#RRGGBB`（`#` 可省略）
  pub fn from_hex(hex: &str) -> Option<Self> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
      return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some(Rgb {
      r: channel(0)?,
      g: channel(2)?,
      b: channel(4)?,
    })
  }

  pub fn to_hex(&self) -> String {
    format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSwatch {
  pub hex: String,
  pub rgb: Rgb,
}

impl Default for ColorSwatch {
  fn default() -> Self {
    Self {
      hex: "#000000".to_string(),
      rgb: Rgb::default(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
  pub concentration: f64,
  pub hex: String,
  #[serde(default)]
  pub rgb: Rgb,
  #[serde(rename = "Red", default, skip_serializing_if = "Option::is_none")]
  pub red: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub concentration: f64,
  pub color_hex: String,
  pub timestamp: String,
}

impl HistoryEntry {
  /// 服务端时间戳格式不固定，依次尝试 RFC 3339 与几种无时区格式（视为 UTC）
  pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
    let raw = self.timestamp.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
      return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%a, %d %b %Y %H:%M:%S GMT"]
      .iter()
      .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
      .map(|naive| naive.and_utc())
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValidationResponse {
  pub status: String,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub action: Option<String>,
}

/// 颜色预检结果
#[derive(Debug, Clone, PartialEq)]
pub enum ColorValidation {
  Accepted,
  Rejected { message: String, action: String },
}

impl ValidationResponse {
  pub fn into_validation(self) -> Option<ColorValidation> {
    match self.status.as_str() {
      "ok" => Some(ColorValidation::Accepted),
      "error" => Some(ColorValidation::Rejected {
        message: self.message.unwrap_or_default(),
        action: self.action.unwrap_or_default(),
      }),
      _ => None,
    }
  }
}

/// 服务端会把空列表写成 `null`
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// `/predict` 的原始响应，所有字段均可缺失，在 [`PredictResponse::into_result`] 中校验
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictResponse {
  #[serde(default)]
  pub ammonia_concentration: Option<f64>,
  #[serde(default)]
  pub color: Option<ColorSwatch>,
  #[serde(default)]
  pub original_color: Option<ColorSwatch>,
  #[serde(default, deserialize_with = "null_as_empty")]
  pub history: Vec<HistoryEntry>,
  #[serde(default, deserialize_with = "null_as_empty")]
  pub chart: Vec<CalibrationPoint>,
  #[serde(default)]
  pub saved_image: Option<String>,
  #[serde(default)]
  pub enhanced_image: Option<String>,
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub distance: Option<f64>,
}

impl PredictResponse {
  /// 缺少或非有限的浓度值视为格式错误
  pub fn into_result(self, sample: SampleInfo) -> Option<TestResult> {
    let concentration = self.ammonia_concentration.filter(|c| c.is_finite())?;
    let method = self
      .saved_image
      .clone()
      .filter(|s| !s.is_empty())
      .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    Some(TestResult {
      concentration,
      confidence: 1.0,
      received_at: Utc::now(),
      sample: SampleInfo { method, ..sample },
      instrument: InstrumentInfo::default(),
      color: self.color.unwrap_or_default(),
      original_color: self.original_color.unwrap_or_default(),
      history: self.history,
      chart: self.chart,
      saved_image: self.saved_image.unwrap_or_default(),
      enhanced_image: self.enhanced_image.unwrap_or_default(),
      success: self.success,
      distance: self.distance.filter(|d| d.is_finite()),
    })
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
  #[serde(default, deserialize_with = "null_as_empty")]
  pub history: Vec<HistoryEntry>,
  #[serde(default, deserialize_with = "null_as_empty")]
  pub chart: Vec<CalibrationPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleInfo {
  pub sample_id: String,
  pub location: String,
  pub collection_time: DateTime<Utc>,
  pub analyst: String,
  pub method: String,
}

static SAMPLE_SEQUENCE: AtomicU32 = AtomicU32::new(0);

impl SampleInfo {
  /// 生成 `SAMPLE-<毫秒时间戳>-<序号>` 形式的样本编号
  pub fn new(collection_time: DateTime<Utc>) -> Self {
    let seq = SAMPLE_SEQUENCE.fetch_add(1, Ordering::Relaxed) % 1000;
    Self {
      sample_id: format!("SAMPLE-{}-{:03}", Utc::now().timestamp_millis(), seq),
      location: "Unknown Location".to_string(),
      collection_time,
      analyst: NOT_AVAILABLE.to_string(),
      method: NOT_AVAILABLE.to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
  pub model: String,
  pub serial_number: String,
  pub status: String,
}

impl Default for InstrumentInfo {
  fn default() -> Self {
    Self {
      model: NOT_AVAILABLE.to_string(),
      serial_number: NOT_AVAILABLE.to_string(),
      status: NOT_AVAILABLE.to_string(),
    }
  }
}

/// 一次分析的完整结果，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
  /// 氨氮浓度，mg/L
  pub concentration: f64,
  pub confidence: f64,
  pub received_at: DateTime<Utc>,
  pub sample: SampleInfo,
  pub instrument: InstrumentInfo,
  pub color: ColorSwatch,
  pub original_color: ColorSwatch,
  pub history: Vec<HistoryEntry>,
  pub chart: Vec<CalibrationPoint>,
  pub saved_image: String,
  pub enhanced_image: String,
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub distance: Option<f64>,
}
