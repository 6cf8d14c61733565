// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/calibration.rs - 校准曲线计算
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::CalibrationPoint;

/// 色阶条的默认分段数
pub const GRADIENT_STEPS: usize = 8;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
  #[error("校准区间退化: 最小浓度与最大浓度相同 ({0})")]
  DegenerateRange(f64),
  #[error("校准数据为空")]
  EmptyChart,
  #[error("采样点数量至少为 2, 实际为 {0}")]
  TooFewPoints(usize),
}

/// 浓度 -> 红色通道强度 的线性模型
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearCalibration {
  pub slope: f64,
  pub intercept: f64,
  pub r_squared: f64,
}

impl Default for LinearCalibration {
  fn default() -> Self {
    Self {
      slope: -14.492,
      intercept: 250.63,
      r_squared: 0.994,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
  pub concentration: f64,
  pub intensity: f64,
}

impl LinearCalibration {
  pub fn predicted_intensity(&self, concentration: f64) -> f64 {
    (self.slope * concentration + self.intercept).clamp(0.0, 255.0)
  }

  /// 在 [min, max] 上均匀取 `count` 个点，浓度保留两位、强度保留一位小数
  pub fn linear_points(&self, min: f64, max: f64, count: usize) -> Result<Vec<CurvePoint>, CalibrationError> {
    if count < 2 {
      return Err(CalibrationError::TooFewPoints(count));
    }
    let step = (max - min) / (count - 1) as f64;
    Ok(
      (0..count)
        .map(|i| {
          let concentration = min + i as f64 * step;
          CurvePoint {
            concentration: round_to(concentration, 2),
            intensity: round_to(self.predicted_intensity(concentration), 1),
          }
        })
        .collect(),
    )
  }

  /// 方程文本，例如 `y = -14.492x + 250.63`
  pub fn equation(&self) -> String {
    let sign = if self.intercept < 0.0 { '-' } else { '+' };
    format!("y = {}x {} {}", self.slope, sign, self.intercept.abs())
  }
}

/// 当前读数在坐标轴上的相对位置，不做截断（可能落在 [0, 1] 之外）
pub fn marker_position(concentration: f64, min: f64, max: f64) -> Result<f64, CalibrationError> {
  let range = max - min;
  if range == 0.0 {
    return Err(CalibrationError::DegenerateRange(min));
  }
  Ok((concentration - min) / range)
}

/// 校准数据的浓度范围
pub fn concentration_range(chart: &[CalibrationPoint]) -> Result<(f64, f64), CalibrationError> {
  let mut iter = chart.iter().map(|p| p.concentration);
  let first = iter.next().ok_or(CalibrationError::EmptyChart)?;
  Ok(iter.fold((first, first), |(lo, hi), c| (lo.min(c), hi.max(c))))
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradientStop {
  pub hex: String,
  pub label: String,
}

/// 按浓度排序后等距抽取色阶
pub fn gradient_stops(chart: &[CalibrationPoint], steps: usize) -> Vec<GradientStop> {
  if chart.is_empty() || steps == 0 {
    return Vec::new();
  }
  let mut sorted: Vec<&CalibrationPoint> = chart.iter().collect();
  sorted.sort_by(|a, b| a.concentration.total_cmp(&b.concentration));

  let stride = sorted.len() / steps;
  (0..steps)
    .map(|i| {
      let point = sorted[(i * stride).min(sorted.len() - 1)];
      GradientStop {
        hex: point.hex.clone(),
        label: format!("{:.1}", point.concentration),
      }
    })
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcentrationStatus {
  Safe,
  Warning,
  Danger,
}

impl ConcentrationStatus {
  pub fn classify(concentration: f64) -> Self {
    if concentration < 0.1 {
      ConcentrationStatus::Safe
    } else if concentration < 0.5 {
      ConcentrationStatus::Warning
    } else {
      ConcentrationStatus::Danger
    }
  }

  pub fn color_hex(&self) -> &'static str {
    match self {
      ConcentrationStatus::Safe => "#10B981",
      ConcentrationStatus::Warning => "#F59E0B",
      ConcentrationStatus::Danger => "#EF4444",
    }
  }
}

impl std::fmt::Display for ConcentrationStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let text = match self {
      ConcentrationStatus::Safe => "Safe",
      ConcentrationStatus::Warning => "Warning",
      ConcentrationStatus::Danger => "Danger",
    };
    f.write_str(text)
  }
}

fn round_to(value: f64, digits: i32) -> f64 {
  let factor = 10f64.powi(digits);
  (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::Rgb;

  fn point(concentration: f64, hex: &str) -> CalibrationPoint {
    CalibrationPoint {
      concentration,
      hex: hex.to_string(),
      rgb: Rgb::default(),
      red: None,
    }
  }

  #[test]
  fn test_intercept_at_zero() {
    let cal = LinearCalibration::default();
    assert!((cal.predicted_intensity(0.0) - 250.63).abs() < 1e-9);
  }

  #[test]
  fn test_intensity_non_increasing_and_clamped() {
    let cal = LinearCalibration::default();
    let mut last = f64::INFINITY;
    for i in 0..400 {
      let value = cal.predicted_intensity(i as f64 * 0.1);
      assert!(value <= last);
      assert!((0.0..=255.0).contains(&value));
      last = value;
    }
    assert_eq!(cal.predicted_intensity(100.0), 0.0);
    assert_eq!(cal.predicted_intensity(-100.0), 255.0);
  }

  #[test]
  fn test_marker_midpoint() {
    assert_eq!(marker_position(5.0, 0.0, 10.0).unwrap(), 0.5);
    assert_eq!(marker_position(12.0, 0.0, 10.0).unwrap(), 1.2);
    assert_eq!(
      marker_position(3.0, 2.0, 2.0),
      Err(CalibrationError::DegenerateRange(2.0))
    );
  }

  #[test]
  fn test_linear_points_endpoints() {
    let cal = LinearCalibration::default();
    let points = cal.linear_points(0.0, 10.0, 20).unwrap();
    assert_eq!(points.len(), 20);
    assert_eq!(points[0].concentration, 0.0);
    assert_eq!(points[0].intensity, 250.6);
    assert_eq!(points[19].concentration, 10.0);
    assert_eq!(points[19].intensity, 105.7);
    assert!(cal.linear_points(0.0, 1.0, 1).is_err());
  }

  #[test]
  fn test_range_and_gradient() {
    let chart: Vec<_> = (0..16)
      .rev()
      .map(|i| point(i as f64 * 0.5, &format!("#0000{:02X}", i)))
      .collect();
    assert_eq!(concentration_range(&chart).unwrap(), (0.0, 7.5));
    assert_eq!(concentration_range(&[]), Err(CalibrationError::EmptyChart));

    let stops = gradient_stops(&chart, GRADIENT_STEPS);
    assert_eq!(stops.len(), 8);
    assert_eq!(stops[0].hex, "#000000");
    assert_eq!(stops[1].label, "1.0");
    assert_eq!(stops[7].hex, "#00000E");
  }

  #[test]
  fn test_gradient_with_fewer_points_than_steps() {
    let chart = vec![point(1.0, "#111111"), point(0.0, "#000000")];
    let stops = gradient_stops(&chart, GRADIENT_STEPS);
    assert_eq!(stops.len(), 8);
    assert!(stops.iter().all(|s| s.hex == "#000000"));
  }

  #[test]
  fn test_status_thresholds() {
    assert_eq!(ConcentrationStatus::classify(0.05), ConcentrationStatus::Safe);
    assert_eq!(ConcentrationStatus::classify(0.1), ConcentrationStatus::Warning);
    assert_eq!(ConcentrationStatus::classify(0.5), ConcentrationStatus::Danger);
  }

  #[test]
  fn test_equation_text() {
    assert_eq!(LinearCalibration::default().equation(), "y = -14.492x + 250.63");
  }
}
