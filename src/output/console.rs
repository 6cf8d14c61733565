// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/output/console.rs - 终端结果报告
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

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Write;

use thiserror::Error;
use url::Url;

use crate::api::TestResult;
use crate::calibration::{
  ConcentrationStatus, GRADIENT_STEPS, LinearCalibration, concentration_range, gradient_stops,
  marker_position,
};
use crate::frame::SampleFrame;
use crate::output::Render;
use crate::settings::Units;
use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum ConsoleReportError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

/// 将分析结果以文本形式写到标准输出
#[derive(Debug, Clone, Default)]
pub struct ConsoleReport {
  units: Units,
  calibration: LinearCalibration,
}

impl FromUrlWithScheme for ConsoleReport {
  const SCHEME: &'static str = "console";
}

impl FromUrl for ConsoleReport {
  type Error = ConsoleReportError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(ConsoleReportError::SchemeMismatch);
    }
    let query_pairs: HashMap<_, _> = uri.query_pairs().collect();
    let units = match query_pairs.get("units").map(|v| v.to_ascii_lowercase()) {
      Some(v) if v == "imperial" => Units::Imperial,
      _ => Units::Metric,
    };
    Ok(Self {
      units,
      ..Default::default()
    })
  }
}

impl ConsoleReport {
  pub fn new(units: Units, calibration: LinearCalibration) -> Self {
    Self { units, calibration }
  }

  pub fn calibration(mut self, calibration: LinearCalibration) -> Self {
    self.calibration = calibration;
    self
  }

  pub fn report(&self, result: &TestResult) -> String {
    let mut out = String::new();
    let status = ConcentrationStatus::classify(result.concentration);
    let label = self.units.concentration_label();
    let value = self.units.convert_mg_per_l(result.concentration);

    let _ = writeln!(out, "Ammonia Test Results");
    let _ = writeln!(out, "  Concentration : {:.2} {}", value, label);
    let _ = writeln!(out, "  Status        : {} ({})", status, status.color_hex());
    let _ = writeln!(out, "  Confidence    : {:.0}%", result.confidence * 100.0);
    let _ = writeln!(out, "  Sample        : {}", result.sample.sample_id);
    let _ = writeln!(out, "  Location      : {}", result.sample.location);
    let _ = writeln!(out, "  Analyst       : {}", result.sample.analyst);
    let _ = writeln!(out, "  Method        : {}", result.sample.method);
    let _ = writeln!(
      out,
      "  Received      : {}",
      result.received_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
      out,
      "  Color         : {} (original {})",
      result.color.hex, result.original_color.hex
    );
    if let Some(distance) = result.distance {
      let _ = writeln!(out, "  Distance      : {:.3}", distance);
    }

    let _ = writeln!(out, "Calibration");
    let _ = writeln!(
      out,
      "  Curve         : {} (R² = {})",
      self.calibration.equation(),
      self.calibration.r_squared
    );
    let _ = writeln!(
      out,
      "  Red intensity : {:.1} expected",
      self.calibration.predicted_intensity(result.concentration)
    );
    match concentration_range(&result.chart)
      .and_then(|(min, max)| Ok((min, max, marker_position(result.concentration, min, max)?)))
    {
      Ok((min, max, position)) => {
        let _ = writeln!(
          out,
          "  Range         : {:.2} - {:.2} mg/L, marker at {:.0}%",
          min,
          max,
          position * 100.0
        );
      }
      Err(e) => {
        let _ = writeln!(out, "  Range         : unavailable ({})", e);
      }
    }
    let stops = gradient_stops(&result.chart, GRADIENT_STEPS);
    if !stops.is_empty() {
      let scale: Vec<String> = stops
        .iter()
        .map(|s| format!("{} {}", s.label, s.hex))
        .collect();
      let _ = writeln!(out, "  Scale         : {}", scale.join(" | "));
    }
    if !result.history.is_empty() {
      let _ = writeln!(out, "  History       : {} earlier readings", result.history.len());
    }
    out
  }
}

impl Render<SampleFrame, TestResult> for ConsoleReport {
  type Error = ConsoleReportError;

  fn render_result(&self, _frame: &SampleFrame, result: &TestResult) -> Result<(), Self::Error> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(self.report(result).as_bytes())?;
    stdout.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{CalibrationPoint, SampleInfo};
  use crate::output::tests::result_with;

  fn point(concentration: f64, hex: &str) -> CalibrationPoint {
    CalibrationPoint {
      concentration,
      hex: hex.to_string(),
      rgb: Default::default(),
      red: None,
    }
  }

  #[test]
  fn test_report_includes_status_and_marker() {
    let mut result = result_with(5.0, SampleInfo::new(chrono::Utc::now()));
    result.chart = vec![point(0.0, "#FFFFFF"), point(10.0, "#000000")];
    let text = ConsoleReport::default().report(&result);
    assert!(text.contains("5.00 mg/L"));
    assert!(text.contains("Danger"));
    assert!(text.contains("marker at 50%"));
    assert!(text.contains("y = -14.492x + 250.63"));
  }

  #[test]
  fn test_degenerate_chart_is_reported() {
    let mut result = result_with(0.05, SampleInfo::new(chrono::Utc::now()));
    result.chart = vec![point(1.0, "#FFFFFF")];
    let text = ConsoleReport::new(Units::Imperial, LinearCalibration::default()).report(&result);
    assert!(text.contains("gr/gal"));
    assert!(text.contains("Safe"));
    assert!(text.contains("unavailable"));
  }

  #[test]
  fn test_from_url_units() {
    let url = Url::parse("console://?units=imperial").unwrap();
    let report = ConsoleReport::from_url(&url).unwrap();
    assert_eq!(report.units, Units::Imperial);
  }
}
