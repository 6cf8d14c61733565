// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/output.rs - 结果输出
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

use thiserror::Error;
use tracing::error;
use url::Url;

use crate::api::TestResult;
use crate::calibration::LinearCalibration;
use crate::frame::SampleFrame;
use crate::{FromUrl, FromUrlWithScheme};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

mod console;
pub use self::console::{ConsoleReport, ConsoleReportError};

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[cfg(feature = "chart_render")]
mod chart;
#[cfg(feature = "chart_render")]
pub use self::chart::{ChartOutput, ChartOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("终端输出错误: {0}")]
  ConsoleReportError(#[from] ConsoleReportError),
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[cfg(feature = "chart_render")]
  #[error("图表输出错误: {0}")]
  ChartOutputError(#[from] ChartOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  ConsoleReport(ConsoleReport),
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
  #[cfg(feature = "chart_render")]
  ChartOutput(ChartOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ConsoleReport::SCHEME => Ok(OutputWrapper::ConsoleReport(ConsoleReport::from_url(url)?)),
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      #[cfg(feature = "chart_render")]
      ChartOutput::SCHEME => {
        let output = ChartOutput::from_url(url)?;
        Ok(OutputWrapper::ChartOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl OutputWrapper {
  /// 地址中不携带校准参数，由配置统一注入
  pub fn with_calibration(self, calibration: LinearCalibration) -> Self {
    match self {
      OutputWrapper::ConsoleReport(output) => OutputWrapper::ConsoleReport(output.calibration(calibration)),
      #[cfg(feature = "chart_render")]
      OutputWrapper::ChartOutput(output) => OutputWrapper::ChartOutput(output.calibration(calibration)),
      #[allow(unreachable_patterns)]
      other => other,
    }
  }
}

impl Render<SampleFrame, TestResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &SampleFrame, result: &TestResult) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::ConsoleReport(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "chart_render")]
      OutputWrapper::ChartOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

/// 多个输出依次渲染；某个输出失败不影响其余输出，返回第一个错误
#[derive(Default)]
pub struct OutputList {
  outputs: Vec<OutputWrapper>,
}

impl OutputList {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, output: OutputWrapper) {
    self.outputs.push(output);
  }

  pub fn len(&self) -> usize {
    self.outputs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.outputs.is_empty()
  }
}

impl FromIterator<OutputWrapper> for OutputList {
  fn from_iter<I: IntoIterator<Item = OutputWrapper>>(iter: I) -> Self {
    Self {
      outputs: iter.into_iter().collect(),
    }
  }
}

impl Render<SampleFrame, TestResult> for OutputList {
  type Error = OutputError;

  fn render_result(&self, frame: &SampleFrame, result: &TestResult) -> Result<(), Self::Error> {
    let mut first_error = None;
    for output in &self.outputs {
      if let Err(e) = output.render_result(frame, result) {
        error!("输出失败: {}", e);
        first_error.get_or_insert(e);
      }
    }
    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::api::{ColorSwatch, InstrumentInfo, SampleInfo};
  use chrono::Utc;

  pub(crate) fn result_with(concentration: f64, sample: SampleInfo) -> TestResult {
    TestResult {
      concentration,
      confidence: 1.0,
      received_at: Utc::now(),
      sample,
      instrument: InstrumentInfo::default(),
      color: ColorSwatch::default(),
      original_color: ColorSwatch::default(),
      history: Vec::new(),
      chart: Vec::new(),
      saved_image: String::new(),
      enhanced_image: String::new(),
      success: true,
      distance: None,
    }
  }

  #[test]
  fn test_configured_calibration_reaches_console() {
    let calibration = LinearCalibration {
      slope: -10.0,
      intercept: 200.0,
      r_squared: 0.9,
    };
    let url = Url::parse("console://?units=metric").unwrap();
    let output = OutputWrapper::from_url(&url).unwrap().with_calibration(calibration);
    let OutputWrapper::ConsoleReport(report) = output else {
      panic!("expected a console report");
    };
    let text = report.report(&result_with(1.0, SampleInfo::new(Utc::now())));
    assert!(text.contains("y = -10x + 200"));
    assert!(text.contains("190.0 expected"));
  }

  #[test]
  fn test_wrapper_dispatch() {
    let url = Url::parse("rtsp://camera/out").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch)
    ));
    let url = Url::parse("console://").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::ConsoleReport(_))
    ));
  }

  #[cfg(feature = "save_image_file")]
  #[test]
  fn test_list_continues_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "file, not a directory").unwrap();
    let good = dir.path().join("good.jpg");

    let list: OutputList = [
      OutputWrapper::SaveImageFileOutput(SaveImageFileOutput::new(&blocker.join("bad.jpg"))),
      OutputWrapper::SaveImageFileOutput(SaveImageFileOutput::new(&good)),
    ]
    .into_iter()
    .collect();
    let frame = SampleFrame::from(image::RgbaImage::new(2, 2));
    let result = result_with(0.2, SampleInfo::new(Utc::now()));

    assert!(list.render_result(&frame, &result).is_err());
    assert!(good.is_file());
  }
}
