// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/model.rs - 远程分析模型
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

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError, ColorValidation, SampleInfo, TestResult, Transport};
use crate::frame::{DEFAULT_JPEG_QUALITY, FrameError, SampleFrame};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 上传前的颜色预检
pub trait Validate {
  type Input;
  type Error;

  fn validate(&self, input: &Self::Input) -> Result<ColorValidation, Self::Error>;
}

/// 区分本机图像处理失败与远程请求失败；前者重试无意义
pub trait LocalFailure {
  fn is_local(&self) -> bool;
}

#[derive(Error, Debug)]
pub enum AnalyzerError {
  #[error("图像编码失败: {0}")]
  Encode(#[from] FrameError),
  #[error(transparent)]
  Api(#[from] ApiError),
}

impl LocalFailure for AnalyzerError {
  fn is_local(&self) -> bool {
    matches!(self, AnalyzerError::Encode(_))
  }
}

/// 将样本图像编码为 JPEG 后交给服务端推理
pub struct RemoteAnalyzer<T> {
  client: Arc<ApiClient<T>>,
  quality: u8,
  location: Option<String>,
  analyst: Option<String>,
}

impl<T: Transport> RemoteAnalyzer<T> {
  pub fn new(client: Arc<ApiClient<T>>) -> Self {
    Self {
      client,
      quality: DEFAULT_JPEG_QUALITY,
      location: None,
      analyst: None,
    }
  }

  pub fn quality(mut self, quality: u8) -> Self {
    self.quality = quality;
    self
  }

  pub fn location(mut self, location: Option<String>) -> Self {
    self.location = location;
    self
  }

  pub fn analyst(mut self, analyst: Option<String>) -> Self {
    self.analyst = analyst;
    self
  }

  pub fn client(&self) -> &ApiClient<T> {
    &self.client
  }

  fn sample_info(&self, frame: &SampleFrame) -> SampleInfo {
    let mut sample = SampleInfo::new(frame.captured_at());
    if let Some(location) = &self.location {
      sample.location = location.clone();
    }
    if let Some(analyst) = &self.analyst {
      sample.analyst = analyst.clone();
    }
    sample
  }
}

impl<T: Transport> Validate for RemoteAnalyzer<T> {
  type Input = SampleFrame;
  type Error = AnalyzerError;

  fn validate(&self, input: &SampleFrame) -> Result<ColorValidation, AnalyzerError> {
    let jpeg = input.encode_jpeg(self.quality)?;
    debug!("颜色预检: 上传 {} 字节", jpeg.len());
    Ok(self.client.validate_color(&jpeg)?)
  }
}

impl<T: Transport> Model for RemoteAnalyzer<T> {
  type Input = SampleFrame;
  type Output = TestResult;
  type Error = AnalyzerError;

  fn infer(&self, input: &SampleFrame) -> Result<TestResult, AnalyzerError> {
    let jpeg = input.encode_jpeg(self.quality)?;
    let sample = self.sample_info(input);
    info!("提交分析: 样本 {}, {} 字节", sample.sample_id, jpeg.len());
    let now = Instant::now();
    let result = self.client.predict(&jpeg, sample)?;
    info!(
      "分析完成: {:.3} mg/L, 耗时 {:.2?}",
      result.concentration,
      now.elapsed()
    );
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::MockTransport;
  use image::{Rgba, RgbaImage};

  fn frame() -> SampleFrame {
    SampleFrame::from(RgbaImage::from_pixel(8, 8, Rgba([180, 120, 60, 255])))
  }

  #[test]
  fn test_infer_uploads_jpeg_and_fills_sample() {
    let transport = MockTransport::new().respond(
      "predict",
      200,
      r##"{"ammonia_concentration": 0.75, "color_hex": "#B4783C"}"##,
    );
    let analyzer = RemoteAnalyzer::new(Arc::new(ApiClient::new(transport)))
      .location(Some("Pond 3".to_string()));
    let result = analyzer.infer(&frame()).unwrap();
    assert_eq!(result.concentration, 0.75);
    assert_eq!(result.sample.location, "Pond 3");

    let requests = analyzer.client().transport().requests();
    assert_eq!(requests.len(), 1);
    let upload = requests[0].form.as_ref().unwrap();
    assert_eq!(&upload.file[..2], &[0xFF, 0xD8]);
  }

  #[test]
  fn test_missing_concentration_is_reported() {
    let transport = MockTransport::new().respond("predict", 200, r##"{"color_hex": "#FFFFFF"}"##);
    let analyzer = RemoteAnalyzer::new(Arc::new(ApiClient::new(transport)));
    let err = analyzer.infer(&frame()).unwrap_err();
    assert_eq!(err.to_string(), "Invalid response format from server");
  }

  #[test]
  fn test_encode_failure_is_local() {
    let analyzer = RemoteAnalyzer::new(Arc::new(ApiClient::new(MockTransport::new())));
    let empty = SampleFrame::from(RgbaImage::new(0, 0));
    let err = analyzer.validate(&empty).unwrap_err();
    assert!(err.is_local());
    assert!(analyzer.client().transport().requests().is_empty());

    let remote = analyzer.infer(&frame()).unwrap_err();
    assert!(!remote.is_local());
  }

  #[test]
  fn test_validate_maps_rejection() {
    let transport = MockTransport::new().respond(
      "validate-color",
      200,
      r#"{"status":"error","message":"Too dark","action":"Move to better light"}"#,
    );
    let analyzer = RemoteAnalyzer::new(Arc::new(ApiClient::new(transport)));
    assert_eq!(
      analyzer.validate(&frame()).unwrap(),
      ColorValidation::Rejected {
        message: "Too dark".to_string(),
        action: "Move to better light".to_string(),
      }
    );
  }
}
