// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/api/client.rs - 远程分析服务客户端
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

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::api::endpoint;
use crate::api::model::{
  ColorValidation, HistoryResponse, PredictResponse, SampleInfo, TestResult, ValidationResponse,
};
use crate::api::transport::{HttpResponse, Transport, TransportError, UploadForm};
use crate::enhance::EnhanceParams;

#[derive(Error, Debug)]
pub enum ApiError {
  #[error("{0}")]
  Transport(#[from] TransportError),
  #[error("{message}")]
  Server { status: u16, message: String },
  #[error("Invalid response format from server")]
  InvalidResponseFormat,
  #[error("响应 JSON 解析失败: {0}")]
  Json(#[from] serde_json::Error),
}

/// 连通性检查的超时，短于普通请求，避免轮询线程长时间阻塞
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(5);

/// 连通性探测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
  pub online: bool,
  pub status: Option<u16>,
}

#[derive(Deserialize)]
struct ServerErrorBody {
  error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessedImage {
  image_uri: String,
}

pub struct ApiClient<T> {
  transport: T,
  process_image_path: String,
}

impl<T: Transport> ApiClient<T> {
  pub fn new(transport: T) -> Self {
    Self {
      transport,
      process_image_path: "process-image".to_string(),
    }
  }

  /// 图像增强接口可能部署在其他主机上，允许填写绝对地址
  pub fn with_process_image_path(mut self, path: &str) -> Self {
    self.process_image_path = path.to_string();
    self
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  pub fn validate_color(&self, jpeg: &[u8]) -> Result<ColorValidation, ApiError> {
    info!("颜色预检: 上传 {} 字节", jpeg.len());
    let response = self
      .transport
      .post_form(endpoint::VALIDATE_COLOR, UploadForm::jpeg(jpeg.to_vec()))?;
    let parsed: ValidationResponse = match serde_json::from_slice(&response.body) {
      Ok(parsed) => parsed,
      Err(e) if !response.is_success() => {
        return Err(server_error(&response, "Failed to validate image", e));
      }
      Err(e) => return Err(e.into()),
    };
    let validation = parsed
      .into_validation()
      .ok_or(ApiError::InvalidResponseFormat)?;
    debug!("颜色预检结果: {:?}", validation);
    Ok(validation)
  }

  pub fn predict(&self, jpeg: &[u8], sample: SampleInfo) -> Result<TestResult, ApiError> {
    info!("上传图像进行浓度预测: {} 字节", jpeg.len());
    let response = self
      .transport
      .post_form(endpoint::PREDICT, UploadForm::jpeg(jpeg.to_vec()))?;
    let raw: PredictResponse = match parse_success(&response, "Failed to analyze image") {
      Err(ApiError::Json(e)) => {
        error!("预测响应格式错误: {}", e);
        return Err(ApiError::InvalidResponseFormat);
      }
      parsed => parsed?,
    };
    match raw.into_result(sample) {
      Some(result) => {
        info!("预测完成: {:.3} mg/L", result.concentration);
        Ok(result)
      }
      None => {
        error!("预测响应缺少 ammonia_concentration 字段");
        Err(ApiError::InvalidResponseFormat)
      }
    }
  }

  pub fn history(&self) -> Result<HistoryResponse, ApiError> {
    let response = self.transport.get(endpoint::HISTORY)?;
    let history: HistoryResponse = parse_success(&response, "Failed to load history data")?;
    debug!("历史记录 {} 条", history.history.len());
    Ok(history)
  }

  /// 任意 2xx 视为在线，传输层错误视为离线
  pub fn ping(&self) -> Probe {
    self.probe(endpoint::LIVENESS)
  }

  pub fn probe(&self, path: &str) -> Probe {
    match self.transport.get_with_timeout(path, LIVENESS_TIMEOUT) {
      Ok(response) => Probe {
        online: response.is_success(),
        status: Some(response.status),
      },
      Err(e) => {
        warn!("连通性检查失败 '{}': {}", path, e);
        Probe {
          online: false,
          status: None,
        }
      }
    }
  }

  /// 服务端增强：上传原图与参数，返回处理后图像的字节
  pub fn process_image(&self, jpeg: &[u8], params: EnhanceParams) -> Result<Vec<u8>, ApiError> {
    let form = UploadForm::jpeg(jpeg.to_vec())
      .field("brightness", params.brightness)
      .field("contrast", params.contrast);
    let response = self.transport.post_form(&self.process_image_path, form)?;
    let processed: ProcessedImage = parse_success(&response, "Failed to process image on server")?;
    debug!("下载处理后的图像: {}", processed.image_uri);
    let image = self.transport.get(&processed.image_uri)?;
    if !image.is_success() {
      return Err(ApiError::Server {
        status: image.status,
        message: "Failed to download processed image".to_string(),
      });
    }
    Ok(image.body)
  }
}

fn parse_success<R: DeserializeOwned>(response: &HttpResponse, fallback: &str) -> Result<R, ApiError> {
  if !response.is_success() {
    let message = serde_json::from_slice::<ServerErrorBody>(&response.body)
      .ok()
      .and_then(|body| body.error)
      .unwrap_or_else(|| fallback.to_string());
    error!("服务端错误 (HTTP {}): {}", response.status, message);
    return Err(ApiError::Server {
      status: response.status,
      message,
    });
  }
  Ok(serde_json::from_slice(&response.body)?)
}

fn server_error(response: &HttpResponse, fallback: &str, cause: serde_json::Error) -> ApiError {
  warn!("无法解析错误响应 (HTTP {}): {}", response.status, cause);
  ApiError::Server {
    status: response.status,
    message: fallback.to_string(),
  }
}
