// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/api/transport.rs - HTTP 传输层
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

use reqwest::blocking::{Client, multipart};
use reqwest::header::ACCEPT;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Error, Debug)]
pub enum TransportError {
  #[error("无效的请求地址 '{0}': {1}")]
  InvalidUrl(String, url::ParseError),
  #[error("HTTP 请求失败: {0}")]
  Http(#[from] reqwest::Error),
  #[error("连接失败: {0}")]
  Unreachable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// multipart 上传表单：一个 `file` 字段加若干文本字段
#[derive(Debug, Clone, PartialEq)]
pub struct UploadForm {
  pub file: Vec<u8>,
  pub file_name: String,
  pub mime: String,
  pub fields: Vec<(String, String)>,
}

impl UploadForm {
  pub fn jpeg(file: Vec<u8>) -> Self {
    Self {
      file,
      file_name: "image.jpg".to_string(),
      mime: "image/jpeg".to_string(),
      fields: Vec::new(),
    }
  }

  pub fn field(mut self, name: &str, value: impl ToString) -> Self {
    self.fields.push((name.to_string(), value.to_string()));
    self
  }
}

/// `path` 相对于服务根地址解析；绝对地址原样使用
pub trait Transport: Send + Sync {
  fn get(&self, path: &str) -> Result<HttpResponse, TransportError>;
  fn post_form(&self, path: &str, form: UploadForm) -> Result<HttpResponse, TransportError>;

  /// 覆盖默认超时的 GET，用于连通性检查
  fn get_with_timeout(&self, path: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
    let _ = timeout;
    self.get(path)
  }
}

pub struct HttpTransport {
  base: Url,
  client: Client,
}

impl HttpTransport {
  pub fn new(base: Url, timeout: Duration) -> Result<Self, TransportError> {
    let client = Client::builder()
      .timeout(timeout)
      .user_agent(concat!("andan/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { base, client })
  }

  pub fn base(&self) -> &Url {
    &self.base
  }

  fn resolve(&self, path: &str) -> Result<Url, TransportError> {
    self
      .base
      .join(path)
      .map_err(|e| TransportError::InvalidUrl(path.to_string(), e))
  }
}

impl Transport for HttpTransport {
  fn get(&self, path: &str) -> Result<HttpResponse, TransportError> {
    let url = self.resolve(path)?;
    debug!("GET {}", url);
    let response = self.client.get(url).header(ACCEPT, "application/json").send()?;
    let status = response.status().as_u16();
    let body = response.bytes()?.to_vec();
    Ok(HttpResponse { status, body })
  }

  fn get_with_timeout(&self, path: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
    let url = self.resolve(path)?;
    debug!("GET {} (超时 {:?})", url, timeout);
    let response = self.client.get(url).timeout(timeout).send()?;
    let status = response.status().as_u16();
    let body = response.bytes()?.to_vec();
    Ok(HttpResponse { status, body })
  }

  fn post_form(&self, path: &str, form: UploadForm) -> Result<HttpResponse, TransportError> {
    let url = self.resolve(path)?;
    debug!("POST {} ({} 字节)", url, form.file.len());
    let part = multipart::Part::bytes(form.file)
      .file_name(form.file_name)
      .mime_str(&form.mime)?;
    let mut body = multipart::Form::new().part("file", part);
    for (name, value) in form.fields {
      body = body.text(name, value);
    }
    let response = self
      .client
      .post(url)
      .header(ACCEPT, "application/json")
      .multipart(body)
      .send()?;
    let status = response.status().as_u16();
    let bytes = response.bytes()?.to_vec();
    Ok(HttpResponse {
      status,
      body: bytes,
    })
  }
}
