// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/api/mock_transport.rs - 用于测试与离线演示的模拟传输层
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

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::api::transport::{HttpResponse, Transport, TransportError, UploadForm};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
  pub method: &'static str,
  pub path: String,
  pub form: Option<UploadForm>,
}

/// 按路径排队的预设响应；队列只剩一条时重复使用，没有预设的路径返回连接失败
#[derive(Debug, Default)]
pub struct MockTransport {
  responses: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
  requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(self, path: &str, status: u16, body: &str) -> Self {
    if let Ok(mut responses) = self.responses.lock() {
      responses
        .entry(path.to_string())
        .or_default()
        .push_back(HttpResponse {
          status,
          body: body.as_bytes().to_vec(),
        });
    }
    self
  }

  pub fn respond_bytes(self, path: &str, status: u16, body: Vec<u8>) -> Self {
    if let Ok(mut responses) = self.responses.lock() {
      responses
        .entry(path.to_string())
        .or_default()
        .push_back(HttpResponse { status, body });
    }
    self
  }

  pub fn requests(&self) -> Vec<RecordedRequest> {
    self.requests.lock().map(|r| r.clone()).unwrap_or_default()
  }

  pub fn calls_to(&self, path: &str) -> usize {
    self.requests().iter().filter(|r| r.path == path).count()
  }

  fn next_response(&self, path: &str) -> Result<HttpResponse, TransportError> {
    let mut responses = self
      .responses
      .lock()
      .map_err(|_| TransportError::Unreachable(path.to_string()))?;
    let queue = responses
      .get_mut(path)
      .ok_or_else(|| TransportError::Unreachable(path.to_string()))?;
    let response = if queue.len() > 1 {
      queue.pop_front()
    } else {
      queue.front().cloned()
    };
    response.ok_or_else(|| TransportError::Unreachable(path.to_string()))
  }

  fn record(&self, method: &'static str, path: &str, form: Option<UploadForm>) {
    if let Ok(mut requests) = self.requests.lock() {
      requests.push(RecordedRequest {
        method,
        path: path.to_string(),
        form,
      });
    }
  }
}

impl Transport for MockTransport {
  fn get(&self, path: &str) -> Result<HttpResponse, TransportError> {
    self.record("GET", path, None);
    self.next_response(path)
  }

  fn post_form(&self, path: &str, form: UploadForm) -> Result<HttpResponse, TransportError> {
    self.record("POST", path, Some(form));
    self.next_response(path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_queue_then_repeat_last() {
    let mock = MockTransport::new()
      .respond("history", 500, "{}")
      .respond("history", 200, "{}");
    assert_eq!(mock.get("history").unwrap().status, 500);
    assert_eq!(mock.get("history").unwrap().status, 200);
    assert_eq!(mock.get("history").unwrap().status, 200);
    assert_eq!(mock.calls_to("history"), 3);
  }

  #[test]
  fn test_unknown_path_unreachable() {
    let mock = MockTransport::new();
    assert!(matches!(
      mock.get("predict"),
      Err(TransportError::Unreachable(_))
    ));
  }
}
