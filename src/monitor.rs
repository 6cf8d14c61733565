// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/monitor.rs - 服务端在线状态轮询
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

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, Probe, Transport};

/// 最近一次检查的结果；尚未检查时 `online` 为 `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStatus {
  pub online: Option<bool>,
  pub last_check: Option<DateTime<Utc>>,
  pub checks: u64,
}

pub struct ServerMonitor;

impl ServerMonitor {
  /// 启动后台轮询：立即检查一次，之后每隔 `interval` 检查
  pub fn spawn<T>(client: Arc<ApiClient<T>>, interval: Duration) -> MonitorHandle
  where
    T: Transport + 'static,
  {
    Self::spawn_with(client, interval, |_| {})
  }

  /// 与 `spawn` 相同，每次检查后回调 `on_check`
  pub fn spawn_with<T, F>(client: Arc<ApiClient<T>>, interval: Duration, on_check: F) -> MonitorHandle
  where
    T: Transport + 'static,
    F: Fn(ServerStatus) + Send + 'static,
  {
    let status = Arc::new(Mutex::new(ServerStatus::default()));
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let shared = Arc::clone(&status);
    let worker = thread::spawn(move || {
      info!("开始轮询服务端状态, 间隔 {:.0?}", interval);
      loop {
        let Probe { online, .. } = client.ping();
        let snapshot = match shared.lock() {
          Ok(mut guard) => {
            if guard.online != Some(online) {
              info!("服务端状态: {}", if online { "在线" } else { "离线" });
            }
            guard.online = Some(online);
            guard.last_check = Some(Utc::now());
            guard.checks += 1;
            *guard
          }
          Err(_) => {
            warn!("状态锁已失效, 停止轮询");
            break;
          }
        };
        on_check(snapshot);

        match stop_rx.recv_timeout(interval) {
          Err(RecvTimeoutError::Timeout) => continue,
          Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
      }
      debug!("服务端状态轮询已停止");
    });

    MonitorHandle {
      status,
      stop: Some(stop_tx),
      worker: Some(worker),
    }
  }
}

/// 轮询线程的句柄；`stop` 结束轮询并等待线程退出，离开作用域时只发出通知
pub struct MonitorHandle {
  status: Arc<Mutex<ServerStatus>>,
  stop: Option<Sender<()>>,
  worker: Option<JoinHandle<()>>,
}

impl MonitorHandle {
  pub fn status(&self) -> ServerStatus {
    self.status.lock().map(|guard| *guard).unwrap_or_default()
  }

  pub fn is_running(&self) -> bool {
    self.worker.as_ref().is_some_and(|w| !w.is_finished())
  }

  pub fn stop(&mut self) {
    if let Some(stop) = self.stop.take() {
      let _ = stop.send(());
    }
    if let Some(worker) = self.worker.take()
      && worker.join().is_err()
    {
      warn!("轮询线程异常退出");
    }
  }
}

/// 离开作用域时只通知线程退出，不等待进行中的检查
impl Drop for MonitorHandle {
  fn drop(&mut self) {
    if let Some(stop) = self.stop.take() {
      let _ = stop.send(());
    }
    if let Some(worker) = self.worker.take()
      && !worker.is_finished()
    {
      debug!("轮询线程将在当前检查结束后退出");
    }
  }
}

/// 连通性报告：服务端与可选参考地址的探测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
  pub server: Probe,
  pub reference: Option<(String, Probe)>,
}

impl ConnectionReport {
  pub fn collect<T: Transport>(client: &ApiClient<T>, reference_url: Option<&str>) -> Self {
    let server = client.ping();
    let reference = reference_url.map(|url| (url.to_string(), client.probe(url)));
    Self { server, reference }
  }

  pub fn summary(&self) -> String {
    let describe = |probe: &Probe| match probe.status {
      Some(code) => format!("HTTP {}{}", code, if probe.online { "" } else { " (异常)" }),
      None => "无法连接".to_string(),
    };
    let mut lines = vec![format!("服务端: {}", describe(&self.server))];
    if let Some((url, probe)) = &self.reference {
      lines.push(format!("参考地址 {}: {}", url, describe(probe)));
    }
    lines.join("\n")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{HttpResponse, MockTransport, TransportError, UploadForm};
  use std::time::Instant;

  fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
      if condition() {
        return true;
      }
      thread::sleep(Duration::from_millis(5));
    }
    false
  }

  #[test]
  fn test_first_check_is_immediate() {
    let client = Arc::new(ApiClient::new(MockTransport::new().respond("", 200, "ok")));
    let handle = ServerMonitor::spawn(client, Duration::from_secs(3600));
    assert!(wait_for(|| handle.status().online == Some(true)));
    assert_eq!(handle.status().checks, 1);
  }

  #[test]
  fn test_polls_repeatedly_and_stops() {
    let client = Arc::new(ApiClient::new(MockTransport::new().respond("", 503, "")));
    let mut handle = ServerMonitor::spawn(Arc::clone(&client), Duration::from_millis(10));
    assert!(wait_for(|| handle.status().checks >= 3));
    assert_eq!(handle.status().online, Some(false));

    handle.stop();
    assert!(!handle.is_running());
    let calls = client.transport().calls_to("");
    thread::sleep(Duration::from_millis(50));
    assert_eq!(client.transport().calls_to(""), calls);
  }

  #[test]
  fn test_drop_stops_worker() {
    let client = Arc::new(ApiClient::new(MockTransport::new()));
    let handle = ServerMonitor::spawn(Arc::clone(&client), Duration::from_millis(10));
    assert!(wait_for(|| handle.status().checks >= 1));
    assert_eq!(handle.status().online, Some(false));
    drop(handle);
    thread::sleep(Duration::from_millis(20));
    let calls = client.transport().calls_to("");
    thread::sleep(Duration::from_millis(50));
    assert_eq!(client.transport().calls_to(""), calls);
  }

  struct StalledServer;

  impl Transport for StalledServer {
    fn get(&self, _: &str) -> Result<HttpResponse, TransportError> {
      thread::sleep(Duration::from_secs(2));
      Err(TransportError::Unreachable("stalled".to_string()))
    }

    fn post_form(&self, path: &str, _: UploadForm) -> Result<HttpResponse, TransportError> {
      Err(TransportError::Unreachable(path.to_string()))
    }
  }

  #[test]
  fn test_drop_does_not_wait_for_stalled_check() {
    let handle = ServerMonitor::spawn(Arc::new(ApiClient::new(StalledServer)), Duration::from_secs(30));
    thread::sleep(Duration::from_millis(20));
    let started = Instant::now();
    drop(handle);
    assert!(started.elapsed() < Duration::from_millis(500));
  }

  #[test]
  fn test_connection_report() {
    let client = ApiClient::new(
      MockTransport::new()
        .respond("", 200, "ok")
        .respond("https://example.org/", 404, ""),
    );
    let report = ConnectionReport::collect(&client, Some("https://example.org/"));
    assert!(report.server.online);
    let (_, reference) = report.reference.as_ref().unwrap();
    assert_eq!(reference.status, Some(404));
    assert!(report.summary().contains("HTTP 200"));
    assert!(report.summary().contains("HTTP 404 (异常)"));
  }
}
