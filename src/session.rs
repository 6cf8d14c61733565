// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/session.rs - 分析会话与请求代次
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
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::api::TestResult;

/// 一次预测请求的凭据，只有最新签发的凭据能写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket(u64);

#[derive(Debug, PartialEq)]
pub enum Completion<E> {
  Applied,
  Stale,
  Failed(E),
}

/// 持有当前展示的结果，独占于一个分析流程
#[derive(Debug, Default)]
pub struct AnalysisSession {
  generation: Arc<AtomicU64>,
  pending: Option<u64>,
  result: Option<TestResult>,
}

/// 可跨线程使用的取消句柄，例如在 Ctrl-C 处理中作废进行中的请求
#[derive(Debug, Clone)]
pub struct SessionCanceller {
  generation: Arc<AtomicU64>,
}

impl SessionCanceller {
  pub fn cancel(&self) {
    let previous = self.generation.fetch_add(1, Ordering::SeqCst);
    debug!("作废请求代次 #{}", previous);
  }
}

impl AnalysisSession {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn canceller(&self) -> SessionCanceller {
    SessionCanceller {
      generation: Arc::clone(&self.generation),
    }
  }

  /// 签发新凭据，之前未完成的请求随之作废
  pub fn begin(&mut self) -> RequestTicket {
    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    self.pending = Some(generation);
    debug!("签发请求凭据 #{}", generation);
    RequestTicket(generation)
  }

  pub fn is_current(&self, ticket: RequestTicket) -> bool {
    self.pending == Some(ticket.0) && self.generation.load(Ordering::SeqCst) == ticket.0
  }

  /// 提交请求结果；过期凭据的响应被丢弃，失败时保留原结果
  pub fn complete<E>(&mut self, ticket: RequestTicket, outcome: Result<TestResult, E>) -> Completion<E> {
    if !self.is_current(ticket) {
      warn!("丢弃过期响应 #{} (当前 {:?})", ticket.0, self.pending);
      if self.pending == Some(ticket.0) {
        self.pending = None;
      }
      return Completion::Stale;
    }
    self.pending = None;
    match outcome {
      Ok(result) => {
        self.result = Some(result);
        Completion::Applied
      }
      Err(e) => Completion::Failed(e),
    }
  }

  /// 流程结束时调用，未完成的请求作废
  pub fn cancel(&mut self) {
    if let Some(pending) = self.pending.take() {
      debug!("取消请求 #{}", pending);
    }
    self.generation.fetch_add(1, Ordering::SeqCst);
  }

  pub fn is_pending(&self) -> bool {
    self.pending.is_some()
  }

  pub fn result(&self) -> Option<&TestResult> {
    self.result.as_ref()
  }

  pub fn take_result(&mut self) -> Option<TestResult> {
    self.result.take()
  }
}
