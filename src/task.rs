// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/task.rs - 采集与分析任务
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

use std::fmt::Display;
use std::sync::mpsc::{self, Receiver};
use std::{thread, time::Duration};

use anyhow::Context;
use tracing::{error, info, warn};

use crate::api::{ColorValidation, TestResult};
use crate::config::ValidationPolicy;
use crate::dialog::{Choice, Dialog, Prompt};
use crate::enhance::Enhancer;
use crate::frame::SampleFrame;
use crate::input::InputError;
use crate::model::{LocalFailure, Model, Validate};
use crate::output::Render;
use crate::session::{AnalysisSession, Completion, SessionCanceller};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 一次采集的结局
#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
  /// 分析成功并已渲染
  Completed(TestResult),
  /// 颜色预检未通过，未提交分析
  Rejected,
  /// 分析失败后用户选择取消
  Cancelled,
  /// 图像处理或预检请求失败，已提示用户
  Aborted(String),
}

/// 单个样本的顺序流程：增强 → 预检 → 分析 → 渲染
///
/// 每一步都在调用线程上阻塞执行。分析请求通过 [`AnalysisSession`] 签发凭据，
/// 失败的请求不会覆盖已显示的结果。
pub struct CaptureFlow<E, P> {
  enhancer: E,
  prompt: P,
  policy: ValidationPolicy,
  session: AnalysisSession,
}

impl<E: Enhancer, P: Prompt> CaptureFlow<E, P> {
  pub fn new(enhancer: E, prompt: P) -> Self {
    Self {
      enhancer,
      prompt,
      policy: ValidationPolicy::default(),
      session: AnalysisSession::new(),
    }
  }

  pub fn policy(mut self, policy: ValidationPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn session(&self) -> &AnalysisSession {
    &self.session
  }

  /// 作废进行中的分析请求，其响应到达后被丢弃
  pub fn canceller(&self) -> SessionCanceller {
    self.session.canceller()
  }

  pub fn prompt(&self) -> &P {
    &self.prompt
  }

  /// 当前显示的结果
  pub fn result(&self) -> Option<&TestResult> {
    self.session.result()
  }

  /// 输入源打开或读取失败时的提示
  pub fn report_input_error(&mut self, err: &InputError) {
    error!("读取输入失败: {}", err);
    let dialog = if err.is_permission_denied() {
      Dialog::permission_denied("Media library")
    } else {
      Dialog::processing_error(&err.to_string())
    };
    self.prompt.show(&dialog);
  }

  pub fn analyze<M, O, ME, VE>(&mut self, frame: &SampleFrame, model: &M, output: &O) -> anyhow::Result<FlowOutcome>
  where
    M: Model<Input = SampleFrame, Output = TestResult, Error = ME> + Validate<Input = SampleFrame, Error = VE>,
    O: Render<SampleFrame, TestResult>,
    O::Error: std::error::Error + Send + Sync + 'static,
    ME: Display + LocalFailure,
    VE: Display + LocalFailure,
  {
    let enhanced = match self.enhancer.enhance(frame) {
      Ok(enhanced) => enhanced,
      Err(e) => {
        error!("图像处理失败: {}", e);
        self.prompt.show(&Dialog::processing_error(&e.to_string()));
        return Ok(FlowOutcome::Aborted(e.to_string()));
      }
    };

    match model.validate(&enhanced) {
      Ok(ColorValidation::Accepted) => info!("颜色预检通过"),
      Ok(ColorValidation::Rejected { message, action }) => {
        warn!("颜色预检未通过: {} / {}", message, action);
        let allow_proceed = self.policy == ValidationPolicy::Ask;
        let choice = self
          .prompt
          .show(&Dialog::validation_rejected(&message, &action, allow_proceed));
        if !(allow_proceed && choice == Choice::Proceed) {
          info!("放弃本次分析");
          return Ok(FlowOutcome::Rejected);
        }
        info!("用户选择继续分析");
      }
      Err(e) if e.is_local() => {
        error!("上传前图像处理失败: {}", e);
        self.prompt.show(&Dialog::processing_error(&e.to_string()));
        return Ok(FlowOutcome::Aborted(e.to_string()));
      }
      Err(e) => {
        error!("颜色预检失败: {}", e);
        self.prompt.show(&Dialog::validation_failed());
        return Ok(FlowOutcome::Aborted(e.to_string()));
      }
    }

    loop {
      let ticket = self.session.begin();
      let now = std::time::Instant::now();
      let outcome = model.infer(&enhanced);
      info!("分析请求返回，耗时: {:.2?}", now.elapsed());

      match self.session.complete(ticket, outcome) {
        Completion::Applied => break,
        Completion::Stale => {
          warn!("分析请求已被取消，丢弃响应");
          return Ok(FlowOutcome::Cancelled);
        }
        Completion::Failed(e) if e.is_local() => {
          error!("上传前图像处理失败: {}", e);
          self.prompt.show(&Dialog::processing_error(&e.to_string()));
          return Ok(FlowOutcome::Aborted(e.to_string()));
        }
        Completion::Failed(e) => {
          error!("分析失败: {}", e);
          match self.prompt.show(&Dialog::analysis_failed(&e.to_string())) {
            Choice::Retry => {
              info!("用户选择重试");
              continue;
            }
            _ => return Ok(FlowOutcome::Cancelled),
          }
        }
      }
    }

    let result = self
      .session
      .result()
      .cloned()
      .context("分析结果缺失")?;
    output
      .render_result(&enhanced, &result)
      .context("渲染分析结果失败")?;
    Ok(FlowOutcome::Completed(result))
  }
}

impl<E, P> Drop for CaptureFlow<E, P> {
  fn drop(&mut self) {
    self.session.cancel();
  }
}

/// 处理输入中的第一张图像
pub struct OneShotTask<E, P> {
  flow: CaptureFlow<E, P>,
}

impl<E: Enhancer, P: Prompt> OneShotTask<E, P> {
  pub fn new(flow: CaptureFlow<E, P>) -> Self {
    Self { flow }
  }
}

impl<E, P, I, M, O, ME, VE> Task<I, M, O> for OneShotTask<E, P>
where
  E: Enhancer,
  P: Prompt,
  I: Iterator<Item = Result<SampleFrame, InputError>>,
  M: Model<Input = SampleFrame, Output = TestResult, Error = ME> + Validate<Input = SampleFrame, Error = VE>,
  O: Render<SampleFrame, TestResult>,
  O::Error: std::error::Error + Send + Sync + 'static,
  ME: Display + LocalFailure,
  VE: Display + LocalFailure,
{
  type Output = FlowOutcome;
  type Error = anyhow::Error;

  fn run_task(mut self, mut input: I, model: M, output: O) -> Result<FlowOutcome, Self::Error> {
    info!("开始任务...");
    let frame = match input.next() {
      Some(Ok(frame)) => frame,
      Some(Err(e)) => {
        self.flow.report_input_error(&e);
        return Ok(FlowOutcome::Aborted(e.to_string()));
      }
      None => anyhow::bail!("没有输入图像"),
    };
    let outcome = self.flow.analyze(&frame, &model, &output)?;
    match &outcome {
      FlowOutcome::Completed(result) => info!("任务完成: {:.3} mg/L", result.concentration),
      other => warn!("任务未完成: {:?}", other),
    }
    Ok(outcome)
  }
}

/// 批量处理的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
  pub completed: usize,
  pub rejected: usize,
  pub cancelled: usize,
  pub aborted: usize,
  pub unreadable: usize,
}

impl BatchSummary {
  fn record(&mut self, outcome: &FlowOutcome) {
    match outcome {
      FlowOutcome::Completed(_) => self.completed += 1,
      FlowOutcome::Rejected => self.rejected += 1,
      FlowOutcome::Cancelled => self.cancelled += 1,
      FlowOutcome::Aborted(_) => self.aborted += 1,
    }
  }

  pub fn total(&self) -> usize {
    self.completed + self.rejected + self.cancelled + self.aborted + self.unreadable
  }
}

/// 逐张处理输入，直到输入耗尽、达到数量上限或收到 Ctrl-C
pub struct ContinuousTask<E, P> {
  flow: CaptureFlow<E, P>,
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl<E: Enhancer, P: Prompt> ContinuousTask<E, P> {
  pub fn new(flow: CaptureFlow<E, P>) -> Self {
    Self {
      flow,
      frame_number: None,
      handle_interrupt: true,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 是否注册 Ctrl-C 处理；一个进程只能注册一次
  pub fn with_interrupt(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }
}

fn install_interrupt(canceller: SessionCanceller) -> Option<Receiver<()>> {
  let (tx, rx) = mpsc::channel();
  let installed = ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    canceller.cancel();
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  });
  match installed {
    Ok(()) => Some(rx),
    Err(e) => {
      warn!("无法注册 Ctrl-C 处理: {}", e);
      None
    }
  }
}

impl<E, P, I, M, O, ME, VE> Task<I, M, O> for ContinuousTask<E, P>
where
  E: Enhancer,
  P: Prompt,
  I: Iterator<Item = Result<SampleFrame, InputError>>,
  M: Model<Input = SampleFrame, Output = TestResult, Error = ME> + Validate<Input = SampleFrame, Error = VE>,
  O: Render<SampleFrame, TestResult>,
  O::Error: std::error::Error + Send + Sync + 'static,
  ME: Display + LocalFailure,
  VE: Display + LocalFailure,
{
  type Output = BatchSummary;
  type Error = anyhow::Error;

  fn run_task(mut self, input: I, model: M, output: O) -> Result<BatchSummary, Self::Error> {
    info!("开始任务...");
    let interrupt = if self.handle_interrupt {
      install_interrupt(self.flow.canceller())
    } else {
      None
    };

    let mut summary = BatchSummary::default();
    let mut frame_index = 0;
    for frame in input {
      frame_index += 1;
      info!("处理第 {} 张图像", frame_index);
      match frame {
        Ok(frame) => {
          let outcome = self.flow.analyze(&frame, &model, &output)?;
          summary.record(&outcome);
        }
        Err(e) if e.is_permission_denied() => {
          self.flow.report_input_error(&e);
          warn!("没有访问权限，退出任务循环");
          summary.unreadable += 1;
          break;
        }
        Err(e) => {
          self.flow.report_input_error(&e);
          summary.unreadable += 1;
        }
      }

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定数量 {}, 退出任务循环", frame_index);
        break;
      }
      if interrupt.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!(
      "任务完成: 成功 {}, 未通过预检 {}, 取消 {}, 失败 {}, 无法读取 {}",
      summary.completed, summary.rejected, summary.cancelled, summary.aborted, summary.unreadable
    );
    Ok(summary)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{ApiClient, MockTransport};
  use crate::dialog::ScriptedPrompt;
  use crate::enhance::{EnhancerWrapper, LocalEnhancer};
  use crate::input::{GalleryInputError, ImageFileInputError};
  use crate::model::{AnalyzerError, RemoteAnalyzer};
  use crate::output::OutputList;
  use image::{Rgba, RgbaImage};
  use std::path::PathBuf;
  use std::sync::Arc;

  const OK: &str = r#"{"status":"ok"}"#;
  const PREDICTED: &str = r##"{"ammonia_concentration": 0.42, "success": true}"##;

  fn frame() -> SampleFrame {
    SampleFrame::from(RgbaImage::from_pixel(4, 4, Rgba([120, 90, 60, 255])))
  }

  fn analyzer(transport: MockTransport) -> RemoteAnalyzer<MockTransport> {
    RemoteAnalyzer::new(Arc::new(ApiClient::new(transport)))
  }

  fn flow(answers: Vec<Choice>) -> CaptureFlow<EnhancerWrapper<MockTransport>, ScriptedPrompt> {
    CaptureFlow::new(
      EnhancerWrapper::Local(LocalEnhancer::default()),
      ScriptedPrompt::new(answers),
    )
  }

  #[test]
  fn test_retry_after_failure() {
    let model = analyzer(
      MockTransport::new()
        .respond("validate-color", 200, OK)
        .respond("predict", 500, r#"{"error":"busy"}"#)
        .respond("predict", 200, PREDICTED),
    );
    let mut flow = flow(vec![Choice::Retry]);
    let outcome = flow.analyze(&frame(), &model, &OutputList::new()).unwrap();

    assert!(matches!(outcome, FlowOutcome::Completed(ref r) if r.concentration == 0.42));
    assert_eq!(flow.prompt().shown()[0].message, "Failed to analyze image. busy");
    assert_eq!(model.client().transport().calls_to("predict"), 2);
    assert!(!flow.session().is_pending());
  }

  struct EncodeFailsOnInfer;

  impl Validate for EncodeFailsOnInfer {
    type Input = SampleFrame;
    type Error = AnalyzerError;

    fn validate(&self, _: &SampleFrame) -> Result<ColorValidation, AnalyzerError> {
      Ok(ColorValidation::Accepted)
    }
  }

  impl Model for EncodeFailsOnInfer {
    type Input = SampleFrame;
    type Output = TestResult;
    type Error = AnalyzerError;

    fn infer(&self, _: &SampleFrame) -> Result<TestResult, AnalyzerError> {
      SampleFrame::from(RgbaImage::new(0, 0)).encode_jpeg(90)?;
      unreachable!("empty frames never encode")
    }
  }

  #[test]
  fn test_local_failure_during_analysis_is_not_retried() {
    let mut flow = flow(vec![Choice::Retry, Choice::Retry]);
    let outcome = flow
      .analyze(&frame(), &EncodeFailsOnInfer, &OutputList::new())
      .unwrap();

    assert!(matches!(outcome, FlowOutcome::Aborted(_)));
    assert_eq!(flow.prompt().shown().len(), 1);
    assert_eq!(flow.prompt().shown()[0].title, "Processing Error");
    assert!(flow.result().is_none());
  }

  #[test]
  fn test_validation_transport_error() {
    let model = analyzer(MockTransport::new());
    let mut flow = flow(vec![]);
    let outcome = flow.analyze(&frame(), &model, &OutputList::new()).unwrap();
    assert!(matches!(outcome, FlowOutcome::Aborted(_)));
    assert_eq!(flow.prompt().shown()[0], Dialog::validation_failed());
    assert_eq!(model.client().transport().calls_to("predict"), 0);
  }

  #[test]
  fn test_batch_continues_past_unreadable_frames() {
    let model = analyzer(
      MockTransport::new()
        .respond("validate-color", 200, OK)
        .respond("predict", 200, PREDICTED),
    );
    let broken = InputError::from(GalleryInputError::Image(ImageFileInputError::InvalidPath(
      "x".to_string(),
    )));
    let input = vec![Ok(frame()), Err(broken), Ok(frame())].into_iter();

    let task = ContinuousTask::new(flow(vec![])).with_interrupt(false);
    let summary = task.run_task(input, model, OutputList::new()).unwrap();
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.unreadable, 1);
    assert_eq!(summary.total(), 3);
  }

  #[test]
  fn test_batch_stops_on_permission_denied_and_limit() {
    let model = analyzer(
      MockTransport::new()
        .respond("validate-color", 200, OK)
        .respond("predict", 200, PREDICTED),
    );
    let denied = InputError::from(GalleryInputError::PermissionDenied(PathBuf::from("/g")));
    let input = vec![Ok(frame()), Err(denied), Ok(frame())].into_iter();
    let task = ContinuousTask::new(flow(vec![])).with_interrupt(false);
    let summary = task.run_task(input, model, OutputList::new()).unwrap();
    assert_eq!((summary.completed, summary.unreadable), (1, 1));

    let model = analyzer(
      MockTransport::new()
        .respond("validate-color", 200, OK)
        .respond("predict", 200, PREDICTED),
    );
    let input = vec![Ok(frame()), Ok(frame()), Ok(frame())].into_iter();
    let task = ContinuousTask::new(flow(vec![]))
      .with_interrupt(false)
      .with_frame_number(Some(2));
    let summary = task.run_task(input, model, OutputList::new()).unwrap();
    assert_eq!(summary.completed, 2);
  }

  #[test]
  fn test_one_shot_requires_input() {
    let model = analyzer(MockTransport::new());
    let input = Vec::<Result<SampleFrame, InputError>>::new().into_iter();
    assert!(OneShotTask::new(flow(vec![])).run_task(input, model, OutputList::new()).is_err());
  }
}
