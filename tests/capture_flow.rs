// 该文件是 Andan （氨氮检测） 项目的一部分。
// tests/capture_flow.rs - 采集流程的决策点
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

#![cfg(feature = "directory_record")]

use std::sync::Arc;

use andan::api::{ApiClient, ColorValidation, MockTransport, TestResult};
use andan::config::ValidationPolicy;
use andan::dialog::{Choice, Dialog, ScriptedPrompt};
use andan::enhance::{EnhanceParams, EnhancerWrapper, LocalEnhancer};
use andan::frame::SampleFrame;
use andan::model::{AnalyzerError, Model, RemoteAnalyzer, Validate};
use andan::output::{DirectoryRecordOutput, OutputList, OutputWrapper};
use andan::session::SessionCanceller;
use andan::task::{CaptureFlow, FlowOutcome};
use image::{Rgba, RgbaImage};

const REJECTED: &str =
  r#"{"status":"error","message":"Too concentrated","action":"Dilute and retry"}"#;
const ACCEPTED: &str = r#"{"status":"ok"}"#;
const PREDICTED: &str = r##"{
  "ammonia_concentration": 1.8,
  "color": {"hex": "#C08040", "rgb": {"r": 192, "g": 128, "b": 64}},
  "chart": [
    {"concentration": 0.0, "hex": "#F0E0A0"},
    {"concentration": 5.0, "hex": "#A06020"}
  ],
  "saved_image": "sample_0001.jpg",
  "success": true
}"##;

fn frame() -> SampleFrame {
  SampleFrame::from(RgbaImage::from_pixel(16, 12, Rgba([170, 140, 90, 255])))
}

fn analyzer(transport: MockTransport) -> RemoteAnalyzer<MockTransport> {
  RemoteAnalyzer::new(Arc::new(ApiClient::new(transport)))
}

fn flow(
  answers: Vec<Choice>,
  policy: ValidationPolicy,
) -> CaptureFlow<EnhancerWrapper<MockTransport>, ScriptedPrompt> {
  CaptureFlow::new(
    EnhancerWrapper::Local(LocalEnhancer::new(EnhanceParams::default())),
    ScriptedPrompt::new(answers),
  )
  .policy(policy)
}

#[test]
fn rejection_shows_server_message_and_skips_predict() {
  let model = analyzer(
    MockTransport::new()
      .respond("validate-color", 200, REJECTED)
      .respond("predict", 200, PREDICTED),
  );
  let mut flow = flow(vec![Choice::Cancel], ValidationPolicy::Ask);

  let outcome = flow.analyze(&frame(), &model, &OutputList::new()).unwrap();

  assert_eq!(outcome, FlowOutcome::Rejected);
  assert_eq!(
    flow.prompt().shown(),
    &[Dialog::validation_rejected(
      "Too concentrated",
      "Dilute and retry",
      true
    )]
  );
  assert_eq!(model.client().transport().calls_to("predict"), 0);
  assert!(flow.result().is_none());
}

#[test]
fn proceed_after_rejection_runs_prediction() {
  let model = analyzer(
    MockTransport::new()
      .respond("validate-color", 200, REJECTED)
      .respond("predict", 200, PREDICTED),
  );
  let mut flow = flow(vec![Choice::Proceed], ValidationPolicy::Ask);

  let outcome = flow.analyze(&frame(), &model, &OutputList::new()).unwrap();

  let FlowOutcome::Completed(result) = outcome else {
    panic!("expected a completed analysis, got {:?}", outcome);
  };
  assert_eq!(result.concentration, 1.8);
  assert_eq!(result.sample.method, "sample_0001.jpg");
  assert_eq!(model.client().transport().calls_to("predict"), 1);
}

#[test]
fn abort_policy_ends_flow_without_choice() {
  let model = analyzer(
    MockTransport::new()
      .respond("validate-color", 200, REJECTED)
      .respond("predict", 200, PREDICTED),
  );
  let mut flow = flow(vec![Choice::Proceed], ValidationPolicy::Abort);

  let outcome = flow.analyze(&frame(), &model, &OutputList::new()).unwrap();

  assert_eq!(outcome, FlowOutcome::Rejected);
  assert_eq!(flow.prompt().shown()[0].choices, vec![Choice::Ok]);
  assert_eq!(flow.prompt().shown()[0].title, "Too concentrated");
  assert_eq!(model.client().transport().calls_to("predict"), 0);
}

#[test]
fn malformed_prediction_keeps_previous_result() {
  let model = analyzer(
    MockTransport::new()
      .respond("validate-color", 200, ACCEPTED)
      .respond("predict", 200, PREDICTED)
      .respond("predict", 200, r#"{"success": true}"#),
  );
  let mut flow = flow(vec![Choice::Cancel], ValidationPolicy::Ask);

  let first = flow.analyze(&frame(), &model, &OutputList::new()).unwrap();
  assert!(matches!(first, FlowOutcome::Completed(_)));
  let shown_before = flow.result().cloned().unwrap();

  let second = flow.analyze(&frame(), &model, &OutputList::new()).unwrap();

  assert_eq!(second, FlowOutcome::Cancelled);
  let dialog = flow.prompt().shown().last().unwrap();
  assert_eq!(dialog.title, "Analysis Failed");
  assert_eq!(
    dialog.message,
    "Failed to analyze image. Invalid response format from server"
  );
  assert_eq!(flow.result(), Some(&shown_before));
}

#[test]
fn completed_analysis_is_recorded() {
  let dir = tempfile::tempdir().unwrap();
  let model = analyzer(
    MockTransport::new()
      .respond("validate-color", 200, ACCEPTED)
      .respond("predict", 200, PREDICTED),
  );
  let outputs: OutputList = [OutputWrapper::DirectoryRecordOutput(DirectoryRecordOutput::new(
    dir.path(),
  ))]
  .into_iter()
  .collect();
  let mut flow = flow(vec![], ValidationPolicy::Ask);

  let outcome = flow.analyze(&frame(), &model, &outputs).unwrap();
  let FlowOutcome::Completed(result) = outcome else {
    panic!("expected a completed analysis, got {:?}", outcome);
  };

  let day = dir
    .path()
    .join(result.received_at.format("%Y").to_string())
    .join(result.received_at.format("%m").to_string())
    .join(result.received_at.format("%d").to_string());
  let records: Vec<_> = std::fs::read_dir(&day)
    .unwrap()
    .map(|e| e.unwrap().path())
    .collect();
  assert_eq!(records.len(), 2);
  assert!(records.iter().any(|p| p.extension().is_some_and(|e| e == "json")));
}

#[test]
fn unencodable_frame_is_a_processing_error() {
  let model = analyzer(
    MockTransport::new()
      .respond("validate-color", 200, ACCEPTED)
      .respond("predict", 200, PREDICTED),
  );
  let mut flow = CaptureFlow::new(
    EnhancerWrapper::<MockTransport>::Off,
    ScriptedPrompt::new(vec![Choice::Retry]),
  );

  let empty = SampleFrame::from(RgbaImage::new(0, 0));
  let outcome = flow.analyze(&empty, &model, &OutputList::new()).unwrap();

  assert!(matches!(outcome, FlowOutcome::Aborted(_)));
  assert_eq!(flow.prompt().shown().len(), 1);
  assert_eq!(flow.prompt().shown()[0].title, "Processing Error");
  assert!(model.client().transport().requests().is_empty());
}

/// 在预测请求返回前作废本次请求，模拟 Ctrl-C 打断批量处理
struct CancelledWhilePredicting {
  inner: RemoteAnalyzer<MockTransport>,
  canceller: SessionCanceller,
}

impl Validate for CancelledWhilePredicting {
  type Input = SampleFrame;
  type Error = AnalyzerError;

  fn validate(&self, input: &SampleFrame) -> Result<ColorValidation, AnalyzerError> {
    self.inner.validate(input)
  }
}

impl Model for CancelledWhilePredicting {
  type Input = SampleFrame;
  type Output = TestResult;
  type Error = AnalyzerError;

  fn infer(&self, input: &SampleFrame) -> Result<TestResult, AnalyzerError> {
    let result = self.inner.infer(input);
    self.canceller.cancel();
    result
  }
}

#[test]
fn response_arriving_after_cancel_is_discarded() {
  let dir = tempfile::tempdir().unwrap();
  let outputs: OutputList = [OutputWrapper::DirectoryRecordOutput(DirectoryRecordOutput::new(
    dir.path(),
  ))]
  .into_iter()
  .collect();
  let mut flow = flow(vec![], ValidationPolicy::Ask);
  let model = CancelledWhilePredicting {
    inner: analyzer(
      MockTransport::new()
        .respond("validate-color", 200, ACCEPTED)
        .respond("validate-color", 200, ACCEPTED)
        .respond("predict", 200, PREDICTED)
        .respond("predict", 200, PREDICTED),
    ),
    canceller: flow.canceller(),
  };

  let outcome = flow.analyze(&frame(), &model, &outputs).unwrap();

  assert_eq!(outcome, FlowOutcome::Cancelled);
  assert!(flow.result().is_none());
  assert!(!flow.session().is_pending());
  assert!(flow.prompt().shown().is_empty());
  assert_eq!(model.inner.client().transport().calls_to("predict"), 1);
  assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

  let outcome = flow.analyze(&frame(), &model.inner, &outputs).unwrap();
  assert!(matches!(outcome, FlowOutcome::Completed(ref r) if r.concentration == 1.8));
  assert_eq!(flow.result().unwrap().concentration, 1.8);
}
