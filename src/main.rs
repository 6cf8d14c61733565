// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::info;
use url::Url;

use andan::{
  FromUrl,
  api::{ApiClient, ColorValidation, HttpTransport, TestResult},
  config::{ClientConfig, EnhanceMode},
  dialog::TerminalPrompt,
  enhance::{Enhancer, EnhancerWrapper, LocalEnhancer, RemoteEnhancer},
  frame::SampleFrame,
  history::{HistoryFilter, is_expired},
  input::InputWrapper,
  model::{RemoteAnalyzer, Validate},
  monitor::{ConnectionReport, ServerMonitor},
  output::{ChartOutput, ConsoleReport, DirectoryRecordOutput, OutputList, OutputWrapper, Render},
  settings::{FileStore, Preferences, SettingsService},
  task::{CaptureFlow, ContinuousTask, FlowOutcome, OneShotTask, Task},
};

use args::{Args, Command, FlowArgs, SettingsCommand};

type Client = ApiClient<HttpTransport>;

fn load_config(args: &Args) -> Result<ClientConfig> {
  let mut config = match &args.config {
    Some(path) => ClientConfig::from_json_file(path)
      .with_context(|| format!("读取配置文件 {} 失败", path.display()))?,
    None => ClientConfig::default(),
  };
  if let Some(server) = &args.server {
    config.base_url = server.to_string();
  }
  config.validate()?;
  Ok(config)
}

fn build_client(config: &ClientConfig) -> Result<Arc<Client>> {
  let transport = HttpTransport::new(config.base_url()?, config.timeout())?;
  Ok(Arc::new(
    ApiClient::new(transport).with_process_image_path(&config.process_image_url),
  ))
}

fn open_settings(config: &ClientConfig) -> Result<SettingsService<FileStore>> {
  let path = config.settings_path();
  let store =
    FileStore::open(&path).with_context(|| format!("打开设置文件 {} 失败", path.display()))?;
  let mut service = SettingsService::new(store);
  service.load()?;
  Ok(service)
}

fn build_enhancer(mode: EnhanceMode, config: &ClientConfig, client: &Arc<Client>) -> EnhancerWrapper<HttpTransport> {
  match mode {
    EnhanceMode::Off => EnhancerWrapper::Off,
    EnhanceMode::Local => EnhancerWrapper::Local(
      LocalEnhancer::new(config.enhance).max_dimension(config.max_dimension),
    ),
    EnhanceMode::Remote => EnhancerWrapper::Remote(
      RemoteEnhancer::new(Arc::clone(client), config.enhance).quality(config.jpeg_quality),
    ),
  }
}

/// 终端报告总是输出；自动保存开启且配置了记录目录时追加目录记录
fn build_outputs(urls: &[Url], config: &ClientConfig, prefs: &Preferences) -> Result<OutputList> {
  let mut outputs = OutputList::new();
  outputs.push(OutputWrapper::ConsoleReport(ConsoleReport::new(
    prefs.app.units,
    config.calibration,
  )));
  if prefs.app.auto_save
    && let Some(dir) = &config.record_dir
  {
    outputs.push(OutputWrapper::DirectoryRecordOutput(
      DirectoryRecordOutput::new(dir).retention_days(Some(prefs.app.data_retention)),
    ));
  }
  for url in urls {
    info!("输出路径: {}", url);
    let output = OutputWrapper::from_url(url).with_context(|| format!("无法创建输出 {}", url))?;
    outputs.push(output.with_calibration(config.calibration));
  }
  Ok(outputs)
}

fn run_flow(flow_args: FlowArgs, frame_number: Option<usize>, batch: bool, config: &ClientConfig) -> Result<()> {
  let settings = open_settings(config)?;
  let prefs = settings.preferences().clone();
  let client = build_client(config)?;

  info!("输入来源: {}", flow_args.input);
  let input = InputWrapper::from_url(&flow_args.input);
  let mode = flow_args.enhance.unwrap_or(config.enhance_mode);
  let policy = flow_args.on_rejected.unwrap_or(config.on_rejected);
  let outputs = build_outputs(&flow_args.output, config, &prefs)?;
  let model = RemoteAnalyzer::new(Arc::clone(&client))
    .quality(config.jpeg_quality)
    .location(flow_args.location)
    .analyst(flow_args.analyst);
  let mut flow = CaptureFlow::new(build_enhancer(mode, config, &client), TerminalPrompt::stdio())
    .policy(policy);

  let input = match input {
    Ok(input) => input,
    Err(e) => {
      flow.report_input_error(&e);
      return Err(e).context("无法打开输入");
    }
  };

  if batch {
    let summary = ContinuousTask::new(flow)
      .with_frame_number(frame_number)
      .run_task(input, model, outputs)?;
    println!(
      "Processed {} image(s): {} completed, {} rejected, {} cancelled, {} failed, {} unreadable",
      summary.total(),
      summary.completed,
      summary.rejected,
      summary.cancelled,
      summary.aborted,
      summary.unreadable
    );
  } else {
    match OneShotTask::new(flow).run_task(input, model, outputs)? {
      FlowOutcome::Completed(_) => {}
      other => anyhow::bail!("分析未完成: {:?}", other),
    }
  }
  Ok(())
}

fn first_frame(url: &Url) -> Result<SampleFrame> {
  let mut input = InputWrapper::from_url(url).context("无法打开输入")?;
  let frame = input.next().context("没有输入图像")??;
  Ok(frame)
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = load_config(&args)?;
  info!("服务端: {}", config.base_url);

  match args.command {
    Command::Analyze(flow) => run_flow(flow, None, false, &config)?,
    Command::Batch { flow, frame_number } => run_flow(flow, frame_number, true, &config)?,

    Command::Enhance {
      input,
      output,
      brightness,
      contrast,
      remote,
    } => {
      let mut config = config.clone();
      if let Some(brightness) = brightness {
        config.enhance.brightness = brightness;
      }
      if let Some(contrast) = contrast {
        config.enhance.contrast = contrast;
      }
      config.validate()?;
      let client = build_client(&config)?;
      let mode = if remote { EnhanceMode::Remote } else { EnhanceMode::Local };
      let frame = first_frame(&input)?;
      let enhanced = build_enhancer(mode, &config, &client).enhance(&frame)?;
      save_frame(&enhanced, &output, config.jpeg_quality)?;
      println!(
        "Enhanced image saved to {} ({}x{})",
        output.display(),
        enhanced.width(),
        enhanced.height()
      );
    }

    Command::Validate { input } => {
      let client = build_client(&config)?;
      let frame = first_frame(&input)?;
      match RemoteAnalyzer::new(client).quality(config.jpeg_quality).validate(&frame)? {
        ColorValidation::Accepted => println!("Image accepted"),
        ColorValidation::Rejected { message, action } => {
          println!("{}", message);
          println!("{}", action);
        }
      }
    }

    Command::History {
      query,
      date,
      min,
      max,
      json,
    } => {
      let client = build_client(&config)?;
      let history = client.history()?;
      let filter = HistoryFilter {
        query,
        date,
        range: (min, max),
      };
      let entries = filter.apply(&history.history, Utc::now());
      if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
      } else if entries.is_empty() {
        println!("No matching records");
      } else {
        let retention = open_settings(&config)?.preferences().app.data_retention;
        let now = Utc::now();
        for entry in &entries {
          let expired = entry
            .parsed_timestamp()
            .is_some_and(|ts| is_expired(ts, retention, now));
          println!(
            "{:<25} {:>8.2} mg/L  {}{}",
            entry.timestamp,
            entry.concentration,
            entry.color_hex,
            if expired { "  (expired)" } else { "" }
          );
        }
      }
    }

    Command::Monitor { interval, once } => {
      let client = build_client(&config)?;
      if once {
        let report = ConnectionReport::collect(&*client, config.reference_url.as_deref());
        println!("{}", report.summary());
        return Ok(());
      }

      let interval = interval
        .map(std::time::Duration::from_secs)
        .unwrap_or(config.poll_interval());
      let (tx, rx) = mpsc::channel();
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
      })
      .context("无法注册 Ctrl-C 处理")?;

      let mut handle = ServerMonitor::spawn_with(client, interval, |status| {
        let state = match status.online {
          Some(true) => "online",
          Some(false) => "offline",
          None => "unknown",
        };
        println!("[{}] server {}", Utc::now().format("%H:%M:%S"), state);
      });
      let _ = rx.recv();
      handle.stop();
    }

    Command::Chart {
      record,
      output,
      width,
      height,
    } => {
      let content = std::fs::read_to_string(&record)
        .with_context(|| format!("读取记录 {} 失败", record.display()))?;
      let result: TestResult = serde_json::from_str(&content)?;
      let chart = ChartOutput::new(&output, width, height)?.calibration(config.calibration);
      let placeholder = SampleFrame::from(image::RgbaImage::new(1, 1));
      chart.render_result(&placeholder, &result)?;
      println!("Chart saved to {}", output.display());
    }

    Command::Settings(command) => {
      let mut settings = open_settings(&config)?;
      match command {
        SettingsCommand::Show => {}
        SettingsCommand::Set { key, value } => {
          settings.update_app(|app| app.set_field(&key, &value))?
        }
        SettingsCommand::Theme { theme } => settings.set_theme(theme)?,
        SettingsCommand::SignIn => settings.sign_in()?,
        SettingsCommand::SignOut => settings.sign_out()?,
      }
      let prefs = settings.preferences();
      println!("theme          : {}", prefs.theme.as_str());
      println!("signed in      : {}", prefs.authenticated);
      println!("notifications  : {}", prefs.app.notifications);
      println!("auto save      : {}", prefs.app.auto_save);
      println!("data retention : {} days", prefs.app.data_retention);
      println!("language       : {}", prefs.app.language);
      println!("units          : {}", prefs.app.units.concentration_label());
    }
  }

  Ok(())
}

fn save_frame(frame: &SampleFrame, path: &Path, quality: u8) -> Result<()> {
  let is_png = path
    .extension()
    .and_then(|e| e.to_str())
    .is_some_and(|e| e.eq_ignore_ascii_case("png"));
  if is_png {
    frame.as_rgba().save(path)?;
  } else {
    std::fs::write(path, frame.encode_jpeg(quality)?)?;
  }
  Ok(())
}
