// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/dialog.rs - 面向用户的提示与选择
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

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
  Ok,
  Retry,
  Cancel,
  Proceed,
}

impl Choice {
  pub fn label(&self) -> &'static str {
    match self {
      Choice::Ok => "OK",
      Choice::Retry => "Retry",
      Choice::Cancel => "Cancel",
      Choice::Proceed => "Proceed",
    }
  }
}

/// 一个模态对话框；第一个选项为默认选项
#[derive(Debug, Clone, PartialEq)]
pub struct Dialog {
  pub title: String,
  pub message: String,
  pub choices: Vec<Choice>,
}

impl Dialog {
  pub fn notice(title: &str, message: &str) -> Self {
    Self {
      title: title.to_string(),
      message: message.to_string(),
      choices: vec![Choice::Ok],
    }
  }

  pub fn analysis_failed(reason: &str) -> Self {
    Self {
      title: "Analysis Failed".to_string(),
      message: format!("Failed to analyze image. {}", reason),
      choices: vec![Choice::Retry, Choice::Cancel],
    }
  }

  /// 颜色预检未通过：标题为服务端 message，正文为 action
  pub fn validation_rejected(message: &str, action: &str, allow_proceed: bool) -> Self {
    let choices = if allow_proceed {
      vec![Choice::Cancel, Choice::Proceed]
    } else {
      vec![Choice::Ok]
    };
    Self {
      title: message.to_string(),
      message: action.to_string(),
      choices,
    }
  }

  pub fn validation_failed() -> Self {
    Self::notice("Error", "Failed to validate the image. Please try again.")
  }

  pub fn permission_denied(what: &str) -> Self {
    Self::notice(
      "Permission Denied",
      &format!("{} permission is required to select images.", what),
    )
  }

  pub fn processing_error(reason: &str) -> Self {
    Self::notice(
      "Processing Error",
      &format!("Failed to process the image: {}. Please pick a different image.", reason),
    )
  }
}

pub trait Prompt {
  fn show(&mut self, dialog: &Dialog) -> Choice;
}

/// 终端交互：打印对话框并从标准输入读取选择
pub struct TerminalPrompt<R, W> {
  input: R,
  output: W,
}

impl TerminalPrompt<std::io::StdinLock<'static>, std::io::Stderr> {
  pub fn stdio() -> Self {
    Self {
      input: std::io::stdin().lock(),
      output: std::io::stderr(),
    }
  }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
  pub fn new(input: R, output: W) -> Self {
    Self { input, output }
  }

  fn render(&mut self, dialog: &Dialog) -> std::io::Result<()> {
    writeln!(self.output)?;
    writeln!(self.output, "== {} ==", dialog.title)?;
    if !dialog.message.is_empty() {
      writeln!(self.output, "{}", dialog.message)?;
    }
    if dialog.choices.len() > 1 {
      let options: Vec<String> = dialog
        .choices
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] {}", i + 1, c.label()))
        .collect();
      write!(self.output, "{} > ", options.join("  "))?;
    }
    self.output.flush()
  }

  fn read_choice(&mut self, dialog: &Dialog) -> Option<Choice> {
    let mut line = String::new();
    self.input.read_line(&mut line).ok()?;
    let answer = line.trim();
    if answer.is_empty() {
      return None;
    }
    if let Ok(index) = answer.parse::<usize>() {
      return dialog.choices.get(index.checked_sub(1)?).copied();
    }
    dialog
      .choices
      .iter()
      .find(|c| c.label().eq_ignore_ascii_case(answer))
      .copied()
  }
}

impl<R: BufRead, W: Write> Prompt for TerminalPrompt<R, W> {
  fn show(&mut self, dialog: &Dialog) -> Choice {
    let default = dialog.choices.first().copied().unwrap_or(Choice::Ok);
    if let Err(e) = self.render(dialog) {
      warn!("无法输出对话框: {}", e);
      return default;
    }
    if dialog.choices.len() <= 1 {
      return default;
    }
    self.read_choice(dialog).unwrap_or(default)
  }
}

/// 预先编排好的选择序列，并记录展示过的对话框
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
  answers: VecDeque<Choice>,
  shown: Vec<Dialog>,
}

impl ScriptedPrompt {
  pub fn new(answers: impl IntoIterator<Item = Choice>) -> Self {
    Self {
      answers: answers.into_iter().collect(),
      shown: Vec::new(),
    }
  }

  pub fn shown(&self) -> &[Dialog] {
    &self.shown
  }
}

impl Prompt for ScriptedPrompt {
  fn show(&mut self, dialog: &Dialog) -> Choice {
    self.shown.push(dialog.clone());
    if dialog.choices.len() <= 1 {
      return dialog.choices.first().copied().unwrap_or(Choice::Ok);
    }
    match self.answers.pop_front() {
      Some(choice) if dialog.choices.contains(&choice) => choice,
      _ => dialog.choices.first().copied().unwrap_or(Choice::Ok),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_terminal_reads_index_and_label() {
    let dialog = Dialog::analysis_failed("timeout");
    let mut prompt = TerminalPrompt::new("2\n".as_bytes(), Vec::new());
    assert_eq!(prompt.show(&dialog), Choice::Cancel);

    let mut prompt = TerminalPrompt::new("retry\n".as_bytes(), Vec::new());
    assert_eq!(prompt.show(&dialog), Choice::Retry);
  }

  #[test]
  fn test_terminal_falls_back_to_default() {
    let dialog = Dialog::validation_rejected("Too dark", "Use more light", true);
    let mut prompt = TerminalPrompt::new("9\n".as_bytes(), Vec::new());
    assert_eq!(prompt.show(&dialog), Choice::Cancel);

    let mut prompt = TerminalPrompt::new("".as_bytes(), Vec::new());
    assert_eq!(prompt.show(&dialog), Choice::Cancel);
  }

  #[test]
  fn test_terminal_output_contains_title() {
    let mut out = Vec::new();
    {
      let mut prompt = TerminalPrompt::new("".as_bytes(), &mut out);
      prompt.show(&Dialog::validation_failed());
    }
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("== Error =="));
    assert!(text.contains("Failed to validate the image. Please try again."));
  }

  #[test]
  fn test_scripted_records_dialogs() {
    let mut prompt = ScriptedPrompt::new([Choice::Proceed]);
    let dialog = Dialog::validation_rejected("Too concentrated", "Dilute and retry", true);
    assert_eq!(prompt.show(&dialog), Choice::Proceed);
    assert_eq!(prompt.shown()[0].title, "Too concentrated");
    assert_eq!(prompt.shown()[0].message, "Dilute and retry");
  }
}
