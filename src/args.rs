// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/args.rs - 命令行参数
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use andan::config::{EnhanceMode, ValidationPolicy};
use andan::history::DateFilter;
use andan::settings::Theme;
use clap::{Args as ClapArgs, Parser, Subcommand};
use url::Url;

/// Andan 氨氮检测客户端
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 配置文件路径（JSON）
  #[arg(long, global = true, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 覆盖配置中的服务端地址
  #[arg(long, global = true, value_name = "URL")]
  pub server: Option<Url>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(ClapArgs, Debug)]
pub struct FlowArgs {
  /// 输入来源
  /// - 单张图像: image:///path/to/sample.jpg
  /// - 图库目录: gallery:///path/to/dir?limit=10
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 额外输出，可重复
  /// - console://?units=imperial
  /// - image:///path/to/enhanced.jpg
  /// - folder:///path/to/records?retention=30
  /// - chart:///path/to/curve.png?width=640&height=400
  #[arg(long, value_name = "OUTPUT")]
  pub output: Vec<Url>,

  /// 图像增强方式（off、local、remote）
  #[arg(long, value_name = "MODE")]
  pub enhance: Option<EnhanceMode>,

  /// 颜色预检未通过时的处理（ask、abort）
  #[arg(long, value_name = "POLICY")]
  pub on_rejected: Option<ValidationPolicy>,

  /// 采样地点
  #[arg(long)]
  pub location: Option<String>,

  /// 分析人员
  #[arg(long)]
  pub analyst: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 分析单张图像
  Analyze(FlowArgs),

  /// 逐张分析输入中的图像，Ctrl-C 结束
  Batch {
    #[command(flatten)]
    flow: FlowArgs,

    /// 最多处理的图像数量
    #[arg(long, value_name = "FRAME_NUMBER")]
    frame_number: Option<usize>,
  },

  /// 仅做亮度/对比度增强并保存
  Enhance {
    #[arg(long, value_name = "SOURCE")]
    input: Url,
    #[arg(long, value_name = "FILE")]
    output: PathBuf,
    #[arg(long)]
    brightness: Option<f32>,
    #[arg(long)]
    contrast: Option<f32>,
    /// 交由服务端处理
    #[arg(long)]
    remote: bool,
  },

  /// 仅做颜色预检
  Validate {
    #[arg(long, value_name = "SOURCE")]
    input: Url,
  },

  /// 查询历史记录
  History {
    /// 按时间或浓度文本搜索
    #[arg(long)]
    query: Option<String>,
    /// all、today、week、month
    #[arg(long, default_value = "all")]
    date: DateFilter,
    #[arg(long, default_value = "0")]
    min: f64,
    #[arg(long, default_value = "15")]
    max: f64,
    /// 以 JSON 输出
    #[arg(long)]
    json: bool,
  },

  /// 轮询服务端在线状态，Ctrl-C 结束
  Monitor {
    /// 轮询间隔（秒），默认取配置
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,
    /// 只输出一次连通性报告
    #[arg(long)]
    once: bool,
  },

  /// 根据已记录的结果绘制校准曲线图
  Chart {
    /// `folder://` 输出写下的 JSON 记录
    #[arg(long, value_name = "FILE")]
    record: PathBuf,
    #[arg(long, value_name = "FILE")]
    output: PathBuf,
    #[arg(long, default_value = "640")]
    width: u32,
    #[arg(long, default_value = "400")]
    height: u32,
  },

  /// 查看或修改本地设置
  #[command(subcommand)]
  Settings(SettingsCommand),
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
  /// 显示全部设置
  Show,
  /// 修改一项应用设置（notifications、autoSave、dataRetention、language、units）
  Set { key: String, value: String },
  /// 切换主题（light、dark、system）
  Theme { theme: Theme },
  SignIn,
  SignOut,
}
