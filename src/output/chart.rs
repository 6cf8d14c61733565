// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/output/chart.rs - 校准曲线图
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

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::{
  draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::api::{Rgb as Swatch, TestResult};
use crate::calibration::{
  ConcentrationStatus, GRADIENT_STEPS, LinearCalibration, concentration_range, gradient_stops,
  marker_position,
};
use crate::frame::SampleFrame;
use crate::output::Render;
use crate::{FromUrl, FromUrlWithScheme, url_to_path};

const MARGIN: u32 = 32;
const STRIP_HEIGHT: u32 = 16;
const CURVE_SAMPLES: usize = 50;
/// 没有校准数据时使用的横轴范围，mg/L
const FALLBACK_RANGE: (f64, f64) = (0.0, 15.0);

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([55, 65, 81]);
const CURVE: Rgb<u8> = Rgb([37, 99, 235]);

#[derive(Error, Debug)]
pub enum ChartOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无效的图表路径: {0}")]
  InvalidPath(String),
  #[error("图表尺寸过小: {0}x{1}")]
  TooSmall(u32, u32),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// `chart://` 输出：绘制校准曲线、校准点、色阶与本次读数，保存为 PNG
pub struct ChartOutput {
  path: PathBuf,
  width: u32,
  height: u32,
  calibration: LinearCalibration,
}

impl FromUrlWithScheme for ChartOutput {
  const SCHEME: &'static str = "chart";
}

impl FromUrl for ChartOutput {
  type Error = ChartOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(ChartOutputError::SchemeMismatch);
    }
    let path = url_to_path(uri).ok_or_else(|| ChartOutputError::InvalidPath(uri.to_string()))?;
    let query_pairs: HashMap<_, _> = uri.query_pairs().collect();
    let width: u32 = query_pairs
      .get("width")
      .and_then(|v| v.parse().ok())
      .unwrap_or(640);
    let height: u32 = query_pairs
      .get("height")
      .and_then(|v| v.parse().ok())
      .unwrap_or(400);
    ChartOutput::new(&path, width, height)
  }
}

/// 绘图区域到像素坐标的映射
struct Plot {
  left: f32,
  right: f32,
  top: f32,
  bottom: f32,
  min: f64,
  max: f64,
}

impl Plot {
  fn x(&self, concentration: f64) -> f32 {
    let t = marker_position(concentration, self.min, self.max).unwrap_or(0.0);
    self.left + (self.right - self.left) * t.clamp(0.0, 1.0) as f32
  }

  fn y(&self, intensity: f64) -> f32 {
    let t = (intensity / 255.0).clamp(0.0, 1.0) as f32;
    self.bottom - (self.bottom - self.top) * t
  }
}

fn to_pixel(color: Swatch) -> Rgb<u8> {
  Rgb([color.r, color.g, color.b])
}

fn hex_pixel(hex: &str) -> Rgb<u8> {
  Swatch::from_hex(hex).map(to_pixel).unwrap_or(AXIS)
}

impl ChartOutput {
  pub fn new(path: &Path, width: u32, height: u32) -> Result<Self, ChartOutputError> {
    let min_side = MARGIN * 2 + STRIP_HEIGHT * 2;
    if width < min_side || height < min_side {
      return Err(ChartOutputError::TooSmall(width, height));
    }
    Ok(Self {
      path: path.to_path_buf(),
      width,
      height,
      calibration: LinearCalibration::default(),
    })
  }

  pub fn calibration(mut self, calibration: LinearCalibration) -> Self {
    self.calibration = calibration;
    self
  }

  pub fn draw(&self, result: &TestResult) -> RgbImage {
    let mut image = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
    let (min, max) = match concentration_range(&result.chart) {
      Ok((min, max)) if max > min => (min, max),
      Ok(_) | Err(_) => {
        warn!("校准数据不足, 使用默认浓度范围");
        FALLBACK_RANGE
      }
    };
    let plot = Plot {
      left: MARGIN as f32,
      right: (self.width - MARGIN) as f32,
      top: MARGIN as f32,
      bottom: (self.height - MARGIN - STRIP_HEIGHT * 2) as f32,
      min,
      max,
    };

    draw_line_segment_mut(&mut image, (plot.left, plot.bottom), (plot.right, plot.bottom), AXIS);
    draw_line_segment_mut(&mut image, (plot.left, plot.top), (plot.left, plot.bottom), AXIS);

    if let Ok(points) = self.calibration.linear_points(min, max, CURVE_SAMPLES) {
      for pair in points.windows(2) {
        draw_line_segment_mut(
          &mut image,
          (plot.x(pair[0].concentration), plot.y(pair[0].intensity)),
          (plot.x(pair[1].concentration), plot.y(pair[1].intensity)),
          CURVE,
        );
      }
    }

    for point in &result.chart {
      let intensity = point
        .red
        .unwrap_or_else(|| self.calibration.predicted_intensity(point.concentration));
      let center = (
        plot.x(point.concentration).round() as i32,
        plot.y(intensity).round() as i32,
      );
      draw_filled_circle_mut(&mut image, center, 4, hex_pixel(&point.hex));
      draw_hollow_circle_mut(&mut image, center, 4, AXIS);
    }

    let stops = gradient_stops(&result.chart, GRADIENT_STEPS);
    if !stops.is_empty() {
      let strip_top = (self.height - MARGIN - STRIP_HEIGHT) as i32;
      let span = (plot.right - plot.left) / stops.len() as f32;
      for (i, stop) in stops.iter().enumerate() {
        let x = plot.left + span * i as f32;
        let rect = Rect::at(x.round() as i32, strip_top).of_size(span.ceil().max(1.0) as u32, STRIP_HEIGHT);
        draw_filled_rect_mut(&mut image, rect, hex_pixel(&stop.hex));
      }
    }

    let status = ConcentrationStatus::classify(result.concentration);
    let marker = hex_pixel(status.color_hex());
    let x = plot.x(result.concentration);
    draw_line_segment_mut(&mut image, (x, plot.top), (x, plot.bottom), marker);
    let center = (
      x.round() as i32,
      plot
        .y(self.calibration.predicted_intensity(result.concentration))
        .round() as i32,
    );
    draw_filled_circle_mut(&mut image, center, 6, to_pixel(result.color.rgb));
    draw_hollow_circle_mut(&mut image, center, 6, marker);

    image
  }
}

impl Render<SampleFrame, TestResult> for ChartOutput {
  type Error = ChartOutputError;

  fn render_result(&self, _frame: &SampleFrame, result: &TestResult) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    self.draw(result).save(&self.path)?;
    info!("保存校准曲线图: {}", self.path.display());
    Ok(())
  }
}
