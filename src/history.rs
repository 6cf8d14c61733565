// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/history.rs - 历史记录筛选
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

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::api::HistoryEntry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateFilter {
  #[default]
  All,
  Today,
  Week,
  Month,
}

impl FromStr for DateFilter {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "all" => Ok(DateFilter::All),
      "today" => Ok(DateFilter::Today),
      "week" => Ok(DateFilter::Week),
      "month" => Ok(DateFilter::Month),
      other => Err(format!("未知的日期筛选: {}", other)),
    }
  }
}

impl DateFilter {
  fn accepts(&self, timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    let ts = match (self, timestamp) {
      (DateFilter::All, _) => return true,
      (_, None) => return false,
      (_, Some(ts)) => ts,
    };
    match self {
      DateFilter::All => true,
      DateFilter::Today => ts.date_naive() == now.date_naive(),
      DateFilter::Week => {
        // 与向上取整的天数差比较，包含未来一周
        let diff = (now - ts).num_milliseconds().unsigned_abs();
        let day = Duration::days(1).num_milliseconds() as u64;
        diff.div_ceil(day) <= 7
      }
      DateFilter::Month => ts.month() == now.month() && ts.year() == now.year(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryFilter {
  pub query: Option<String>,
  pub date: DateFilter,
  /// 闭区间 [min, max]，单位 mg/L
  pub range: (f64, f64),
}

impl Default for HistoryFilter {
  fn default() -> Self {
    Self {
      query: None,
      date: DateFilter::All,
      range: (0.0, 15.0),
    }
  }
}

impl HistoryFilter {
  /// 筛选并按时间从新到旧排序；无法解析时间的记录排在最后
  pub fn apply(&self, entries: &[HistoryEntry], now: DateTime<Utc>) -> Vec<HistoryEntry> {
    let query = self
      .query
      .as_deref()
      .map(str::trim)
      .filter(|q| !q.is_empty())
      .map(str::to_lowercase);

    let mut matched: Vec<(Option<DateTime<Utc>>, &HistoryEntry)> = entries
      .iter()
      .map(|entry| (entry.parsed_timestamp(), entry))
      .filter(|(_, entry)| {
        query.as_deref().is_none_or(|q| {
          entry.timestamp.to_lowercase().contains(q)
            || entry.concentration.to_string().contains(q)
        })
      })
      .filter(|(ts, _)| self.date.accepts(*ts, now))
      .filter(|(_, entry)| {
        entry.concentration >= self.range.0 && entry.concentration <= self.range.1
      })
      .collect();

    matched.sort_by(|a, b| b.0.cmp(&a.0));
    matched.into_iter().map(|(_, entry)| entry.clone()).collect()
  }
}

/// 超过保留天数的记录
pub fn is_expired(timestamp: DateTime<Utc>, retention_days: u32, now: DateTime<Utc>) -> bool {
  now - timestamp > Duration::days(retention_days as i64)
}
