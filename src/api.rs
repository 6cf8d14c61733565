// 该文件是 Andan （氨氮检测） 项目的一部分。
// src/api.rs - 远程分析服务接口
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

mod client;
mod mock_transport;
mod model;
mod transport;

pub use self::client::{ApiClient, ApiError, LIVENESS_TIMEOUT, Probe};
pub use self::mock_transport::{MockTransport, RecordedRequest};
pub use self::model::{
  CalibrationPoint, ColorSwatch, ColorValidation, HistoryEntry, HistoryResponse, InstrumentInfo,
  PredictResponse, Rgb, SampleInfo, TestResult, ValidationResponse,
};
pub use self::transport::{HttpResponse, HttpTransport, Transport, TransportError, UploadForm};

/// 服务端各接口路径
pub mod endpoint {
  pub const LIVENESS: &str = "";
  pub const VALIDATE_COLOR: &str = "validate-color";
  pub const PREDICT: &str = "predict";
  pub const HISTORY: &str = "history";
}
