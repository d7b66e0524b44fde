//! 鉴权 HTTP 接口处理模块。

mod http;
mod refresh;
mod verify;

pub(crate) use http::{device_refresh_handler, device_session_handler};
