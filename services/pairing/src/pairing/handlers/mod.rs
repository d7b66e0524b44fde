//! 配对接口处理模块。

mod exchange;
mod http;
mod link;
mod register;

pub(crate) use http::{device_exchange_handler, device_link_handler, device_register_handler};
