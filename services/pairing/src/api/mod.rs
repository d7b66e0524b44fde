//! HTTP 接口层：错误、响应包裹与内部类型。

pub(crate) mod error;
pub(crate) mod response;
pub(crate) mod types;
