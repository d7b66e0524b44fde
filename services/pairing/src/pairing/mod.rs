//! 配对模块：配对码生成、存储状态机、过期清扫与接口处理。

pub(crate) mod code;
pub(crate) mod handlers;
pub(crate) mod store;
pub(crate) mod sweep;
