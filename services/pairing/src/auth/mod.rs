//! 鉴权模块：token 编解码、签名密钥、调用方身份与接口处理。

pub(crate) mod handlers;
pub(crate) mod identity;
pub(crate) mod store;
pub(crate) mod token;
