//! 服务层模块

pub mod doc_generator;
pub mod language;
