//! 测试用的内存实现与端到端流程测试

pub mod support;
