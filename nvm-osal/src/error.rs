//! 操作系统抽象层错误类型

use std::io;

use thiserror::Error;

/// 操作系统抽象层结果类型
pub type OsalResult<T> = Result<T, OsalError>;

/// 操作系统抽象层错误
#[derive(Debug, Error)]
pub enum OsalError {
    /// mmap 失败
    #[error("failed to map {len} bytes: {source}")]
    Map {
        len: usize,
        #[source]
        source: io::Error,
    },

    /// msync 失败
    #[error("failed to sync {len} mapped bytes: {source}")]
    Sync {
        len: usize,
        #[source]
        source: io::Error,
    },

    /// 映射长度非法
    #[error("invalid mapping length: {0}")]
    InvalidLength(usize),

    /// NUMA 节点不存在
    #[error("NUMA node {node} does not exist on this host")]
    InvalidNode { node: usize },

    /// 设置 CPU 亲和性失败
    #[error("failed to change CPU affinity: {0}")]
    Affinity(#[source] io::Error),

    /// 设置内存策略失败
    #[error("failed to change memory policy: {0}")]
    MemPolicy(#[source] io::Error),

    /// 拓扑检测失败
    #[error("NUMA topology detection failed: {0}")]
    Topology(String),

    /// 当前平台不支持
    #[error("operation not supported on {0}")]
    Unsupported(&'static str),
}
