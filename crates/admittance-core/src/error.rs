//! 核心层错误类型定义

use thiserror::Error;

/// 单个控制周期内的错误
///
/// 这些错误都只影响当前周期：调用方根据奇异处理策略决定是保持上一周期
/// 的命令还是停机，见 [`SingularityPolicy`](crate::config::SingularityPolicy)。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// 雅可比矩阵病态（接近奇异位形）
    #[error("Singular Jacobian: condition number {condition:.3e} exceeds limit {limit:.3e}")]
    SingularJacobian { condition: f64, limit: f64 },

    /// 关节状态不完整或格式错误
    #[error("Invalid joint state: {0}")]
    InvalidJointState(String),

    /// 计算结果中出现 NaN / Inf
    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),

    /// 输入流尚无采样
    #[error("No sample available on the {0} stream")]
    MissingInput(&'static str),
}

/// 配置错误
///
/// 缺失的参数不会产生错误（记录日志后使用默认值），
/// 这里只包含文件读写失败、语法错误和非法取值。
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读写失败
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML 语法或类型错误
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML 序列化失败
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// 参数取值非法
    #[error("Invalid config: {0}")]
    Invalid(String),
}
