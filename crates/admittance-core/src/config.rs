//! # 控制器配置
//!
//! 配置在启动时加载一次，之后只读。
//!
//! ## 缺省策略
//!
//! 配置文件中的每一项都是可选的：缺失的参数会记录一条 `warn!` 日志并回退到
//! 内置默认值，而不是中止启动。调用方可以通过 [`ConfigLoad::defaulted`]
//! 查看哪些参数使用了默认值。
//!
//! 取值非法（如质量非正、限幅非正）与"缺失"不同，由 [`ControllerConfig::validate`]
//! 拒绝，返回 [`ConfigError::Invalid`]。
//!
//! ## 文件格式
//!
//! ```toml
//! rate_hz = 500.0
//! use_feedback_velocity = false
//! inertia_reduction = true
//! swap_base_elbow = false
//! startup_timeout_s = 10.0
//!
//! [model]
//! mass = [10.0, 10.0, 10.0, 1.0, 1.0, 1.0]
//! damping = [50.0, 50.0, 50.0, 5.0, 5.0, 5.0]
//! admittance_weight = 1.0
//! force_dead_zone = 2.0
//! torque_dead_zone = 0.2
//!
//! [limits]
//! max_velocity = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
//! max_acceleration = [2.0, 2.0, 2.0, 2.0, 2.0, 2.0]
//!
//! [singularity]
//! policy = "hold"
//! max_condition = 1.0e4
//! damping = 0.05
//! ```

use crate::error::ConfigError;
use crate::types::JointArray;
use nalgebra::{Matrix6, Vector6};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// 虚拟质量-阻尼模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmittanceModel {
    /// 质量矩阵对角线 [x, y, z, rx, ry, rz]（kg / kg·m²）
    pub mass: [f64; 6],
    /// 阻尼矩阵对角线（N·s/m / N·m·s/rad）
    pub damping: [f64; 6],
    /// 力旋量权重 k
    pub admittance_weight: f64,
    /// 力死区（N）
    pub force_dead_zone: f64,
    /// 力矩死区（N·m）
    pub torque_dead_zone: f64,
}

impl AdmittanceModel {
    pub fn mass_matrix(&self) -> Matrix6<f64> {
        Matrix6::from_diagonal(&Vector6::from_column_slice(&self.mass))
    }

    pub fn damping_matrix(&self) -> Matrix6<f64> {
        Matrix6::from_diagonal(&Vector6::from_column_slice(&self.damping))
    }
}

impl Default for AdmittanceModel {
    fn default() -> Self {
        Self {
            mass: [10.0, 10.0, 10.0, 1.0, 1.0, 1.0],
            damping: [50.0, 50.0, 50.0, 5.0, 5.0, 5.0],
            admittance_weight: 1.0,
            force_dead_zone: 2.0,
            torque_dead_zone: 0.2,
        }
    }
}

/// 关节动态限幅
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicLimits {
    /// 最大关节速度（rad/s）
    pub max_velocity: [f64; 6],
    /// 最大关节加速度（rad/s²）
    pub max_acceleration: [f64; 6],
}

impl DynamicLimits {
    pub fn velocity(&self) -> JointArray<f64> {
        JointArray::new(self.max_velocity)
    }

    pub fn acceleration(&self) -> JointArray<f64> {
        JointArray::new(self.max_acceleration)
    }
}

impl Default for DynamicLimits {
    fn default() -> Self {
        Self {
            // ⚠️ 这些值应该根据实际机器人参数调整
            max_velocity: [1.0; 6],
            max_acceleration: [2.0; 6],
        }
    }
}

/// 雅可比病态时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SingularityPolicy {
    /// 拒绝本周期，重发上一周期的命令，持久状态不变
    #[default]
    Hold,
    /// 改用阻尼最小二乘逆继续计算
    Damped,
    /// 停止控制循环
    Fault,
}

/// 奇异位形处理配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingularityConfig {
    pub policy: SingularityPolicy,
    /// 允许的最大条件数（σmax / σmin）
    pub max_condition: f64,
    /// 阻尼最小二乘的阻尼系数 λ（仅 `damped` 策略使用）
    pub damping: f64,
}

impl Default for SingularityConfig {
    fn default() -> Self {
        Self {
            policy: SingularityPolicy::Hold,
            max_condition: 1.0e4,
            damping: 0.05,
        }
    }
}

/// 控制器完整配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// 控制频率（Hz）
    pub rate_hz: f64,
    /// 使用实测关节速度（J·q̇）作为积分起点，否则使用上一周期命令
    pub use_feedback_velocity: bool,
    /// 无力轴速度清零
    pub inertia_reduction: bool,
    /// 交换关节 0 和 2（部分实机的接线顺序）
    pub swap_base_elbow: bool,
    /// 等待输入流的超时（秒），0 表示一直等待
    pub startup_timeout_s: f64,
    pub model: AdmittanceModel,
    pub limits: DynamicLimits,
    pub singularity: SingularityConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            rate_hz: 500.0,
            use_feedback_velocity: false,
            inertia_reduction: true,
            swap_base_elbow: false,
            startup_timeout_s: 10.0,
            model: AdmittanceModel::default(),
            limits: DynamicLimits::default(),
            singularity: SingularityConfig::default(),
        }
    }
}

/// 配置加载结果
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: ControllerConfig,
    /// 使用了默认值的参数（点分路径，如 `model.mass`）
    pub defaulted: Vec<&'static str>,
}

impl ControllerConfig {
    /// 从文件加载并校验
    ///
    /// 文件不存在时所有参数都使用默认值（同样记录警告）。
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ConfigLoad, ConfigError> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "Config file {} not found, every parameter falls back to its default",
                    path.display()
                );
                String::new()
            },
            Err(e) => return Err(e.into()),
        };
        Self::parse(&text)
    }

    /// 从 TOML 文本解析并校验
    pub fn parse(text: &str) -> Result<ConfigLoad, ConfigError> {
        let raw: RawControllerConfig = toml::from_str(text)?;
        let load = raw.resolve();
        load.config.validate()?;
        Ok(load)
    }

    /// 序列化为 TOML 文本
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 保存到文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// 控制周期（秒）
    pub fn dt(&self) -> f64 {
        1.0 / self.rate_hz
    }

    /// 控制周期
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.dt())
    }

    /// 启动超时（`None` 表示一直等待）
    pub fn startup_timeout(&self) -> Option<Duration> {
        (self.startup_timeout_s > 0.0).then(|| Duration::from_secs_f64(self.startup_timeout_s))
    }

    /// 校验取值
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("rate_hz", self.rate_hz)?;
        check_duration("1 / rate_hz", self.dt())?;
        check_positive_all("model.mass", &self.model.mass)?;
        check_positive_all("model.damping", &self.model.damping)?;
        check_finite("model.admittance_weight", self.model.admittance_weight)?;
        check_finite("model.force_dead_zone", self.model.force_dead_zone)?;
        check_finite("model.torque_dead_zone", self.model.torque_dead_zone)?;
        check_positive_all("limits.max_velocity", &self.limits.max_velocity)?;
        check_positive_all("limits.max_acceleration", &self.limits.max_acceleration)?;
        check_finite("startup_timeout_s", self.startup_timeout_s)?;
        if self.startup_timeout_s < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "startup_timeout_s must be >= 0 (got {})",
                self.startup_timeout_s
            )));
        }
        check_duration("startup_timeout_s", self.startup_timeout_s)?;
        check_positive("singularity.max_condition", self.singularity.max_condition)?;
        if self.singularity.max_condition < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "singularity.max_condition must be >= 1 (got {})",
                self.singularity.max_condition
            )));
        }
        check_positive("singularity.damping", self.singularity.damping)?;
        if self.rate_hz > 10_000.0 {
            warn!(
                "Very high control frequency: {} Hz. This may cause performance issues.",
                self.rate_hz
            );
        }
        Ok(())
    }

    /// 启动时打印一次配置
    pub fn log_summary(&self) {
        info!("Mass Matrix diagonal: {:?}", self.model.mass);
        info!("Damping Matrix diagonal: {:?}", self.model.damping);
        info!("Maximum Velocity: {:?}", self.limits.max_velocity);
        info!("Maximum Acceleration: {:?}", self.limits.max_acceleration);
        info!("Force Dead Zone: {:.2}", self.model.force_dead_zone);
        info!("Torque Dead Zone: {:.2}", self.model.torque_dead_zone);
        info!("Admittance Weight: {:.2}", self.model.admittance_weight);
        info!(
            "Cycle Time: {:.3} ms ({} Hz)",
            self.dt() * 1000.0,
            self.rate_hz
        );
        info!(
            "Velocity source: {}",
            if self.use_feedback_velocity {
                "joint feedback"
            } else {
                "last command"
            }
        );
        info!(
            "Singularity policy: {:?} (max condition {:.1e})",
            self.singularity.policy, self.singularity.max_condition
        );
        if !self.inertia_reduction {
            warn!("Inertia reduction disabled: velocity on unloaded axes will not be zeroed");
        }
        if self.swap_base_elbow {
            info!("Joint feedback indices 0 and 2 are swapped before use");
        }
    }
}

fn check_finite(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{key} must be finite (got {value})")))
    }
}

/// 秒数必须能表示为 `Duration`
fn check_duration(key: &str, seconds: f64) -> Result<(), ConfigError> {
    Duration::try_from_secs_f64(seconds).map(|_| ()).map_err(|_| {
        ConfigError::Invalid(format!("{key} = {seconds}s does not fit in a Duration"))
    })
}

fn check_positive(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{key} must be > 0 (got {value})")))
    }
}

fn check_positive_all(key: &str, values: &[f64; 6]) -> Result<(), ConfigError> {
    for (i, value) in values.iter().enumerate() {
        if !(value.is_finite() && *value > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "{key}[{i}] must be > 0 (got {value})"
            )));
        }
    }
    Ok(())
}

// 文件侧的镜像结构：所有字段可选，缺失项在 resolve() 中回退到默认值

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawControllerConfig {
    rate_hz: Option<f64>,
    use_feedback_velocity: Option<bool>,
    inertia_reduction: Option<bool>,
    swap_base_elbow: Option<bool>,
    startup_timeout_s: Option<f64>,
    model: Option<RawModel>,
    limits: Option<RawLimits>,
    singularity: Option<RawSingularity>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModel {
    mass: Option<[f64; 6]>,
    damping: Option<[f64; 6]>,
    admittance_weight: Option<f64>,
    force_dead_zone: Option<f64>,
    torque_dead_zone: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLimits {
    max_velocity: Option<[f64; 6]>,
    max_acceleration: Option<[f64; 6]>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSingularity {
    policy: Option<SingularityPolicy>,
    max_condition: Option<f64>,
    damping: Option<f64>,
}

/// 记录缺失参数并返回默认值
struct Defaults {
    defaulted: Vec<&'static str>,
}

impl Defaults {
    fn take<T: Debug>(&mut self, key: &'static str, value: Option<T>, default: T) -> T {
        match value {
            Some(value) => value,
            None => {
                warn!("Couldn't retrieve `{}`, falling back to default {:?}", key, default);
                self.defaulted.push(key);
                default
            },
        }
    }
}

impl RawControllerConfig {
    fn resolve(self) -> ConfigLoad {
        let defaults = ControllerConfig::default();
        let mut d = Defaults {
            defaulted: Vec::new(),
        };

        let model = self.model.unwrap_or_default();
        let limits = self.limits.unwrap_or_default();
        let singularity = self.singularity.unwrap_or_default();

        let config = ControllerConfig {
            rate_hz: d.take("rate_hz", self.rate_hz, defaults.rate_hz),
            use_feedback_velocity: d.take(
                "use_feedback_velocity",
                self.use_feedback_velocity,
                defaults.use_feedback_velocity,
            ),
            inertia_reduction: d.take(
                "inertia_reduction",
                self.inertia_reduction,
                defaults.inertia_reduction,
            ),
            swap_base_elbow: d.take(
                "swap_base_elbow",
                self.swap_base_elbow,
                defaults.swap_base_elbow,
            ),
            startup_timeout_s: d.take(
                "startup_timeout_s",
                self.startup_timeout_s,
                defaults.startup_timeout_s,
            ),
            model: AdmittanceModel {
                mass: d.take("model.mass", model.mass, defaults.model.mass),
                damping: d.take("model.damping", model.damping, defaults.model.damping),
                admittance_weight: d.take(
                    "model.admittance_weight",
                    model.admittance_weight,
                    defaults.model.admittance_weight,
                ),
                force_dead_zone: d.take(
                    "model.force_dead_zone",
                    model.force_dead_zone,
                    defaults.model.force_dead_zone,
                ),
                torque_dead_zone: d.take(
                    "model.torque_dead_zone",
                    model.torque_dead_zone,
                    defaults.model.torque_dead_zone,
                ),
            },
            limits: DynamicLimits {
                max_velocity: d.take(
                    "limits.max_velocity",
                    limits.max_velocity,
                    defaults.limits.max_velocity,
                ),
                max_acceleration: d.take(
                    "limits.max_acceleration",
                    limits.max_acceleration,
                    defaults.limits.max_acceleration,
                ),
            },
            singularity: SingularityConfig {
                policy: d.take(
                    "singularity.policy",
                    singularity.policy,
                    defaults.singularity.policy,
                ),
                max_condition: d.take(
                    "singularity.max_condition",
                    singularity.max_condition,
                    defaults.singularity.max_condition,
                ),
                damping: d.take(
                    "singularity.damping",
                    singularity.damping,
                    defaults.singularity.damping,
                ),
            },
        };

        ConfigLoad {
            config,
            defaulted: d.defaulted,
        }
    }
}
