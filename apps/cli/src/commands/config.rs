//! 配置管理命令
//!
//! 控制器配置文件默认位于 `<config_dir>/admittance/controller.toml`。

use admittance_core::ControllerConfig;
use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::fs;
use std::path::{Path, PathBuf};

/// 默认配置文件路径
pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;

    path.push("admittance");
    path.push("controller.toml");
    Ok(path)
}

/// 解析配置文件路径（未指定时使用默认路径）
pub fn resolve_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => default_config_path(),
    }
}

/// 加载配置（缺失项使用默认值，非法值报错）
pub fn load_config(path: &Path) -> Result<ControllerConfig> {
    let load = ControllerConfig::load(path)
        .with_context(|| format!("加载配置文件失败: {}", path.display()))?;
    Ok(load.config)
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 写入默认配置
    Init {
        /// 配置文件路径
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// 覆盖已有文件
        #[arg(short, long)]
        force: bool,
    },

    /// 显示解析后的完整配置
    Show {
        /// 配置文件路径
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// 检查配置
    Check {
        /// 配置文件路径
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Init { path, force } => Self::init_(resolve_path(path)?, force),

            ConfigCommand::Show { path } => Self::show_(resolve_path(path)?),

            ConfigCommand::Check { path } => Self::check_(resolve_path(path)?),
        }
    }

    fn init_(path: PathBuf, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!(
                "配置文件已存在: {}（使用 --force 覆盖）",
                path.display()
            );
        }

        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).context("创建配置目录失败")?;
        }

        ControllerConfig::default()
            .save(&path)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;

        println!("✅ 已写入默认配置: {}", path.display());
        Ok(())
    }

    fn show_(path: PathBuf) -> Result<()> {
        let config = load_config(&path)?;
        let text = config.to_toml_string().context("序列化配置失败")?;

        println!("# {}", path.display());
        print!("{}", text);
        Ok(())
    }

    fn check_(path: PathBuf) -> Result<()> {
        let load = ControllerConfig::load(&path)
            .with_context(|| format!("配置检查失败: {}", path.display()))?;

        println!("配置文件: {}", path.display());
        if load.defaulted.is_empty() {
            println!("✅ 所有参数均已设置");
        } else {
            println!("⚠️  以下参数使用默认值:");
            for key in &load.defaulted {
                println!("  - {}", key);
            }
        }
        println!(
            "  控制频率: {} Hz, 奇异处理: {:?}",
            load.config.rate_hz, load.config.singularity.policy
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_explicit_path() {
        let path = PathBuf::from("/tmp/custom.toml");
        assert_eq!(resolve_path(Some(path.clone())).unwrap(), path);
    }

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("controller.toml");

        ConfigCommand::Init {
            path: Some(path.clone()),
            force: false,
        }
        .execute()
        .unwrap();
        assert_eq!(load_config(&path).unwrap(), ControllerConfig::default());

        // 已存在且未指定 --force
        let again = ConfigCommand::Init {
            path: Some(path.clone()),
            force: false,
        }
        .execute();
        assert!(again.is_err());

        ConfigCommand::Init {
            path: Some(path),
            force: true,
        }
        .execute()
        .unwrap();
    }
}
