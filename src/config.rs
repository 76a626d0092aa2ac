//! `hamlc.toml` 配置：为命令行与宿主集成提供进程级默认编译选项。

use crate::Options;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;

/// 未识别的配置项一律忽略，保持向前兼容
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub cli: CliConfig,
}

#[derive(Debug, Deserialize)]
pub struct CompilerConfig {
    /// 属性值的包裹引号，单字符
    #[serde(default = "default_attr_wrapper")]
    pub attr_wrapper: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            attr_wrapper: default_attr_wrapper(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_attr_wrapper() -> String {
    "'".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// 从目录加载 `hamlc.toml`；文件不存在时使用默认配置
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("hamlc.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("读取 {} 失败", path.display()))?;
        toml::from_str(&text).with_context(|| format!("解析 {} 失败", path.display()))
    }

    /// 换算为编译选项
    pub fn options(&self) -> Result<Options> {
        let mut chars = self.compiler.attr_wrapper.chars();
        let (Some(wrapper), None) = (chars.next(), chars.next()) else {
            bail!(
                "compiler.attr_wrapper 必须是单个字符，当前为 {:?}",
                self.compiler.attr_wrapper
            );
        };
        Ok(Options {
            attr_wrapper: wrapper,
            ..Options::default()
        })
    }
}
