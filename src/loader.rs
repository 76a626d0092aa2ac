//! 宿主加载器集成：识别模板扩展名、取回源码、编译后交给下游引擎。
//!
//! 宿主通过实现 [`TemplateSource`] 能力接口接入，[`HamlLoader`] 以
//! 组合（委托）方式包装它；扩展名不匹配与取回失败都是软性的
//! "未找到"，让宿主的加载器链可以继续尝试下一个加载器。

use crate::{Options, compile_named};
use anyhow::Result;
use std::path::PathBuf;

/// 可识别的模板扩展名（封闭集合）
pub const VALID_EXTENSIONS: &[&str] = &["haml", "hamlpy"];

/// 宿主模板来源的最小能力接口
pub trait TemplateSource {
    /// 该来源是否处理此扩展名
    fn can_handle(&self, extension: &str) -> bool;
    /// 按模板名列出候选标识（如各搜索目录下的路径）
    fn enumerate_candidates(&self, name: &str) -> Vec<String>;
    /// 按标识取回源码文本
    fn fetch(&self, identifier: &str) -> Result<String>;
}

/// 包装宿主来源的 Haml 加载器
pub struct HamlLoader<S> {
    source: S,
    options: Options,
}

impl<S: TemplateSource> HamlLoader<S> {
    pub fn new(source: S) -> Self {
        Self::with_options(source, Options::default())
    }

    pub fn with_options(source: S, options: Options) -> Self {
        Self { source, options }
    }

    /// 加载并编译模板。扩展名不受支持或模板不存在返回 `Ok(None)`，
    /// 编译失败是硬错误
    pub fn load(&self, name: &str) -> Result<Option<String>> {
        let Some(extension) = extension_of(name) else {
            return Ok(None);
        };
        if !VALID_EXTENSIONS.contains(&extension) || !self.source.can_handle(extension) {
            tracing::debug!("扩展名不受支持，交还加载器链：{name}");
            return Ok(None);
        }

        for candidate in self.source.enumerate_candidates(name) {
            let text = match self.source.fetch(&candidate) {
                Ok(text) => text,
                // 单个候选取回失败视同未找到，继续尝试下一个
                Err(e) => {
                    tracing::debug!("候选 {candidate} 取回失败：{e}");
                    continue;
                }
            };
            let compiled = compile_named(&text, &candidate, &self.options)?;
            return Ok(Some(compiled));
        }

        Ok(None)
    }

    /// 适配为 `minijinja::Environment::set_loader` 接受的闭包
    pub fn into_minijinja_loader(
        self,
    ) -> impl Fn(&str) -> Result<Option<String>, minijinja::Error> + Send + Sync + 'static
    where
        S: Send + Sync + 'static,
    {
        move |name| {
            self.load(name).map_err(|e| {
                minijinja::Error::new(minijinja::ErrorKind::SyntaxError, e.to_string())
            })
        }
    }
}

/// 基于文件系统搜索目录的模板来源
pub struct DirSource {
    roots: Vec<PathBuf>,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { roots: vec![root.into()] }
    }

    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl TemplateSource for DirSource {
    fn can_handle(&self, extension: &str) -> bool {
        VALID_EXTENSIONS.contains(&extension)
    }

    fn enumerate_candidates(&self, name: &str) -> Vec<String> {
        self.roots
            .iter()
            .map(|root| root.join(name))
            .filter(|p| p.is_file())
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }

    fn fetch(&self, identifier: &str) -> Result<String> {
        Ok(std::fs::read_to_string(identifier)?)
    }
}

fn extension_of(name: &str) -> Option<&str> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() { None } else { Some(ext) }
}
