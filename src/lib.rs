//! hamlc：把缩进式 Haml 方言编译为嵌入 `{{ … }}` / `{% … %}`
//! 指令语法的模板文本，交由 MiniJinja 等下游引擎渲染。
//!
//! 编译是 (源码, 选项) → 文本的纯同步函数：单遍扫描，
//! 节点树随调用创建与销毁，调用之间不共享任何状态。

pub mod check;
pub mod codegen;
pub mod config;
pub mod element;
pub mod error;
pub mod filters;
pub mod inline;
pub mod lexer;
pub mod loader;
pub mod parser;

use std::sync::Arc;

pub use error::HamlError;
pub use filters::ScriptEvaluator;

/// 编译选项。调用方未覆盖时使用进程级默认值；
/// 未识别的配置项会被忽略以保持向前兼容
#[derive(Clone)]
pub struct Options {
    /// 属性值的包裹引号
    pub attr_wrapper: char,
    /// `:python` 过滤器的脚本执行器；默认不注入、过滤器不可用
    pub evaluator: Option<Arc<dyn ScriptEvaluator>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            attr_wrapper: '\'',
            evaluator: None,
        }
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("attr_wrapper", &self.attr_wrapper)
            .field("evaluator", &self.evaluator.as_ref().map(|_| "…"))
            .finish()
    }
}

/// 编译 Haml 源码为模板字符串
pub fn compile(source: &str, options: &Options) -> Result<String, HamlError> {
    compile_named(source, "<haml>", options)
}

/// 编译 Haml 源码，`file_name` 用于错误信息定位
pub fn compile_named(
    source: &str,
    file_name: &str,
    options: &Options,
) -> Result<String, HamlError> {
    let tokenized = lexer::tokenize(source);
    let tree = parser::parse(&tokenized, file_name, source)?;
    let output = codegen::generate(&tree, options)?;
    tracing::debug!("已编译 {file_name}：{} 行 → {} 字节", tokenized.lines.len(), output.len());
    Ok(output)
}
