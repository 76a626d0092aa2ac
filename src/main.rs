use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hamlc::config::Config;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hamlc", about = "Haml 方言 → MiniJinja 模板编译器", version = long_version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 编译单个模板
    Compile {
        /// 模板文件路径
        input: PathBuf,

        /// 输出文件（缺省写到标准输出）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 覆盖配置中的属性包裹引号
        #[arg(long)]
        attr_wrapper: Option<char>,
    },

    /// 批量检查目录下的所有模板
    Check {
        /// 模板根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// 监听目录，模板变化时重新编译为 .html
    Watch {
        /// 模板根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// 输出目录（缺省与源文件同目录）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 配置中的日志级别作为默认值
    let config_root = match &cli.command {
        Commands::Compile { input, .. } => input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        Commands::Check { root } | Commands::Watch { root, .. } => root.clone(),
    };
    let config = Config::load(&config_root).unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.cli.log_level)),
        )
        .init();

    match cli.command {
        Commands::Compile {
            input,
            output,
            attr_wrapper,
        } => {
            let mut options = config.options()?;
            if let Some(w) = attr_wrapper {
                options.attr_wrapper = w;
            }

            let source = std::fs::read_to_string(&input)
                .with_context(|| format!("读取 {} 失败", input.display()))?;
            let html = hamlc::compile_named(&source, &input.display().to_string(), &options)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, html)
                        .with_context(|| format!("写入 {} 失败", path.display()))?;
                    tracing::info!("已写入：{}", path.display());
                }
                None => print!("{html}"),
            }
        }

        Commands::Check { root } => {
            let options = config.options()?;
            let result = hamlc::check::run(&root, &options)?;

            for w in &result.warnings {
                tracing::warn!("{w}");
            }
            for e in &result.errors {
                tracing::error!("{e}");
            }

            if result.errors.is_empty() {
                tracing::info!(
                    "检查通过：{} 个模板（{} 个警告）",
                    result.checked,
                    result.warnings.len()
                );
            } else {
                anyhow::bail!(
                    "检查未通过：{} 个错误，{} 个警告",
                    result.errors.len(),
                    result.warnings.len()
                );
            }
        }

        Commands::Watch { root, output } => {
            let options = config.options()?;
            watch(&root, output.as_deref(), &options)?;
        }
    }

    Ok(())
}

/// 初次全量编译后监听文件变化增量重编
fn watch(root: &Path, output: Option<&Path>, options: &hamlc::Options) -> Result<()> {
    use notify::{RecursiveMode, Watcher};

    for path in hamlc::check::collect_templates(root)? {
        compile_to_file(&path, output, options);
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx)?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    tracing::info!("开始监听：{}", root.display());

    for event in rx {
        let event = match event {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("监听事件错误：{e}");
                continue;
            }
        };
        if !matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
        ) {
            continue;
        }
        for path in event.paths {
            let is_template = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| hamlc::loader::VALID_EXTENSIONS.contains(&e));
            if is_template && path.is_file() {
                compile_to_file(&path, output, options);
            }
        }
    }

    Ok(())
}

fn compile_to_file(path: &Path, output: Option<&Path>, options: &hamlc::Options) {
    let target = match output {
        Some(dir) => dir.join(path.file_name().unwrap_or_default()).with_extension("html"),
        None => path.with_extension("html"),
    };

    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("读取 {} 失败：{e}", path.display());
            return;
        }
    };

    match hamlc::compile_named(&source, &path.display().to_string(), options) {
        Ok(html) => {
            if let Some(parent) = target.parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::error!("创建目录 {} 失败：{e}", parent.display());
                return;
            }
            match std::fs::write(&target, html) {
                Ok(()) => tracing::info!("{} → {}", path.display(), target.display()),
                Err(e) => tracing::error!("写入 {} 失败：{e}", target.display()),
            }
        }
        Err(e) => tracing::error!("{e}"),
    }
}

const fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\ncommit:  ",
        env!("HAMLC_GIT_COMMIT"),
        "\nbuild:   ",
        env!("HAMLC_BUILD_TIME"),
        "\ntarget:  ",
        env!("HAMLC_BUILD_TARGET"),
        "\nprofile: ",
        env!("HAMLC_BUILD_PROFILE"),
    )
}
