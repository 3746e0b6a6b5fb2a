//! 日志初始化.
//!
//! 终端输出到 stderr (彩色), 指定日志目录时另写一份无色的按天滚动文件
//! `{dir}/{prefix}.{date}.log`. 每行带线程名, 便于区分主线程与后台解码线程.
//!
//! 级别 (TAO_LOG 环境变量优先):
//! - 默认:   info
//! - `-v`:   debug
//! - `-vv`:  trace, 只对播放相关 crate 生效
//! - `-vvv`: trace, 全局

use std::path::Path;
use std::sync::OnceLock;

use anyhow::Context;
use chrono::Local;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const PLAYBACK_TARGETS: &[&str] = &[
    "tao_ogv",
    "tao_core",
    "tao_codec",
    "tao_format",
    "tao_scale",
    "tao_playback",
    "tao_play",
];

fn filter_for(verbosity: u8) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env("TAO_LOG") {
        return filter;
    }
    match verbosity {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        2 => {
            let mut directives: Vec<String> =
                PLAYBACK_TARGETS.iter().map(|t| format!("{t}=trace")).collect();
            directives.push("info".into());
            EnvFilter::new(directives.join(","))
        }
        _ => EnvFilter::new("trace"),
    }
}

/// 初始化日志. 库 crate 的 `log` 记录经 tracing-log 桥接一并输出.
pub fn init(prefix: &str, verbosity: u8, dir: Option<&Path>) -> anyhow::Result<()> {
    let console = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .event_format(LineFormat { ansi: true })
        .with_filter(filter_for(verbosity));

    let file = match dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("创建日志目录失败: {}", dir.display()))?;
            let appender = tracing_appender::rolling::RollingFileAppender::builder()
                .rotation(tracing_appender::rolling::Rotation::DAILY)
                .filename_prefix(prefix)
                .filename_suffix("log")
                .build(dir)
                .context("创建日志文件失败")?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                fmt::Layer::default()
                    .with_writer(writer)
                    .with_ansi(false)
                    .event_format(LineFormat { ansi: false })
                    .with_filter(filter_for(verbosity)),
            )
        }
        None => None,
    };

    Registry::default()
        .with(console)
        .with(file)
        .try_init()
        .context("日志系统已初始化")
}

/// `[时:分:秒.毫秒] 级别 线程 > 消息`
struct LineFormat {
    ansi: bool,
}

impl LineFormat {
    fn level_color(level: tracing::Level) -> &'static str {
        match level {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let level = *event.metadata().level();
        let current = std::thread::current();
        let thread = current.name().unwrap_or("-");
        write!(writer, "[{}] ", Local::now().format("%H:%M:%S%.3f"))?;
        if self.ansi {
            write!(writer, "{}{:5}\x1b[0m", Self::level_color(level), level)?;
        } else {
            write!(writer, "{level:5}")?;
        }
        write!(writer, " {thread} > ")?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
