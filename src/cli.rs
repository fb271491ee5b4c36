use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use apiforge::ApiforgeError;
use apiforge::config::{RunnerSettings, SettingsLoader};
use apiforge::generator::compile;
use apiforge::runner::{LoadSettings, RunReporter, SampleCollector, TestRunner};
use apiforge::scenario::ScenarioLoader;
use apiforge::utils::parse_duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 将场景编译为测试程序
    Compile {
        /// 场景文件（.toml / .json）
        scenario: PathBuf,

        /// 输出文件，不指定时打印到标准输出
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 编译并运行场景
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// 场景文件（.toml / .json）
    pub scenario: PathBuf,

    /// 解释器
    #[arg(long)]
    pub interpreter: Option<PathBuf>,

    /// worker 入口脚本
    #[arg(long)]
    pub worker: Option<PathBuf>,

    /// 迭代次数
    #[arg(short, long)]
    pub iterations: Option<u64>,

    /// 持续时间，例如 30s、1m30s
    #[arg(short = 'd', long, value_parser = duration_arg)]
    pub hold: Option<Duration>,

    /// 功能测试模式
    #[arg(long)]
    pub functional: bool,

    /// 输出目录
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// 整个运行的超时时间
    #[arg(long, value_parser = duration_arg)]
    pub timeout: Option<Duration>,

    /// 指定配置文件，默认查找 apiforge.toml
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn duration_arg(s: &str) -> std::result::Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

/// 编译场景
pub fn compile_scenario(scenario: &Path, output: Option<&Path>) -> Result<ExitCode> {
    let loaded = ScenarioLoader::load_from_path(scenario)
        .with_context(|| format!("Failed to load scenario {}", scenario.display()))?;
    let program = compile(&loaded)?;

    match output {
        Some(path) => {
            program.save(path)?;
            println!(
                "{} {} test methods to {}",
                "Wrote".green().bold(),
                program.methods.len(),
                path.display()
            );
        }
        None => print!("{}", program.render()),
    }

    Ok(ExitCode::SUCCESS)
}

enum Outcome {
    Finished,
    Cancelled,
    TimedOut(ApiforgeError),
}

/// 运行场景：准备、启动、轮询直到结束，然后汇总
pub async fn run(args: RunArgs, verbose: bool) -> Result<ExitCode> {
    let settings = resolve_settings(&args)?;
    let scenario = ScenarioLoader::load_from_path(&args.scenario)
        .with_context(|| format!("Failed to load scenario {}", args.scenario.display()))?;
    let label = args
        .scenario
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scenario".to_string());

    let poll_interval = settings.poll_interval;
    let reporter = RunReporter::new(verbose);
    let mut runner = TestRunner::new(&label, scenario, settings.clone()).with_load(LoadSettings {
        iterations: args.iterations,
        hold: args.hold,
        max_duration: args.timeout,
    });
    let mut collector = SampleCollector::new(runner.mode());

    runner.prepare(Some(&mut collector))?;
    if let Some(invocation) = runner.invocation() {
        reporter.print_header(&label, invocation);
    }
    runner.start()?;

    let mut samples = Vec::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                warn!("Interrupted, shutting down worker '{}'", label);
                tokio::task::block_in_place(|| runner.shutdown());
                break Outcome::Cancelled;
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }

        for sample in collector.collect()? {
            reporter.print_sample(&sample);
            samples.push(sample);
        }

        match runner.poll() {
            Ok(true) => break Outcome::Finished,
            Ok(false) => {}
            Err(e @ ApiforgeError::Timeout(_)) => break Outcome::TimedOut(e),
            Err(e) => return Err(e.into()),
        }
    };

    // 进程结束后报告文件可能还有未读取的记录
    for sample in collector.collect()? {
        reporter.print_sample(&sample);
        samples.push(sample);
    }
    // 忽略 SIGTERM 的 worker 会让 shutdown 阻塞一个宽限期
    tokio::task::block_in_place(|| runner.shutdown());

    let summary = collector.summary().clone();
    reporter.print_summary(&summary, &samples);
    if !runner.has_results() {
        warn!("Worker '{}' produced no results", label);
    }
    if let Some(paths) = runner.paths() {
        info!("Artifacts: {}", settings.artifacts_dir.display());
        info!("Report: {}", paths.report.display());
    }

    match outcome {
        Outcome::Cancelled => Ok(ExitCode::from(130)),
        Outcome::TimedOut(e) => Err(e.into()),
        Outcome::Finished => {
            if let Some(failure) = runner.failure() {
                reporter.print_failure(failure);
                Ok(ExitCode::FAILURE)
            } else if summary.all_passed() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// 优先级：命令行 > 配置文件 > 默认值
fn resolve_settings(args: &RunArgs) -> Result<RunnerSettings> {
    let mut settings = match &args.config {
        Some(path) => RunnerSettings::from_file(&SettingsLoader::load_from_path(path)?)?,
        None => SettingsLoader::find_and_load()?,
    };

    if let Some(interpreter) = &args.interpreter {
        settings.interpreter = interpreter.clone();
    }
    if let Some(worker) = &args.worker {
        settings.worker_script = worker.clone();
    }
    if let Some(artifacts) = &args.artifacts {
        settings.artifacts_dir = artifacts.clone();
    }
    if args.functional {
        settings.functional = true;
    }

    // 每次运行使用独立的时间戳目录
    settings.artifacts_dir = settings
        .artifacts_dir
        .join(Local::now().format("%Y-%m-%d_%H-%M-%S").to_string());

    Ok(settings)
}
