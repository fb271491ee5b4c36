use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// 一次执行所需的全部参数，构造后不再修改
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerInvocation {
    /// 解释器路径
    pub interpreter: PathBuf,

    /// worker 入口脚本
    pub worker_script: PathBuf,

    /// 报告文件（LDJSON）
    pub report_path: PathBuf,

    /// 迭代次数上限
    pub iterations: Option<u64>,

    /// 持续时间上限
    pub hold: Option<Duration>,

    /// 测试程序路径
    pub program: PathBuf,

    /// 测试程序是否由编译器生成
    pub generated: bool,
}

impl RunnerInvocation {
    /// 构建命令行
    ///
    /// `<interpreter> <worker> --report-file <report> [-i N] [-d S] <program>`
    pub fn command_line(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            self.interpreter.clone().into(),
            self.worker_script.clone().into(),
            "--report-file".into(),
            self.report_path.clone().into(),
        ];

        if let Some(iterations) = self.iterations.filter(|n| *n > 0) {
            args.push("-i".into());
            args.push(iterations.to_string().into());
        }

        if let Some(hold) = self.hold.filter(|d| !d.is_zero()) {
            args.push("-d".into());
            args.push(format_hold(hold).into());
        }

        args.push(self.program.clone().into());
        args
    }

    /// 用于日志输出的命令行
    pub fn display(&self) -> String {
        self.command_line()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 整秒输出为整数，否则输出小数
fn format_hold(hold: Duration) -> String {
    if hold.subsec_nanos() == 0 {
        hold.as_secs().to_string()
    } else {
        hold.as_secs_f64().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation() -> RunnerInvocation {
        RunnerInvocation {
            interpreter: PathBuf::from("python3"),
            worker_script: PathBuf::from("/opt/nose_plugin.py"),
            report_path: PathBuf::from("/tmp/report.ldjson"),
            iterations: None,
            hold: None,
            program: PathBuf::from("/tmp/test_api.py"),
            generated: true,
        }
    }

    #[test]
    fn test_minimal_command_line() {
        assert_eq!(
            invocation().display(),
            "python3 /opt/nose_plugin.py --report-file /tmp/report.ldjson /tmp/test_api.py"
        );
    }

    #[test]
    fn test_bounded_command_line() {
        let mut inv = invocation();
        inv.iterations = Some(10);
        inv.hold = Some(Duration::from_secs(60));
        assert_eq!(
            inv.display(),
            "python3 /opt/nose_plugin.py --report-file /tmp/report.ldjson -i 10 -d 60 /tmp/test_api.py"
        );

        inv.hold = Some(Duration::from_millis(1500));
        assert!(inv.display().contains("-d 1.5 "));
    }

    #[test]
    fn test_zero_bounds_are_omitted() {
        let mut inv = invocation();
        inv.iterations = Some(0);
        inv.hold = Some(Duration::ZERO);
        assert!(!inv.display().contains("-i"));
        assert!(!inv.display().contains("-d"));
    }
}
