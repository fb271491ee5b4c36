use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};

use crate::ApiforgeError;
use crate::runner::invocation::RunnerInvocation;
use crate::runner::types::{RunSummary, SampleRecord, SampleStatus};

pub struct RunReporter {
    verbose: bool,
}

impl RunReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// 打印运行开始
    pub fn print_header(&self, scenario: &str, invocation: &RunnerInvocation) {
        let source = if invocation.generated {
            "generated"
        } else {
            "script"
        };
        println!(
            "\nRunning {} ({}: {})...\n",
            scenario.bold(),
            source,
            invocation.program.display()
        );
        if self.verbose {
            println!("   {}", invocation.display().dimmed());
            println!();
        }
    }

    /// 打印单条样本
    pub fn print_sample(&self, sample: &SampleRecord) {
        let symbol = match sample.status {
            SampleStatus::Passed => "✓".green(),
            SampleStatus::Failed => "✗".red(),
            SampleStatus::Broken => "!".red().bold(),
            SampleStatus::Skipped => "⊘".dimmed(),
        };

        let code = sample
            .response_code()
            .map(|c| format!(" [{}]", c))
            .unwrap_or_default();

        println!(
            " {} {}{} ({}ms)",
            symbol,
            sample.label(),
            code,
            sample.elapsed().as_millis()
        );

        if let Some(msg) = &sample.error_msg {
            println!("   {}: {}", "Error".red().bold(), msg);
        }
        if self.verbose
            && let Some(trace) = &sample.error_trace
        {
            for line in trace.lines() {
                println!("     {}", line.dimmed());
            }
        }
    }

    /// 打印 worker 失败信息
    pub fn print_failure(&self, failure: &ApiforgeError) {
        println!("\n{}", "Worker failed".red().bold());
        for line in failure.to_string().lines() {
            println!("   {}", line);
        }
    }

    /// 打印摘要
    pub fn print_summary(&self, summary: &RunSummary, samples: &[SampleRecord]) {
        if self.verbose && !samples.is_empty() {
            println!("\n{}", samples_table(samples));
        }

        println!("\n{}", "━".repeat(50));
        println!("{}", "Summary".bold());
        println!("{}", "━".repeat(50));

        if summary.all_passed() {
            println!(
                "  {}: {} passed, {} skipped, {} total",
                "Samples".bold(),
                summary.passed.to_string().green(),
                summary.skipped.to_string().dimmed(),
                summary.total
            );
        } else {
            println!(
                "  {}: {} passed, {} failed, {} broken, {} skipped, {} total",
                "Samples".bold(),
                summary.passed.to_string().green(),
                summary.failed.to_string().red(),
                summary.broken.to_string().red(),
                summary.skipped.to_string().dimmed(),
                summary.total
            );
        }

        println!(
            "  {}: {:.3}s",
            "Duration".bold(),
            summary.total_duration.as_secs_f64()
        );
        println!();
    }
}

impl Default for RunReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

/// 样本明细表
pub fn samples_table(samples: &[SampleRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Time", "Test", "Status", "Code", "Duration"]);

    for sample in samples {
        let status_color = match sample.status {
            SampleStatus::Passed => Color::Green,
            SampleStatus::Skipped => Color::DarkGrey,
            SampleStatus::Failed | SampleStatus::Broken => Color::Red,
        };
        let time = sample
            .timestamp()
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default();
        let code = sample
            .response_code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(time),
            Cell::new(sample.label()).add_attribute(Attribute::Bold),
            Cell::new(format!("{:?}", sample.status).to_uppercase()).fg(status_color),
            Cell::new(code),
            Cell::new(format!("{}ms", sample.elapsed().as_millis())),
        ]);
    }

    table
}
