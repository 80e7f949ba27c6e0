use colored::{Color, ColoredString, Colorize};

use crate::{
    orchestrator::Summary,
    score::Mean,
    testing::{TestReport, Verdict},
};

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    matches!(v.as_str(), "truecolor" | "24bit")
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for Verdict {
    fn color(&self) -> Color {
        use Verdict::*;
        if !self::is_truecolor_supported() {
            return match self {
                Passed | Benchmarked(_) => Color::Green,
                RivalFailed(_) => Color::Cyan,
                WrongAnswer => Color::Yellow,
                TimedOut | CompilerTimeout => Color::Red,
                CompilerError | LinkError | ToolError => Color::Magenta,
            };
        }

        match self {
            Passed | Benchmarked(_) => Color::TrueColor {
                r: 30,
                g: 180,
                b: 40,
            },
            RivalFailed(_) => Color::TrueColor {
                r: 40,
                g: 150,
                b: 200,
            },
            WrongAnswer => Color::TrueColor {
                r: 210,
                g: 138,
                b: 4,
            },
            TimedOut | CompilerTimeout => Color::TrueColor {
                r: 220,
                g: 42,
                b: 42,
            },
            CompilerError | LinkError | ToolError => Color::TrueColor {
                r: 171,
                g: 40,
                b: 200,
            },
        }
    }
}

pub fn verdict_icon(verdict: &Verdict) -> ColoredString {
    let fg = if is_truecolor_supported() {
        Color::TrueColor {
            r: 255,
            g: 255,
            b: 255,
        }
    } else {
        Color::BrightBlack
    };
    format!(" {} ", verdict.label())
        .on_color(verdict.color())
        .bold()
        .color(fg)
}

/// One progress line per finished test.
pub fn format_report(report: &TestReport) -> String {
    match &report.verdict {
        Verdict::Benchmarked(b) => format!(
            "{} {}",
            report.name,
            format!(
                "{:.3}ms / {:.3}ms => {:.2}%",
                b.candidate_ms,
                b.rival_ms,
                b.rival_ms / b.candidate_ms * 100.0
            )
            .green()
        ),
        Verdict::RivalFailed(failure) => format!(
            "{} {} {}",
            report.name,
            verdict_icon(&report.verdict),
            format!("({})", failure).dimmed()
        ),
        verdict => format!("{} {}", report.name, verdict_icon(verdict)),
    }
}

pub fn print_report(report: &TestReport) {
    println!("{}", format_report(report));
}

fn info_tag() -> ColoredString {
    "[info]".blue().bold()
}

pub fn print_summary(summary: &Summary, mean: Mean) {
    for failure in &summary.failures {
        println!(
            "{} `{}` Failed {}",
            info_tag(),
            failure.name,
            failure.verdict.label().color(failure.verdict.color())
        );
    }

    let num_total = summary.reports.len();
    if summary.all_passed() {
        println!("{} {}", info_tag(), format!("All Passed ({} tests)", num_total).green());
    } else {
        println!(
            "{} {}",
            info_tag(),
            format!("{}/{} tests failed", summary.failures.len(), num_total).bright_red()
        );
    }

    if let Some(score) = summary.aggregate(mean) {
        println!(
            "{} final score: {} ({} mean of {} tests)",
            info_tag(),
            format!("{:.2}", score).bold(),
            mean,
            summary.scores().len()
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{Benchmark, ExecStatus, RivalFailure};

    #[test]
    fn report_lines() {
        colored::control::set_override(false);

        let b = TestReport::new(
            "fib",
            Verdict::Benchmarked(Benchmark {
                candidate_ms: 12.345,
                rival_ms: 20.0,
                score: 100.0,
            }),
        );
        assert_eq!(format_report(&b), "fib 12.345ms / 20.000ms => 162.01%");

        let wa = TestReport::new("qsort", Verdict::WrongAnswer);
        assert_eq!(format_report(&wa), "qsort  Wrong Answer ");

        let rival = TestReport::new(
            "hanoi",
            Verdict::RivalFailed(RivalFailure::Exec(ExecStatus::TimedOut)),
        );
        assert_eq!(
            format_report(&rival),
            "hanoi  Rival Error  (Time Limit Exceeded)"
        );
    }
}
