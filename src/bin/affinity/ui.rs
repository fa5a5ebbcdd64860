use std::fmt::Display;
use std::io::IsTerminal;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use nu_ansi_term::{Color, Style};

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Theme {
    Auto,
    Light,
    Dark,
    Plain,
}

/// Human-facing output. Everything goes to stdout except warnings and the spinner.
pub struct Ui {
    palette: Palette,
    paint: bool,
    quiet: bool,
}

impl Ui {
    pub fn new(theme: Theme, quiet: bool) -> Self {
        let paint = theme != Theme::Plain && !quiet && std::io::stdout().is_terminal();

        #[cfg(windows)]
        if paint {
            let _ = nu_ansi_term::enable_ansi_support();
        }

        let palette = match theme {
            Theme::Plain => Palette::plain(),
            Theme::Light => Palette::light(),
            Theme::Dark | Theme::Auto => Palette::dark(),
        };
        Self {
            palette,
            paint,
            quiet,
        }
    }

    pub fn section<'a, I, V>(&self, title: &str, rows: I)
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Display,
    {
        let rows: Vec<(&str, String)> = rows
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        if rows.is_empty() {
            return;
        }
        self.heading(title);
        let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        for (key, value) in rows {
            let key = format!("{key:>width$}:");
            println!(
                "  {} {}",
                self.paint(self.palette.key, &key),
                self.paint(self.palette.value, &value)
            );
        }
    }

    /// Left-aligned columns sized to their widest cell.
    pub fn table(&self, title: &str, headers: &[&str], rows: &[Vec<String>]) {
        self.heading(title);
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }
        let header = headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| format!("{h:<w$}"))
            .collect::<Vec<_>>()
            .join("  ");
        println!("  {}", self.paint(self.palette.key, header.trim_end()));
        for row in rows {
            let line = row
                .iter()
                .zip(&widths)
                .map(|(cell, w)| format!("{cell:<w$}"))
                .collect::<Vec<_>>()
                .join("  ");
            println!("  {}", line.trim_end());
        }
    }

    pub fn info(&self, message: &str) {
        self.line(INFO_ICON, self.palette.info, message);
    }

    pub fn success(&self, message: &str) {
        self.line(SUCCESS_ICON, self.palette.success, message);
    }

    pub fn warn(&self, message: &str) {
        if self.quiet {
            eprintln!("{message}");
        } else {
            eprintln!("{} {message}", self.paint(self.palette.warn, WARNING_ICON));
        }
    }

    /// Starts a spinner that stays up until the guard is finished or dropped.
    pub fn task(&self, label: impl Into<String>) -> TaskGuard<'_> {
        let label = label.into();
        let pb = (!self.quiet).then(|| {
            let style = ProgressStyle::with_template("{prefix} {spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
            let pb = ProgressBar::new_spinner();
            pb.set_style(style);
            pb.set_prefix(self.paint(self.palette.info, PROGRESS_ICON));
            pb.set_message(label.clone());
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        });
        TaskGuard {
            ui: self,
            label,
            start: Instant::now(),
            finished: false,
            pb,
        }
    }

    fn line(&self, icon: &str, style: Style, message: &str) {
        if self.quiet {
            println!("{message}");
        } else {
            println!("{} {message}", self.paint(style, icon));
        }
    }

    fn heading(&self, title: &str) {
        if self.quiet {
            println!("{title}");
        } else {
            let formatted = format!("{HEADING_ICON} {title}");
            println!("{}", self.paint(self.palette.heading, &formatted));
        }
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.paint {
            style.paint(text).to_string()
        } else {
            text.to_string()
        }
    }
}

pub struct TaskGuard<'a> {
    ui: &'a Ui,
    label: String,
    start: Instant,
    finished: bool,
    pb: Option<ProgressBar>,
}

impl TaskGuard<'_> {
    pub fn finish(mut self) -> Duration {
        self.finished = true;
        if let Some(pb) = self.pb.take() {
            pb.finish_and_clear();
        }
        self.start.elapsed()
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let message = format!(
            "{} stopped after {}",
            self.label,
            format_duration(self.start.elapsed())
        );
        match self.pb.take() {
            Some(pb) => pb.abandon_with_message(message),
            None => self.ui.warn(&message),
        }
    }
}

pub fn format_duration(duration: Duration) -> String {
    if duration.as_secs_f64() >= 1.0 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{:.0}ms", duration.as_secs_f64() * 1_000.0)
    }
}

#[derive(Clone, Copy)]
struct Palette {
    heading: Style,
    key: Style,
    value: Style,
    info: Style,
    success: Style,
    warn: Style,
}

impl Palette {
    fn dark() -> Self {
        Self {
            heading: Style::new().fg(Color::Purple).bold(),
            key: Style::new().fg(Color::LightBlue).bold(),
            value: Style::new().fg(Color::White),
            info: Style::new().fg(Color::LightCyan),
            success: Style::new().fg(Color::LightGreen).bold(),
            warn: Style::new().fg(Color::Yellow).bold(),
        }
    }

    fn light() -> Self {
        Self {
            heading: Style::new().fg(Color::Blue).bold(),
            key: Style::new().fg(Color::Black).bold(),
            value: Style::new().fg(Color::Black),
            info: Style::new().fg(Color::Purple),
            success: Style::new().fg(Color::Green).bold(),
            warn: Style::new().fg(Color::Red).bold(),
        }
    }

    fn plain() -> Self {
        Self {
            heading: Style::new(),
            key: Style::new(),
            value: Style::new(),
            info: Style::new(),
            success: Style::new(),
            warn: Style::new(),
        }
    }
}

const HEADING_ICON: &str = "▸";
const SUCCESS_ICON: &str = "✔";
const WARNING_ICON: &str = "⚠";
const INFO_ICON: &str = "ℹ";
const PROGRESS_ICON: &str = "▶";
