//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use uiprobe_harness::{ActionOutcome, ProbeReport, ProbeSpec, ProbeVerdict};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

impl OutputFormat {
    /// Machine-readable formats print documents only, no decoration
    pub fn is_structured(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Yaml)
    }
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for ProbeSpec {
    fn headers() -> Vec<&'static str> {
        vec!["Probe", "Tags", "Kind", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.tags.join(", "),
            if self.is_documentation() {
                "documentation".to_string()
            } else {
                "browser".to_string()
            },
            self.description.clone(),
        ]
    }
}

impl TableDisplay for ProbeReport {
    fn headers() -> Vec<&'static str> {
        vec!["Probe", "Verdict", "Submit", "Indicators", "Evidence", "Duration", "Error"]
    }

    fn row(&self) -> Vec<String> {
        let verdict = match self.verdict {
            ProbeVerdict::Passed => "✓ passed".green().to_string(),
            ProbeVerdict::Documented => "• documented".cyan().to_string(),
            ProbeVerdict::Failed => "✗ failed".red().to_string(),
            ProbeVerdict::Errored => "✗ errored".red().bold().to_string(),
        };
        let submit = match self.submit {
            Some(ActionOutcome::Acted) => "sent",
            Some(ActionOutcome::Skipped) => "disabled",
            Some(ActionOutcome::Absent) => "absent",
            None => "-",
        };
        let indicators = self
            .indicators
            .indicators
            .iter()
            .map(|i| format!("{} {} ({})", i.name, i.total(), i.breakdown()))
            .collect::<Vec<_>>()
            .join("\n");

        vec![
            self.name.clone(),
            verdict,
            submit.to_string(),
            if indicators.is_empty() { "-".to_string() } else { indicators },
            self.evidence.len().to_string(),
            format!("{} ms", self.duration_ms),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

/// Print a document in a structured format
pub fn print_document<T: Serialize + ?Sized>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(value).unwrap_or_default());
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
        }
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() && !format.is_structured() {
        println!("No probes found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json | OutputFormat::Yaml => print_document(items, format),
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}
