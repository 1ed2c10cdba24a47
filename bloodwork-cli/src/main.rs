use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context};
use bloodwork_core::{
    MissingValuePolicy, PanelCatalog, Report, ReportBuilder, ReportConfig, StatusLabels,
};
use bloodwork_intake::{catalog_with_panels, measurements_from_form, measurements_from_str};
use clap::{Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "bloodwork-cli",
    about = "Phân loại chỉ số xét nghiệm máu theo khoảng tham chiếu."
)]
struct Args {
    /// File JSON giá trị xét nghiệm (kết quả parse hoặc object phẳng).
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Giá trị nhập tay dạng `khóa=giá_trị`, vd. `--value wbc=11,5`.
    #[arg(short, long = "value", value_name = "KEY=VALUE")]
    values: Vec<String>,

    /// Mã bảng chỉ số.
    #[arg(short, long, default_value = PanelCatalog::BASIC_CBC)]
    panel: String,

    /// File JSON chứa thêm bảng chỉ số.
    #[arg(long)]
    panel_file: Option<PathBuf>,

    /// Coi giá trị thiếu là bình thường (hành vi của client web cũ).
    #[arg(long)]
    missing_as_normal: bool,

    /// Ngôn ngữ nhãn trạng thái (`en`, `vi`).
    #[arg(short, long, default_value = "en")]
    locale: String,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let catalog = match &args.panel_file {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("Không đọc được file {:?}", path))?;
            catalog_with_panels(&data)
                .with_context(|| format!("Bảng chỉ số trong {:?} không hợp lệ", path))?
        }
        None => PanelCatalog::builtin()?,
    };

    let config = ReportConfig {
        panel: args.panel.clone(),
        missing_value_policy: if args.missing_as_normal {
            MissingValuePolicy::Normal
        } else {
            MissingValuePolicy::Unknown
        },
    };
    let panel = catalog.get(&config.panel)?;

    let mut measurements = match &args.input {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("Không đọc được file {:?}", path))?;
            measurements_from_str(&data, panel)?
        }
        None => HashMap::new(),
    };
    for (id, value) in measurements_from_form(&parse_value_args(&args.values)?, panel) {
        if value.is_some() || !measurements.contains_key(&id) {
            measurements.insert(id, value);
        }
    }
    debug!(panel = %panel.id, values = measurements.len(), "classifying measurements");

    let report = ReportBuilder::new(panel)
        .with_missing_value_policy(config.missing_value_policy)
        .build(&measurements);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            let Some(labels) = StatusLabels::for_locale(&args.locale) else {
                bail!("Không hỗ trợ ngôn ngữ {:?}", args.locale);
            };
            print!("{}", render_text(&report, &labels));
        }
    }

    Ok(())
}

fn parse_value_args(values: &[String]) -> anyhow::Result<HashMap<String, String>> {
    values
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Giá trị {pair:?} phải có dạng KEY=VALUE"))?;
            Ok((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

fn render_text(report: &Report, labels: &StatusLabels) -> String {
    let summary = report.summary();
    let mut out = format!(
        "Panel: {}\n{} ({}/{})\n\n",
        report.panel_id(),
        labels.verdict(summary.verdict),
        summary.abnormal,
        summary.total
    );

    for record in report.results() {
        let value = record
            .value
            .map(|value| format!("{value} {}", record.unit))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<22} {:>16}  [{}]  {}\n",
            record.name,
            value,
            record.reference_range,
            labels.status(record.status)
        ));
    }

    out
}
