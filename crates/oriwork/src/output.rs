use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use oriwork_pool::PoolStats;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Print a flat record: one JSON line, a KEY/VALUE table, or `key=value` pairs.
pub fn print_record<T: Serialize>(record: &T, format: OutputFormat) {
    let value = serde_json::to_value(record).unwrap_or(Value::Null);
    match format {
        OutputFormat::Json => println!("{value}"),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "VALUE"]);
            for (key, field) in fields(&value) {
                table.add_row(vec![key, field]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line: Vec<String> = fields(&value)
                .into_iter()
                .map(|(key, field)| format!("{key}={field}"))
                .collect();
            println!("{}", line.join(" "));
        }
    }
}

/// Per-worker breakdown for human-readable formats.
pub fn print_workers(stats: &PoolStats, format: OutputFormat) {
    if matches!(format, OutputFormat::Json) {
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["WORKER", "STATE", "COMPLETED", "RESPAWNS", "PID"]);
    for worker in &stats.workers {
        table.add_row(vec![
            worker.id.to_string(),
            worker.state.as_str().to_string(),
            worker.completed.to_string(),
            worker.respawns.to_string(),
            worker
                .pid
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{table}");
}

fn fields(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter(|(_, field)| !field.is_array() && !field.is_object())
            .map(|(key, field)| (key.clone(), scalar(field)))
            .collect(),
        other => vec![("value".to_string(), scalar(other))],
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn fields_flatten_scalars_only() {
        let value = json!({"valid": true, "signature": "3045", "workers": [1, 2]});
        let fields = fields(&value);
        assert!(fields.contains(&("valid".to_string(), "true".to_string())));
        assert!(fields.contains(&("signature".to_string(), "3045".to_string())));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn null_renders_as_dash() {
        assert_eq!(scalar(&Value::Null), "-");
    }
}
