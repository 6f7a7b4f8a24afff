use serde_json::json;
use std::io::{self, Write};

use super::options::OutputFormat;
use crate::collector::Report;
use crate::tasks::Action;

/// One line per action: `file:line [kind] module args`.
pub fn action_line(action: &Action) -> String {
    let location = match action.line() {
        Some(line) => format!("{}:{}", action.filename.display(), line),
        None => action.filename.display().to_string(),
    };

    let mut args: Vec<String> = action
        .arguments
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    args.extend(action.raw_arguments.iter().cloned());

    if args.is_empty() {
        format!("{} [{}] {}", location, action.kind, action.module)
    } else {
        format!("{} [{}] {} {}", location, action.kind, action.module, args.join(" "))
    }
}

pub fn write_report(out: &mut impl Write, report: &Report, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            let value = json!({
                "edges": report.edges,
                "actions": report.actions,
            });
            serde_json::to_writer_pretty(&mut *out, &value)?;
            writeln!(out)
        }
        OutputFormat::Text => {
            for action in &report.actions {
                writeln!(out, "{}", action_line(action))?;
            }
            Ok(())
        }
    }
}

pub fn write_errors(out: &mut impl Write, report: &Report) -> io::Result<()> {
    for error in &report.errors {
        writeln!(out, "error: {}", error)?;
    }
    Ok(())
}
