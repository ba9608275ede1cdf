use anyhow::Result;
use audit_core::{code_or_zero, Regression};
use clap::ValueEnum;
use std::io::Write;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Jsonl,
}

pub fn write_report<W: Write>(mut w: W, regressions: &[Regression], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for r in regressions {
                writeln!(
                    w,
                    "{}:{}\t{} -> {}\t{}",
                    r.server_name,
                    r.port,
                    code_or_zero(r.orig_status_code),
                    code_or_zero(r.new_status_code),
                    r.status_message
                )?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut w, regressions)?;
            writeln!(w)?;
        }
        OutputFormat::Jsonl => {
            for r in regressions {
                serde_json::to_writer(&mut w, r)?;
                writeln!(w)?;
            }
        }
    }
    w.flush()?;
    Ok(())
}

pub fn write_csv<W: Write>(w: W, regressions: &[Regression]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(["server_name", "port", "orig_status_code", "new_status_code", "status_message"])?;
    for r in regressions {
        wtr.write_record([
            r.server_name.clone(),
            r.port.to_string(),
            code_or_zero(r.orig_status_code).to_string(),
            code_or_zero(r.new_status_code).to_string(),
            r.status_message.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
