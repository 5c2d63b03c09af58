use std::io::Write;

use tessera_table::Table;

use crate::config::{JobConfig, ShowArgs};
use crate::error::CliError;

pub async fn run(args: ShowArgs) -> Result<(), CliError> {
    let job = JobConfig::load(&args.job.config)?;
    let options = job.stream_options(args.job.workers);

    let table = Table::read(job.source.source()?, options).await?;
    tracing::info!(source = %job.source.describe(), rows = table.len(), "table read");

    let mut out = std::io::stdout().lock();
    for row in table.rows().iter().take(args.limit) {
        writeln!(out, "{row}")?;
    }
    if table.len() > args.limit {
        writeln!(out, "... {} more rows", table.len() - args.limit)?;
    }
    Ok(())
}
