use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use tessera_api::{Prefetch, Source, StreamOptions};
use tessera_csv::{ColumnSpec, CsvOptions, CsvSource};
use tessera_rdb::{Database, RdbOptions, RdbSource};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "tessera", about = "Move typed tables between CSV files and SQL databases")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drain the job's source into its sink
    Copy(JobArgs),
    /// Read the job's source into a table and print it
    Show(ShowArgs),
}

#[derive(Args, Clone, Debug)]
pub struct JobArgs {
    /// Path to the TOML job file
    #[arg(long, default_value = "job.toml", env = "TESSERA_JOB")]
    pub config: String,
    /// Override the job's worker count
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Args, Clone, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub job: JobArgs,
    /// Print at most this many rows
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

// ---- TOML job ----

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub source: EndpointConfig,
    #[serde(default)]
    pub sink: Option<EndpointConfig>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Read-ahead buffer size; 0 disables prefetch.
    #[serde(default)]
    pub prefetch: usize,
}

fn default_workers() -> usize {
    1
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndpointConfig {
    Csv {
        path: PathBuf,
        #[serde(default)]
        options: CsvOptions,
        #[serde(default)]
        columns: Vec<ColumnSpec>,
    },
    Rdb {
        /// `driver:connection-info`
        url: String,
        #[serde(default)]
        options: RdbOptions,
    },
}

impl JobConfig {
    pub fn load(path: &str) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content).map_err(|e| match e {
            CliError::Config { context, detail } => CliError::Config { context, detail: format!("'{path}': {detail}") },
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, CliError> {
        let job: JobConfig =
            toml::from_str(content).map_err(|e| CliError::Config { context: "parse", detail: e.to_string() })?;
        if job.workers == 0 {
            return Err(CliError::Config { context: "validate", detail: "workers must be at least 1".into() });
        }
        Ok(job)
    }

    pub fn stream_options(&self, workers: Option<usize>) -> StreamOptions {
        let prefetch = match self.prefetch {
            0 => Prefetch::None,
            n => Prefetch::Buffered(n),
        };
        StreamOptions::workers(workers.unwrap_or(self.workers)).with_prefetch(prefetch)
    }
}

impl EndpointConfig {
    pub fn source(&self) -> Result<Arc<dyn Source>, CliError> {
        let source: Arc<dyn Source> = match self {
            EndpointConfig::Csv { path, options, columns } => {
                let columns = columns.iter().map(ColumnSpec::to_column).collect::<Result<Vec<_>, _>>()?;
                Arc::new(CsvSource::from_path(path.clone(), columns, options.clone())?)
            }
            EndpointConfig::Rdb { url, options } => {
                Arc::new(RdbSource::new(Database::url(url.clone()), options.clone())?)
            }
        };
        Ok(source)
    }

    pub fn describe(&self) -> String {
        match self {
            EndpointConfig::Csv { path, .. } => format!("csv:{}", path.display()),
            EndpointConfig::Rdb { url, options } => {
                let driver = url.split_once(':').map_or(url.as_str(), |(d, _)| d);
                format!("{driver}:{}", options.table.as_deref().unwrap_or("<query>"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use tessera_rdb::IfExists;

    const JOB: &str = r#"
workers = 4
prefetch = 64

[source]
kind = "csv"
path = "iris.csv"

[[source.columns]]
pattern = "sepal*"
type = "tensor_f32"
group = "F1"

[[source.columns]]
pattern = "class"
rename = "label"

[sink]
kind = "rdb"
url = "postgres:host=localhost dbname=ml"

[sink.options]
table = "iris"
batch = 100
if_exists = "drop"
"#;

    #[test]
    fn parses_copy_job() {
        let job = JobConfig::parse(JOB).unwrap();
        assert_eq!(job.workers, 4);
        let options = job.stream_options(None);
        assert_eq!(options.prefetch, Prefetch::Buffered(64));
        assert_eq!(job.stream_options(Some(2)).workers, 2);

        let EndpointConfig::Csv { columns, options, .. } = &job.source else {
            panic!("expected csv source");
        };
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[1].meta, "string");
        assert_eq!(options, &CsvOptions::default());

        let Some(EndpointConfig::Rdb { options, .. }) = &job.sink else {
            panic!("expected rdb sink");
        };
        assert_eq!(options.batch, 100);
        assert_eq!(options.if_exists, IfExists::Drop);
        assert_eq!(job.sink.as_ref().unwrap().describe(), "postgres:iris");
    }

    #[test]
    fn rejects_unknown_keys_and_zero_workers() {
        let err = JobConfig::parse("colour = 1\n[source]\nkind = \"csv\"\npath = \"a.csv\"\n").unwrap_err();
        assert!(matches!(err, CliError::Config { context: "parse", .. }));

        let err = JobConfig::parse("workers = 0\n[source]\nkind = \"csv\"\npath = \"a.csv\"\n").unwrap_err();
        assert!(matches!(err, CliError::Config { context: "validate", .. }));
    }

    #[test]
    fn load_reports_path() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "[source]\nkind = \"xml\"\n").unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let err = JobConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains(&path), "{err}");
    }

    #[test]
    fn rdb_source_needs_table_or_query() {
        let job = JobConfig::parse("[source]\nkind = \"rdb\"\nurl = \"mysql:x\"\n").unwrap();
        assert!(matches!(job.source.source(), Err(CliError::Tessera(_))));
    }
}
