use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use tessera_api::Sink;
use tessera_csv::CsvSink;
use tessera_rdb::{Database, RdbSink};

use crate::config::{EndpointConfig, JobArgs, JobConfig};
use crate::error::CliError;

/// Opened sink plus the concrete handle used for reporting.
enum Target {
    Csv(Arc<CsvSink>),
    Rdb(Arc<RdbSink>),
}

impl Target {
    fn open(config: &EndpointConfig) -> Result<Self, CliError> {
        let target = match config {
            EndpointConfig::Csv { path, options, columns } => {
                if !columns.is_empty() {
                    tracing::warn!(path = %path.display(), "column descriptors are ignored for a csv sink");
                }
                Target::Csv(Arc::new(CsvSink::create(path, options.clone())?))
            }
            EndpointConfig::Rdb { url, options } => {
                Target::Rdb(Arc::new(RdbSink::open(Database::url(url.clone()), options.clone())?))
            }
        };
        Ok(target)
    }

    fn sink(&self) -> Arc<dyn Sink> {
        match self {
            Target::Csv(sink) => Arc::clone(sink) as Arc<dyn Sink>,
            Target::Rdb(sink) => Arc::clone(sink) as Arc<dyn Sink>,
        }
    }

    fn written(&self) -> usize {
        match self {
            Target::Csv(sink) => sink.written(),
            Target::Rdb(sink) => sink.written(),
        }
    }
}

pub async fn run(args: JobArgs) -> Result<(), CliError> {
    let job = JobConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded job");

    let sink_config = job.sink.as_ref().ok_or_else(|| CliError::Config {
        context: "validate",
        detail: format!("'{}': copy needs a [sink] section", args.config),
    })?;

    let source = job.source.source()?;
    let target = Target::open(sink_config)?;
    let options = job.stream_options(args.workers);
    tracing::info!(
        from = %job.source.describe(),
        to = %sink_config.describe(),
        workers = options.workers,
        "copy started"
    );

    let cancel = CancellationToken::new();
    let drained = tessera_pipeline::drain_until(source, target.sink(), options, cancel.clone());
    tokio::pin!(drained);
    let result = tokio::select! {
        result = &mut drained => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::warn!("interrupted, stopping copy");
            cancel.cancel();
            drained.await
        }
    };
    match result {
        Ok(()) => {}
        Err(tessera_api::Error::Cancelled) => {
            tracing::warn!(rows = target.written(), "copy abandoned");
            return Err(CliError::Interrupted);
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(rows = target.written(), "copy finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tessera_rdb::{Database, RdbOptions};

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn copies_csv_into_sqlite() {
        tessera_sqlite::register();
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("iris.csv");
        std::fs::write(&csv, "sepal_len,class\n5.1,setosa\n7.0,versicolor\n6.3,virginica\n").unwrap();
        let db = format!("sqlite:{}", dir.path().join("iris.db").display());

        let mut job = tempfile::NamedTempFile::new().unwrap();
        write!(
            job,
            r#"
workers = 2

[source]
kind = "csv"
path = "{}"

[[source.columns]]
pattern = "sepal_len"
type = "f64"

[[source.columns]]
pattern = "class"
rename = "label"

[sink]
kind = "rdb"
url = "{db}"

[sink.options]
table = "iris"
batch = 2
"#,
            csv.display()
        )
        .unwrap();

        let args = JobArgs { config: job.path().display().to_string(), workers: None };
        run(args).await.unwrap();

        let options = RdbOptions::query("select sepal_len, label from iris order by sepal_len");
        let table = tessera_rdb::read(Database::url(db), options).await.unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.factory().unwrap().names(), ["sepal_len", "label"]);
        assert_eq!(table.row(2).unwrap().col("label"), Some(&tessera_api::Value::from("versicolor")));
        assert_eq!(table.row(0).unwrap().col("sepal_len"), Some(&tessera_api::Value::Float64(5.1)));
    }

    #[tokio::test]
    async fn unknown_driver_fails_before_copying() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("a.csv");
        std::fs::write(&csv, "a\n1\n").unwrap();
        let job = dir.path().join("job.toml");
        std::fs::write(
            &job,
            format!("[source]\nkind = \"csv\"\npath = \"{}\"\n\n[sink]\nkind = \"rdb\"\nurl = \"nosuch:x\"\n\n[sink.options]\ntable = \"a\"\n", csv.display()),
        )
        .unwrap();

        let err = run(JobArgs { config: job.display().to_string(), workers: None }).await.unwrap_err();
        assert!(err.to_string().contains("unknown driver"), "{err}");
    }
}
