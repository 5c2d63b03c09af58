use std::sync::Arc;

use serde::Deserialize;

use tessera_api::{Error, Kind, Meta, Result, RowFactory, ScalarMeta, TensorElem, TensorMeta, meta_by_name};

/// Selects CSV fields by name and says how to parse them.
///
/// A pattern ending in `*` matches every field with that prefix.
#[derive(Debug, Clone)]
pub struct Column {
    meta: Arc<dyn Meta>,
    pattern: String,
    rename: Option<String>,
    group: Option<String>,
}

impl Column {
    pub fn new(meta: Arc<dyn Meta>, pattern: impl Into<String>) -> Self {
        Self { meta, pattern: pattern.into(), rename: None, group: None }
    }

    pub fn scalar(kind: Kind, pattern: impl Into<String>) -> Self {
        Self::new(Arc::new(ScalarMeta(kind)), pattern)
    }

    /// Name the resulting column. Requires the pattern to match one field.
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    /// Collect every matched field into one multi-element column.
    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.group = Some(name.into());
        self
    }

    /// Meta for the grouped column: tensor metas as given, `u8` and `f32`
    /// scalars widened to a tensor of that element.
    fn grouped_meta(&self) -> Result<Arc<dyn Meta>> {
        match self.meta.kind() {
            Kind::Tensor => Ok(Arc::clone(&self.meta)),
            Kind::UInt8 => Ok(Arc::new(TensorMeta::new(TensorElem::Byte))),
            Kind::Float32 => Ok(Arc::new(TensorMeta::new(TensorElem::Float32))),
            other => Err(Error::config(format!(
                "csv: `{}` cannot be grouped as {other}; use u8, f32 or a tensor type",
                self.pattern
            ))),
        }
    }

    fn matches(&self, field: &str) -> bool {
        match self.pattern.strip_suffix('*') {
            Some(prefix) => field.starts_with(prefix),
            None => field == self.pattern,
        }
    }
}

/// Column description as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    pub pattern: String,
    /// Meta name, e.g. `float32`, `string`, `tensor_f32`.
    #[serde(rename = "type", default = "default_type")]
    pub meta: String,
    #[serde(default)]
    pub rename: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

fn default_type() -> String { "string".into() }

impl ColumnSpec {
    pub fn to_column(&self) -> Result<Column> {
        let mut column = Column::new(meta_by_name(&self.meta)?, self.pattern.clone());
        column.rename = self.rename.clone();
        column.group = self.group.clone();
        Ok(column)
    }
}

/// Where one input field goes.
#[derive(Debug, Clone)]
pub(crate) struct Target {
    pub meta: Arc<dyn Meta>,
    pub column: usize,
    pub index: usize,
    pub width: usize,
}

/// Field-to-column mapping resolved against a header.
#[derive(Debug)]
pub(crate) struct Layout {
    pub factory: Arc<RowFactory>,
    pub fields: Vec<String>,
    pub targets: Vec<Option<Target>>,
}

impl Layout {
    /// Every field becomes a string column.
    fn all_strings(fields: Vec<String>) -> Self {
        let meta: Arc<dyn Meta> = Arc::new(ScalarMeta(Kind::String));
        let targets = (0..fields.len())
            .map(|column| Some(Target { meta: Arc::clone(&meta), column, index: 0, width: 1 }))
            .collect();
        Self { factory: RowFactory::new(fields.iter().cloned()), fields, targets }
    }

    /// Columns come out in descriptor order; a field claimed by an
    /// earlier descriptor is not matched again.
    pub fn resolve(fields: Vec<String>, columns: &[Column]) -> Result<Self> {
        if columns.is_empty() {
            return Ok(Self::all_strings(fields));
        }

        let mut targets: Vec<Option<Target>> = vec![None; fields.len()];
        let mut names = Vec::new();
        for column in columns {
            let matched: Vec<usize> = (0..fields.len())
                .filter(|&i| targets[i].is_none() && column.matches(&fields[i]))
                .collect();
            if matched.is_empty() {
                return Err(Error::config(format!("csv: no field matches `{}`", column.pattern)));
            }

            if let Some(group) = &column.group {
                let grouped = column.grouped_meta()?;
                let width = matched.len();
                for (index, &field) in matched.iter().enumerate() {
                    let meta = Arc::clone(&grouped);
                    targets[field] = Some(Target { meta, column: names.len(), index, width });
                }
                names.push(group.clone());
                continue;
            }

            if column.rename.is_some() && matched.len() > 1 {
                return Err(Error::config(format!(
                    "csv: `{}` matches {} fields and cannot be renamed; use group",
                    column.pattern,
                    matched.len()
                )));
            }
            for field in matched {
                let meta = Arc::clone(&column.meta);
                targets[field] = Some(Target { meta, column: names.len(), index: 0, width: 1 });
                names.push(column.rename.clone().unwrap_or_else(|| fields[field].clone()));
            }
        }

        Ok(Self { factory: RowFactory::new(names), fields, targets })
    }
}
