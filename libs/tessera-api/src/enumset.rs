use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::meta::Meta;
use crate::row::Cell;
use crate::value::{Kind, Value};

#[derive(Debug, Default)]
struct Labels {
    codes: HashMap<String, isize>,
    names: Vec<String>,
}

/// Categorical meta: string labels ↔ stable integer codes.
///
/// Codes are handed out in first-seen order starting at 0 and never
/// change afterwards, so one `EnumMeta` shared by a source and a sink
/// formats every code back to the label it was assigned for.
#[derive(Debug, Default)]
pub struct EnumMeta {
    labels: Mutex<Labels>,
}

impl EnumMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with known labels; they get codes `0..n` in the given order.
    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let meta = Self::new();
        for label in labels {
            let label: String = label.into();
            meta.code(&label);
        }
        meta
    }

    /// Code of `label`, assigning the next free one if it is new.
    pub fn code(&self, label: &str) -> isize {
        let mut labels = self.labels.lock();
        if let Some(code) = labels.codes.get(label) {
            return *code;
        }
        let code = labels.names.len() as isize;
        labels.names.push(label.to_string());
        labels.codes.insert(label.to_string(), code);
        code
    }

    pub fn label(&self, code: isize) -> Option<String> {
        let index = usize::try_from(code).ok()?;
        self.labels.lock().names.get(index).cloned()
    }

    /// Labels in code order.
    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().names.clone()
    }

    pub fn len(&self) -> usize {
        self.labels.lock().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Meta for EnumMeta {
    fn kind(&self) -> Kind {
        Kind::Isize
    }

    fn convert(&self, text: &str, slot: &mut Cell, _index: usize, width: usize) -> Result<()> {
        if width > 1 {
            return Err(Error::type_err(format!("enum column cannot hold {width} elements")));
        }
        let label = text.trim();
        if label.is_empty() {
            return Err(Error::convert(text, "empty enum label"));
        }
        *slot = Some(Value::Isize(self.code(label)));
        Ok(())
    }

    fn format(&self, value: Option<&Value>) -> Result<String> {
        match value {
            None => Ok(String::new()),
            Some(Value::Isize(code)) => self
                .label(*code)
                .ok_or_else(|| Error::type_err(format!("enum code {code} has no label"))),
            Some(other) => Err(Error::type_err(format!("`{other}` is not an enum code"))),
        }
    }
}
