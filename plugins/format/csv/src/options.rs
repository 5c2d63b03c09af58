use serde::Deserialize;

use tessera_api::Result;

use crate::parser::parse_delimiter;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CsvOptions {
    /// Single character; `\t` is accepted for tab.
    pub delimiter: String,
    pub quoting: bool,
    /// First line names the fields. Without it fields are `col0`, `col1`, ...
    pub header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: ",".to_string(), quoting: true, header: true }
    }
}

impl CsvOptions {
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn without_header(mut self) -> Self {
        self.header = false;
        self
    }

    pub fn delimiter(&self) -> Result<char> {
        parse_delimiter(&self.delimiter)
    }
}
