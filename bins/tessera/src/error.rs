#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Tessera(#[from] tessera_api::Error),

    #[error("interrupted")]
    Interrupted,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
