/// Failures callers need to tell apart; everything else is an `eyre::Report`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{context} [{status}]: {body}")]
    Http {
        context: String,
        status: u16,
        body: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Transcript error: {0}")]
    Transcript(String),
}

impl Error {
    /// HTTP status carried by a report, if it wraps an [`Error::Http`].
    pub fn status_of(report: &color_eyre::eyre::Report) -> Option<u16> {
        match report.downcast_ref::<Error>() {
            Some(Error::Http { status, .. }) => Some(*status),
            _ => None,
        }
    }
}
