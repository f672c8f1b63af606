use thiserror::Error;

use crate::gnss::GnssError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn the {name} thread")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Gnss(#[from] GnssError),
    #[error("the {0} thread panicked")]
    ThreadPanicked(&'static str),
}
