use thiserror::Error;

#[derive(Error, Debug)]
pub enum MdsError {
    #[error("[MDS_FAULT]: FETCH_FAILED -> {0}")]
    FetchFailed(#[from] reqwest::Error),

    #[error("[MDS_FAULT]: MALFORMED_JWT -> expected 3 dot-separated segments, got {0}")]
    MalformedJwt(usize),

    #[error("[MDS_FAULT]: MALFORMED_PAYLOAD -> {0}")]
    MalformedPayload(String),

    #[error("[MDS_FAULT]: EMPTY_ENTRIES")]
    EmptyEntries,
}
