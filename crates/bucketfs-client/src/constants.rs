//! Client constants.

/// Query parameter carrying the bucket id.
pub const BUCKET_ID_PARAM: &str = "metorial-code-bucket-id";

/// Query parameter carrying the bucket token.
pub const BUCKET_TOKEN_PARAM: &str = "metorial-code-bucket-token";

/// Collection segment of the bucket API.
pub const FILES_SEGMENT: &str = "files";

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("bucketfs/", env!("CARGO_PKG_VERSION"));
