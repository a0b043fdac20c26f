//! HTTP remote store for bucketfs.
//!
//! Implements [`RemoteStore`](bucketfs_kernel::RemoteStore) against the code
//! bucket API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list      | `GET {endpoint}/files` |
//! | get       | `GET {endpoint}/files/{path}` |
//! | put       | `PUT {endpoint}/files/{path}` |
//! | delete    | `DELETE {endpoint}/files/{path}` |
//!
//! Credentials travel as query parameters on every request.

pub mod constants;
pub mod http;

pub use http::HttpStore;
