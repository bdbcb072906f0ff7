//! Backend driver implementations.
//!
//! - **s3**: S3-compatible buckets (AWS, MinIO, Ceph)
//! - **gcs**: Google Cloud Storage
//! - **azure**: Azure Blob Storage
//! - **http**: plain HTTP(S) endpoints
//! - **raw**: content inlined in the workflow definition

pub mod azure;
pub mod gcs;
pub mod http;
pub mod raw;
pub mod s3;

pub use azure::AzureDriver;
pub use gcs::GcsDriver;
pub use http::HttpDriver;
pub use raw::RawDriver;
pub use s3::S3Driver;
