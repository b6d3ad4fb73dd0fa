//! # retdec
//!
//! An async client for the [retdec](https://retdec.com) decompilation service.
//!
//! A decompilation goes through four steps: the input file and its parameters are
//! submitted, the job status is polled until it finishes, the generated outputs are
//! listed, and every output a [`ResultConsumer`](prelude::ResultConsumer) accepts is
//! streamed to it.
//!
//! This crate serves as an entry point, re-exporting the core types and
//! optionally the HTTP client and the filesystem consumer via feature flags.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | **`client`** | The HTTP client (`retdec_client`). Enabled by default. |
//! | **`fs`** | A consumer saving outputs to a directory (`retdec_fs`). Enabled by default. |
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! retdec = "0.3"
//! ```
//!
//! ```rust,no_run
//! use retdec::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RetdecClient::new(DEFAULT_BASE_URL, Some("my-api-key".into()))?;
//!
//!     let job = JobDescriptor::bin(InputFile::from_path("prog.exe"));
//!     let handle = client.submit(&job).await?;
//!
//!     let task = client.spawn(handle, FileSaveConsumer::new("./out"));
//!     let consumer = task.join().await?;
//!     println!("saved {:?}", consumer.saved());
//!     Ok(())
//! }
//! ```

pub use retdec_core::*;

#[cfg(feature = "client")]
pub mod client {
    pub use retdec_client::*;
}

#[cfg(feature = "fs")]
pub mod fs {
    pub use retdec_fs::*;
}

pub mod prelude {
    pub use retdec_core::prelude::*;

    #[cfg(feature = "client")]
    pub use retdec_client::{ClientConfig, DecompilationTask, RetdecClient};

    #[cfg(feature = "fs")]
    pub use retdec_fs::FileSaveConsumer;
}
