//! # Retdec Core
//!
//! Types and traits for the retdec decompilation client.
//!
//! Defines the protocol spoken between a client and the remote decompiler.
//!
//! - **[`JobDescriptor`](job::JobDescriptor)**: A decompilation request. Every parameter is optional and absent ones fall back to the service default.
//! - **[`JobHandle`](status::JobHandle)**: The id and follow-up links of a submitted job.
//! - **[`StatusSnapshot`](status::StatusSnapshot)**: One polled view of a job's progress.
//! - **[`ResultConsumer`](traits::ResultConsumer)**: Trait implemented by callers to receive progress and outputs.

#[macro_use]
mod wire;

pub mod constants;
pub mod error;
pub mod job;
pub mod status;
pub mod traits;

pub use wire::WireToken;

pub mod prelude {
    pub use super::constants::*;
    pub use super::error::*;
    pub use super::job::*;
    pub use super::status::*;
    pub use super::traits::*;
    pub use super::wire::WireToken;
}
