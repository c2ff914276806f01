//! Multi-version visibility
//!
//! - `CommitId` totally orders committed writes
//! - `ReadView` fixes what a read can see at its start
//! - `VersionChain` keeps the per-key history readers may still need
//! - `VisibilityFloor` bounds what reclamation may drop

mod commit_id;
mod floor;
mod read_view;
mod version;
mod version_chain;

pub use commit_id::CommitId;
pub use floor::VisibilityFloor;
pub use read_view::ReadView;
pub use version::{Version, VersionPayload};
pub use version_chain::VersionChain;
