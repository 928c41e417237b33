//! Web-facing collaborators for `notice-compose`: multipart HTTP upload and
//! JSON notice scripts.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod script;
mod upload;

pub use script::{ImageBlockSpec, NoticeScript, ScriptBlock, ScriptError, TextBlock};
pub use upload::{parse_descriptor, HttpUploader, MultipartForm, UploadConfig};

/// Current crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
