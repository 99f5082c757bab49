//! End-to-end tests driving a [`shellac::Session`] the way a host would.

pub mod completion_test;
pub mod mode_test;
pub mod persistence_test;
pub mod pipeline_test;

use shellac::session::{BufferOutput, Session};
use std::sync::Arc;

/// Builds a session writing into a buffer.
pub fn buffered_session() -> (Session, BufferOutput) {
    let output = BufferOutput::new();
    let session = Session::builder().output(Arc::new(output.clone())).build();
    (session, output)
}
