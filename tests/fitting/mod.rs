//! Tests for the solver codec, the persisted text encoding and end-to-end global fits.

mod codec_tests;
mod global_fit_tests;
