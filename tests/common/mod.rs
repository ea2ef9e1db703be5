#![allow(unused_imports)]

pub use stubrunner_test_utils::{init_tracing, with_timeout};
