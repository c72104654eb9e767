//! the test_utils folder here shares utils and test components between unit
//! tests of different modules
mod common;

pub use common::*;
