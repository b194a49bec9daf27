//! Integration harness for running lvmd against a real `lvm`.
//!
//! Tests need root. Tests that create volume groups on loop devices also
//! need `LVMD_TESTING_ENABLE_DESTRUCTIVE=1`; without it they report `SKIP`
//! and pass.

pub mod cmd;
pub mod errors;
pub mod logs;
pub mod loopback;
pub mod support;
