// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;
pub mod wiremock_helpers;
