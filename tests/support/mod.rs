#![allow(dead_code)]

pub mod socket_guard;
pub mod upstream;
