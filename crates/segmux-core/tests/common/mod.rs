#![allow(dead_code)]

pub mod media;
pub mod range_server;
