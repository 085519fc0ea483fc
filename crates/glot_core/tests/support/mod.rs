#![allow(dead_code)]

pub mod archive;
pub mod receiver;
pub mod transport;
