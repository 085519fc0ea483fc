pub mod git;
pub mod http_bridge;
pub mod receiver;
