// PassGuard — Gateway Module
//
// Local API surface: JSON-RPC 2.0 over a Unix domain socket, with bearer
// token authentication and per-connection rate limiting.

mod protocol;
mod uds;

pub use uds::UdsServer;
