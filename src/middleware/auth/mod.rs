pub mod access;
pub mod implicit_refresh;

pub use access::RouteGuard;
