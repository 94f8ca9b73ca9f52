pub mod dispatch;
pub mod http;
pub mod poller;
pub mod state;
