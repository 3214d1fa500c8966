pub mod io;
pub mod tcp;

pub use tcp::TcpTransport;
