pub mod config;
pub mod datagram_socket;
pub mod receive_loop;
pub mod report_sink;
