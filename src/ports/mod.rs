pub mod router_port;
