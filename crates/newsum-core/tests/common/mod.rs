pub mod completion_server;
