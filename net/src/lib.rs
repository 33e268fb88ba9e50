/*
Wire-level HTTP types shared between the serving runtime and anything that
talks to it. This crate only knows how to turn bytes into a Request and a
Response back into bytes; sockets, threading and lifecycle policy live in
the server crate.
*/

/// Type aliases shared across the workspace
pub mod data_types;

/// HTTP request and response types and their wire encoding
pub mod http;
