//! Message definitions for the Grid Universe protocol.
//!
//! Every message is a JSON object tagged by its `type` field. This module
//! contains both client->server and server->client message types.

mod client;
mod server;

pub use client::*;
pub use server::*;
