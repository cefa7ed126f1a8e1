//! Unified error types for VoIP Armor

use std::net::SocketAddr;
use thiserror::Error;

use crate::server::FormError;
use crate::validator::ValidationFailure;

#[derive(Error, Debug)]
pub enum ArmorError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Connection error from {remote}: {source}")]
    Connection {
        remote: SocketAddr,
        source: hyper::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),
}

pub type Result<T> = std::result::Result<T, ArmorError>;
