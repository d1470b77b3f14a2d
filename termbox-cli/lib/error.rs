use std::io;

use termbox_core::TermboxError;
use termbox_server::ServerError;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a termbox command.
pub type TermboxCliResult<T> = Result<T, TermboxCliError>;

/// An error that stops a termbox command.
#[derive(pretty_error_debug::Debug, Error)]
pub enum TermboxCliError {
    /// The server could not be configured or started.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// A core operation failed, e.g. loading the image catalog.
    #[error(transparent)]
    Core(#[from] TermboxError),

    /// An I/O error, e.g. binding the listen address.
    #[error(transparent)]
    Io(#[from] io::Error),
}
