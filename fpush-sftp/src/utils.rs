use fpush_core::RemoteError;
use russh_sftp::client::error::Error;
use russh_sftp::protocol::StatusCode;

/// Classify an SFTP failure. Status replies mean the server answered and the
/// session is still usable; anything else means the channel is gone.
pub(crate) fn remote_error(path: &str, e: Error) -> RemoteError {
    match e {
        Error::Status(status) if status.status_code == StatusCode::NoSuchFile => {
            RemoteError::NotFound(path.to_string())
        }
        Error::Status(status) => RemoteError::Failed {
            path: path.to_string(),
            message: format!("{:?}: {}", status.status_code, status.error_message),
        },
        other => RemoteError::Disconnected(other.to_string()),
    }
}

pub(crate) fn io_error(path: &str, e: std::io::Error) -> RemoteError {
    RemoteError::Failed {
        path: path.to_string(),
        message: e.to_string(),
    }
}
