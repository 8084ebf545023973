/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An operating-system call failed while establishing a connection
    /// (`operation` is `"resolve"`, `"connect"` or `"bind"`).
    #[error("{operation} failed: {source}")]
    Syscall {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The host name resolved to no addresses.
    #[error("no addresses found for {host}")]
    NoAddress { host: String },

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Accepting a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    pub(crate) fn syscall(operation: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Syscall { operation, source }
    }
}
