/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request could not be delivered (connection, DNS, TLS).
    Transport,
    /// The server answered with a non-success HTTP status.
    Status,
    /// The server reported an error inside the response stream.
    Api,
    /// Reading the response stream failed midway.
    Stream,
    /// Any other errors.
    Other,
}
