use thiserror::Error;

/// Codec-level failure (§4.C2). Unparseable frames are logged and dropped;
/// they never reach the dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty line")]
    Empty,

    #[error("prefix with no following command")]
    PrefixWithoutCommand,

    #[error("too many parameters (max 15)")]
    TooManyParams,

    #[error("line exceeds 512 octets")]
    LineTooLong,
}

/// Directory-level failure (§4.C4). These indicate an invariant a handler
/// relies on was violated; they are not part of normal protocol flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("nickname '{0}' already in use")]
    NickInUse(String),

    #[error("no such channel '{0}'")]
    NoSuchChannel(String),

    #[error("no such nick '{0}'")]
    NoSuchNick(String),
}

/// What a command handler tells the dispatcher/worker to do next
/// (§9 "variant-typed handler result", replacing magic sentinel codes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Message handled (successfully or with a numeric error reply);
    /// keep the connection open.
    Continue,
    /// Orderly shutdown requested (QUIT, SendQ exceeded, failed server
    /// registration): the worker runs the §4.C5 teardown exactly once.
    Disconnect { reason: String },
}
