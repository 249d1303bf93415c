/// Failure modes of the PI18 protocol stack.
///
/// Decode failures are never papered over with defaults: silently
/// misreporting an inverter's operating mode or battery chemistry is worse
/// than a visible error, so everything here propagates to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Communication-layer fault. Not retried at this level; the polling
    /// loop decides whether to try again on its next tick.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The device answered, but with a different prefix than the command
    /// expects, or with a bad integrity trailer. Carries the raw response
    /// text for diagnostics. `Transaction::send_command` converts this case
    /// (and only this case) into a rejected-command `false`.
    #[error("unexpected response, wanted prefix {expected:?}: {response:?}")]
    UnexpectedResponse { expected: String, response: String },

    /// Fewer fields than the telegram's documented minimum.
    #[error("malformed telegram: {0:?}")]
    MalformedTelegram(String),

    #[error("unknown {kind} value: {value:?}")]
    UnknownEnumerationValue { kind: &'static str, value: String },

    #[error("unknown fault code: {0}")]
    UnknownFaultCode(u16),

    #[error("malformed serial number response: {0:?}")]
    MalformedSerialNumber(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
