/// Errors returned by the engine and the lightbulb facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Input outside its documented range (hue > 360, value > 100, bad
    /// channel index, invalid action period).
    InvalidArgument,
    /// Operation not valid in the current state (channel class disabled,
    /// unknown work mode).
    InvalidState,
    /// Optional capability invoked on a backend that does not implement it.
    NotSupported,
    /// A backend write failed. The fade engine contains these internally;
    /// see [`crate::fade::ERROR_COUNT_THRESHOLD`].
    HardwareFailure,
}
