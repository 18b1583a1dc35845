/// A notification the host emits and subscribers react to.
///
/// Cancellable events report their state through [`is_cancelled`]; a
/// subscriber registered with `ignore_cancelled` is skipped once it returns
/// true, including when an earlier subscriber cancelled it.
///
/// [`is_cancelled`]: Event::is_cancelled
pub trait Event: Send + Sync + 'static {
    fn is_cancelled(&self) -> bool {
        false
    }
}
