/// Told about every confident identity match. Fire-and-forget: must not
/// block the identity lane for long and has no way to report failure.
pub trait MatchNotifier: Send + Sync {
    fn notify(&self, name: &str);
}

impl<F> MatchNotifier for F
where
    F: Fn(&str) + Send + Sync,
{
    fn notify(&self, name: &str) {
        self(name)
    }
}
