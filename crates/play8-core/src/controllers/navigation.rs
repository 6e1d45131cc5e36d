/// Reflects the shown conversation in the surrounding UI (URL, title bar).
pub trait Navigator: Send + Sync {
    fn show_conversation(&self, id: &str);
    fn show_new_conversation(&self);
}

/// Navigator for front ends without addressable locations.
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn show_conversation(&self, _id: &str) {}

    fn show_new_conversation(&self) {}
}
