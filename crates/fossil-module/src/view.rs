//! Minimal view contract for the render/attach wrappers.

/// What [`Module::use_view`](crate::Module::use_view) needs to know
/// about a view.
///
/// Rendering itself is a service concern; the module only decides
/// whether a render request is needed before the attach request. A
/// recyclable view that is already rendered skips the render.
pub trait View: Send + Sync {
    /// Whether the view has been rendered at least once.
    fn is_rendered(&self) -> bool {
        false
    }

    /// Whether an already-rendered instance may be reused as-is.
    fn recycle(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fresh;
    impl View for Fresh {}

    #[test]
    fn defaults() {
        let view = Fresh;
        assert!(!view.is_rendered());
        assert!(!view.recycle());
    }
}
