//! Trigger for the external math typesetting engine.
//!
//! The engine itself is opaque: the board only asks it to re-typeset a region
//! after annotation content changed. It is loaded on the first trigger and
//! reused afterwards.

/// Region name passed to the engine for the annotation overlay.
pub const OVERLAY_REGION: &str = "container";

/// An external typesetting engine.
pub trait TypesetEngine: Send {
    /// Re-typeset everything inside `region`.
    fn typeset(&mut self, region: &str);
}

/// Engine used when no renderer is attached; only logs requests.
#[derive(Debug, Default)]
pub struct LogTypesetEngine;

impl TypesetEngine for LogTypesetEngine {
    fn typeset(&mut self, region: &str) {
        log::debug!("Typeset requested for region {:?}", region);
    }
}

type Loader = Box<dyn FnOnce() -> Box<dyn TypesetEngine> + Send>;

/// Lazily loaded handle to a [`TypesetEngine`].
pub struct TypesetTrigger {
    loader: Option<Loader>,
    engine: Option<Box<dyn TypesetEngine>>,
    triggers: u64,
}

impl TypesetTrigger {
    /// Handle whose engine is created by `loader` on first use.
    pub fn new<F, E>(loader: F) -> Self
    where
        F: FnOnce() -> E + Send + 'static,
        E: TypesetEngine + 'static,
    {
        Self {
            loader: Some(Box::new(move || Box::new(loader()) as Box<dyn TypesetEngine>)),
            engine: None,
            triggers: 0,
        }
    }

    /// Handle backed by [`LogTypesetEngine`].
    pub fn headless() -> Self {
        Self::new(|| LogTypesetEngine)
    }

    /// Whether the engine has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.engine.is_some()
    }

    /// Number of typeset requests issued.
    pub fn trigger_count(&self) -> u64 {
        self.triggers
    }

    /// Ask the engine to typeset `region`, loading it first if needed.
    pub fn trigger(&mut self, region: &str) {
        if self.engine.is_none() {
            if let Some(loader) = self.loader.take() {
                log::info!("Loading typesetting engine");
                self.engine = Some(loader());
            }
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.typeset(region);
            self.triggers += 1;
        }
    }
}

impl Default for TypesetTrigger {
    fn default() -> Self {
        Self::headless()
    }
}

impl std::fmt::Debug for TypesetTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypesetTrigger")
            .field("loaded", &self.is_loaded())
            .field("triggers", &self.triggers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl TypesetEngine for Recorder {
        fn typeset(&mut self, region: &str) {
            self.0.lock().unwrap().push(region.to_string());
        }
    }

    #[test]
    fn test_loads_on_first_trigger_only() {
        let loads = Arc::new(AtomicUsize::new(0));
        let regions = Arc::new(Mutex::new(Vec::new()));
        let (l, r) = (loads.clone(), regions.clone());
        let mut trigger = TypesetTrigger::new(move || {
            l.fetch_add(1, Ordering::SeqCst);
            Recorder(r)
        });

        assert!(!trigger.is_loaded());
        trigger.trigger(OVERLAY_REGION);
        assert!(trigger.is_loaded());
        trigger.trigger(OVERLAY_REGION);

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(trigger.trigger_count(), 2);
        assert_eq!(regions.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_headless() {
        let mut trigger = TypesetTrigger::headless();
        trigger.trigger("anything");
        assert!(trigger.is_loaded());
        assert_eq!(trigger.trigger_count(), 1);
    }
}
