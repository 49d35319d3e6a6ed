//! Ordered release of owned resources.
//!
//! A component that owns child resources (event emitters, subscriptions,
//! background tasks) registers them on a [`DisposableStack`]. Disposing the
//! stack releases every child exactly once, in registration order, and
//! reports all failures together instead of stopping at the first one.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

/// Something that holds a resource which must be released explicitly.
pub trait Dispose: Send + Sync {
    /// Release the resource. Calling this again must be a no-op.
    fn dispose(&self) -> Result<(), DisposeError>;
}

impl<D: Dispose + ?Sized> Dispose for Arc<D> {
    fn dispose(&self) -> Result<(), DisposeError> {
        (**self).dispose()
    }
}

impl<D: Dispose + ?Sized> Dispose for Box<D> {
    fn dispose(&self) -> Result<(), DisposeError> {
        (**self).dispose()
    }
}

/// Errors raised while releasing resources.
#[derive(Debug, thiserror::Error)]
pub enum DisposeError {
    #[error("failed to release {name}: {message}")]
    Release { name: String, message: String },

    #[error("encountered {} errors while disposing", .0.len())]
    Aggregate(Vec<DisposeError>),
}

impl DisposeError {
    /// Flatten into the list of individual failures.
    pub fn into_errors(self) -> Vec<DisposeError> {
        match self {
            DisposeError::Aggregate(errors) => errors
                .into_iter()
                .flat_map(DisposeError::into_errors)
                .collect(),
            single => vec![single],
        }
    }

    fn from_errors(mut errors: Vec<DisposeError>) -> Result<(), DisposeError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(DisposeError::Aggregate(errors)),
        }
    }
}

type ReleaseFn = Box<dyn FnOnce() -> Result<(), String> + Send>;

/// A named one-shot release action.
pub struct ReleaseAction {
    name: String,
    action: Mutex<Option<ReleaseFn>>,
}

impl ReleaseAction {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Mutex::new(Some(Box::new(action))),
        }
    }
}

impl Dispose for ReleaseAction {
    fn dispose(&self) -> Result<(), DisposeError> {
        let action = self
            .action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match action {
            Some(action) => action().map_err(|message| DisposeError::Release {
                name: self.name.clone(),
                message,
            }),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
struct StackState {
    disposed: bool,
    items: Vec<Box<dyn Dispose>>,
}

/// Owns child resources and releases them in registration order.
#[derive(Default)]
pub struct DisposableStack {
    state: Mutex<StackState>,
}

impl DisposableStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `item`.
    ///
    /// If the stack is already disposed the item is released right away and
    /// the result of that release is returned.
    pub fn register<D: Dispose + 'static>(&self, item: D) -> Result<(), DisposeError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.disposed {
            drop(state);
            return item.dispose();
        }
        state.items.push(Box::new(item));
        Ok(())
    }

    /// Register a closure as a named release action.
    pub fn defer<F>(&self, name: impl Into<String>, action: F) -> Result<(), DisposeError>
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        self.register(ReleaseAction::new(name, action))
    }

    pub fn is_disposed(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .disposed
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Dispose for DisposableStack {
    fn dispose(&self) -> Result<(), DisposeError> {
        let items = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.disposed {
                return Ok(());
            }
            state.disposed = true;
            std::mem::take(&mut state.items)
        };

        let errors: Vec<DisposeError> = items
            .iter()
            .filter_map(|item| item.dispose().err())
            .collect();
        DisposeError::from_errors(errors)
    }
}

impl Drop for DisposableStack {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            warn!(error = %e, "Errors while releasing resources on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tracked(
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
        fail: bool,
    ) -> ReleaseAction {
        let log = Arc::clone(log);
        ReleaseAction::new(name, move || {
            log.lock().unwrap().push(name);
            if fail {
                Err(format!("{name} is stuck"))
            } else {
                Ok(())
            }
        })
    }

    #[test]
    fn test_releases_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stack = DisposableStack::new();
        stack.register(tracked(&log, "first", false)).unwrap();
        stack.register(tracked(&log, "second", false)).unwrap();
        stack.register(tracked(&log, "third", false)).unwrap();
        assert_eq!(stack.len(), 3);

        stack.dispose().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        assert!(stack.is_disposed());
        assert!(stack.is_empty());
    }

    #[test]
    fn test_second_dispose_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stack = DisposableStack::new();
        stack.register(tracked(&log, "only", false)).unwrap();

        stack.dispose().unwrap();
        stack.dispose().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["only"]);
    }

    #[test]
    fn test_single_failure_is_returned_as_is() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stack = DisposableStack::new();
        stack.register(tracked(&log, "a", true)).unwrap();
        stack.register(tracked(&log, "b", false)).unwrap();

        let err = stack.dispose().unwrap_err();
        assert!(matches!(err, DisposeError::Release { ref name, .. } if name == "a"));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_failures_are_aggregated_not_short_circuited() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stack = DisposableStack::new();
        stack.register(tracked(&log, "a", true)).unwrap();
        stack.register(tracked(&log, "b", false)).unwrap();
        stack.register(tracked(&log, "c", true)).unwrap();

        let err = stack.dispose().unwrap_err();
        assert_eq!(err.to_string(), "encountered 2 errors while disposing");
        let names: Vec<String> = err
            .into_errors()
            .into_iter()
            .map(|e| match e {
                DisposeError::Release { name, .. } => name,
                other => other.to_string(),
            })
            .collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_register_after_dispose_releases_immediately() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stack = DisposableStack::new();
        stack.dispose().unwrap();

        stack.register(tracked(&log, "late", false)).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["late"]);
        assert!(stack.is_empty());

        let result = stack.defer("late-failing", || Err("boom".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_drop_releases_children() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let stack = DisposableStack::new();
            stack.register(tracked(&log, "child", false)).unwrap();
        }
        assert_eq!(*log.lock().unwrap(), vec!["child"]);
    }

    #[test]
    fn test_nested_stacks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::new(DisposableStack::new());
        inner.register(tracked(&log, "inner", true)).unwrap();

        let outer = DisposableStack::new();
        outer.register(Arc::clone(&inner)).unwrap();
        outer.register(tracked(&log, "outer", true)).unwrap();

        let err = outer.dispose().unwrap_err();
        assert_eq!(err.into_errors().len(), 2);
        assert!(inner.is_disposed());
    }
}
