//! Provider bundle trait for simplified type parameters.
//!
//! Without bundling, every dispatch type would carry one type parameter per
//! runtime seam:
//!
//! ```text
//! struct RequestState<T, TP>
//! where
//!     T: TimeProvider + TimerService,
//!     TP: TaskProvider,
//! ```
//!
//! With bundling this becomes `struct RequestState<P: Providers>`.

use crate::{TaskProvider, TimeProvider, TimerService, TokioTaskProvider, TokioTimeProvider};

/// Bundle of all provider types for a runtime environment.
///
/// ## Implementations
///
/// - [`TokioProviders`]: Production providers using the Tokio runtime
/// - Test suites may bundle scripted providers of their own
pub trait Providers: Clone + Send + Sync + 'static {
    /// Time provider type, also acting as the timer service.
    type Time: TimeProvider + TimerService;

    /// Task provider type for spawning background tasks.
    type Task: TaskProvider;

    /// Get the time provider instance.
    fn time(&self) -> &Self::Time;

    /// Get the task provider instance.
    fn task(&self) -> &Self::Task;
}

/// Production providers using the Tokio runtime.
///
/// ## Example
///
/// ```rust,ignore
/// use clusternet_core::{Providers, TimeProvider, TokioProviders};
///
/// let providers = TokioProviders::new();
/// let now = providers.time().now();
/// ```
#[derive(Clone, Debug)]
pub struct TokioProviders {
    time: TokioTimeProvider,
    task: TokioTaskProvider,
}

impl TokioProviders {
    /// Create a new production providers bundle.
    ///
    /// The time provider's epoch is the moment of creation.
    pub fn new() -> Self {
        Self {
            time: TokioTimeProvider::new(),
            task: TokioTaskProvider,
        }
    }
}

impl Default for TokioProviders {
    fn default() -> Self {
        Self::new()
    }
}

impl Providers for TokioProviders {
    type Time = TokioTimeProvider;
    type Task = TokioTaskProvider;

    fn time(&self) -> &Self::Time {
        &self.time
    }

    fn task(&self) -> &Self::Task {
        &self.task
    }
}
