/*!
 * Application State
 *
 * Shared state for the admin API server.
 */

use std::sync::Arc;

use forgehook_dispatch::{EventRouter, Notifier, SubscriptionStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<EventRouter>,
}

impl AppState {
    pub fn store(&self) -> &SubscriptionStore {
        self.router.store()
    }

    pub fn notifier(&self) -> &Notifier {
        self.router.notifier()
    }
}
