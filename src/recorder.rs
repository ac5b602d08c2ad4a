//! Page-view recording
//!
//! One navigation produces one insert. There is no retry; callers that need
//! durability guarantees should use [`EventRecorder::try_record_view`] and
//! decide themselves.

use crate::error::StoreError;
use crate::session_token::SessionContext;
use crate::store::EventStore;
use crate::types::{NewPageView, PageViewEvent};

/// Appends page-view events to an event store
pub struct EventRecorder<S> {
    store: S,
}

impl<S: EventStore> EventRecorder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record a view under the context's session token and return the stored event
    pub fn try_record_view(
        &self,
        context: &SessionContext,
        user_id: &str,
        page_name: &str,
        referrer_page: Option<&str>,
    ) -> Result<PageViewEvent, StoreError> {
        let session_id = context.get_or_create_session_token();
        let view = NewPageView::now(
            user_id,
            session_id,
            page_name,
            referrer_page.map(str::to_string),
        );
        self.store.insert(view)
    }

    /// Fire-and-forget variant: logs failures and reports success as a boolean
    pub fn record_view(
        &self,
        context: &SessionContext,
        user_id: &str,
        page_name: &str,
        referrer_page: Option<&str>,
    ) -> bool {
        match self.try_record_view(context, user_id, page_name, referrer_page) {
            Ok(event) => {
                log::debug!("recorded view {} of {} for {}", event.id, page_name, user_id);
                true
            }
            Err(e) => {
                log::warn!("failed to record view of {} for {}: {}", page_name, user_id, e);
                false
            }
        }
    }
}
