use crate::error::app_error::AppError;
use crate::models::contact::ContactPage;
use crate::models::pagination::{ListQuery, SortOrder};
use crate::service::contacts::ContactService;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

struct ListState {
    query: ListQuery,
    generation: u64,
    current: Option<ContactPage>,
}

/// Keeps the contact list's page, page size and sort in sync with the server.
///
/// Every accepted change bumps a generation counter and issues exactly one
/// fetch. A response that arrives after a newer change is still handed to its
/// caller but never replaces [`ListQueryController::current_page`].
pub struct ListQueryController {
    contacts: ContactService,
    state: Mutex<ListState>,
}

impl ListQueryController {
    pub fn new(contacts: ContactService) -> Self {
        Self::with_query(contacts, ListQuery::default())
    }

    pub fn with_query(contacts: ContactService, query: ListQuery) -> Self {
        Self {
            contacts,
            state: Mutex::new(ListState {
                query,
                generation: 0,
                current: None,
            }),
        }
    }

    pub fn query(&self) -> ListQuery {
        self.lock().query.clone()
    }

    /// Latest committed page, if any fetch has succeeded.
    pub fn current_page(&self) -> Option<ContactPage> {
        self.lock().current.clone()
    }

    pub async fn set_page(&self, page: u32) -> Result<ContactPage, AppError> {
        self.apply(|query| query.with_page(page))?;
        self.fetch().await
    }

    pub async fn set_page_size(&self, page_size: u32) -> Result<ContactPage, AppError> {
        self.apply(|query| query.with_page_size(page_size))?;
        self.fetch().await
    }

    /// Sorts by `field` in `order`; passing `None` for either clears the sort.
    pub async fn set_sort(&self, field: Option<&str>, order: Option<SortOrder>) -> Result<ContactPage, AppError> {
        self.apply(|query| Ok(query.with_sort(field, order)))?;
        self.fetch().await
    }

    /// Fetches the page for the current query. A failed fetch leaves the
    /// committed page untouched.
    pub async fn fetch(&self) -> Result<ContactPage, AppError> {
        let (query, generation) = {
            let state = self.lock();
            (state.query.clone(), state.generation)
        };

        let page = match self.contacts.list(&query).await {
            Ok(page) => page,
            Err(err) => {
                warn!(error = %err, page = query.page(), "failed to fetch contacts");
                return Err(err);
            }
        };

        let mut state = self.lock();
        if state.generation == generation {
            state.current = Some(page.clone());
        } else {
            debug!(
                requested_generation = generation,
                current_generation = state.generation,
                "discarding contact page for a superseded query"
            );
        }

        Ok(page)
    }

    fn apply(&self, change: impl FnOnce(&ListQuery) -> Result<ListQuery, AppError>) -> Result<(), AppError> {
        let mut state = self.lock();
        let next = change(&state.query)?;
        debug!(
            page = next.page(),
            page_size = next.page_size().as_u32(),
            sort = next.sort_field(),
            order = %next.sort_order(),
            "list query changed"
        );
        state.query = next;
        state.generation += 1;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
