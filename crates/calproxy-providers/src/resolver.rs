//! Calendar name resolution.

use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::CalendarApi;

/// Resolves a calendar display name to its provider-assigned ID.
///
/// Walks the calendar list page by page and returns the first entry whose
/// summary equals `display_name` exactly (case-sensitive). Fails with a
/// not-found error only after the last page has been scanned. Nothing is
/// cached; every call starts from the first page.
pub async fn resolve_calendar_id(
    api: &dyn CalendarApi,
    display_name: &str,
) -> ProviderResult<String> {
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = api.list_calendars_page(page_token.as_deref()).await?;
        pages += 1;

        if let Some(entry) = page.items.iter().find(|c| c.summary == display_name) {
            debug!(
                "resolved calendar {:?} to {} on page {}",
                display_name, entry.id, pages
            );
            return Ok(entry.id.clone());
        }

        match page.next_page() {
            Some(token) => page_token = Some(token.to_string()),
            None => break,
        }
    }

    Err(ProviderError::not_found(format!(
        "failed to find the calendar ID by name: {} ({} pages scanned)",
        display_name, pages
    )))
}
