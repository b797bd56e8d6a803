//! A whole page frozen for the back/forward cache.

use std::fmt;
use std::rc::Rc;

use bfcache_types::{Clock, DocumentId, HistoryError, MonotonicTime, Result};

use super::cached_frame::CachedFrame;
use crate::frame::DocumentLoader;
use crate::page::Page;

/// Snapshot of a page's frame tree, restorable once.
///
/// Expiry is passive: [`CachedPage::has_expired`] compares the page clock
/// against the deadline fixed at capture time.
pub struct CachedPage {
    clock: Rc<dyn Clock>,
    expiration_time: MonotonicTime,
    cached_main_frame: Option<CachedFrame>,
    loaded_subresource_domains: Vec<String>,
    needs_device_or_page_scale_changed: bool,
    needs_caption_preferences_changed: bool,
    needs_update_contents_size: bool,
}

impl CachedPage {
    /// Freeze `page`. Its subframes leave the frame tree and the main
    /// frame is left without a document until the next commit installs one.
    pub(crate) fn new(page: &mut Page) -> Self {
        let expiration_time = page.now() + page.config.page_cache_expiration();
        let loaded_subresource_domains = page.client.loaded_subresource_domains();
        let main = page.frames.main();
        let cached_main_frame = CachedFrame::capture(&mut page.frames, main);
        Self {
            clock: Rc::clone(&page.clock),
            expiration_time,
            cached_main_frame,
            loaded_subresource_domains,
            needs_device_or_page_scale_changed: false,
            needs_caption_preferences_changed: false,
            needs_update_contents_size: false,
        }
    }

    /// Bring the frozen frames back to life in `page` and consume the
    /// snapshot.
    pub fn restore(&mut self, page: &mut Page) -> Result<()> {
        if self.cached_main_frame.is_none() {
            log::error!("restoring a cached page that was already consumed");
            return Err(HistoryError::CachedPageConsumed);
        }
        let subframes = page.frames.subframe_count();
        if subframes > 0 {
            log::error!("restoring a cached page into a page with {subframes} subframes");
            return Err(HistoryError::PageHasSubframes(subframes));
        }
        let Some(cached_main_frame) = self.cached_main_frame.as_mut() else {
            return Err(HistoryError::CachedPageConsumed);
        };

        page.restoring_cached_page = true;
        cached_main_frame.open(&mut page.frames, None);

        let main = page.frames.main();
        let focused_frame = page
            .focused_frame
            .filter(|&frame| page.frames.contains(frame))
            .unwrap_or(main);
        let focused_element = page
            .frames
            .get(focused_frame)
            .and_then(|f| f.document.as_ref())
            .and_then(|d| d.focused_element.clone());
        if let Some(element) = focused_element {
            page.client.update_focus_appearance(focused_frame, &element);
        }

        if self.needs_device_or_page_scale_changed {
            page.client.device_or_page_scale_factor_changed();
        }
        page.needs_style_recalc = true;
        if self.needs_caption_preferences_changed {
            page.client.caption_preferences_changed();
        }
        if self.needs_update_contents_size {
            page.client.update_contents_size(main);
        }

        if page.config.navigation_api_enabled {
            if let Some(current) = page.back_forward.current_item() {
                let entries = page.back_forward.all_items().to_vec();
                page.client.update_for_reactivation(focused_frame, &entries, current);
            }
        }

        for frame in page.frames.traverse_post_order(main) {
            let Some(document) = page.frames.get_mut(frame).and_then(|f| f.document.as_mut()) else {
                continue;
            };
            document.hidden = false;
            let document = document.id;
            page.client.dispatch_pageshow(frame, document, true);
        }

        for domain in &self.loaded_subresource_domains {
            page.client.did_load_from_registrable_domain(domain);
        }

        page.restoring_cached_page = false;
        log::debug!("restored cached page into {main}");
        self.clear()
    }

    /// Destroy the snapshot and reset the pending notifications.
    ///
    /// Clearing twice is an error.
    pub fn clear(&mut self) -> Result<()> {
        let Some(mut cached_main_frame) = self.cached_main_frame.take() else {
            log::error!("clearing a cached page that was already consumed");
            return Err(HistoryError::CachedPageConsumed);
        };
        cached_main_frame.clear();
        self.needs_caption_preferences_changed = false;
        self.needs_device_or_page_scale_changed = false;
        self.needs_update_contents_size = false;
        self.loaded_subresource_domains.clear();
        Ok(())
    }

    pub fn has_expired(&self) -> bool {
        self.clock.now() > self.expiration_time
    }

    pub fn expiration_time(&self) -> MonotonicTime {
        self.expiration_time
    }

    /// Whether the snapshot has been restored or cleared.
    pub fn is_cleared(&self) -> bool {
        self.cached_main_frame.is_none()
    }

    pub fn cached_main_frame(&self) -> Option<&CachedFrame> {
        self.cached_main_frame.as_ref()
    }

    pub fn document_id(&self) -> Option<DocumentId> {
        self.cached_main_frame.as_ref()?.document_id()
    }

    pub fn url(&self) -> Option<&str> {
        self.cached_main_frame.as_ref().map(CachedFrame::url)
    }

    pub fn document_loader(&self) -> Option<&DocumentLoader> {
        self.cached_main_frame.as_ref()?.document_loader()
    }

    pub fn loaded_subresource_domains(&self) -> &[String] {
        &self.loaded_subresource_domains
    }

    pub fn mark_for_device_or_page_scale_changed(&mut self) {
        self.needs_device_or_page_scale_changed = true;
    }

    pub fn mark_for_caption_preferences_changed(&mut self) {
        self.needs_caption_preferences_changed = true;
    }

    pub fn mark_for_contents_size_changed(&mut self) {
        self.needs_update_contents_size = true;
    }

    pub(crate) fn referenced_items(&self, out: &mut Vec<bfcache_types::ItemId>) {
        if let Some(frame) = &self.cached_main_frame {
            frame.referenced_items(out);
        }
    }
}

impl Drop for CachedPage {
    fn drop(&mut self) {
        if let Some(mut frame) = self.cached_main_frame.take() {
            log::trace!("destroying cached page for {}", frame.url());
            frame.clear();
        }
    }
}

impl fmt::Debug for CachedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedPage")
            .field("expiration_time", &self.expiration_time)
            .field("url", &self.url())
            .field("cleared", &self.is_cleared())
            .field("needs_device_or_page_scale_changed", &self.needs_device_or_page_scale_changed)
            .field("needs_caption_preferences_changed", &self.needs_caption_preferences_changed)
            .field("needs_update_contents_size", &self.needs_update_contents_size)
            .finish()
    }
}
