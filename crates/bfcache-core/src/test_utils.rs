//! Recording client and page builders shared by the unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use bfcache_types::{DocumentId, FrameId, HistoryConfig, IdGenerator, ItemId, ManualClock};
use serde_json::Value;

use crate::client::{
    HistoryClient, LoadRequest, LoadResponse, NavigationNavigationType, PolicyTicket,
    ProcessSwapDisposition, ShouldGoToHistoryItem,
};
use crate::item::HistoryItem;
use crate::page::Page;

/// Everything the page told the client, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StartLoad(LoadRequest),
    CancelLoad(FrameId),
    PolicyCheck { item: ItemId, same_document: bool },
    AsyncPolicyCheck(ItemId),
    GlobalHistory(String),
    Pageshow { frame: FrameId, document: DocumentId, persisted: bool },
    Popstate { frame: FrameId, state: Option<Value> },
    LoadedFromDomain(String),
    UpdateForNavigation { frame: FrameId, item: ItemId, kind: NavigationNavigationType },
    Reactivation { frame: FrameId, entries: Vec<ItemId>, current: ItemId },
    RejectFinished { frame: FrameId, tracker: Option<u64> },
    FocusAppearance { frame: FrameId, element: String },
    DidRestoreScroll(FrameId),
    ScaleFactorChanged,
    CaptionPreferencesChanged,
    ContentsSizeUpdated(FrameId),
}

/// Shared state behind a [`RecordingClient`]. Tests keep one handle and
/// give the other to the page.
#[derive(Debug)]
pub struct ClientLog {
    pub events: Vec<ClientEvent>,
    /// Loads started and not yet answered.
    pub pending_loads: Vec<LoadRequest>,
    /// Answer to synchronous policy checks.
    pub decision: ShouldGoToHistoryItem,
    pub async_policy: bool,
    pub tickets: Vec<PolicyTicket>,
    /// Frames whose Navigation API navigations script aborts.
    pub abort_frames: Vec<FrameId>,
    pub subresource_domains: Vec<String>,
}

impl Default for ClientLog {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            pending_loads: Vec::new(),
            decision: ShouldGoToHistoryItem::Yes,
            async_policy: false,
            tickets: Vec::new(),
            abort_frames: Vec::new(),
            subresource_domains: Vec::new(),
        }
    }
}

impl ClientLog {
    pub fn popstates(&self) -> Vec<(FrameId, Option<Value>)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ClientEvent::Popstate { frame, state } => Some((*frame, state.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn persisted_pageshows(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ClientEvent::Pageshow { persisted: true, .. }))
            .count()
    }

    pub fn started_loads(&self) -> Vec<LoadRequest> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ClientEvent::StartLoad(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingClient(pub Rc<RefCell<ClientLog>>);

impl RecordingClient {
    fn push(&self, event: ClientEvent) {
        self.0.borrow_mut().events.push(event);
    }
}

impl HistoryClient for RecordingClient {
    fn should_go_to_history_item(
        &mut self,
        item: &HistoryItem,
        is_same_document: bool,
        _disposition: ProcessSwapDisposition,
    ) -> ShouldGoToHistoryItem {
        self.push(ClientEvent::PolicyCheck {
            item: item.id(),
            same_document: is_same_document,
        });
        self.0.borrow().decision
    }

    fn supports_async_should_go_to_history_item(&self) -> bool {
        self.0.borrow().async_policy
    }

    fn should_go_to_history_item_async(&mut self, item: &HistoryItem, ticket: PolicyTicket) {
        self.push(ClientEvent::AsyncPolicyCheck(item.id()));
        self.0.borrow_mut().tickets.push(ticket);
    }

    fn start_load(&mut self, request: LoadRequest) {
        let mut log = self.0.borrow_mut();
        log.events.push(ClientEvent::StartLoad(request.clone()));
        log.pending_loads.push(request);
    }

    fn cancel_load(&mut self, frame: FrameId) {
        let mut log = self.0.borrow_mut();
        log.events.push(ClientEvent::CancelLoad(frame));
        log.pending_loads.retain(|r| r.frame != frame);
    }

    fn did_restore_scroll_position(&mut self, frame: FrameId) {
        self.push(ClientEvent::DidRestoreScroll(frame));
    }

    fn update_global_history(&mut self, url: &str) {
        self.push(ClientEvent::GlobalHistory(url.to_string()));
    }

    fn dispatch_pageshow(&mut self, frame: FrameId, document: DocumentId, persisted: bool) {
        self.push(ClientEvent::Pageshow {
            frame,
            document,
            persisted,
        });
    }

    fn dispatch_popstate(&mut self, frame: FrameId, state: Option<&Value>) {
        self.push(ClientEvent::Popstate {
            frame,
            state: state.cloned(),
        });
    }

    fn loaded_subresource_domains(&self) -> Vec<String> {
        self.0.borrow().subresource_domains.clone()
    }

    fn did_load_from_registrable_domain(&mut self, domain: &str) {
        self.push(ClientEvent::LoadedFromDomain(domain.to_string()));
    }

    fn update_for_navigation(
        &mut self,
        frame: FrameId,
        item: &HistoryItem,
        kind: NavigationNavigationType,
    ) {
        self.push(ClientEvent::UpdateForNavigation {
            frame,
            item: item.id(),
            kind,
        });
    }

    fn update_for_reactivation(&mut self, frame: FrameId, entries: &[ItemId], current: ItemId) {
        self.push(ClientEvent::Reactivation {
            frame,
            entries: entries.to_vec(),
            current,
        });
    }

    fn navigation_was_aborted(&mut self, frame: FrameId) -> bool {
        self.0.borrow().abort_frames.contains(&frame)
    }

    fn reject_finished_promise(&mut self, frame: FrameId, tracker: Option<u64>) {
        self.push(ClientEvent::RejectFinished { frame, tracker });
    }

    fn update_focus_appearance(&mut self, frame: FrameId, element: &str) {
        self.push(ClientEvent::FocusAppearance {
            frame,
            element: element.to_string(),
        });
    }

    fn device_or_page_scale_factor_changed(&mut self) {
        self.push(ClientEvent::ScaleFactorChanged);
    }

    fn caption_preferences_changed(&mut self) {
        self.push(ClientEvent::CaptionPreferencesChanged);
    }

    fn update_contents_size(&mut self, frame: FrameId) {
        self.push(ClientEvent::ContentsSizeUpdated(frame));
    }
}

/// Page on a manual clock with a recording client.
pub fn manual_page(config: HistoryConfig) -> (Page, Rc<RefCell<ClientLog>>) {
    let (page, log, _clock) = manual_page_with_clock(config);
    (page, log)
}

pub fn manual_page_with_clock(
    config: HistoryConfig,
) -> (Page, Rc<RefCell<ClientLog>>, Rc<ManualClock>) {
    let client = RecordingClient::default();
    let log = Rc::clone(&client.0);
    let clock = Rc::new(ManualClock::new());
    let page = Page::with_clock_and_ids(
        config,
        Box::new(client),
        Rc::clone(&clock) as Rc<dyn bfcache_types::Clock>,
        IdGenerator::new(),
    );
    (page, log, clock)
}

/// Answer every outstanding load with a 200 response for the requested
/// URL, in the order they were started. Loads started while answering are
/// answered too.
pub fn complete_pending_loads(page: &mut Page, log: &Rc<RefCell<ClientLog>>) {
    loop {
        let pending = std::mem::take(&mut log.borrow_mut().pending_loads);
        if pending.is_empty() {
            return;
        }
        for request in pending {
            let still_pending = page
                .frame(request.frame)
                .and_then(|f| f.loader.provisional_document_loader.as_ref())
                .is_some_and(|l| l.url == request.url);
            if !still_pending {
                continue;
            }
            page.did_commit_load(request.frame, LoadResponse::ok(request.url.as_str()))
                .unwrap();
            page.did_finish_load(request.frame).unwrap();
        }
    }
}

/// Navigate `frame` to `url` and let the load run to completion.
pub fn visit(page: &mut Page, log: &Rc<RefCell<ClientLog>>, frame: FrameId, url: &str) {
    page.load_url(frame, url).unwrap();
    complete_pending_loads(page, log);
}
