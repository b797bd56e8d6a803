//! Whole-page scenarios: loads, traversals and the page cache together.

use std::time::Duration;

use bfcache_types::{FrameId, FrameLoadType, HistoryConfig, HistoryError, ItemId};
use serde_json::json;

use crate::cache::NotCacheableReason;
use crate::client::{LoadResponse, NavigationNavigationType, ShouldGoToHistoryItem};
use crate::item::ScrollPosition;
use crate::page::Page;
use crate::test_utils::{
    ClientEvent, complete_pending_loads, manual_page, manual_page_with_clock, visit,
};

fn no_cache() -> HistoryConfig {
    let mut config = HistoryConfig::default();
    config.page_cache.enabled = false;
    config
}

fn entries(page: &Page) -> Vec<ItemId> {
    page.back_forward().all_items().to_vec()
}

fn current(page: &Page, frame: FrameId) -> Option<ItemId> {
    page.frame(frame).and_then(|f| f.history.current_item())
}

fn document_url(page: &Page, frame: FrameId) -> Option<String> {
    page.frame(frame)
        .and_then(|f| f.document_url())
        .map(str::to_string)
}

// -- Standard loads and the page cache ----------------------------------------

#[test]
fn back_and_forward_restore_from_the_page_cache() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    let a_document = page.main_frame().document.as_ref().unwrap().id;
    page.scroll_frame(main, ScrollPosition::new(0, 120)).unwrap();
    visit(&mut page, &log, main, "https://b.test/");

    let [ia, ib] = entries(&page)[..] else {
        panic!("expected two entries");
    };
    assert!(page.cache().contains(ia));
    let loads_before = log.borrow().started_loads().len();

    assert!(page.go_back().unwrap());
    assert_eq!(log.borrow().started_loads().len(), loads_before);
    assert_eq!(current(&page, main), Some(ia));
    assert_eq!(page.back_forward().current_item(), Some(ia));
    assert_eq!(document_url(&page, main).as_deref(), Some("https://a.test/"));
    assert_eq!(page.main_frame().document.as_ref().unwrap().id, a_document);
    assert_eq!(page.main_frame().view.scroll_position, ScrollPosition::new(0, 120));
    assert!(!page.cache().contains(ia));
    assert!(page.cache().contains(ib));
    assert!(page.main_frame().history.frame_load_complete());
    assert!(!page.is_restoring_cached_page());
    assert_eq!(log.borrow().persisted_pageshows(), 1);
    assert!(log.borrow().events.contains(&ClientEvent::Reactivation {
        frame: main,
        entries: vec![ia, ib],
        current: ia,
    }));

    assert!(page.go_forward().unwrap());
    assert_eq!(log.borrow().started_loads().len(), loads_before);
    assert_eq!(current(&page, main), Some(ib));
    assert_eq!(document_url(&page, main).as_deref(), Some("https://b.test/"));
    assert!(page.cache().contains(ia));
    assert_eq!(log.borrow().persisted_pageshows(), 2);
}

#[test]
fn back_without_cache_loads_the_item_and_restores_form_state() {
    let (mut page, log) = manual_page(no_cache());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    page.set_form_state(main, vec!["q=rust".into()]).unwrap();
    visit(&mut page, &log, main, "https://b.test/");
    let [ia, _ib] = entries(&page)[..] else {
        panic!("expected two entries");
    };
    assert!(page.cache().is_empty());

    page.go_back().unwrap();
    let request = log.borrow().started_loads().pop().unwrap();
    assert_eq!(request.url, "https://a.test/");
    assert_eq!(request.load_type, FrameLoadType::Back);
    assert_eq!(request.history_item, Some(ia));
    assert_eq!(page.main_frame().history.provisional_item(), Some(ia));

    complete_pending_loads(&mut page, &log);
    assert_eq!(current(&page, main), Some(ia));
    assert_eq!(page.main_frame().history.provisional_item(), None);
    let document = page.main_frame().document.as_ref().unwrap();
    assert_eq!(document.url, "https://a.test/");
    assert_eq!(document.pending_form_state, vec!["q=rust".to_string()]);
    assert_eq!(log.borrow().persisted_pageshows(), 0);
}

#[test]
fn expired_cache_entry_falls_back_to_the_network() {
    let mut config = HistoryConfig::default();
    config.page_cache.expiration_secs = 10;
    let (mut page, log, clock) = manual_page_with_clock(config);
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    visit(&mut page, &log, main, "https://b.test/");
    let [ia, ib] = entries(&page)[..] else {
        panic!("expected two entries");
    };

    clock.advance(Duration::from_secs(11));
    assert!(!page.cache().contains(ia));
    page.go_back().unwrap();
    let request = log.borrow().started_loads().pop().unwrap();
    assert_eq!(request.history_item, Some(ia));
    assert!(page.cache().is_empty());

    complete_pending_loads(&mut page, &log);
    assert_eq!(current(&page, main), Some(ia));
    assert!(page.cache().contains(ib));
}

#[test]
fn cache_keeps_the_most_recent_pages() {
    let mut config = HistoryConfig::default();
    config.page_cache.capacity = 2;
    let (mut page, log) = manual_page(config);
    let main = page.main_frame_id();
    for url in ["https://a.test/", "https://b.test/", "https://c.test/", "https://d.test/"] {
        visit(&mut page, &log, main, url);
    }
    let [ia, ib, ic, _id] = entries(&page)[..] else {
        panic!("expected four entries");
    };
    assert_eq!(page.cache().cached_items().collect::<Vec<_>>(), vec![ic, ib]);
    assert!(!page.cache().contains(ia));
}

#[test]
fn shrinking_the_cache_to_zero_stops_caching() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    page.cache_mut().set_capacity(0);
    assert_eq!(
        page.check_cacheability(FrameLoadType::Standard),
        Err(NotCacheableReason::ZeroCapacity)
    );
    assert!(matches!(
        page.add_if_cacheable(FrameLoadType::Standard),
        Err(HistoryError::NotCacheable(NotCacheableReason::ZeroCapacity))
    ));
    visit(&mut page, &log, main, "https://b.test/");
    assert!(page.cache().is_empty());
}

#[test]
fn pages_that_cannot_suspend_are_not_cached() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    page.set_document_can_suspend(main, false).unwrap();
    visit(&mut page, &log, main, "https://b.test/");
    assert!(page.cache().is_empty());
}

#[test]
fn subframes_are_frozen_and_restored_with_the_page() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    let child = page
        .load_url_into_child_frame(main, "child", "https://a.test/c1")
        .unwrap();
    complete_pending_loads(&mut page, &log);
    let c1 = current(&page, child).unwrap();

    visit(&mut page, &log, main, "https://b.test/");
    assert_eq!(page.subframe_count(), 0);
    log.borrow_mut().events.clear();

    page.go_back().unwrap();
    assert_eq!(page.subframe_count(), 1);
    assert_eq!(page.frames().parent(child), Some(main));
    assert_eq!(current(&page, child), Some(c1));
    assert_eq!(document_url(&page, child).as_deref(), Some("https://a.test/c1"));

    let pageshows: Vec<_> = log
        .borrow()
        .events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::Pageshow { frame, persisted, .. } => Some((*frame, *persisted)),
            _ => None,
        })
        .collect();
    assert_eq!(pageshows, vec![(child, true), (main, true)]);
    assert!(page.item(c1).is_some());
}

#[test]
fn back_list_eviction_releases_items() {
    let mut config = HistoryConfig::default();
    config.back_forward_list_capacity = 2;
    let (mut page, log) = manual_page(config);
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    let ia = entries(&page)[0];
    visit(&mut page, &log, main, "https://b.test/");
    visit(&mut page, &log, main, "https://c.test/");

    assert_eq!(page.back_forward().len(), 2);
    assert!(!page.back_forward().contains(ia));
    assert!(!page.cache().contains(ia));
    assert!(page.item(ia).is_none());
}

// -- Subframe traversal ---------------------------------------------------------

#[test]
fn traversal_reloads_only_the_frame_that_changed() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    let child = page
        .load_url_into_child_frame(main, "child", "https://a.test/c1")
        .unwrap();
    complete_pending_loads(&mut page, &log);
    let c1 = current(&page, child).unwrap();
    visit(&mut page, &log, child, "https://a.test/c2");

    let [i1, i2] = entries(&page)[..] else {
        panic!("expected two entries");
    };
    assert!(page.items().items_are_clones(i1, Some(i2)));
    assert_eq!(current(&page, main), Some(i2));

    let loads_before = log.borrow().started_loads().len();
    page.go_back().unwrap();

    let started = log.borrow().started_loads();
    assert_eq!(started.len(), loads_before + 1);
    let request = started.last().unwrap();
    assert_eq!(request.frame, child);
    assert_eq!(request.url, "https://a.test/c1");
    assert_eq!(request.history_item, Some(c1));
    assert_eq!(page.main_frame().history.provisional_item(), Some(i1));
    assert_eq!(page.frame(child).unwrap().history.provisional_item(), Some(c1));

    complete_pending_loads(&mut page, &log);
    assert_eq!(current(&page, main), Some(i1));
    assert_eq!(current(&page, child), Some(c1));
    assert_eq!(page.main_frame().history.provisional_item(), None);
    assert_eq!(document_url(&page, main).as_deref(), Some("https://a.test/"));
    assert_eq!(document_url(&page, child).as_deref(), Some("https://a.test/c1"));
}

#[test]
fn child_frame_created_during_back_load_loads_its_recorded_item() {
    let (mut page, log) = manual_page(no_cache());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    let old_child = page
        .load_url_into_child_frame(main, "child", "https://a.test/c1")
        .unwrap();
    complete_pending_loads(&mut page, &log);
    let c1 = current(&page, old_child).unwrap();
    visit(&mut page, &log, main, "https://b.test/");
    assert!(page.frame(old_child).is_none());

    page.go_back().unwrap();
    let request = log.borrow_mut().pending_loads.pop().unwrap();
    page.did_commit_load(main, LoadResponse::ok(request.url)).unwrap();

    let child = page
        .load_url_into_child_frame(main, "child", "https://a.test/default")
        .unwrap();
    let request = log.borrow().started_loads().pop().unwrap();
    assert_eq!(request.frame, child);
    assert_eq!(request.url, "https://a.test/c1");
    assert_eq!(request.load_type, FrameLoadType::Back);
    assert_eq!(page.item(c1).unwrap().frame_id, Some(child));

    complete_pending_loads(&mut page, &log);
    page.did_finish_load(main).unwrap();
    assert_eq!(current(&page, child), Some(c1));
    assert!(page.main_frame().history.frame_load_complete());
}

// -- Policy -----------------------------------------------------------------------

#[test]
fn stale_async_policy_decision_is_ignored() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    for url in ["https://a.test/", "https://b.test/", "https://c.test/"] {
        visit(&mut page, &log, main, url);
    }
    let [ia, ib, ic] = entries(&page)[..] else {
        panic!("expected three entries");
    };
    log.borrow_mut().async_policy = true;

    page.go_to_index(-1).unwrap();
    page.go_to_index(-2).unwrap();
    let tickets = std::mem::take(&mut log.borrow_mut().tickets);
    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0].target(), ib);
    assert_eq!(tickets[1].target(), ia);
    assert_eq!(page.main_frame().history.policy_item(), Some(ia));

    let mut tickets = tickets.into_iter();
    let first = tickets.next().unwrap();
    let second = tickets.next().unwrap();
    page.complete_policy_check(first, ShouldGoToHistoryItem::Yes);
    assert_eq!(page.back_forward().current_item(), Some(ic));
    assert_eq!(current(&page, main), Some(ic));

    page.complete_policy_check(second, ShouldGoToHistoryItem::Yes);
    assert_eq!(page.back_forward().current_item(), Some(ia));
    assert_eq!(current(&page, main), Some(ia));
    assert_eq!(page.main_frame().history.policy_item(), None);
}

#[test]
fn refused_traversal_changes_nothing() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    visit(&mut page, &log, main, "https://b.test/");
    let ib = entries(&page)[1];
    log.borrow_mut().decision = ShouldGoToHistoryItem::No;

    assert!(page.go_back().unwrap());
    assert_eq!(page.back_forward().current_item(), Some(ib));
    assert_eq!(current(&page, main), Some(ib));
    assert_eq!(page.main_frame().history.policy_item(), None);
    assert!(log
        .borrow()
        .events
        .iter()
        .any(|e| matches!(e, ClientEvent::PolicyCheck { same_document: false, .. })));
}

#[test]
fn deferred_traversal_replays_when_loading_resumes() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    visit(&mut page, &log, main, "https://b.test/");
    let [ia, ib] = entries(&page)[..] else {
        panic!("expected two entries");
    };

    page.set_defers_loading(true);
    page.go_back().unwrap();
    assert_eq!(current(&page, main), Some(ib));
    let deferred = page.main_frame().history.deferred_navigation().unwrap();
    assert_eq!(deferred.item, ia);
    assert_eq!(deferred.load_type, FrameLoadType::Back);

    page.set_defers_loading(false);
    assert_eq!(page.main_frame().history.deferred_navigation(), None);
    assert_eq!(current(&page, main), Some(ia));
}

#[test]
fn failed_back_load_restores_the_list_cursor() {
    let (mut page, log) = manual_page(no_cache());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    visit(&mut page, &log, main, "https://b.test/");
    let ib = entries(&page)[1];

    page.go_back().unwrap();
    assert_ne!(page.back_forward().current_item(), Some(ib));
    page.did_fail_load(main).unwrap();
    assert_eq!(page.back_forward().current_item(), Some(ib));
    assert_eq!(current(&page, main), Some(ib));
    assert_eq!(page.main_frame().history.provisional_item(), None);
}

// -- Same-document navigation ---------------------------------------------------

#[test]
fn push_state_entries_traverse_with_popstate() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    page.push_state(main, Some(json!({"n": 1})), "/p1").unwrap();

    let [ia, p1] = entries(&page)[..] else {
        panic!("expected two entries");
    };
    assert_eq!(current(&page, main), Some(p1));
    let pushed = page.item(p1).unwrap();
    assert_eq!(pushed.url, "https://a.test/p1");
    assert_eq!(pushed.state_object, Some(json!({"n": 1})));
    assert!(pushed.was_created_by_js_without_user_interaction);
    assert_eq!(
        page.item(ia).unwrap().document_sequence_number,
        pushed.document_sequence_number
    );
    assert!(log.borrow().events.contains(&ClientEvent::UpdateForNavigation {
        frame: main,
        item: p1,
        kind: NavigationNavigationType::Push,
    }));
    let loads_before = log.borrow().started_loads().len();

    page.go_back().unwrap();
    assert_eq!(current(&page, main), Some(ia));
    assert_eq!(document_url(&page, main).as_deref(), Some("https://a.test/"));
    assert_eq!(log.borrow().popstates(), vec![(main, None)]);

    page.go_forward().unwrap();
    assert_eq!(current(&page, main), Some(p1));
    assert_eq!(document_url(&page, main).as_deref(), Some("https://a.test/p1"));
    assert_eq!(
        log.borrow().popstates(),
        vec![(main, None), (main, Some(json!({"n": 1})))]
    );
    assert_eq!(log.borrow().started_loads().len(), loads_before);
}

#[test]
fn replace_state_rewrites_the_current_entry() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    let ia = entries(&page)[0];

    page.replace_state(main, Some(json!("r")), "/r").unwrap();
    assert_eq!(entries(&page), vec![ia]);
    let item = page.item(ia).unwrap();
    assert_eq!(item.url, "https://a.test/r");
    assert_eq!(item.state_object, Some(json!("r")));
    assert_eq!(document_url(&page, main).as_deref(), Some("https://a.test/r"));
    assert!(page.is_visited("https://a.test/r"));
    assert!(log.borrow().events.contains(&ClientEvent::UpdateForNavigation {
        frame: main,
        item: ia,
        kind: NavigationNavigationType::Replace,
    }));
}

#[test]
fn fragment_navigation_adds_an_entry_and_restores_scroll() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    page.scroll_frame(main, ScrollPosition::new(0, 300)).unwrap();
    page.navigate_to_fragment(main, "sec").unwrap();

    let [ia, fragment] = entries(&page)[..] else {
        panic!("expected two entries");
    };
    assert_eq!(page.item(fragment).unwrap().url, "https://a.test/#sec");
    assert_eq!(page.item(ia).unwrap().scroll_position, ScrollPosition::new(0, 300));
    assert!(page.main_frame().history.frame_load_complete());

    page.scroll_frame(main, ScrollPosition::new(0, 900)).unwrap();
    page.go_back().unwrap();
    assert_eq!(current(&page, main), Some(ia));
    assert_eq!(document_url(&page, main).as_deref(), Some("https://a.test/"));
    assert_eq!(page.main_frame().view.scroll_position, ScrollPosition::new(0, 300));
    assert_eq!(page.item(fragment).unwrap().scroll_position, ScrollPosition::new(0, 900));
    assert_eq!(log.borrow().popstates(), vec![(main, None)]);
}

#[test]
fn navigating_to_a_fragment_url_stays_in_the_document() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/page");
    let loads_before = log.borrow().started_loads().len();

    page.load_url(main, "https://a.test/page#top").unwrap();
    assert_eq!(log.borrow().started_loads().len(), loads_before);
    assert_eq!(page.back_forward().len(), 2);
    assert_eq!(document_url(&page, main).as_deref(), Some("https://a.test/page#top"));
}

// -- Entry replacement and reloads ----------------------------------------------

#[test]
fn first_load_after_about_blank_replaces_the_entry() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "about:blank");
    let blank = entries(&page)[0];
    assert!(page.main_history().current_item_should_be_replaced());

    page.load_url(main, "https://a.test/").unwrap();
    assert_eq!(page.main_frame().loader.provisional_load_type, FrameLoadType::Replace);
    complete_pending_loads(&mut page, &log);

    assert_eq!(entries(&page), vec![blank]);
    assert_eq!(page.item(blank).unwrap().url, "https://a.test/");
    assert!(!page.main_history().current_item_should_be_replaced());
}

#[test]
fn go_zero_reloads_the_main_frame() {
    let (mut page, log) = manual_page(HistoryConfig::default());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    assert!(page.go_to_index(0).unwrap());
    let request = log.borrow().started_loads().pop().unwrap();
    assert_eq!(request.load_type, FrameLoadType::Reload);
    assert_eq!(request.url, "https://a.test/");
    complete_pending_loads(&mut page, &log);
    assert_eq!(page.back_forward().len(), 1);
}

// -- Navigation API ----------------------------------------------------------------

#[test]
fn aborted_navigation_api_traversal_rejects_finished_promise() {
    let (mut page, log) = manual_page(no_cache());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    visit(&mut page, &log, main, "https://b.test/");
    let ia = entries(&page)[0];
    log.borrow_mut().abort_frames.push(main);

    page.traverse_for_navigation_api(main, ia, Some(7)).unwrap();
    let request = log.borrow().started_loads().pop().unwrap();
    assert_eq!(request.history_item, Some(ia));
    assert_eq!(request.load_type, FrameLoadType::IndexedBackForward);
    assert!(log.borrow().events.contains(&ClientEvent::RejectFinished {
        frame: main,
        tracker: Some(7),
    }));
    assert!(matches!(
        page.traverse_for_navigation_api(FrameId(99), ia, None),
        Err(HistoryError::UnknownFrame(_))
    ));
}

// -- Private browsing ----------------------------------------------------------------

#[test]
fn ephemeral_sessions_do_not_record_history() {
    let mut config = HistoryConfig::default();
    config.uses_ephemeral_session = true;
    let (mut page, log) = manual_page(config.clone());
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    assert!(!page.is_visited("https://a.test/"));
    assert!(
        !log.borrow()
            .events
            .iter()
            .any(|e| matches!(e, ClientEvent::GlobalHistory(_)))
    );
    assert_eq!(page.back_forward().len(), 1);

    config.allow_privacy_sensitive_operations_in_ephemeral_session = true;
    let (mut page, log) = manual_page(config);
    let main = page.main_frame_id();
    visit(&mut page, &log, main, "https://a.test/");
    assert!(page.is_visited("https://a.test/"));
    assert!(
        log.borrow()
            .events
            .contains(&ClientEvent::GlobalHistory("https://a.test/".into()))
    );
}
