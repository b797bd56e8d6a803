//! Drives a [`Page`] through scenario steps with an instant network.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bfcache_core::{
    Clock, FrameId, HistoryClient, HistoryConfig, IdGenerator, LoadRequest, LoadResponse,
    ManualClock, Page,
};
use serde::Serialize;

use crate::scenario::Step;

type LoadQueue = Rc<RefCell<Vec<LoadRequest>>>;

/// Collects load requests until the simulator answers them.
struct QueueClient(LoadQueue);

impl HistoryClient for QueueClient {
    fn start_load(&mut self, request: LoadRequest) {
        log::trace!("{}: start load {}", request.frame, request.url);
        self.0.borrow_mut().push(request);
    }

    fn cancel_load(&mut self, frame: FrameId) {
        self.0.borrow_mut().retain(|r| r.frame != frame);
    }
}

pub struct Simulator {
    page: Page,
    queue: LoadQueue,
    clock: Rc<ManualClock>,
    frames: HashMap<String, FrameId>,
}

impl Simulator {
    pub fn new(config: HistoryConfig) -> Self {
        let queue: LoadQueue = Rc::default();
        let clock = Rc::new(ManualClock::new());
        let page = Page::with_clock_and_ids(
            config,
            Box::new(QueueClient(Rc::clone(&queue))),
            Rc::clone(&clock) as Rc<dyn Clock>,
            IdGenerator::new(),
        );
        Self {
            page,
            queue,
            clock,
            frames: HashMap::new(),
        }
    }

    fn frame(&self, name: Option<&str>) -> Result<FrameId> {
        match name {
            None => Ok(self.page.main_frame_id()),
            Some(name) => match self.frames.get(name) {
                Some(&id) if self.page.frame(id).is_some() => Ok(id),
                Some(_) => bail!("frame {name:?} is no longer in the page"),
                None => bail!("no frame named {name:?}"),
            },
        }
    }

    pub fn apply(&mut self, step: &Step) -> Result<()> {
        log::info!("step: {step:?}");
        match step {
            Step::Navigate { url, frame } => {
                let frame = self.frame(frame.as_deref())?;
                self.page.load_url(frame, url)?;
            }
            Step::Subframe { name, url, parent } => {
                let parent = self.frame(parent.as_deref())?;
                let child = self.page.load_url_into_child_frame(parent, name, url)?;
                self.frames.insert(name.clone(), child);
            }
            Step::Back => {
                if !self.page.go_back()? {
                    log::warn!("no back entry");
                }
            }
            Step::Forward => {
                if !self.page.go_forward()? {
                    log::warn!("no forward entry");
                }
            }
            Step::Go { delta } => {
                if !self.page.go_to_index(*delta)? {
                    log::warn!("no entry at offset {delta}");
                }
            }
            Step::Reload { from_origin } => {
                let main = self.page.main_frame_id();
                self.page.reload(main, *from_origin)?;
            }
            Step::Fragment { fragment, frame } => {
                let frame = self.frame(frame.as_deref())?;
                self.page.navigate_to_fragment(frame, fragment)?;
            }
            Step::PushState { url, state, frame } => {
                let frame = self.frame(frame.as_deref())?;
                self.page.push_state(frame, state.clone(), url)?;
            }
            Step::ReplaceState { url, state, frame } => {
                let frame = self.frame(frame.as_deref())?;
                self.page.replace_state(frame, state.clone(), url)?;
            }
            Step::AdvanceClock { secs } => {
                self.clock.advance(Duration::from_secs(*secs));
            }
        }
        self.settle()
    }

    /// Commit and finish every outstanding load, including loads started
    /// by the commits themselves.
    fn settle(&mut self) -> Result<()> {
        loop {
            let pending = std::mem::take(&mut *self.queue.borrow_mut());
            if pending.is_empty() {
                return Ok(());
            }
            for request in pending {
                let still_pending = self
                    .page
                    .frame(request.frame)
                    .and_then(|f| f.loader.provisional_document_loader.as_ref())
                    .is_some_and(|l| l.url == request.url);
                if !still_pending {
                    log::debug!("{}: dropping superseded load {}", request.frame, request.url);
                    continue;
                }
                self.page
                    .did_commit_load(request.frame, LoadResponse::ok(request.url.as_str()))
                    .with_context(|| format!("committing {}", request.url))?;
                self.page.did_finish_load(request.frame)?;
            }
        }
    }

    pub fn report(&self) -> Report {
        let list = self.page.back_forward();
        let current = list.current_index();
        let entries = list
            .all_items()
            .iter()
            .enumerate()
            .filter_map(|(index, &id)| {
                let item = self.page.item(id)?;
                Some(Entry {
                    url: item.url.clone(),
                    title: item.title.clone(),
                    current: current == Some(index),
                    cached: self.page.cache().contains(id),
                })
            })
            .collect();
        Report {
            entries,
            cached_pages: self.page.cache().len(),
            cache_capacity: self.page.cache().capacity(),
            subframes: self.page.subframe_count(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Entry {
    pub url: String,
    pub title: String,
    pub current: bool,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub entries: Vec<Entry>,
    pub cached_pages: usize,
    pub cache_capacity: usize,
    pub subframes: usize,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "back/forward list ({} entries):", self.entries.len())?;
        for (index, entry) in self.entries.iter().enumerate() {
            let marker = if entry.current { '>' } else { ' ' };
            let cached = if entry.cached { " [cached]" } else { "" };
            writeln!(f, "{marker} {index:>3} {}{cached}", entry.url)?;
        }
        write!(
            f,
            "page cache: {}/{} pages, {} subframes",
            self.cached_pages, self.cache_capacity, self.subframes
        )
    }
}
