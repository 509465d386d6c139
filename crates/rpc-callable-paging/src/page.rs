//! [`Page`] and [`PagedListResponse`]: the element-level, page-level, and
//! fixed-size-collection views spec.md §4.4 exposes over a list-returning
//! callable.

use crate::descriptor::PageDescriptor;
use crate::error::PagingError;
use crate::events::PageEvent;
use futures::stream::{self, BoxStream, StreamExt};
use rpc_callable_core::{ApiException, EventListeners, FnListener, ValidationException, ValidationReason};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tower::{Service, ServiceExt};

#[cfg(feature = "tracing")]
use tracing::debug;

/// A single fetched page: the request that produced it, the raw response,
/// and the descriptor used to interpret both.
pub struct Page<S, D, Req, Resp, Elem> {
    service: S,
    descriptor: Arc<D>,
    request: Req,
    response: Resp,
    name: String,
    event_listeners: EventListeners<PageEvent>,
    _elem: std::marker::PhantomData<Elem>,
}

impl<S, D, Req, Resp, Elem> Page<S, D, Req, Resp, Elem>
where
    D: PageDescriptor<Req, Resp, Elem>,
{
    /// The elements this page carries, in order.
    pub fn elements(&self) -> Vec<Elem> {
        self.descriptor.extract_resources(&self.response)
    }

    /// The continuation token this page's response carries.
    pub fn next_token(&self) -> String {
        self.descriptor.extract_next_token(&self.response)
    }

    /// `true` iff there are no further pages: the next token is the empty
    /// token, or this page carried no elements.
    pub fn is_last_page(&self) -> bool {
        self.next_token() == self.descriptor.empty_token() || self.elements().is_empty()
    }

    /// The request that produced this page.
    pub fn request(&self) -> &Req {
        &self.request
    }

    /// The raw response this page wraps.
    pub fn response(&self) -> &Resp {
        &self.response
    }

    /// The request that would fetch the next page, or `None` if this is the
    /// last page. Building it performs no I/O.
    fn next_request(&self) -> Option<Req> {
        if self.is_last_page() {
            None
        } else {
            Some(self.descriptor.with_page_token(&self.request, &self.next_token()))
        }
    }
}

impl<S, D, Req, Resp, Elem> Page<S, D, Req, Resp, Elem>
where
    S: Service<Req, Response = Resp, Error = ApiException> + Clone + Send + 'static,
    S::Future: Send + 'static,
    D: PageDescriptor<Req, Resp, Elem> + Send + Sync + 'static,
    Req: Clone + Send + 'static,
    Resp: Send + 'static,
    Elem: Send + 'static,
{
    /// Fetches the next page using the same callable and descriptor, with
    /// the request rebuilt by injecting this page's next-token. Returns
    /// `Ok(None)` once this is the last page.
    pub async fn get_next_page(&self) -> Result<Option<Self>, ApiException> {
        match self.next_request() {
            None => Ok(None),
            Some(request) => {
                let page = fetch_page(
                    self.service.clone(),
                    Arc::clone(&self.descriptor),
                    request,
                    self.name.clone(),
                    self.event_listeners.clone(),
                )
                .await?;
                Ok(Some(page))
            }
        }
    }
}

async fn fetch_page<S, D, Req, Resp, Elem>(
    mut service: S,
    descriptor: Arc<D>,
    request: Req,
    name: String,
    event_listeners: EventListeners<PageEvent>,
) -> Result<Page<S, D, Req, Resp, Elem>, ApiException>
where
    S: Service<Req, Response = Resp, Error = ApiException>,
    D: PageDescriptor<Req, Resp, Elem>,
    Req: Clone,
{
    let response = service.ready().await?.call(request.clone()).await?;

    let element_count = descriptor.extract_resources(&response).len();
    let next_token = descriptor.extract_next_token(&response);
    let is_last_page = next_token == descriptor.empty_token() || element_count == 0;

    #[cfg(feature = "tracing")]
    debug!(pattern = %name, elements = element_count, last_page = is_last_page, "fetched page");

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("paging_pages_fetched_total", "paging" => name.clone()).increment(1);
        metrics::histogram!("paging_page_elements", "paging" => name.clone()).record(element_count as f64);
    }

    event_listeners.emit(&PageEvent::PageFetched {
        pattern_name: name.clone(),
        timestamp: Instant::now(),
        element_count,
        is_last_page,
    });

    Ok(Page {
        service,
        descriptor,
        request,
        response,
        name,
        event_listeners,
        _elem: std::marker::PhantomData,
    })
}

enum ElementCursor<S, D, Req, Resp, Elem> {
    Fetching {
        service: S,
        descriptor: Arc<D>,
        request: Req,
        name: String,
        listeners: EventListeners<PageEvent>,
    },
    Draining {
        page: Page<S, D, Req, Resp, Elem>,
        buffer: VecDeque<Elem>,
    },
    Exhausted {
        page: Page<S, D, Req, Resp, Elem>,
    },
    Done,
}

async fn elements_step<S, D, Req, Resp, Elem>(
    cursor: ElementCursor<S, D, Req, Resp, Elem>,
) -> Option<(Result<Elem, ApiException>, ElementCursor<S, D, Req, Resp, Elem>)>
where
    S: Service<Req, Response = Resp, Error = ApiException> + Clone + Send + 'static,
    S::Future: Send + 'static,
    D: PageDescriptor<Req, Resp, Elem> + Send + Sync + 'static,
    Req: Clone + Send + 'static,
    Resp: Send + 'static,
    Elem: Send + 'static,
{
    let mut cursor = cursor;
    loop {
        match cursor {
            ElementCursor::Done => return None,
            ElementCursor::Fetching {
                service,
                descriptor,
                request,
                name,
                listeners,
            } => match fetch_page(service, descriptor, request, name, listeners).await {
                Ok(page) => {
                    let buffer: VecDeque<Elem> = page.elements().into();
                    cursor = if buffer.is_empty() {
                        ElementCursor::Done
                    } else {
                        ElementCursor::Draining { page, buffer }
                    };
                    continue;
                }
                Err(err) => return Some((Err(err), ElementCursor::Done)),
            },
            ElementCursor::Draining { page, mut buffer } => {
                let elem = buffer.pop_front().expect("draining cursor never holds an empty buffer");
                let next = if !buffer.is_empty() {
                    ElementCursor::Draining { page, buffer }
                } else if page.is_last_page() {
                    ElementCursor::Done
                } else {
                    ElementCursor::Exhausted { page }
                };
                return Some((Ok(elem), next));
            }
            ElementCursor::Exhausted { page } => match page.next_request() {
                Some(request) => {
                    cursor = ElementCursor::Fetching {
                        service: page.service.clone(),
                        descriptor: Arc::clone(&page.descriptor),
                        request,
                        name: page.name.clone(),
                        listeners: page.event_listeners.clone(),
                    };
                    continue;
                }
                None => {
                    cursor = ElementCursor::Done;
                    continue;
                }
            },
        }
    }
}

enum ChunkCursor<S, D, Req, Resp, Elem> {
    Fetching {
        service: S,
        descriptor: Arc<D>,
        request: Req,
        name: String,
        listeners: EventListeners<PageEvent>,
        accumulated: Vec<Elem>,
        collection_size: usize,
    },
    HavePage {
        page: Page<S, D, Req, Resp, Elem>,
        accumulated: Vec<Elem>,
        collection_size: usize,
    },
    Done,
}

async fn chunk_step<S, D, Req, Resp, Elem>(
    cursor: ChunkCursor<S, D, Req, Resp, Elem>,
) -> Option<(Result<Vec<Elem>, PagingError>, ChunkCursor<S, D, Req, Resp, Elem>)>
where
    S: Service<Req, Response = Resp, Error = ApiException> + Clone + Send + 'static,
    S::Future: Send + 'static,
    D: PageDescriptor<Req, Resp, Elem> + Send + Sync + 'static,
    Req: Clone + Send + 'static,
    Resp: Send + 'static,
    Elem: Send + 'static,
{
    let mut cursor = cursor;
    loop {
        match cursor {
            ChunkCursor::Done => return None,
            ChunkCursor::Fetching {
                service,
                descriptor,
                request,
                name,
                listeners,
                accumulated,
                collection_size,
            } => match fetch_page(service, descriptor, request, name, listeners).await {
                Ok(page) => {
                    cursor = ChunkCursor::HavePage {
                        page,
                        accumulated,
                        collection_size,
                    };
                    continue;
                }
                Err(err) => return Some((Err(err.into()), ChunkCursor::Done)),
            },
            ChunkCursor::HavePage {
                page,
                mut accumulated,
                collection_size,
            } => {
                accumulated.extend(page.elements());
                let is_last = page.is_last_page();

                if accumulated.len() > collection_size {
                    let err = ValidationException::new(ValidationReason::PageOverrun { collection_size });
                    return Some((Err(PagingError::Validation(err)), ChunkCursor::Done));
                }

                if accumulated.len() == collection_size {
                    let chunk = accumulated;
                    return match page.next_request() {
                        Some(request) if !is_last => Some((
                            Ok(chunk),
                            ChunkCursor::Fetching {
                                service: page.service.clone(),
                                descriptor: Arc::clone(&page.descriptor),
                                request,
                                name: page.name.clone(),
                                listeners: page.event_listeners.clone(),
                                accumulated: Vec::new(),
                                collection_size,
                            },
                        )),
                        _ => Some((Ok(chunk), ChunkCursor::Done)),
                    };
                }

                if is_last {
                    if accumulated.is_empty() {
                        cursor = ChunkCursor::Done;
                    } else {
                        return Some((Ok(accumulated), ChunkCursor::Done));
                    }
                    continue;
                }

                match page.next_request() {
                    Some(request) => {
                        cursor = ChunkCursor::Fetching {
                            service: page.service.clone(),
                            descriptor: Arc::clone(&page.descriptor),
                            request,
                            name: page.name.clone(),
                            listeners: page.event_listeners.clone(),
                            accumulated,
                            collection_size,
                        };
                        continue;
                    }
                    None => {
                        if accumulated.is_empty() {
                            cursor = ChunkCursor::Done;
                        } else {
                            return Some((Ok(accumulated), ChunkCursor::Done));
                        }
                        continue;
                    }
                }
            }
        }
    }
}

/// Root handle returned by a paging call: the entry point for the
/// element-level, page-level, and fixed-size-collection views.
pub struct PagedListResponse<S, D, Req, Resp, Elem> {
    service: S,
    descriptor: Arc<D>,
    initial_request: Req,
    name: String,
    event_listeners: EventListeners<PageEvent>,
    _elem: std::marker::PhantomData<Elem>,
}

impl<S, D, Req, Resp, Elem> PagedListResponse<S, D, Req, Resp, Elem>
where
    D: PageDescriptor<Req, Resp, Elem>,
{
    pub fn new(service: S, descriptor: D, initial_request: Req) -> Self {
        Self {
            service,
            descriptor: Arc::new(descriptor),
            initial_request,
            name: "<unnamed>".to_string(),
            event_listeners: EventListeners::new(),
            _elem: std::marker::PhantomData,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a listener invoked for every page fetch.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&PageEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }
}

impl<S, D, Req, Resp, Elem> PagedListResponse<S, D, Req, Resp, Elem>
where
    S: Service<Req, Response = Resp, Error = ApiException> + Clone + Send + 'static,
    S::Future: Send + 'static,
    D: PageDescriptor<Req, Resp, Elem> + Send + Sync + 'static,
    Req: Clone + Send + 'static,
    Resp: Send + 'static,
    Elem: Send + 'static,
{
    /// Fetches and returns the first page.
    pub async fn get_page(&self) -> Result<Page<S, D, Req, Resp, Elem>, ApiException> {
        let first_request = self
            .descriptor
            .with_page_token(&self.initial_request, &self.descriptor.empty_token());
        fetch_page(
            self.service.clone(),
            Arc::clone(&self.descriptor),
            first_request,
            self.name.clone(),
            self.event_listeners.clone(),
        )
        .await
    }

    /// A lazy ordered stream of elements spanning all pages. Advances to
    /// the next page only once the current page's elements are exhausted.
    pub fn iterate_all_elements(&self) -> BoxStream<'static, Result<Elem, ApiException>> {
        let first_request = self
            .descriptor
            .with_page_token(&self.initial_request, &self.descriptor.empty_token());
        let initial = ElementCursor::Fetching {
            service: self.service.clone(),
            descriptor: Arc::clone(&self.descriptor),
            request: first_request,
            name: self.name.clone(),
            listeners: self.event_listeners.clone(),
        };
        stream::unfold(initial, elements_step).boxed()
    }

    /// Regroups the element stream into exactly-`collection_size` chunks;
    /// only the terminal chunk may be shorter. Fails synchronously if
    /// `collection_size` is smaller than the first page's size, and fails
    /// mid-stream if a page boundary does not align with `collection_size`.
    pub fn expand_to_fixed_size_collection(
        &self,
        collection_size: usize,
    ) -> Result<BoxStream<'static, Result<Vec<Elem>, PagingError>>, ValidationException> {
        let page_size = self.descriptor.extract_page_size(&self.initial_request);
        if collection_size < page_size {
            return Err(ValidationException::new(ValidationReason::CollectionSizeTooSmall {
                requested: collection_size,
                page_size,
            }));
        }

        let first_request = self
            .descriptor
            .with_page_token(&self.initial_request, &self.descriptor.empty_token());
        let initial = ChunkCursor::Fetching {
            service: self.service.clone(),
            descriptor: Arc::clone(&self.descriptor),
            request: first_request,
            name: self.name.clone(),
            listeners: self.event_listeners.clone(),
            accumulated: Vec::new(),
            collection_size,
        };
        Ok(stream::unfold(initial, chunk_step).boxed())
    }
}
