//! Integration tests for the `rpc-callable` facade: composing context
//! binding, retrying, paging, and bundling through `UnaryApiCallable`.

use rpc_callable::{
    BundlingDescriptor, BundlingSettings, CallContext, PageDescriptor, RetryableCodes, RetrySettings, StatusCode,
    UnaryApiCallable,
};
use rpc_callable_core::{ClassifiableError, Clock, FakeClock, RecordingScheduler, Scheduler, SystemClock, TokioScheduler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::service_fn;

#[derive(Debug, Clone)]
struct CodedError {
    code: StatusCode,
    message: String,
}

impl std::fmt::Display for CodedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
impl std::error::Error for CodedError {}
impl ClassifiableError for CodedError {
    fn status_code(&self) -> StatusCode {
        self.code
    }
    fn classify_message(&self) -> String {
        self.message.clone()
    }
}

#[tokio::test]
async fn retrying_then_binding_a_channel_survives_every_attempt() {
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct ChanId(&'static str);

    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = Arc::clone(&calls);
    let primitive = service_fn(move |(req, ctx): (i32, CallContext)| {
        let calls = Arc::clone(&calls2);
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let chan = ctx.channel().and_then(|c| c.downcast_ref::<ChanId>()).cloned();
            if n == 0 {
                Err(CodedError {
                    code: StatusCode::Unavailable,
                    message: "unavailable".into(),
                })
            } else {
                Ok((req, chan))
            }
        }
    });

    let clock = Arc::new(FakeClock::new());
    let scheduler = Arc::new(RecordingScheduler::new(Arc::clone(&clock)));
    let callable = UnaryApiCallable::create(primitive)
        .bind(Arc::new(ChanId("prod")))
        .retryable_on(RetryableCodes::of([StatusCode::Unavailable]))
        .retrying(
            RetrySettings::aggressive().build(),
            scheduler as Arc<dyn Scheduler>,
            clock as Arc<dyn Clock>,
        );

    let (value, chan) = callable.call(7).await.unwrap();
    assert_eq!(value, 7);
    assert_eq!(chan, Some(ChanId("prod")));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn page_streaming_after_retrying_exposes_a_paged_list_response() {
    #[derive(Clone)]
    struct ListRequest {
        token: String,
    }
    #[derive(Clone)]
    struct ListResponse {
        items: Vec<i32>,
        next_token: String,
    }
    #[derive(Clone)]
    struct ListDescriptor;
    impl PageDescriptor<ListRequest, ListResponse, i32> for ListDescriptor {
        fn with_page_token(&self, req: &ListRequest, token: &str) -> ListRequest {
            ListRequest {
                token: token.to_string(),
                ..req.clone()
            }
        }
        fn with_page_size(&self, req: &ListRequest, _size: usize) -> ListRequest {
            req.clone()
        }
        fn extract_page_size(&self, _req: &ListRequest) -> usize {
            1
        }
        fn extract_next_token(&self, resp: &ListResponse) -> String {
            resp.next_token.clone()
        }
        fn extract_resources(&self, resp: &ListResponse) -> Vec<i32> {
            resp.items.clone()
        }
    }

    let primitive = service_fn(|(req, _ctx): (ListRequest, CallContext)| async move {
        let (items, next_token) = if req.token.is_empty() {
            (vec![1, 2], "more".to_string())
        } else {
            (vec![3], String::new())
        };
        Ok::<_, CodedError>(ListResponse { items, next_token })
    });

    let callable = UnaryApiCallable::create(primitive)
        .retryable_on(RetryableCodes::none())
        .retrying(
            RetrySettings::aggressive().build(),
            Arc::new(TokioScheduler::new()),
            Arc::new(SystemClock::default()),
        )
        .page_streaming(ListDescriptor);

    let paged = callable.call(ListRequest { token: String::new() });
    let elements: Vec<i32> = futures::StreamExt::collect::<Vec<_>>(paged.iterate_all_elements())
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(elements, vec![1, 2, 3]);
}

#[tokio::test]
async fn bundling_after_binding_merges_same_partition_requests() {
    #[derive(Clone, Copy)]
    struct SumPairs;
    impl BundlingDescriptor<Vec<i32>, Vec<i32>> for SumPairs {
        type Key = &'static str;
        fn bundle_partition_key(&self, _req: &Vec<i32>) -> Self::Key {
            "only"
        }
        fn count_elements(&self, req: &Vec<i32>) -> usize {
            req.len()
        }
        fn count_bytes(&self, req: &Vec<i32>) -> usize {
            req.len() * 4
        }
        fn merge_requests(&self, requests: &[Vec<i32>]) -> Vec<i32> {
            requests.iter().flatten().copied().collect()
        }
        fn split_response(&self, response: Vec<i32>, requests: &[Vec<i32>]) -> Vec<Vec<i32>> {
            let mut out = Vec::new();
            let mut rest = &response[..];
            for req in requests {
                let (head, tail) = rest.split_at(req.len());
                out.push(head.to_vec());
                rest = tail;
            }
            out
        }
    }

    let primitive = service_fn(|(req, _ctx): (Vec<i32>, CallContext)| async move {
        Ok::<_, CodedError>(req.iter().map(|n| n * n).collect::<Vec<_>>())
    });

    let bundling = UnaryApiCallable::create(primitive)
        .bind(Arc::new("prod"))
        .retryable_on(RetryableCodes::none())
        .retrying(
            RetrySettings::aggressive().build(),
            Arc::new(TokioScheduler::new()),
            Arc::new(SystemClock::default()),
        )
        .bundling(SumPairs, BundlingSettings::builder().element_count_threshold(2).build());
    let mut bundled = bundling.bundler("sum-pairs").unwrap();

    let first = tower::ServiceExt::ready(&mut bundled).await.unwrap().call(vec![1, 2]);
    let second = tower::ServiceExt::ready(&mut bundled).await.unwrap().call(vec![3, 4]);
    let (first, second) = tokio::join!(first, second);
    assert_eq!(first.unwrap(), vec![1, 4]);
    assert_eq!(second.unwrap(), vec![9, 16]);
}
