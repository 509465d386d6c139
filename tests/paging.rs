//! Integration tests for the paging decorator against spec.md §8 scenarios
//! 5 and 6.

use futures::StreamExt;
use rpc_callable_core::{ApiException, ValidationReason};
use rpc_callable_paging::{PageDescriptor, PagedListResponse, PagingError};
use std::sync::Arc;
use tower::service_fn;

#[derive(Clone, Debug, PartialEq, Eq)]
struct ListRequest {
    token: String,
    page_size: usize,
}

#[derive(Clone, Debug)]
struct ListResponse {
    items: Vec<i32>,
    next_token: String,
}

struct ListDescriptor;

impl PageDescriptor<ListRequest, ListResponse, i32> for ListDescriptor {
    fn with_page_token(&self, req: &ListRequest, token: &str) -> ListRequest {
        ListRequest {
            token: token.to_string(),
            page_size: req.page_size,
        }
    }
    fn with_page_size(&self, req: &ListRequest, size: usize) -> ListRequest {
        ListRequest {
            token: req.token.clone(),
            page_size: size,
        }
    }
    fn extract_page_size(&self, req: &ListRequest) -> usize {
        req.page_size
    }
    fn extract_next_token(&self, resp: &ListResponse) -> String {
        resp.next_token.clone()
    }
    fn extract_resources(&self, resp: &ListResponse) -> Vec<i32> {
        resp.items.clone()
    }
}

fn backend(
    pages: Vec<(Vec<i32>, String)>,
) -> impl tower::Service<ListRequest, Response = ListResponse, Error = ApiException, Future = impl Send> + Clone {
    let pages = Arc::new(pages);
    let index_of_token: Arc<dyn Fn(&str) -> usize + Send + Sync> = {
        let tokens: Vec<String> = {
            let mut tokens = vec![String::new()];
            for (_, next) in pages.iter() {
                if !next.is_empty() {
                    tokens.push(next.clone());
                }
            }
            tokens
        };
        Arc::new(move |token: &str| tokens.iter().position(|t| t == token).expect("unknown token"))
    };
    service_fn(move |req: ListRequest| {
        let pages = Arc::clone(&pages);
        let index_of_token = Arc::clone(&index_of_token);
        async move {
            let idx = index_of_token(&req.token);
            let (items, next_token) = pages[idx].clone();
            Ok::<_, ApiException>(ListResponse { items, next_token })
        }
    })
}

#[tokio::test]
async fn scenario_5_pagination_walks_pages_in_order() {
    let pages = vec![
        (vec![0, 1, 2], "p2".to_string()),
        (vec![3, 4], String::new()),
        (vec![], String::new()),
    ];
    let paged = PagedListResponse::new(
        backend(pages),
        ListDescriptor,
        ListRequest { token: String::new(), page_size: 3 },
    );

    let elements: Vec<i32> = paged.iterate_all_elements().map(|r| r.unwrap()).collect().await;
    assert_eq!(elements, vec![0, 1, 2, 3, 4]);

    let page1 = paged.get_page().await.unwrap();
    assert_eq!(page1.elements(), vec![0, 1, 2]);
    let page2 = page1.get_next_page().await.unwrap().unwrap();
    assert_eq!(page2.elements(), vec![3, 4]);
}

#[tokio::test]
async fn scenario_6_fixed_size_collection_happy_path() {
    let pages = vec![
        (vec![0, 1, 2], "p2".to_string()),
        (vec![3, 4], "p3".to_string()),
        (vec![5, 6, 7], String::new()),
        (vec![], String::new()),
    ];
    let paged = PagedListResponse::new(
        backend(pages),
        ListDescriptor,
        ListRequest { token: String::new(), page_size: 3 },
    );

    let chunks: Vec<Vec<i32>> = paged
        .expand_to_fixed_size_collection(5)
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await;
    assert_eq!(chunks, vec![vec![0, 1, 2, 3, 4], vec![5, 6, 7]]);
}

#[tokio::test]
async fn scenario_6_fixed_size_collection_overrun_is_validation_error() {
    let pages = vec![(vec![0, 1, 2], "p2".to_string()), (vec![3, 4], String::new())];
    let paged = PagedListResponse::new(
        backend(pages),
        ListDescriptor,
        ListRequest { token: String::new(), page_size: 3 },
    );

    let results: Vec<_> = paged.expand_to_fixed_size_collection(4).unwrap().collect().await;
    assert!(matches!(results.last().unwrap(), Err(PagingError::Validation(_))));
}

#[test]
fn scenario_6_fixed_size_collection_too_small_fails_synchronously() {
    let paged = PagedListResponse::new(
        backend(vec![(vec![0, 1], String::new())]),
        ListDescriptor,
        ListRequest { token: String::new(), page_size: 3 },
    );

    let err = paged.expand_to_fixed_size_collection(2).unwrap_err();
    assert!(matches!(
        err.reason,
        ValidationReason::CollectionSizeTooSmall { requested: 2, page_size: 3 }
    ));
}
