use std::sync::{Arc, Once};
use std::time::Duration;

use opener_core::{DownloadEvent, DownloadState, Screening};
use opener_engine::{
    BridgeMode, DownloadInterceptor, HostAction, InterceptOutcome, MemoryHost, OpenedIn,
    OpenerSettings,
};
use pretty_assertions::assert_eq;

const SITE: &str = "https://connect.bracu.ac.bd/course/7";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(opener_logging::initialize_for_tests);
}

fn interceptor(host: &Arc<MemoryHost>) -> DownloadInterceptor {
    let interceptor =
        DownloadInterceptor::new(&OpenerSettings::default(), host.clone(), host.clone());
    interceptor.apply_flag(true);
    host.take_actions();
    interceptor
}

fn pdf(id: u32, url: &str) -> DownloadEvent {
    DownloadEvent::new(id, url, "application/pdf")
}

#[tokio::test]
async fn pdf_download_navigates_the_active_tab() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    let page = host.add_page(SITE, BridgeMode::Present);
    host.set_active(Some(page));
    host.start_download(1);
    let interceptor = interceptor(&host);

    let outcome = interceptor.on_download_created(pdf(1, "https://x/a.pdf")).await;

    assert_eq!(outcome, InterceptOutcome::Opened(OpenedIn::ActivePage(page)));
    assert_eq!(
        host.actions(),
        vec![
            HostAction::Cancelled(1),
            HostAction::Navigated {
                page,
                url: "https://x/a.pdf".to_string()
            },
        ]
    );
    assert_eq!(host.download_state(1), Some(DownloadState::Interrupted));
}

#[tokio::test]
async fn disabled_flag_leaves_downloads_alone() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    host.start_download(1);
    let interceptor = interceptor(&host);
    interceptor.apply_flag(false);

    let outcome = interceptor.on_download_created(pdf(1, "https://x/a.pdf")).await;

    assert_eq!(outcome, InterceptOutcome::Ignored(Screening::Disabled));
    assert_eq!(host.actions(), vec![HostAction::ListenerDetached]);
    assert!(!host.is_listening());
    assert_eq!(host.download_state(1), Some(DownloadState::InProgress));
}

#[tokio::test(start_paused = true)]
async fn duplicate_within_window_is_ignored_until_it_expires() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    for id in 1..=3 {
        host.start_download(id);
    }
    let interceptor = interceptor(&host);

    let first = interceptor.on_download_created(pdf(1, "https://x/a.pdf")).await;
    tokio::time::advance(Duration::from_secs(9)).await;
    let second = interceptor.on_download_created(pdf(2, "https://x/a.pdf")).await;
    tokio::time::advance(Duration::from_secs(1)).await;
    let third = interceptor.on_download_created(pdf(3, "https://x/a.pdf")).await;

    assert!(matches!(first, InterceptOutcome::Opened(_)));
    assert_eq!(second, InterceptOutcome::Ignored(Screening::Duplicate));
    assert!(matches!(third, InterceptOutcome::Opened(_)));
    assert_eq!(host.download_state(2), Some(DownloadState::InProgress));
    let cancelled: Vec<_> = host
        .actions()
        .into_iter()
        .filter(|action| matches!(action, HostAction::Cancelled(_)))
        .collect();
    assert_eq!(cancelled, vec![HostAction::Cancelled(1), HostAction::Cancelled(3)]);
}

#[tokio::test]
async fn no_window_opens_a_new_window() {
    init_logging();
    let host = Arc::new(MemoryHost::without_window());
    host.start_download(5);
    let interceptor = interceptor(&host);

    let outcome = interceptor.on_download_created(pdf(5, "https://x/b.pdf")).await;

    let InterceptOutcome::Opened(OpenedIn::NewWindow(page)) = outcome else {
        panic!("expected a new window, got {outcome:?}");
    };
    assert_eq!(host.window_count(), 1);
    assert_eq!(host.page_url(page).as_deref(), Some("https://x/b.pdf"));
    assert_eq!(host.actions()[0], HostAction::Cancelled(5));
}

#[tokio::test]
async fn no_active_tab_opens_a_new_tab() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    host.add_page(SITE, BridgeMode::Present);
    host.start_download(2);
    let interceptor = interceptor(&host);

    let outcome = interceptor.on_download_created(pdf(2, "https://x/c.pdf")).await;

    assert!(matches!(outcome, InterceptOutcome::Opened(OpenedIn::NewTab(_))));
    assert_eq!(host.page_count(), 2);
}

#[tokio::test]
async fn failed_navigation_falls_back_to_a_new_tab() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    let page = host.add_page(SITE, BridgeMode::Present);
    host.set_active(Some(page));
    host.fail_navigation(true);
    host.start_download(3);
    let interceptor = interceptor(&host);

    let outcome = interceptor.on_download_created(pdf(3, "https://x/d.pdf")).await;

    assert!(matches!(outcome, InterceptOutcome::Opened(OpenedIn::NewTab(_))));
    assert_eq!(host.page_url(page).as_deref(), Some(SITE));
}

#[tokio::test]
async fn finished_download_is_not_cancelled() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    host.set_download_state(4, DownloadState::Complete);
    let interceptor = interceptor(&host);

    let outcome = interceptor.on_download_created(pdf(4, "https://x/e.pdf")).await;

    assert_eq!(outcome, InterceptOutcome::NotInProgress(DownloadState::Complete));
    assert!(host.actions().is_empty());
}

#[tokio::test]
async fn failed_cancel_stops_before_navigation() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    host.start_download(6);
    host.fail_cancel(6);
    let interceptor = interceptor(&host);

    let outcome = interceptor.on_download_created(pdf(6, "https://x/f.pdf")).await;

    assert!(matches!(outcome, InterceptOutcome::CancelFailed(_)));
    assert!(host.actions().is_empty());
    assert_eq!(host.page_count(), 0);
}

#[tokio::test]
async fn page_handled_blob_urls_and_other_types_pass_through() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    host.start_download(8);
    host.start_download(9);
    let interceptor = interceptor(&host);

    let blob = interceptor
        .on_download_created(pdf(8, "blob:https://connect.bracu.ac.bd/5f2c"))
        .await;
    let zip = interceptor
        .on_download_created(DownloadEvent::new(9, "https://x/a.zip", "application/zip"))
        .await;

    assert_eq!(blob, InterceptOutcome::Ignored(Screening::Excluded));
    assert_eq!(zip, InterceptOutcome::Ignored(Screening::NotPdf));
    assert!(host.actions().is_empty());
}
