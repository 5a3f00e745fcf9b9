use std::sync::Arc;

use econ_news_digest::{
    clients::sheets::MemorySheetStore,
    pipeline::dashboard::{DashboardGenerator, extract_categories},
};

const MESSAGE: &str = "📅 05/12(월) 경제뉴스입니다\n\n【금리】\n💡 동결 기조\n\n1. 한은 동결\n   → 물가 우선\n\n📌 전체뉴스\nhttps://rank";

#[tokio::test]
async fn dashboard_writes_index_and_a_page_per_dated_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemorySheetStore::new());
    store
        .insert_sheet(
            "요약결과",
            vec![
                vec!["날짜".into(), "요약".into(), "부동산인사이트".into()],
                vec!["2025-05-11".into(), MESSAGE.into(), "<script>x</script>".into()],
                vec!["2025-05-12".into(), MESSAGE.into(), String::new()],
                vec!["2025-05-13".into(), "인사이트 없는 행".into()],
            ],
        )
        .await;

    let outcome = DashboardGenerator::new(store, "요약결과", dir.path())
        .generate()
        .await
        .expect("dashboard generated");

    assert_eq!(outcome.pages, 3);
    let index = std::fs::read_to_string(dir.path().join("index.html")).expect("index");
    let newest = index.find("2025-05-13.html").expect("row without insight is still listed");
    let oldest = index.find("2025-05-11.html").expect("oldest listed");
    assert!(newest < oldest);

    let page = std::fs::read_to_string(dir.path().join("2025-05-11.html")).expect("page");
    assert!(page.contains("<h2>금리</h2>"));
    assert!(page.contains("&lt;script&gt;"));
    assert!(!page.contains("<script>"));

    let without_insight =
        std::fs::read_to_string(dir.path().join("2025-05-13.html")).expect("linked page exists");
    assert!(without_insight.contains("2025-05-13"));
    assert!(!without_insight.contains("부동산 인사이트"));
}

#[test]
fn repeated_category_replaces_the_earlier_entry() {
    let message = "【금리】\n💡 첫번째\n1. 가\n   → 나\n【금리】\n💡 두번째\n1. 다\n   → 라";
    let categories = extract_categories(message);

    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].trend, "두번째");
    assert_eq!(categories[0].items[0].title, "다");
}
