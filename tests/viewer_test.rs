//! Tests for the viewer: validation, fetch outcomes and deep links.
//!
//! Run with: cargo test --test viewer_test

mod common;

use std::sync::Arc;

use chrono::Utc;

use common::{Call, MockApi, paired_directory_json, record};
use hires_viewer::classify::RuleSet;
use hires_viewer::directory::{DirectoryShape, LocationDirectory, LocationId};
use hires_viewer::hires::ApiError;
use hires_viewer::query::{GridQuery, QueryShape};
use hires_viewer::url_state::UrlState;
use hires_viewer::viewer::{FetchOutcome, Field, Notice, ValidationError, Viewer};
use hires_viewer::window::TimeWindow;

fn directory() -> Arc<LocationDirectory> {
    Arc::new(
        LocationDirectory::from_json(DirectoryShape::Paired, paired_directory_json()).unwrap(),
    )
}

fn window(start: &str, end: &str) -> TimeWindow {
    TimeWindow {
        start: start.to_string(),
        end: end.to_string(),
    }
}

fn range_viewer(api: &Arc<MockApi>) -> Viewer<Arc<MockApi>, Utc> {
    Viewer::new(api.clone(), Utc, QueryShape::Range, directory())
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        body: "boom".to_string(),
    }
}

// =============================================================================
// Initial state
// =============================================================================

#[test]
fn new_viewer_has_default_window_and_nothing_else() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let viewer = range_viewer(&api);

    assert!(viewer.start().ends_with("T00:00"));
    assert!(viewer.end().ends_with("T01:00"));
    assert_eq!(viewer.location(), "");
    assert_eq!(viewer.add_hours(), "1");
    assert_eq!(viewer.notice(), None);
    assert!(!viewer.is_busy());
    assert!(viewer.rows().is_empty());
    assert_eq!(viewer.address(), None);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn end_before_start_blocks_fetch() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api).with_window(window("2024-01-02T10:00", "2024-01-02T09:00"));
    viewer.set_location("Main & 1st");

    let err = viewer.submit().await.unwrap_err();

    assert!(matches!(err, ValidationError::EndBeforeStart { .. }));
    assert!(viewer.is_invalid(Field::End));
    assert!(!viewer.is_invalid(Field::Start));
    assert!(!viewer.is_busy());
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn equal_bounds_are_allowed() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api).with_window(window("2024-01-02T10:00", "2024-01-02T10:00"));
    viewer.set_location("Main & 1st");

    viewer.submit().await.unwrap();

    assert_eq!(api.grid_calls().len(), 1);
}

#[tokio::test]
async fn unknown_location_blocks_fetch() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api).with_window(window("2024-01-02T09:00", "2024-01-02T10:00"));
    viewer.set_location("Nowhere Rd");

    let err = viewer.submit().await.unwrap_err();

    assert!(matches!(err, ValidationError::UnknownLocation(ref name) if name == "Nowhere Rd"));
    assert!(viewer.is_invalid(Field::Location));
    assert!(api.calls().is_empty());
}

#[test]
fn every_offending_field_is_flagged() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api).with_window(window("garbage", "2024-01-02T10:00"));
    viewer.set_location("Nowhere Rd");

    let err = viewer.prepare().unwrap_err();

    assert_eq!(err.field(), Field::Location);
    let flagged: Vec<Field> = viewer.invalid_fields().collect();
    assert_eq!(flagged, vec![Field::Location, Field::Start]);
}

#[test]
fn editing_a_field_clears_its_mark() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api).with_window(window("2024-01-02T10:00", "2024-01-02T09:00"));
    viewer.set_location("Main & 1st");

    assert!(viewer.prepare().is_err());
    assert!(viewer.is_invalid(Field::End));

    viewer.set_end("2024-01-02T11:00");
    assert!(!viewer.is_invalid(Field::End));
    assert!(viewer.prepare().is_ok());
}

#[test]
fn select_location_by_id() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api);

    assert!(viewer.select_location(&LocationId::new("6")));
    assert_eq!(viewer.location(), "Oak & 2nd");

    assert!(!viewer.select_location(&LocationId::new("404")));
    assert_eq!(viewer.location(), "");
}

// =============================================================================
// Fetch outcomes
// =============================================================================

#[tokio::test]
async fn successful_fetch_replaces_rows() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    api.push_grid(Ok(vec![record(1, 2), record(8, 2)]));

    let mut viewer = range_viewer(&api)
        .with_window(window("2024-11-25T00:00", "2024-11-25T01:00"))
        .with_rows(vec![record(43, 0)]);
    viewer.set_location("Main & 1st");

    let outcome = viewer.submit().await.unwrap();

    assert_eq!(outcome, FetchOutcome::Displayed(2));
    assert_eq!(viewer.rows(), &[record(1, 2), record(8, 2)]);
    assert_eq!(viewer.notice(), None);
    assert!(!viewer.is_busy());
    assert_eq!(
        viewer.address(),
        Some("locid=5&startdt=2024-11-25T00%3A00&enddt=2024-11-25T01%3A00")
    );
}

#[tokio::test]
async fn empty_result_shows_no_data() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    api.push_grid(Ok(Vec::new()));

    let mut viewer = range_viewer(&api)
        .with_window(window("2024-11-25T00:00", "2024-11-25T01:00"))
        .with_rows(vec![record(1, 2), record(8, 2)]);
    viewer.set_location("Oak & 2nd");

    let outcome = viewer.submit().await.unwrap();

    assert_eq!(outcome, FetchOutcome::NoData);
    assert_eq!(viewer.notice(), Some(Notice::NoData));
    assert!(viewer.rows().is_empty());
    assert!(!viewer.is_busy());
}

#[tokio::test]
async fn backend_failure_keeps_previous_rows() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    api.push_grid(Err(server_error()));

    let seeded = vec![record(1, 2), record(8, 2), record(10, 2)];
    let mut viewer = range_viewer(&api)
        .with_window(window("2024-11-25T00:00", "2024-11-25T01:00"))
        .with_rows(seeded.clone());
    viewer.set_location("Main & 1st");

    let outcome = viewer.submit().await.unwrap();

    assert_eq!(outcome, FetchOutcome::Failed);
    assert_eq!(viewer.notice(), Some(Notice::Error));
    assert_eq!(viewer.rows(), seeded.as_slice());
    assert!(!viewer.is_busy());
    assert_eq!(viewer.address(), None);
}

#[tokio::test]
async fn notices_replace_each_other() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    api.push_grid(Err(server_error()));
    api.push_grid(Ok(Vec::new()));
    api.push_grid(Ok(vec![record(1, 2)]));

    let mut viewer = range_viewer(&api).with_window(window("2024-11-25T00:00", "2024-11-25T01:00"));
    viewer.set_location("Main & 1st");

    viewer.submit().await.unwrap();
    assert_eq!(viewer.notice(), Some(Notice::Error));

    viewer.submit().await.unwrap();
    assert_eq!(viewer.notice(), Some(Notice::NoData));

    viewer.submit().await.unwrap();
    assert_eq!(viewer.notice(), None);
}

#[test]
fn dismiss_notice() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api).with_window(window("2024-11-25T00:00", "2024-11-25T01:00"));
    viewer.set_location("Main & 1st");

    let pending = viewer.prepare().unwrap();
    viewer.complete(pending, Ok(Vec::new()));
    assert_eq!(viewer.notice(), Some(Notice::NoData));

    viewer.dismiss_notice();
    assert_eq!(viewer.notice(), None);
}

#[test]
fn busy_between_prepare_and_complete() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api).with_window(window("2024-11-25T00:00", "2024-11-25T01:00"));
    viewer.set_location("Main & 1st");

    let pending = viewer.prepare().unwrap();
    assert!(viewer.is_busy());

    viewer.complete(pending, Ok(vec![record(1, 2)]));
    assert!(!viewer.is_busy());
}

#[test]
fn superseded_response_is_dropped() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api).with_window(window("2024-11-25T00:00", "2024-11-25T01:00"));
    viewer.set_location("Main & 1st");

    let first = viewer.prepare().unwrap();
    viewer.set_location("Oak & 2nd");
    let second = viewer.prepare().unwrap();
    assert!(second.seq > first.seq);

    let outcome = viewer.complete(first, Ok(vec![record(1, 2)]));
    assert_eq!(outcome, FetchOutcome::Superseded);
    assert!(viewer.rows().is_empty());
    assert!(viewer.is_busy());

    let outcome = viewer.complete(second, Ok(vec![record(8, 2), record(10, 2)]));
    assert_eq!(outcome, FetchOutcome::Displayed(2));
    assert_eq!(viewer.rows().len(), 2);
    assert!(viewer.address().unwrap().starts_with("locid=6&"));
}

// =============================================================================
// Deep links
// =============================================================================

#[tokio::test]
async fn deep_link_fetches_once_with_linked_values() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let directory = Arc::new(
        LocationDirectory::fetch(&api, DirectoryShape::Paired)
            .await
            .unwrap(),
    );
    let mut viewer = Viewer::new(api.clone(), Utc, QueryShape::Range, directory);

    let state = UrlState::from_query(
        "?locid=5&startdt=2024-11-25T00:00&enddt=2024-11-25T01:00",
        QueryShape::Range,
    )
    .unwrap();
    viewer.open(state).await.unwrap();

    assert_eq!(viewer.location(), "Main & 1st");
    assert_eq!(viewer.start(), "2024-11-25T00:00");
    assert_eq!(viewer.end(), "2024-11-25T01:00");

    // Directory first, then exactly one grid fetch
    let expected = GridQuery::range(LocationId::new("5"), "2024-11-25T00:00", "2024-11-25T01:00")
        .unwrap();
    assert_eq!(api.calls(), vec![Call::Locations, Call::Grid(expected)]);
}

#[tokio::test]
async fn deep_link_to_unknown_location_does_not_fetch() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api);

    let state = UrlState::from_query(
        "locid=404&startdt=2024-11-25T00:00&enddt=2024-11-25T01:00",
        QueryShape::Range,
    )
    .unwrap();
    let err = viewer.open(state).await.unwrap_err();

    assert!(matches!(err, ValidationError::UnknownLocation(_)));
    assert!(viewer.is_invalid(Field::Location));
    assert!(api.grid_calls().is_empty());
}

// =============================================================================
// Addresses and restoring earlier rows
// =============================================================================

#[tokio::test]
async fn address_uses_canonical_bounds() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api)
        .with_window(window("2024-11-25 00:00:30", " 2024-11-25T01:00:59"));
    viewer.set_location("Main & 1st");
    api.push_grid(Ok(vec![record(1, 2)]));

    viewer.submit().await.unwrap();

    assert_eq!(
        viewer.address(),
        Some("locid=5&startdt=2024-11-25T00%3A00&enddt=2024-11-25T01%3A00")
    );
    // The inputs keep what was typed
    assert_eq!(viewer.start(), "2024-11-25 00:00:30");
}

#[tokio::test]
async fn legacy_address_uses_parsed_hours() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = Viewer::new(api.clone(), Utc, QueryShape::Legacy, directory())
        .with_window(window("2024-09-20 09:00", "2024-09-20T09:00"));
    viewer.set_location("Quiet St");
    viewer.set_add_hours(" 3 ");
    api.push_grid(Ok(vec![record(1, 2)]));

    viewer.submit().await.unwrap();

    assert_eq!(
        viewer.address(),
        Some("locid=7&date=2024-09-20T09%3A00&addhrs=3")
    );
}

#[test]
fn query_for_reads_an_earlier_address() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let viewer = range_viewer(&api);
    let state = UrlState::from_query(
        "locid=5&startdt=2024-11-25T00%3A00&enddt=2024-11-25T01%3A00",
        QueryShape::Range,
    )
    .unwrap();

    let expected =
        GridQuery::range(LocationId::new("5"), "2024-11-25T00:00", "2024-11-25T01:00").unwrap();
    assert_eq!(viewer.query_for(&state), Some(expected));
}

#[test]
fn query_for_rejects_stale_addresses() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let viewer = range_viewer(&api);

    for raw in [
        "locid=404&startdt=2024-11-25T00%3A00&enddt=2024-11-25T01%3A00",
        "locid=5&startdt=2024-11-25T02%3A00&enddt=2024-11-25T01%3A00",
        "locid=5&startdt=nope&enddt=2024-11-25T01%3A00",
        "locid=5&startdt=2024-11-25T00%3A00",
    ] {
        let state = UrlState::from_query(raw, QueryShape::Range).unwrap();
        assert_eq!(viewer.query_for(&state), None, "{raw}");
    }
}

#[tokio::test]
async fn restore_after_failure_shows_earlier_rows() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    api.push_grid(Err(server_error()));
    let mut viewer = range_viewer(&api)
        .with_window(window("2024-11-25T00:00", "2024-11-25T01:00"));
    viewer.set_location("Broken Ave");

    assert_eq!(viewer.submit().await.unwrap(), FetchOutcome::Failed);
    assert!(viewer.rows().is_empty());

    let earlier =
        GridQuery::range(LocationId::new("5"), "2024-11-25T00:00", "2024-11-25T01:00").unwrap();
    viewer.restore(&earlier, vec![record(1, 2)]);

    assert_eq!(viewer.rows(), &[record(1, 2)]);
    assert_eq!(viewer.notice(), Some(Notice::Error));
    assert_eq!(viewer.location(), "Broken Ave");
    assert_eq!(
        viewer.address(),
        Some("locid=5&startdt=2024-11-25T00%3A00&enddt=2024-11-25T01%3A00")
    );
}

// =============================================================================
// Window shifts
// =============================================================================

#[test]
fn extend_end_changes_only_end() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api).with_window(window("2024-11-25T05:00", "2024-11-25T05:00"));

    viewer.extend_end().unwrap();

    assert_eq!(viewer.start(), "2024-11-25T05:00");
    assert_eq!(viewer.end(), "2024-11-25T06:00");
    assert!(api.calls().is_empty());
}

#[test]
fn rewind_start_changes_only_start() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api).with_window(window("2024-11-25T09:00", "2024-11-25T05:00"));

    viewer.rewind_start().unwrap();

    assert_eq!(viewer.start(), "2024-11-25T04:00");
    assert_eq!(viewer.end(), "2024-11-25T05:00");
}

#[test]
fn shift_from_unparseable_value_flags_source() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = range_viewer(&api).with_window(window("soon", "2024-11-25T05:00"));

    assert!(viewer.extend_end().is_err());
    assert!(viewer.is_invalid(Field::Start));
    assert_eq!(viewer.end(), "2024-11-25T05:00");
}

// =============================================================================
// Legacy query shape
// =============================================================================

#[tokio::test]
async fn legacy_fetch_uses_hour_count() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = Viewer::new(api.clone(), Utc, QueryShape::Legacy, directory())
        .with_window(window("2024-09-20T09:00", "2024-09-20T09:00"));
    viewer.set_location("Quiet St");
    viewer.set_add_hours("3");

    viewer.submit().await.unwrap();

    let expected = GridQuery::legacy(LocationId::new("7"), "2024-09-20T09:00", 3).unwrap();
    assert_eq!(api.grid_calls(), vec![expected]);
    assert_eq!(
        viewer.address(),
        Some("locid=7&date=2024-09-20T09%3A00&addhrs=3")
    );
}

#[tokio::test]
async fn legacy_hours_out_of_range_block_fetch() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = Viewer::new(api.clone(), Utc, QueryShape::Legacy, directory())
        .with_window(window("2024-09-20T09:00", "2024-09-20T09:00"));
    viewer.set_location("Quiet St");

    for hours in ["0", "33", "two", ""] {
        viewer.set_add_hours(hours);
        let err = viewer.submit().await.unwrap_err();
        assert!(matches!(err, ValidationError::AddHours(_)), "{hours:?}");
        assert!(viewer.is_invalid(Field::AddHours));
    }
    assert!(api.calls().is_empty());
}

#[test]
fn legacy_ignores_end_input() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let mut viewer = Viewer::new(api.clone(), Utc, QueryShape::Legacy, directory())
        .with_window(window("2024-09-20T09:00", "2024-09-20T08:00"));
    viewer.set_location("Quiet St");

    assert!(viewer.prepare().is_ok());
}

// =============================================================================
// Styling
// =============================================================================

#[test]
fn classified_rows_keep_display_order() {
    let api = Arc::new(MockApi::new(paired_directory_json()));
    let rules = RuleSet::builtin().unwrap();
    let viewer = range_viewer(&api).with_rows(vec![record(43, 0), record(1, 2)]);

    let styled: Vec<_> = viewer.classified(&rules).collect();

    assert_eq!(styled.len(), 2);
    assert!(styled[0].1.is_empty());
    assert_eq!(styled[1].1.row_classes(), vec!["start-green"]);
}
