//! `SqliteStore` exercised through the `FunnelStore` trait.

use chrono::{DateTime, Duration, TimeZone, Utc};
use funnel_core::{
  Error as CoreError,
  event::{EventKind, NewEvent},
  registration::NewRegistration,
  setting,
  store::{EventQuery, FunnelStore, Insertion},
  waitlist::NewWaitlistEntry,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(hour: u32) -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 11, 24, hour, 0, 0).unwrap() }

fn visit(hour: u32, page: &str) -> NewEvent {
  let mut e = NewEvent::new(EventKind::PageVisit, at(hour));
  e.details.page = Some(page.to_owned());
  e
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn append_and_get_event() {
  let s = store().await;

  let mut input = visit(10, "index");
  input.details.visitor_id = Some("v1".into());
  input.details.variant = Some("A".into());
  input.details.referred_by = Some(3);
  input.details.context.country = Some("US".into());

  let id = s.append_event(input).await.unwrap();
  let event = s.get_event(id).await.unwrap().unwrap();

  assert_eq!(event.id, id);
  assert_eq!(event.kind, EventKind::PageVisit);
  assert_eq!(event.timestamp, at(10));
  assert_eq!(event.details.variant.as_deref(), Some("A"));
  assert_eq!(event.details.referred_by, Some(3));
  assert_eq!(event.details.context.country.as_deref(), Some("US"));
  assert!(event.created_at.is_some());
}

#[tokio::test]
async fn event_without_kind_is_rejected_and_not_written() {
  let s = store().await;
  let input = NewEvent { timestamp: Some(at(10)), ..Default::default() };

  let err = s.append_event(input).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::MissingField("event"))));
  assert!(s.list_events(EventQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn event_without_timestamp_is_rejected() {
  let s = store().await;
  let input = NewEvent { kind: Some(EventKind::ButtonClick), ..Default::default() };
  let err = s.append_event(input).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::MissingField("timestamp"))));
}

#[tokio::test]
async fn ids_are_unique() {
  let s = store().await;
  let a = s.append_event(visit(10, "index")).await.unwrap();
  let b = s.append_event(visit(10, "index")).await.unwrap();
  assert_ne!(a, b);
}

#[tokio::test]
async fn list_events_newest_first_with_filters() {
  let s = store().await;
  s.append_event(visit(8, "index")).await.unwrap();
  s.append_event(visit(12, "pricing")).await.unwrap();
  s.append_event(NewEvent::new(EventKind::ButtonClick, at(11))).await.unwrap();
  s.append_event(visit(14, "index")).await.unwrap();

  let all = s.list_events(EventQuery::default()).await.unwrap();
  let hours: Vec<_> = all.iter().map(|e| e.timestamp).collect();
  assert_eq!(hours, [at(14), at(12), at(11), at(8)]);

  let visits = s
    .list_events(EventQuery { kind: Some(EventKind::PageVisit), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(visits.len(), 3);

  let window = s
    .list_events(EventQuery { from: Some(at(11)), to: Some(at(12)), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(window.len(), 2);

  let limited = s
    .list_events(EventQuery { limit: Some(1), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(limited.len(), 1);
  assert_eq!(limited[0].timestamp, at(14));
}

#[tokio::test]
async fn delete_event() {
  let s = store().await;
  let id = s.append_event(visit(10, "index")).await.unwrap();
  assert!(s.delete_event(id).await.unwrap());
  assert!(s.get_event(id).await.unwrap().is_none());
  assert!(!s.delete_event(id).await.unwrap());
}

// ─── Registrations ───────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_registration_is_a_no_op() {
  let s = store().await;
  let input = NewRegistration::new("jane@example.com", at(10));

  let first = s.append_registration(input.clone()).await.unwrap();
  assert!(matches!(first, Insertion::Created(_)));

  let second = s.append_registration(input).await.unwrap();
  assert_eq!(second, Insertion::Duplicate);

  assert_eq!(s.list_registrations(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn same_email_at_another_time_is_a_new_registration() {
  let s = store().await;
  s.append_registration(NewRegistration::new("jane@example.com", at(10))).await.unwrap();
  let again = s
    .append_registration(NewRegistration::new("jane@example.com", at(10) + Duration::milliseconds(1)))
    .await
    .unwrap();
  assert!(matches!(again, Insertion::Created(_)));
}

#[tokio::test]
async fn registration_without_email_is_rejected() {
  let s = store().await;
  let err = s
    .append_registration(NewRegistration::new("   ", at(10)))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::MissingField("email"))));
}

#[tokio::test]
async fn registration_round_trips_details() {
  let s = store().await;
  let mut input = NewRegistration::new("jane@example.com", at(10));
  input.details.first_name = Some("Jane".into());
  input.details.referred_by = Some(1);
  input.details.variant = Some("B".into());
  input.details.context.utm_campaign = Some("nov".into());

  let Insertion::Created(id) = s.append_registration(input).await.unwrap() else {
    panic!("expected a new row");
  };
  let reg = s.get_registration(id).await.unwrap().unwrap();
  assert_eq!(reg.email, "jane@example.com");
  assert_eq!(reg.details.first_name.as_deref(), Some("Jane"));
  assert_eq!(reg.details.referred_by, Some(1));
  assert_eq!(reg.details.variant.as_deref(), Some("B"));
  assert_eq!(reg.details.context.utm_campaign.as_deref(), Some("nov"));
}

#[tokio::test]
async fn list_registrations_newest_first_and_limited() {
  let s = store().await;
  for (i, hour) in [9, 15, 12].into_iter().enumerate() {
    s.append_registration(NewRegistration::new(format!("u{i}@example.com"), at(hour)))
      .await
      .unwrap();
  }
  let all = s.list_registrations(None).await.unwrap();
  let times: Vec<_> = all.iter().map(|r| r.timestamp).collect();
  assert_eq!(times, [at(15), at(12), at(9)]);
  assert_eq!(s.list_registrations(Some(2)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn delete_registration_leaves_dangling_referrals() {
  let s = store().await;
  let Insertion::Created(referrer) = s
    .append_registration(NewRegistration::new("a@example.com", at(9)))
    .await
    .unwrap()
  else {
    panic!("expected a new row");
  };
  let mut referred = NewRegistration::new("b@example.com", at(10));
  referred.details.referred_by = Some(referrer);
  s.append_registration(referred).await.unwrap();

  assert!(s.delete_registration(referrer).await.unwrap());
  let remaining = s.list_registrations(None).await.unwrap();
  assert_eq!(remaining.len(), 1);
  assert_eq!(remaining[0].details.referred_by, Some(referrer));
}

// ─── Maintenance ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn stats_count_everything() {
  let s = store().await;
  let mut v1 = visit(9, "index");
  v1.details.visitor_id = Some("v1".into());
  let mut v2 = visit(10, "index");
  v2.details.visitor_id = Some("v1".into());
  let mut v3 = visit(11, "pricing");
  v3.details.visitor_id = Some("v2".into());
  for e in [v1, v2, v3, NewEvent::new(EventKind::ButtonClick, at(12))] {
    s.append_event(e).await.unwrap();
  }
  for (i, country) in ["US", "US", "CA"].into_iter().enumerate() {
    let mut r = NewRegistration::new(format!("u{i}@example.com"), at(10));
    r.details.context.country = Some(country.into());
    s.append_registration(r).await.unwrap();
  }

  let stats = s.stats().await.unwrap();
  assert_eq!(stats.total_events, 4);
  assert_eq!(stats.total_visits, 3);
  assert_eq!(stats.unique_visitors, 2);
  assert_eq!(stats.button_clicks, 1);
  assert_eq!(stats.total_registrations, 3);
  assert_eq!(stats.registrations_by_country[0].country, "US");
  assert_eq!(stats.registrations_by_country[0].count, 2);
  assert_eq!(stats.page_views[0].page, "index");
  assert_eq!(stats.page_views[0].count, 2);
}

#[tokio::test]
async fn reset_deletes_events_and_registrations_only() {
  let s = store().await;
  s.append_event(visit(9, "index")).await.unwrap();
  s.append_registration(NewRegistration::new("a@example.com", at(9))).await.unwrap();
  s.join_waitlist(NewWaitlistEntry::new("w@example.com", at(9))).await.unwrap();

  let counts = s.reset().await.unwrap();
  assert_eq!((counts.events, counts.registrations), (1, 1));
  assert_eq!(s.stats().await.unwrap().total_events, 0);
  assert_eq!(s.list_waitlist().await.unwrap().len(), 1);
  assert!(s.get_setting(setting::SITE_CLOSED).await.unwrap().is_some());
}

#[tokio::test]
async fn restore_keeps_ids_and_ignores_existing_rows() {
  let source = store().await;
  source.append_event(visit(9, "index")).await.unwrap();
  source.append_event(visit(10, "index")).await.unwrap();
  source.append_registration(NewRegistration::new("a@example.com", at(9))).await.unwrap();
  let events = source.list_events(EventQuery::default()).await.unwrap();
  let regs = source.list_registrations(None).await.unwrap();

  let target = store().await;
  assert_eq!(target.restore_events(events.clone()).await.unwrap(), 2);
  assert_eq!(target.restore_registrations(regs.clone()).await.unwrap(), 1);
  assert_eq!(target.restore_events(events.clone()).await.unwrap(), 0);
  assert_eq!(target.restore_registrations(regs).await.unwrap(), 0);

  let restored = target.get_event(events[0].id).await.unwrap().unwrap();
  assert_eq!(restored.timestamp, events[0].timestamp);
}

// ─── Settings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn settings_are_seeded() {
  let s = store().await;
  let closed = s.get_setting(setting::SITE_CLOSED).await.unwrap().unwrap();
  assert_eq!(closed.value, "false");
  assert!(s.get_setting(setting::CLOSED_MESSAGE).await.unwrap().is_some());
  assert!(s.get_setting("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn set_setting_is_last_write_wins() {
  let s = store().await;
  s.set_setting(setting::SITE_CLOSED, "true").await.unwrap();
  let updated = s.set_setting(setting::SITE_CLOSED, "false").await.unwrap();
  assert_eq!(updated.value, "false");

  let stored = s.get_setting(setting::SITE_CLOSED).await.unwrap().unwrap();
  assert_eq!(stored.value, "false");
  assert_eq!(s.list_settings().await.unwrap().len(), 2);
}

#[tokio::test]
async fn seeding_does_not_overwrite_existing_settings() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("funnel.db");
  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.set_setting(setting::SITE_CLOSED, "true").await.unwrap();
  }
  let s = SqliteStore::open(&path).await.unwrap();
  assert!(s.get_setting(setting::SITE_CLOSED).await.unwrap().unwrap().as_bool());
}

// ─── Waiting list ────────────────────────────────────────────────────────────

#[tokio::test]
async fn waitlist_is_unique_by_email() {
  let s = store().await;
  let mut entry = NewWaitlistEntry::new("w@example.com", at(9));
  entry.details.hear_about = Some("podcast".into());

  assert!(matches!(s.join_waitlist(entry.clone()).await.unwrap(), Insertion::Created(_)));
  entry.timestamp = Some(at(10));
  assert_eq!(s.join_waitlist(entry).await.unwrap(), Insertion::Duplicate);

  let list = s.list_waitlist().await.unwrap();
  assert_eq!(list.len(), 1);
  assert_eq!(list[0].details.hear_about.as_deref(), Some("podcast"));
}
