use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::page::{fetch_all, Page, PageSource};
use crate::tracker::{AssigneeEvent, LabelAction, LabelEvent, TrackerClient, User};

/// A single state-changing event in a task's history, normalized from the
/// tracker's separate label and assignee streams.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    LabelAdded {
        label: String,
        at: DateTime<Utc>,
        actor: Option<String>,
    },
    LabelRemoved {
        label: String,
        at: DateTime<Utc>,
        actor: Option<String>,
    },
    AssigneeChanged {
        from: Option<String>,
        to: Option<String>,
        at: DateTime<Utc>,
        actor: Option<String>,
    },
}

impl Event {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::LabelAdded { at, .. }
            | Event::LabelRemoved { at, .. }
            | Event::AssigneeChanged { at, .. } => *at,
        }
    }
}

fn username(user: &Option<User>) -> Option<String> {
    user.as_ref().map(|u| u.username.clone())
}

/// Merge the two event streams into one timestamp-ordered sequence.
///
/// The sort is stable over the concatenation label-stream-then-assignee-stream,
/// which gives both required tie-breaks at equal timestamps: source order
/// within a stream, and label events before assignee events across streams
/// (classification at a boundary must see the label change first).
pub fn merge_events(label_events: Vec<LabelEvent>, assignee_events: Vec<AssigneeEvent>) -> Vec<Event> {
    let mut events: Vec<Event> = Vec::with_capacity(label_events.len() + assignee_events.len());

    for e in label_events {
        let event = match e.action {
            LabelAction::Add => Event::LabelAdded {
                label: e.label,
                at: e.created_at,
                actor: username(&e.actor),
            },
            LabelAction::Remove => Event::LabelRemoved {
                label: e.label,
                at: e.created_at,
                actor: username(&e.actor),
            },
        };
        events.push(event);
    }
    for e in assignee_events {
        events.push(Event::AssigneeChanged {
            from: username(&e.from),
            to: username(&e.to),
            at: e.created_at,
            actor: username(&e.actor),
        });
    }

    events.sort_by_key(Event::timestamp);
    events
}

struct LabelEvents<'a, C: TrackerClient + ?Sized> {
    client: &'a C,
    project_id: u64,
    task_iid: u64,
}

#[async_trait]
impl<C: TrackerClient + ?Sized> PageSource for LabelEvents<'_, C> {
    type Item = LabelEvent;

    async fn fetch_page(&self, page_index: usize, page_size: usize) -> Result<Page<LabelEvent>> {
        self.client
            .label_events_page(self.project_id, self.task_iid, page_index, page_size)
            .await
    }
}

struct AssigneeEvents<'a, C: TrackerClient + ?Sized> {
    client: &'a C,
    project_id: u64,
    task_iid: u64,
}

#[async_trait]
impl<C: TrackerClient + ?Sized> PageSource for AssigneeEvents<'_, C> {
    type Item = AssigneeEvent;

    async fn fetch_page(&self, page_index: usize, page_size: usize) -> Result<Page<AssigneeEvent>> {
        self.client
            .assignee_events_page(self.project_id, self.task_iid, page_index, page_size)
            .await
    }
}

/// Fetch and normalize the full event history for one task.
///
/// Both sub-streams are drained completely before merging — the tracker's
/// ordering contract is only approximately chronological, so a later page can
/// contain an earlier event. Any page failure aborts normalization for this
/// task; the caller records it as a per-task failure without stopping the run.
pub async fn normalize_history<C: TrackerClient + ?Sized>(
    client: &C,
    project_id: u64,
    task_iid: u64,
    page_size: usize,
    max_retries: u32,
) -> Result<Vec<Event>> {
    let labels = fetch_all(
        &LabelEvents {
            client,
            project_id,
            task_iid,
        },
        page_size,
        max_retries,
    )
    .await?;
    let assignees = fetch_all(
        &AssigneeEvents {
            client,
            project_id,
            task_iid,
        },
        page_size,
        max_retries,
    )
    .await?;

    log::debug!(
        "Normalized history for task {task_iid}: {} label events, {} assignee events",
        labels.len(),
        assignees.len()
    );

    Ok(merge_events(labels, assignees))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn label_event(label: &str, action: LabelAction, secs: i64) -> LabelEvent {
        LabelEvent {
            label: label.to_string(),
            action,
            created_at: at(secs),
            actor: None,
        }
    }

    fn assignee_event(to: &str, secs: i64) -> AssigneeEvent {
        AssigneeEvent {
            from: None,
            to: Some(User {
                id: 1,
                username: to.to_string(),
                name: None,
            }),
            created_at: at(secs),
            actor: None,
        }
    }

    #[test]
    fn test_merge_sorts_by_timestamp() {
        let labels = vec![
            label_event("qa", LabelAction::Add, 300),
            label_event("work", LabelAction::Add, 100),
        ];
        let events = merge_events(labels, vec![assignee_event("alice", 200)]);
        let times: Vec<i64> = events.iter().map(|e| e.timestamp().timestamp()).collect();
        assert_eq!(times, vec![100, 200, 300]);
    }

    #[test]
    fn test_merge_label_before_assignee_at_equal_instant() {
        let events = merge_events(
            vec![label_event("review", LabelAction::Add, 100)],
            vec![assignee_event("bob", 100)],
        );
        assert!(matches!(events[0], Event::LabelAdded { .. }));
        assert!(matches!(events[1], Event::AssigneeChanged { .. }));
    }

    #[test]
    fn test_merge_preserves_source_order_within_stream() {
        // Two label events at the literally same instant: source order holds.
        let labels = vec![
            label_event("work", LabelAction::Add, 100),
            label_event("qa", LabelAction::Add, 100),
        ];
        let events = merge_events(labels, vec![]);
        assert_eq!(
            events,
            vec![
                Event::LabelAdded {
                    label: "work".into(),
                    at: at(100),
                    actor: None
                },
                Event::LabelAdded {
                    label: "qa".into(),
                    at: at(100),
                    actor: None
                },
            ]
        );
    }

    #[test]
    fn test_merge_handles_out_of_order_sources() {
        // The tracker returned a later page with an earlier event; the merge
        // re-sorts rather than trusting source chronology across pages.
        let labels = vec![
            label_event("review", LabelAction::Add, 500),
            label_event("work", LabelAction::Add, 50),
        ];
        let events = merge_events(labels, vec![]);
        assert_eq!(events[0].timestamp(), at(50));
        assert_eq!(events[1].timestamp(), at(500));
    }
}
