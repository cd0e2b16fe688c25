use chrono::Duration;
use chrono::TimeZone;
use chrono::Utc;
use parley_client::ClientError;
use parley_client::Role;
use parley_client::StreamEvent;

use super::Conversation;
use super::HistoryKind;
use super::Phase;
use super::StreamOutcome;
use crate::domain::models::Event;
use crate::domain::models::MessageStatus;
use crate::domain::models::SessionEntry;
use crate::domain::models::SessionSource;
use crate::errors::ControllerError;

fn server_message(session_id: &str, index: usize) -> parley_client::Message {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    parley_client::Message {
        id: format!("m{index}"),
        session_id: Some(session_id.to_string()),
        role: if index % 2 == 0 {
            Role::User
        } else {
            Role::Assistant
        },
        content: format!("message {index}"),
        created_at: start + Duration::minutes(index as i64),
    }
}

// Pages are counted from the newest message, each page oldest first.
fn server_page(
    session_id: &str,
    total: usize,
    limit: usize,
    offset: usize,
) -> Vec<parley_client::Message> {
    let end = total.saturating_sub(offset);
    let start = end.saturating_sub(limit);
    (start..end)
        .map(|index| server_message(session_id, index))
        .collect()
}

fn ids(conversation: &Conversation) -> Vec<String> {
    conversation
        .messages()
        .iter()
        .map(|message| message.id.clone())
        .collect()
}

fn session_entry(id: &str) -> SessionEntry {
    SessionEntry {
        id: id.to_string(),
        title: format!("Session {id}"),
        is_active: false,
        created_at: None,
    }
}

#[test]
fn test_fetches_first_page_on_select_and_replaces_window() {
    let mut conversation = Conversation::new(20);
    conversation.begin_send("draft", Utc::now()).unwrap();
    let placeholder_id = conversation.stream_placeholder_id().unwrap().to_string();
    conversation.finish_stream(&placeholder_id, StreamOutcome::Completed);

    let request = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();

    assert_eq!(request.kind, HistoryKind::Initial);
    assert_eq!(request.page.offset, 0);
    assert_eq!(request.page.limit, 20);
    assert_eq!(conversation.phase(), Phase::RestoringHistory);
    assert!(conversation.begin_load_older().is_none());

    assert!(conversation.apply_history(&request, Ok(server_page("s1", 5, 20, 0))));

    assert_eq!(ids(&conversation), vec!["m0", "m1", "m2", "m3", "m4"]);
    assert_eq!(conversation.offset(), 5);
    assert!(!conversation.has_more());
    assert_eq!(conversation.phase(), Phase::Idle);
    assert_eq!(conversation.active_session_id(), Some("s1"));
    assert_eq!(conversation.source(), SessionSource::SidebarSelected);
}

#[test]
fn test_paginates_forty_five_messages_in_three_pages() {
    let mut conversation = Conversation::new(20);

    let request = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Ok(server_page("s1", 45, 20, 0)));
    assert_eq!(conversation.offset(), 20);
    assert!(conversation.has_more());

    let request = conversation.begin_load_older().unwrap();
    assert_eq!(request.page.offset, 20);
    assert_eq!(conversation.phase(), Phase::Paginating);
    assert!(conversation.begin_load_older().is_none());
    conversation.apply_history(&request, Ok(server_page("s1", 45, 20, 20)));
    assert_eq!(conversation.offset(), 40);
    assert!(conversation.has_more());

    let request = conversation.begin_load_older().unwrap();
    conversation.apply_history(&request, Ok(server_page("s1", 45, 20, 40)));
    assert_eq!(conversation.offset(), 45);
    assert!(!conversation.has_more());
    assert!(conversation.begin_load_older().is_none());

    let expected = (0..45).map(|i| format!("m{i}")).collect::<Vec<_>>();
    assert_eq!(ids(&conversation), expected);

    let timestamps = conversation
        .messages()
        .iter()
        .map(|message| message.created_at)
        .collect::<Vec<_>>();
    let mut sorted = timestamps.clone();
    sorted.sort();
    assert_eq!(timestamps, sorted);
}

#[test]
fn test_drops_ids_already_in_window_but_advances_by_returned_count() {
    let mut conversation = Conversation::new(3);

    let request = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Ok(server_page("s1", 10, 3, 0)));
    assert_eq!(ids(&conversation), vec!["m7", "m8", "m9"]);

    // Two new rows landed server-side, so the next page overlaps by two.
    let request = conversation.begin_load_older().unwrap();
    conversation.apply_history(&request, Ok(server_page("s1", 10, 3, 1)));

    assert_eq!(ids(&conversation), vec!["m6", "m7", "m8", "m9"]);
    assert_eq!(conversation.offset(), 6);
    assert!(conversation.has_more());

    let older = conversation
        .take_events()
        .into_iter()
        .filter_map(|event| match event {
            Event::OlderLoaded { messages, .. } => Some(messages.len()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(older, vec![1]);
}

#[test]
fn test_shows_two_entries_after_new_chat_and_send() {
    let mut conversation = Conversation::new(20);
    let request = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Ok(server_page("s1", 4, 20, 0)));

    conversation.new_chat().unwrap();
    assert!(conversation.messages().is_empty());
    assert_eq!(conversation.active_session_id(), None);
    assert_eq!(conversation.source(), SessionSource::None);
    assert!(conversation.has_more());

    let ticket = conversation.begin_send("hello", Utc::now()).unwrap();

    assert_eq!(conversation.messages().len(), 2);
    let user = &conversation.messages()[0];
    let placeholder = &conversation.messages()[1];
    assert_eq!(user.role, Role::User);
    assert_eq!(user.text, "hello");
    assert_eq!(user.status, MessageStatus::Optimistic);
    assert_eq!(placeholder.role, Role::Assistant);
    assert_eq!(placeholder.text, "");
    assert_eq!(placeholder.id, ticket.placeholder_id);
    assert_eq!(ticket.request.conversation_id, None);
    assert_eq!(ticket.request.message.content, "hello");
    assert_eq!(conversation.phase(), Phase::Streaming);
}

#[test]
fn test_rejects_reentrant_and_blank_sends() {
    let mut conversation = Conversation::new(20);

    assert_eq!(
        conversation.begin_send("   ", Utc::now()),
        Err(ControllerError::EmptyMessage)
    );
    conversation.begin_send("first", Utc::now()).unwrap();
    assert_eq!(
        conversation.begin_send("second", Utc::now()),
        Err(ControllerError::SendInFlight)
    );
    assert_eq!(conversation.messages().len(), 2);
    assert_eq!(conversation.new_chat(), Err(ControllerError::SendInFlight));
}

#[test]
fn test_adopts_reported_session_exactly_once() {
    let mut conversation = Conversation::new(20);
    let ticket = conversation.begin_send("hello", Utc::now()).unwrap();
    let placeholder_id = ticket.placeholder_id.as_str();

    let adopted = conversation.apply_stream_event(
        placeholder_id,
        StreamEvent::SessionAssigned("new-1".to_string()),
    );
    assert_eq!(adopted.as_deref(), Some("new-1"));
    assert_eq!(conversation.active_session_id(), Some("new-1"));
    assert_eq!(conversation.source(), SessionSource::CreatedBySend);
    assert!(conversation
        .messages()
        .iter()
        .all(|message| message.session_id.as_deref() == Some("new-1")));

    let adopted = conversation.apply_stream_event(
        placeholder_id,
        StreamEvent::SessionAssigned("new-2".to_string()),
    );
    assert_eq!(adopted, None);
    assert_eq!(conversation.active_session_id(), Some("new-1"));

    let changes = conversation
        .take_events()
        .into_iter()
        .filter(|event| matches!(event, Event::ActiveSessionChanged { .. }))
        .count();
    assert_eq!(changes, 1);
}

#[test]
fn test_keeps_existing_session_when_stream_reports_one() {
    let mut conversation = Conversation::new(20);
    let request = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Ok(vec![]));

    let ticket = conversation.begin_send("hello", Utc::now()).unwrap();
    assert_eq!(ticket.request.conversation_id.as_deref(), Some("s1"));

    let adopted = conversation.apply_stream_event(
        &ticket.placeholder_id,
        StreamEvent::SessionAssigned("other".to_string()),
    );
    assert_eq!(adopted, None);
    assert_eq!(conversation.active_session_id(), Some("s1"));
    assert_eq!(conversation.source(), SessionSource::SidebarSelected);
}

#[test]
fn test_appends_chunks_in_place() {
    let mut conversation = Conversation::new(20);
    let ticket = conversation.begin_send("hello", Utc::now()).unwrap();

    for chunk in ["Hel", "lo ", "there"] {
        conversation
            .apply_stream_event(&ticket.placeholder_id, StreamEvent::TextDelta(chunk.to_string()));
    }
    assert!(conversation.finish_stream(&ticket.placeholder_id, StreamOutcome::Completed));

    let placeholder = &conversation.messages()[1];
    assert_eq!(placeholder.text, "Hello there");
    assert_eq!(placeholder.status, MessageStatus::Complete);
    assert_eq!(conversation.phase(), Phase::Idle);
}

#[test]
fn test_keeps_partial_text_when_stream_fails() {
    let mut conversation = Conversation::new(20);
    let ticket = conversation.begin_send("hello", Utc::now()).unwrap();
    conversation.apply_stream_event(
        &ticket.placeholder_id,
        StreamEvent::TextDelta("Partial".to_string()),
    );

    let completed = conversation.finish_stream(
        &ticket.placeholder_id,
        StreamOutcome::Failed(ClientError::StreamInterrupted("reset".to_string())),
    );

    assert!(!completed);
    let placeholder = &conversation.messages()[1];
    assert!(placeholder.text.starts_with("Partial"));
    assert!(placeholder.text.ends_with("[error: Stream interrupted: reset]"));
    assert_eq!(placeholder.status, MessageStatus::Failed);
    assert!(!conversation.is_streaming());

    let events = conversation.take_events();
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::Notification(_))));
    assert!(events.iter().any(|event| matches!(
        event,
        Event::StreamFinished { marker: Some(_), .. }
    )));
}

#[test]
fn test_marks_stopped_stream() {
    let mut conversation = Conversation::new(20);
    let ticket = conversation.begin_send("hello", Utc::now()).unwrap();

    conversation.finish_stream(&ticket.placeholder_id, StreamOutcome::Stopped);

    assert_eq!(conversation.messages()[1].text, "[stopped]");
    assert!(conversation.begin_send("again", Utc::now()).is_ok());
}

#[test]
fn test_resets_when_active_session_is_deleted() {
    let mut conversation = Conversation::new(20);
    conversation.set_sessions(vec![session_entry("s1"), session_entry("s2")]);
    let request = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Ok(server_page("s1", 3, 20, 0)));
    let ticket = conversation.begin_send("hello", Utc::now()).unwrap();

    assert!(conversation.remove_session("s1"));

    assert_eq!(conversation.active_session_id(), None);
    assert_eq!(conversation.source(), SessionSource::None);
    assert!(conversation.messages().is_empty());
    assert_eq!(conversation.offset(), 0);
    assert!(conversation.has_more());
    assert_eq!(conversation.sessions().len(), 1);

    // The orphaned stream no longer touches the window.
    conversation.apply_stream_event(
        &ticket.placeholder_id,
        StreamEvent::TextDelta("late".to_string()),
    );
    conversation.finish_stream(&ticket.placeholder_id, StreamOutcome::Completed);
    assert!(conversation.messages().is_empty());
    assert!(!conversation.is_streaming());
}

#[test]
fn test_keeps_active_session_when_other_is_deleted() {
    let mut conversation = Conversation::new(20);
    conversation.set_sessions(vec![session_entry("s1"), session_entry("s2")]);
    conversation.select_session("s1", SessionSource::SidebarSelected);

    assert!(!conversation.remove_session("s2"));
    assert_eq!(conversation.active_session_id(), Some("s1"));
    assert_eq!(conversation.sessions(), &[session_entry("s1")]);
}

#[test]
fn test_keeps_window_when_reload_of_same_session_fails() {
    let mut conversation = Conversation::new(20);
    let request = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Ok(server_page("s1", 25, 20, 0)));
    conversation.take_events();

    let request = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Err(ClientError::Network("down".to_string())));

    assert_eq!(conversation.messages().len(), 20);
    assert_eq!(conversation.offset(), 20);
    assert_eq!(conversation.phase(), Phase::Idle);
    assert!(conversation
        .take_events()
        .iter()
        .any(|event| matches!(event, Event::Notification(_))));
    assert_eq!(conversation.begin_load_older().unwrap().page.offset, 20);
}

#[test]
fn test_failed_first_page_clears_window_of_previous_session() {
    let mut conversation = Conversation::new(20);
    let request = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Ok(server_page("s1", 45, 20, 0)));
    conversation.take_events();

    let request = conversation
        .select_session("s2", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Err(ClientError::Network("down".to_string())));

    assert_eq!(conversation.active_session_id(), Some("s2"));
    assert!(conversation.messages().is_empty());
    assert_eq!(conversation.offset(), 0);
    assert!(conversation.begin_load_older().is_none());
    assert!(conversation
        .take_events()
        .iter()
        .any(|event| matches!(event, Event::WindowCleared)));

    // A retry that succeeds makes the session pageable again.
    let request = conversation
        .select_session("s2", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Ok(server_page("s2", 30, 20, 0)));
    let older = conversation.begin_load_older().unwrap();
    assert_eq!(older.session_id, "s2");
    assert_eq!(older.page.offset, 20);
    assert!(conversation
        .messages()
        .iter()
        .all(|message| message.session_id.as_deref() == Some("s2")));
}

#[test]
fn test_rejects_send_while_first_page_is_loading() {
    let mut conversation = Conversation::new(20);
    let request = conversation
        .select_session("s1", SessionSource::RestoredFromStorage)
        .unwrap();

    assert_eq!(
        conversation.begin_send("hello", Utc::now()),
        Err(ControllerError::HistoryLoading)
    );
    assert!(conversation.messages().is_empty());
    assert!(!conversation.is_streaming());

    conversation.apply_history(&request, Ok(server_page("s1", 3, 20, 0)));
    let ticket = conversation.begin_send("hello", Utc::now()).unwrap();

    let texts = conversation
        .messages()
        .iter()
        .map(|message| message.text.as_str())
        .collect::<Vec<_>>();
    assert_eq!(texts, vec!["message 0", "message 1", "message 2", "hello", ""]);
    assert_eq!(ticket.request.conversation_id.as_deref(), Some("s1"));
}

#[test]
fn test_older_page_lands_while_reply_streams() {
    let mut conversation = Conversation::new(20);
    let request = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Ok(server_page("s1", 45, 20, 0)));

    let ticket = conversation.begin_send("hello", Utc::now()).unwrap();
    let older = conversation.begin_load_older().unwrap();
    assert_eq!(older.page.offset, 20);

    conversation.apply_stream_event(&ticket.placeholder_id, StreamEvent::TextDelta("Hel".to_string()));
    assert!(conversation.apply_history(&older, Ok(server_page("s1", 45, 20, 20))));
    conversation.apply_stream_event(&ticket.placeholder_id, StreamEvent::TextDelta("lo".to_string()));

    assert_eq!(conversation.messages().len(), 42);
    assert_eq!(conversation.messages()[0].id, "m5");
    assert_eq!(conversation.offset(), 40);
    let placeholder = conversation.messages().last().unwrap();
    assert_eq!(placeholder.id, ticket.placeholder_id);
    assert_eq!(placeholder.text, "Hello");

    assert!(conversation.finish_stream(&ticket.placeholder_id, StreamOutcome::Completed));
    assert_eq!(conversation.messages()[41].status, MessageStatus::Complete);
    assert_eq!(conversation.messages()[40].text, "hello");
}

#[test]
fn test_send_accepted_while_older_page_is_in_flight() {
    let mut conversation = Conversation::new(20);
    let request = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Ok(server_page("s1", 25, 20, 0)));

    let older = conversation.begin_load_older().unwrap();
    assert_eq!(conversation.phase(), Phase::Paginating);
    let ticket = conversation.begin_send("hello", Utc::now()).unwrap();
    conversation.apply_history(&older, Ok(server_page("s1", 25, 20, 20)));

    let ids = ids(&conversation);
    assert_eq!(ids.len(), 27);
    assert_eq!(ids[0], "m0");
    assert_eq!(ids[24], "m24");
    assert_eq!(ids[26], ticket.placeholder_id);
    assert!(!conversation.has_more());
    assert_eq!(conversation.phase(), Phase::Streaming);
}

#[test]
fn test_drops_history_of_a_session_no_longer_selected() {
    let mut conversation = Conversation::new(20);
    let first = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();
    let second = conversation
        .select_session("s2", SessionSource::SidebarSelected)
        .unwrap();

    assert!(!conversation.apply_history(&first, Ok(server_page("s1", 3, 20, 0))));
    assert!(conversation.messages().is_empty());
    assert_eq!(conversation.phase(), Phase::RestoringHistory);

    assert!(conversation.apply_history(&second, Ok(server_page("s2", 1, 20, 0))));
    assert_eq!(conversation.messages()[0].session_id.as_deref(), Some("s2"));
}

#[test]
fn test_reinserts_placeholder_replaced_by_history_reload() {
    let mut conversation = Conversation::new(20);
    let request = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Ok(server_page("s1", 2, 20, 0)));
    let ticket = conversation.begin_send("hello", Utc::now()).unwrap();
    conversation.apply_stream_event(&ticket.placeholder_id, StreamEvent::TextDelta("Par".to_string()));

    let request = conversation
        .select_session("s1", SessionSource::SidebarSelected)
        .unwrap();
    conversation.apply_history(&request, Ok(server_page("s1", 3, 20, 0)));
    assert!(!ids(&conversation).contains(&ticket.placeholder_id));

    conversation.apply_stream_event(&ticket.placeholder_id, StreamEvent::TextDelta("tial".to_string()));

    let last = conversation.messages().last().unwrap();
    assert_eq!(last.id, ticket.placeholder_id);
    assert_eq!(last.text, "Partial");
    assert_eq!(conversation.messages().len(), 4);
}

#[test]
fn test_needs_an_active_session_to_paginate() {
    let mut conversation = Conversation::new(20);
    assert!(conversation.begin_load_older().is_none());

    conversation.select_session("s1", SessionSource::CreatedBySend);
    assert_eq!(conversation.phase(), Phase::Idle);
    assert!(conversation.begin_load_older().is_some());
}
