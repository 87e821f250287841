//! Integration tests for admin commands: rooms, admins, disactivation.

mod common;

use anonrelay::state::{ConversationStatus, NewRoomStage};
use anonrelay::intent::Intent;
use common::{BOT_URL, TestRelay, recipients, texts_to};

#[tokio::test]
async fn test_admin_commands_forbidden_for_users() {
    let t = TestRelay::spawn().await.expect("spawn relay");

    for command in ["/new_room", "/new_admin", "/disactivate_room"] {
        let out = t.send("mallory", command).await;
        assert_eq!(
            texts_to(&out, "mallory"),
            vec!["Forbidden: this command is for admins only"]
        );
    }
    assert_eq!(t.status("mallory").await, ConversationStatus::Free);
}

#[tokio::test]
async fn test_configured_admin_bootstraps_others() {
    let t = TestRelay::spawn().await.expect("spawn relay");
    let seeded = vec!["root".to_string()];
    assert_eq!(t.relay.db.users().grant_admins(&seeded).await.unwrap(), 1);

    // No prior contact needed: the seeded id is an admin on its first message.
    let out = t.send("root", "/new_room").await;
    assert_eq!(texts_to(&out, "root"), vec!["Input Code of room"]);
    t.send("root", "/cancel").await;

    t.send("bob", "/start").await;
    t.send("root", "/new_admin").await;
    let out = t.send("root", "bob").await;
    assert_eq!(texts_to(&out, "root"), vec!["Added new admin - with ID bob"]);

    // Seeding again on restart keeps both admins.
    assert_eq!(t.relay.db.users().grant_admins(&seeded).await.unwrap(), 0);
    let out = t.send("bob", "/new_room").await;
    assert_eq!(texts_to(&out, "bob"), vec!["Input Code of room"]);
}

#[tokio::test]
async fn test_create_room() {
    let t = TestRelay::spawn().await.expect("spawn relay");
    t.make_admin("root").await;

    let out = t.send("root", "/new_room").await;
    assert_eq!(texts_to(&out, "root"), vec!["Input Code of room"]);
    let out = t.send("root", "LOBBY").await;
    assert_eq!(texts_to(&out, "root"), vec!["Input Title of room"]);
    let out = t.send("root", "Lobby").await;
    assert_eq!(texts_to(&out, "root"), vec!["Input Description of room"]);
    let out = t.send("root", "Chat here").await;
    assert_eq!(
        texts_to(&out, "root"),
        vec![format!(
            "Added new room Lobby\nDescription: Chat here\nCode LOBBY\nLink: {BOT_URL}?start=LOBBY"
        )]
    );
    assert_eq!(t.status("root").await, ConversationStatus::Free);
    assert_eq!(t.relay.cache.draft("root").await.unwrap(), None);

    let room = t
        .relay
        .db
        .rooms()
        .find_active_by_code("LOBBY")
        .await
        .unwrap()
        .expect("room created");
    assert_eq!(room.title, "Lobby");

    // The new room is joinable right away.
    t.join("alice", "LOBBY", "Alice").await;
}

#[tokio::test]
async fn test_create_room_code_taken() {
    let t = TestRelay::spawn().await.expect("spawn relay");
    t.make_admin("root").await;
    t.create_room("ABC", "Existing").await;

    t.send("root", "/new_room").await;
    let out = t.send("root", "ABC").await;
    assert_eq!(
        texts_to(&out, "root"),
        vec!["This code is already taken(\nTry again!!!"]
    );
    assert_eq!(
        t.status("root").await,
        ConversationStatus::InputNewRoom {
            stage: NewRoomStage::Code
        }
    );

    let out = t.send("root", "XYZ").await;
    assert_eq!(texts_to(&out, "root"), vec!["Input Title of room"]);
}

#[tokio::test]
async fn test_cancel_room_creation() {
    let t = TestRelay::spawn().await.expect("spawn relay");
    t.make_admin("root").await;

    t.send("root", "/new_room").await;
    t.send("root", "DRAFT").await;
    assert!(t.relay.cache.draft("root").await.unwrap().is_some());

    let out = t.send("root", "/cancel").await;
    assert_eq!(texts_to(&out, "root"), vec!["Cancelled"]);
    assert_eq!(t.status("root").await, ConversationStatus::Free);
    assert_eq!(t.relay.cache.draft("root").await.unwrap(), None);
    assert!(
        t.relay
            .db
            .rooms()
            .find_by_code("DRAFT")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_admin_flow_requires_leaving_room() {
    let t = TestRelay::spawn().await.expect("spawn relay");
    t.make_admin("root").await;
    let room = t.create_room("ABC", "Lobby").await;
    t.join("root", "ABC", "Root").await;

    let out = t.send("root", "/new_room").await;
    assert_eq!(texts_to(&out, "root"), vec!["Leave the room with /exit first"]);
    assert_eq!(
        t.status("root").await,
        ConversationStatus::Participant { room_id: room.id }
    );
}

#[tokio::test]
async fn test_add_admin() {
    let t = TestRelay::spawn().await.expect("spawn relay");
    t.make_admin("root").await;

    let out = t.send("root", "/new_admin").await;
    assert_eq!(texts_to(&out, "root"), vec!["Input ID of new admin"]);

    let out = t.send("root", "bob").await;
    assert_eq!(
        texts_to(&out, "root"),
        vec!["This user doesn`t exist at this bot!"]
    );
    assert_eq!(t.status("root").await, ConversationStatus::InputNewAdmin);

    // Bob talks to the bot once, which registers him.
    t.send("bob", "/start").await;

    let out = t.send("root", "bob").await;
    assert_eq!(texts_to(&out, "root"), vec!["Added new admin - with ID bob"]);
    assert_eq!(t.status("root").await, ConversationStatus::Free);

    let out = t.send("bob", "/new_room").await;
    assert_eq!(texts_to(&out, "bob"), vec!["Input Code of room"]);
}

#[tokio::test]
async fn test_add_existing_admin() {
    let t = TestRelay::spawn().await.expect("spawn relay");
    t.make_admin("root").await;
    t.make_admin("ops").await;

    t.send("root", "/new_admin").await;
    let out = t.send("root", "ops").await;
    assert_eq!(texts_to(&out, "root"), vec!["This user already admin!"]);
}

#[tokio::test]
async fn test_disactivate_room_evicts_members() {
    let t = TestRelay::spawn().await.expect("spawn relay");
    t.make_admin("root").await;
    let room = t.create_room("ABC", "Lobby").await;
    t.join("alice", "ABC", "Alice").await;
    t.join("bob", "ABC", "Bob").await;

    let out = t.send("root", "/disactivate_room").await;
    assert_eq!(
        texts_to(&out, "root"),
        vec!["Input code of room to disactivate"]
    );

    let out = t.send("root", "ABC").await;
    assert_eq!(recipients(&out), vec!["alice", "bob", "root"]);
    assert_eq!(
        texts_to(&out, "root"),
        vec!["Room Lobby with code ABC disactivated successfuly"]
    );
    assert!(texts_to(&out, "alice")[0].starts_with("Room Lobby was closed"));

    for user in ["alice", "bob"] {
        assert_eq!(t.status(user).await, ConversationStatus::Free);
        assert!(
            !t.relay
                .cache
                .is_user_active_in_room(user, &room.id)
                .await
                .unwrap()
        );
    }
    assert!(t.relay.cache.active_user_ids(&room.id).await.unwrap().is_empty());

    // Nothing is relayed any more and the code no longer works.
    assert!(t.send("alice", "hello?").await.is_empty());
    let out = t.send("alice", "/start ABC").await;
    assert_eq!(texts_to(&out, "alice"), vec!["Invalid Code"]);
}

#[tokio::test]
async fn test_disactivate_unknown_room() {
    let t = TestRelay::spawn().await.expect("spawn relay");
    t.make_admin("root").await;

    t.send("root", "/disactivate_room").await;
    let out = t.send("root", "NOPE").await;
    assert_eq!(
        texts_to(&out, "root"),
        vec!["Room with code NOPE doesn't exist"]
    );
    assert_eq!(t.status("root").await, ConversationStatus::DisactivateRoom);
}

#[tokio::test]
async fn test_concurrent_room_creation_with_same_code() {
    let t = TestRelay::spawn().await.expect("spawn relay");
    for admin in ["root", "ops"] {
        t.make_admin(admin).await;
        t.send(admin, "/new_room").await;
        t.send(admin, "LOBBY").await;
        t.send(admin, &format!("{admin}'s lobby")).await;
    }

    let (root, ops) = tokio::join!(
        t.relay.handle(Intent::text("root", "First come")),
        t.relay.handle(Intent::text("ops", "First served")),
    );
    t.relay.producer.flush().await;
    let out = t.broker.drain();

    assert_eq!([&root, &ops].iter().filter(|r| r.is_ok()).count(), 1);
    let texts: Vec<String> = out.iter().filter_map(|e| e.body.text.clone()).collect();
    assert_eq!(
        texts.iter().filter(|t| t.starts_with("Added new room")).count(),
        1,
        "unexpected replies: {texts:?}"
    );
    assert!(
        texts.iter().any(|t| {
            t == "This code is already taken(\nTry again!!!"
                || t == "Your previous request is still being processed, try again"
        }),
        "unexpected replies: {texts:?}"
    );

    let room = t
        .relay
        .db
        .rooms()
        .find_active_by_code("LOBBY")
        .await
        .unwrap()
        .expect("one room");
    assert!(room.title == "root's lobby" || room.title == "ops's lobby");
}
