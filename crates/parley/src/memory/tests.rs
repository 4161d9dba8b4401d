//! Unit tests for the in-process collaborators.

use std::time::Duration;

use time::macros::datetime;

use super::*;

#[tokio::test]
async fn pinned_clock_expires_cooldowns_when_advanced() {
    let start = datetime!(2024-05-01 12:00 UTC);
    let store = InMemoryCooldownStore::with_clock(start);
    let subject = PrincipalId::new(3);
    store
        .start(Cooldown {
            subject,
            command: String::from("heal"),
            started_at: start,
            duration: Duration::from_secs(30),
            scope: CooldownScope::Standard,
            compounding: None,
        })
        .await
        .expect("start cooldown");

    let active = store
        .active(subject, "heal", CooldownScope::Standard)
        .await
        .expect("lookup");
    assert!(active.is_some());
    assert!(
        store
            .active(subject, "heal", CooldownScope::Isolated)
            .await
            .expect("lookup")
            .is_none(),
        "scopes are tracked separately"
    );

    store.advance(Duration::from_secs(31));
    let expired = store
        .active(subject, "heal", CooldownScope::Standard)
        .await
        .expect("lookup");
    assert!(expired.is_none());
    assert_eq!(store.entries().len(), 1);
}

fn cooldown(subject: PrincipalId, command: &str, started_at: OffsetDateTime) -> Cooldown {
    Cooldown {
        subject,
        command: command.to_owned(),
        started_at,
        duration: Duration::from_secs(30),
        scope: CooldownScope::Standard,
        compounding: None,
    }
}

#[tokio::test]
async fn starting_a_cooldown_evicts_expired_entries() {
    let start = datetime!(2024-05-01 12:00 UTC);
    let store = InMemoryCooldownStore::with_clock(start);
    let subject = PrincipalId::new(4);
    store
        .start(cooldown(subject, "heal", start))
        .await
        .expect("start heal");
    store
        .start(cooldown(subject, "boost", start))
        .await
        .expect("start boost");

    store.advance(Duration::from_secs(31));
    store
        .start(cooldown(subject, "save", start + time::Duration::seconds(31)))
        .await
        .expect("start save");

    let commands: Vec<String> = store
        .entries()
        .into_iter()
        .map(|entry| entry.command)
        .collect();
    assert_eq!(commands, ["save"]);
}

#[tokio::test]
async fn players_resolve_by_id_exact_name_then_prefix() {
    let resolver = StaticTargetResolver::new()
        .with_player(PrincipalId::new(5), "Alice")
        .with_player(PrincipalId::new(6), "Alicia")
        .with_player(PrincipalId::new(7), "Bob");

    let by_id = resolver.find_player("7").await.expect("lookup");
    assert_eq!(by_id.map(|player| player.name), Some(String::from("Bob")));

    let exact = resolver.find_player("alicia").await.expect("lookup");
    assert_eq!(exact.map(|player| player.id), Some(PrincipalId::new(6)));

    let prefix = resolver.find_player("bo").await.expect("lookup");
    assert_eq!(prefix.map(|player| player.id), Some(PrincipalId::new(7)));

    assert!(resolver.find_player("zed").await.expect("lookup").is_none());
}

#[tokio::test]
async fn aims_are_per_viewer_and_kind() {
    let viewer = Caller::player(PrincipalId::new(5), "Alice");
    let resolver = StaticTargetResolver::new().with_aim(
        viewer.id(),
        WorldTarget {
            kind: String::from("Vehicle"),
            id: 99,
            label: String::from("Humvee"),
        },
    );

    let seen = resolver.look_at(&viewer, "vehicle").await.expect("lookup");
    assert_eq!(seen.map(|target| target.id), Some(99));
    assert!(
        resolver
            .look_at(&viewer, "structure")
            .await
            .expect("lookup")
            .is_none()
    );
}

#[test]
fn recording_sink_keeps_delivery_order() {
    let sink = RecordingReplySink::new();
    let caller = Caller::console();
    sink.send(&caller, "first");
    sink.send(&caller, "second");
    assert_eq!(sink.texts(), vec!["first", "second"]);
    sink.clear();
    assert!(sink.replies().is_empty());
}
