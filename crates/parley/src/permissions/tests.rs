//! Unit tests for permission leaves and combined checks.

use rstest::{fixture, rstest};

use super::*;
use crate::caller::PrincipalId;
use crate::memory::InMemoryPermissionStore;

fn leaf(raw: &str) -> PermissionLeaf {
    PermissionLeaf::new(raw).expect("valid leaf")
}

fn player() -> Caller {
    Caller::player(PrincipalId::new(11), "Rook")
}

#[rstest]
#[case("commands.clear", "commands.clear")]
#[case("  Commands.Clear.Inventory ", "commands.clear.inventory")]
#[case("commands.*", "commands.*")]
#[case("*", "*")]
#[case("commands.tp-here", "commands.tp-here")]
fn normalises_valid_leaves(#[case] raw: &str, #[case] expected: &str) {
    assert_eq!(leaf(raw).as_str(), expected);
}

#[rstest]
#[case("", PermissionLeafError::Empty)]
#[case("   ", PermissionLeafError::Empty)]
#[case("commands..clear", PermissionLeafError::EmptySegment { leaf: "commands..clear".into() })]
#[case(".commands", PermissionLeafError::EmptySegment { leaf: ".commands".into() })]
#[case("commands.*.clear", PermissionLeafError::MisplacedWildcard { leaf: "commands.*.clear".into() })]
#[case("commands.cl ear", PermissionLeafError::InvalidCharacter { leaf: "commands.cl ear".into(), character: ' ' })]
fn rejects_malformed_leaves(#[case] raw: &str, #[case] expected: PermissionLeafError) {
    assert_eq!(PermissionLeaf::new(raw), Err(expected));
}

#[rstest]
#[case("commands.clear", "commands.clear", true)]
#[case("commands.clear", "commands.clear.inventory", false)]
#[case("commands.*", "commands.clear", true)]
#[case("commands.*", "commands.clear.inventory", true)]
#[case("commands.*", "commands", false)]
#[case("commands.clear.*", "commands.heal", false)]
#[case("*", "anything.at.all", true)]
fn grants_cover_expected_leaves(#[case] grant: &str, #[case] requested: &str, #[case] covered: bool) {
    assert_eq!(leaf(grant).grants(&leaf(requested)), covered);
}

#[test]
fn child_appends_a_segment() {
    let parent = leaf("commands.native");
    assert_eq!(
        parent.child("Teleport").expect("valid child").as_str(),
        "commands.native.teleport"
    );
    assert!(leaf("commands.*").child("x").is_err());
}

#[fixture]
fn required() -> Vec<PermissionLeaf> {
    vec![leaf("commands.a"), leaf("commands.b"), leaf("commands.c")]
}

fn store_with(deferred: bool, granted: &[&str]) -> InMemoryPermissionStore {
    let store = if deferred {
        InMemoryPermissionStore::deferred()
    } else {
        InMemoryPermissionStore::new()
    };
    for grant in granted {
        store.grant(player().id(), leaf(grant));
    }
    store
}

#[rstest]
#[case::none_granted(&[], false, false)]
#[case::first_granted(&["commands.a"], true, false)]
#[case::last_granted(&["commands.c"], true, false)]
#[case::all_granted(&["commands.a", "commands.b", "commands.c"], true, true)]
#[case::wildcard(&["commands.*"], true, true)]
#[tokio::test]
async fn immediate_and_deferred_stores_agree(
    required: Vec<PermissionLeaf>,
    #[case] granted: &[&str],
    #[case] any_expected: bool,
    #[case] all_expected: bool,
) {
    for deferred in [false, true] {
        let store = store_with(deferred, granted);
        let any = check(&store, &player(), PermissionMode::Any, &required)
            .await
            .expect("store answers");
        let all = check(&store, &player(), PermissionMode::All, &required)
            .await
            .expect("store answers");
        assert_eq!(any, any_expected, "Any mismatch (deferred = {deferred})");
        assert_eq!(all, all_expected, "All mismatch (deferred = {deferred})");
    }
}

#[rstest]
#[tokio::test]
async fn any_stops_at_first_grant(required: Vec<PermissionLeaf>) {
    let store = store_with(true, &["commands.a"]);
    assert!(
        check(&store, &player(), PermissionMode::Any, &required)
            .await
            .expect("store answers")
    );
    assert_eq!(store.queries(), 1);
}

#[rstest]
#[tokio::test]
async fn all_stops_at_first_denial(required: Vec<PermissionLeaf>) {
    let store = store_with(false, &["commands.a"]);
    assert!(
        !check(&store, &player(), PermissionMode::All, &required)
            .await
            .expect("store answers")
    );
    assert_eq!(store.queries(), 2);
}

#[rstest]
#[tokio::test]
async fn superusers_skip_the_store(required: Vec<PermissionLeaf>) {
    let store = store_with(false, &[]);
    let admin = player().with_superuser(true);
    assert!(
        check(&store, &admin, PermissionMode::All, &required)
            .await
            .expect("superuser passes")
    );
    assert_eq!(store.queries(), 0);
}

#[tokio::test]
async fn empty_requirements_always_pass() {
    let store = store_with(false, &[]);
    assert!(
        check(&store, &player(), PermissionMode::Any, &[])
            .await
            .expect("nothing required")
    );
}
