//! Integration tests for the overlay lifecycle: login, permission checks,
//! chat formatting and administrative edits, backed by in-memory SurrealDB.

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use usf_core::error::{UsfError, UsfResult};
use usf_core::models::color::Rgb;
use usf_core::models::group::Group;
use usf_core::models::identity::{Identity, SessionId};
use usf_core::models::record::{OverrideRecord, UpsertOverride};
use usf_core::permission::PermissionSet;
use usf_core::repository::{OverrideRepository, PaginatedResult, Pagination};
use usf_db::repository::SurrealOverrideRepository;
use usf_overlay::host::{ChatBroadcaster, ChatEvent, Hook, MessageEnvelope, PermissionCheck};
use usf_overlay::{BroadcastError, ChatOutcome, HookTable, Overlay, OverlayConfig, SkipReason};

const S1: SessionId = SessionId(1);
const S2: SessionId = SessionId(2);

/// Helper: spin up in-memory DB and run migrations.
async fn setup_with(config: OverlayConfig) -> Overlay<SurrealOverrideRepository<Db>> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    usf_db::run_migrations(&db).await.unwrap();
    Overlay::new(SurrealOverrideRepository::new(db), config)
}

async fn setup() -> Overlay<SurrealOverrideRepository<Db>> {
    setup_with(OverlayConfig::default()).await
}

fn member() -> Group {
    let mut group = Group::new("member");
    group.prefix = "[Member] ".into();
    group.suffix = " ~".into();
    group.chat_color = Rgb::new(200, 200, 200);
    group.permissions = HashSet::from(["tshock.canchat".to_string(), "tshock.warp".to_string()]);
    group
}

fn chat(session: Option<SessionId>, text: &str) -> ChatEvent {
    ChatEvent {
        session,
        player_name: "Steve".into(),
        raw_text: text.into(),
        muted: false,
    }
}

#[derive(Debug, Default)]
struct Envelope {
    prefixes: Vec<String>,
    suffixes: Vec<String>,
    color: Option<Rgb>,
}

impl Envelope {
    fn for_group(group: &Group) -> Self {
        Self {
            prefixes: vec![group.prefix.clone()],
            ..Default::default()
        }
    }
}

impl MessageEnvelope for Envelope {
    fn clear_prefixes(&mut self) {
        self.prefixes.clear();
    }

    fn prefix(&mut self, prefix: &str) {
        self.prefixes.push(prefix.to_string());
    }

    fn suffix(&mut self, suffix: &str) {
        self.suffixes.push(suffix.to_string());
    }

    fn colorize(&mut self, color: Rgb) {
        self.color = Some(color);
    }
}

#[derive(Default)]
struct Screen {
    names: RefCell<Vec<String>>,
    lines: RefCell<Vec<(String, Rgb)>>,
}

impl ChatBroadcaster for Screen {
    fn broadcast_name(&self, _session: SessionId, name: &str) -> Result<(), BroadcastError> {
        self.names.borrow_mut().push(name.to_string());
        Ok(())
    }

    fn broadcast_chat(&self, _session: SessionId, text: &str, color: Rgb) -> Result<(), BroadcastError> {
        self.lines.borrow_mut().push((text.to_string(), color));
        Ok(())
    }
}

/// Store whose every call fails.
struct BrokenRepo;

impl OverrideRepository for BrokenRepo {
    async fn get(&self, _identity: Identity) -> UsfResult<Option<OverrideRecord>> {
        Err(UsfError::Database("connection refused".into()))
    }

    async fn upsert(&self, _input: UpsertOverride) -> UsfResult<OverrideRecord> {
        Err(UsfError::Database("connection refused".into()))
    }

    async fn delete(&self, _identity: Identity) -> UsfResult<()> {
        Err(UsfError::Database("connection refused".into()))
    }

    async fn list(&self, _pagination: Pagination) -> UsfResult<PaginatedResult<OverrideRecord>> {
        Err(UsfError::Database("connection refused".into()))
    }
}

/// Store that answers `get` after `delay` with a prefixed record.
struct SlowRepo {
    delay: Duration,
}

impl OverrideRepository for SlowRepo {
    async fn get(&self, identity: Identity) -> UsfResult<Option<OverrideRecord>> {
        tokio::time::sleep(self.delay).await;
        let now = chrono::Utc::now();
        Ok(Some(OverrideRecord {
            identity,
            prefix: Some("[Slow] ".into()),
            suffix: None,
            color: None,
            permissions: PermissionSet::new(),
            created_at: now,
            updated_at: now,
        }))
    }

    async fn upsert(&self, _input: UpsertOverride) -> UsfResult<OverrideRecord> {
        Err(UsfError::Internal("read-only".into()))
    }

    async fn delete(&self, _identity: Identity) -> UsfResult<()> {
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> UsfResult<PaginatedResult<OverrideRecord>> {
        Ok(PaginatedResult {
            items: Vec::new(),
            total: 0,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

// -----------------------------------------------------------------------
// Login and logout
// -----------------------------------------------------------------------

#[tokio::test]
async fn login_without_record_uses_group_defaults() {
    let overlay = setup().await;
    let group = member();

    let binding = overlay.on_login(S1, Identity(7)).await.unwrap();
    assert!(binding.record().is_none());

    let fields = overlay.resolver().resolve_chat_fields(Some(S1), &group);
    assert_eq!(fields.prefix, "[Member] ");
    assert_eq!(fields.suffix, " ~");
    assert_eq!(fields.color, Rgb::new(200, 200, 200));
    assert!(!fields.clear_prefix_chain);
}

#[tokio::test]
async fn login_loads_record_stored_by_admin() {
    let overlay = setup().await;
    let admin = overlay.admin();
    admin.set_prefix(Identity(7), Some("[VIP] ".into())).await.unwrap();
    admin.set_color(Identity(7), Some("255, 215, 0")).await.unwrap();

    overlay.on_login(S1, Identity(7)).await.unwrap();

    let fields = overlay.resolver().resolve_chat_fields(Some(S1), &member());
    assert_eq!(fields.prefix, "[VIP] ");
    assert_eq!(fields.suffix, " ~");
    assert_eq!(fields.color, Rgb::new(255, 215, 0));
}

#[tokio::test]
async fn store_failure_binds_without_customization() {
    let overlay = Overlay::new(BrokenRepo, OverlayConfig::default());

    let binding = overlay.on_login(S1, Identity(7)).await.unwrap();
    assert!(binding.record().is_none());
    assert_eq!(overlay.cache().len(), 1);
}

#[tokio::test]
async fn slow_lookup_times_out_to_group_defaults() {
    let config = OverlayConfig {
        lookup_timeout_ms: 20,
        ..Default::default()
    };
    let overlay = Overlay::new(
        SlowRepo {
            delay: Duration::from_secs(5),
        },
        config,
    );

    let binding = overlay.on_login(S1, Identity(7)).await.unwrap();
    assert!(binding.record().is_none());
    let fields = overlay.resolver().resolve_chat_fields(Some(S1), &member());
    assert_eq!(fields.prefix, "[Member] ");
}

#[tokio::test]
async fn logout_during_lookup_leaves_slot_empty() {
    let overlay = Overlay::new(
        SlowRepo {
            delay: Duration::from_millis(100),
        },
        OverlayConfig::default(),
    );

    let (login, ()) = tokio::join!(overlay.on_login(S1, Identity(7)), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        overlay.on_logout(S1);
    });

    assert!(login.is_none());
    assert!(overlay.cache().get(S1).is_none());
}

#[tokio::test]
async fn slot_reuse_never_sees_previous_occupant() {
    let overlay = setup().await;
    let admin = overlay.admin();
    admin.set_prefix(Identity(1), Some("[Old] ".into())).await.unwrap();
    admin.deny(Identity(1), "tshock.warp").await.unwrap();

    overlay.on_login(S1, Identity(1)).await.unwrap();
    overlay.on_logout(S1);
    assert!(overlay.cache().is_empty());

    overlay.on_login(S1, Identity(2)).await.unwrap();
    let group = member();
    let fields = overlay.resolver().resolve_chat_fields(Some(S1), &group);
    assert_eq!(fields.prefix, "[Member] ");
    assert!(overlay.resolver().has_permission(Some(S1), &group, "tshock.warp"));
}

#[tokio::test]
async fn sessions_resolve_independently() {
    let overlay = setup().await;
    overlay
        .admin()
        .set_prefix(Identity(1), Some("[VIP] ".into()))
        .await
        .unwrap();

    overlay.on_login(S1, Identity(1)).await.unwrap();
    overlay.on_login(S2, Identity(2)).await.unwrap();

    let group = member();
    assert_eq!(overlay.resolver().resolve_chat_fields(Some(S1), &group).prefix, "[VIP] ");
    assert_eq!(overlay.resolver().resolve_chat_fields(Some(S2), &group).prefix, "[Member] ");
}

// -----------------------------------------------------------------------
// Permission checks
// -----------------------------------------------------------------------

#[tokio::test]
async fn permission_check_marks_explicit_answers_handled() {
    let overlay = setup().await;
    let admin = overlay.admin();
    admin.grant(Identity(7), "tshock.ban").await.unwrap();
    admin.deny(Identity(7), "tshock.warp").await.unwrap();
    overlay.on_login(S1, Identity(7)).await.unwrap();
    let group = member();

    let mut check = PermissionCheck::new(Some(S1), "tshock.ban");
    assert!(overlay.on_permission_check(&mut check, &group));
    assert!(check.handled && check.granted);

    let mut check = PermissionCheck::new(Some(S1), "tshock.warp");
    assert!(!overlay.on_permission_check(&mut check, &group));
    assert!(check.handled && !check.granted);

    let mut check = PermissionCheck::new(Some(S1), "tshock.canchat");
    assert!(overlay.on_permission_check(&mut check, &group));
    assert!(!check.handled);
}

#[tokio::test]
async fn denial_beats_grant_for_same_name() {
    let overlay = setup().await;
    let admin = overlay.admin();
    admin.grant(Identity(7), "tshock.kick").await.unwrap();
    admin.deny(Identity(7), "tshock.kick").await.unwrap();
    overlay.on_login(S1, Identity(7)).await.unwrap();

    let mut group = member();
    group.permissions.insert("tshock.kick".into());
    assert!(!overlay.resolver().has_permission(Some(S1), &group, "tshock.kick"));
}

#[tokio::test]
async fn permission_check_without_session_defers_to_group() {
    let overlay = setup().await;
    let mut check = PermissionCheck::new(None, "tshock.warp");
    assert!(overlay.on_permission_check(&mut check, &member()));
    assert!(!check.handled);
}

// -----------------------------------------------------------------------
// Chat
// -----------------------------------------------------------------------

#[tokio::test]
async fn inline_chat_is_decorated_from_record() {
    let overlay = setup().await;
    let admin = overlay.admin();
    admin.set_prefix(Identity(7), Some("[VIP] ".into())).await.unwrap();
    admin.set_suffix(Identity(7), Some(String::new())).await.unwrap();
    overlay.on_login(S1, Identity(7)).await.unwrap();

    let group = member();
    let mut envelope = Envelope::for_group(&group);
    let screen = Screen::default();
    let outcome = overlay.on_chat(&chat(Some(S1), "hello"), &mut envelope, &group, &screen);

    assert_eq!(outcome, ChatOutcome::Inline);
    assert_eq!(envelope.prefixes, vec!["[VIP] "]);
    assert_eq!(envelope.suffixes, vec![""]);
    assert_eq!(envelope.color, Some(Rgb::new(200, 200, 200)));
    assert!(screen.names.borrow().is_empty());
}

#[tokio::test]
async fn empty_prefix_override_clears_group_prefix() {
    let overlay = setup().await;
    overlay
        .admin()
        .set_prefix(Identity(7), Some(String::new()))
        .await
        .unwrap();
    overlay.on_login(S1, Identity(7)).await.unwrap();

    let group = member();
    let mut envelope = Envelope::for_group(&group);
    overlay.on_chat(&chat(Some(S1), "hi"), &mut envelope, &group, &Screen::default());
    assert!(envelope.prefixes.is_empty());
}

#[tokio::test]
async fn chat_gating_follows_effective_permission() {
    let overlay = setup().await;
    let admin = overlay.admin();
    admin.deny(Identity(1), "tshock.canchat").await.unwrap();
    admin.grant(Identity(2), "tshock.canchat").await.unwrap();
    overlay.on_login(S1, Identity(1)).await.unwrap();
    overlay.on_login(S2, Identity(2)).await.unwrap();

    let screen = Screen::default();
    let group = member();
    let mut envelope = Envelope::default();
    assert_eq!(
        overlay.on_chat(&chat(Some(S1), "hi"), &mut envelope, &group, &screen),
        ChatOutcome::Skipped(SkipReason::CannotChat)
    );

    let mut silent = Group::new("silent");
    silent.chat_color = Rgb::WHITE;
    assert_eq!(
        overlay.on_chat(&chat(Some(S2), "hi"), &mut envelope, &silent, &screen),
        ChatOutcome::Inline
    );
}

#[tokio::test]
async fn commands_muted_and_sessionless_lines_are_left_alone() {
    let overlay = setup().await;
    overlay.on_login(S1, Identity(7)).await.unwrap();
    let group = member();
    let screen = Screen::default();
    let mut envelope = Envelope::for_group(&group);

    let outcome = overlay.on_chat(&chat(Some(S1), "/warp home"), &mut envelope, &group, &screen);
    assert_eq!(outcome, ChatOutcome::Skipped(SkipReason::Command));
    let outcome = overlay.on_chat(&chat(Some(S1), ".who"), &mut envelope, &group, &screen);
    assert_eq!(outcome, ChatOutcome::Skipped(SkipReason::Command));

    let mut muted = chat(Some(S1), "hello");
    muted.muted = true;
    let outcome = overlay.on_chat(&muted, &mut envelope, &group, &screen);
    assert_eq!(outcome, ChatOutcome::Skipped(SkipReason::Muted));

    let outcome = overlay.on_chat(&chat(None, "hello"), &mut envelope, &group, &screen);
    assert_eq!(outcome, ChatOutcome::Skipped(SkipReason::NoSession));

    assert_eq!(envelope.prefixes, vec!["[Member] "]);
    assert!(envelope.color.is_none());
}

#[tokio::test]
async fn above_heads_mode_swaps_and_restores_name() {
    let config = OverlayConfig {
        chat_above_heads: true,
        ..Default::default()
    };
    let overlay = setup_with(config).await;
    overlay
        .admin()
        .set_prefix(Identity(7), Some("[VIP] ".into()))
        .await
        .unwrap();
    overlay.on_login(S1, Identity(7)).await.unwrap();

    let group = member();
    let screen = Screen::default();
    let mut envelope = Envelope::for_group(&group);
    let outcome = overlay.on_chat(&chat(Some(S1), "hello"), &mut envelope, &group, &screen);

    assert_eq!(
        outcome,
        ChatOutcome::AboveHeads {
            chat_delivered: true,
            name_restored: true,
        }
    );
    assert_eq!(
        *screen.names.borrow(),
        vec!["member[VIP] Steve ~".to_string(), "Steve".to_string()]
    );
    assert_eq!(
        *screen.lines.borrow(),
        vec![("hello".to_string(), Rgb::new(200, 200, 200))]
    );
}

// -----------------------------------------------------------------------
// Administration
// -----------------------------------------------------------------------

#[tokio::test]
async fn admin_edits_reach_live_sessions() {
    let overlay = setup().await;
    overlay.on_login(S1, Identity(7)).await.unwrap();
    overlay.on_login(S2, Identity(8)).await.unwrap();
    let group = member();

    overlay
        .admin()
        .set_prefix(Identity(7), Some("[Mod] ".into()))
        .await
        .unwrap();
    assert_eq!(overlay.resolver().resolve_chat_fields(Some(S1), &group).prefix, "[Mod] ");
    assert_eq!(overlay.resolver().resolve_chat_fields(Some(S2), &group).prefix, "[Member] ");

    overlay.admin().remove(Identity(7)).await.unwrap();
    assert_eq!(overlay.resolver().resolve_chat_fields(Some(S1), &group).prefix, "[Member] ");
}

#[tokio::test]
async fn invalid_color_is_rejected_and_nothing_stored() {
    let overlay = setup().await;
    let admin = overlay.admin();

    let err = admin.set_color(Identity(7), Some("300,0,0")).await.unwrap_err();
    assert!(matches!(err, UsfError::Validation { .. }));
    assert!(admin.get(Identity(7)).await.unwrap().is_none());

    admin.set_color(Identity(8), Some("10,20,30")).await.unwrap();
    assert!(admin.set_color(Identity(8), Some("red")).await.is_err());
    let kept = admin.get(Identity(8)).await.unwrap().unwrap();
    assert_eq!(kept.color.as_deref(), Some("10,20,30"));

    let record = admin
        .set_color(Identity(7), Some(" 1 ,2, 3"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.color.as_deref(), Some("1,2,3"));
}

#[tokio::test]
async fn invalid_permission_names_are_rejected() {
    let overlay = setup().await;
    let admin = overlay.admin();
    assert!(admin.grant(Identity(7), "").await.is_err());
    assert!(admin.deny(Identity(7), "two words").await.is_err());
    assert!(admin.grant(Identity(7), "!tshock.ban").await.is_err());
    assert!(admin.get(Identity(7)).await.unwrap().is_none());
}

#[tokio::test]
async fn clearing_last_field_deletes_record() {
    let overlay = setup().await;
    let admin = overlay.admin();
    admin.set_suffix(Identity(7), Some("!".into())).await.unwrap();
    admin.grant(Identity(7), "tshock.ban").await.unwrap();

    let after = admin.revoke(Identity(7), "tshock.ban").await.unwrap();
    assert!(after.is_some());
    let after = admin.set_suffix(Identity(7), None).await.unwrap();
    assert!(after.is_none());
    assert!(admin.get(Identity(7)).await.unwrap().is_none());
}

#[tokio::test]
async fn list_pages_through_records() {
    let overlay = setup().await;
    let admin = overlay.admin();
    for id in 1..=3 {
        admin.set_prefix(Identity(id), Some(format!("[{id}] "))).await.unwrap();
    }

    let page = admin
        .list(Pagination {
            offset: 0,
            limit: 2,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn store_errors_surface_from_admin() {
    let overlay = Overlay::new(BrokenRepo, OverlayConfig::default());
    let err = overlay
        .admin()
        .set_prefix(Identity(7), Some("x".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, UsfError::Database(_)));
}

// -----------------------------------------------------------------------
// Registration
// -----------------------------------------------------------------------

#[tokio::test]
async fn register_subscribes_all_hooks_until_dropped() {
    let overlay = Arc::new(setup().await);
    let table = HookTable::new();

    let registration = overlay.register(&table);
    let hooks: Vec<Hook> = registration.hooks().collect();
    assert_eq!(
        hooks,
        vec![Hook::PostLogin, Hook::Logout, Hook::Permission, Hook::Chat]
    );
    for hook in hooks {
        assert_eq!(table.subscriber_count(hook), 1);
    }

    drop(registration);
    for hook in [Hook::PostLogin, Hook::Logout, Hook::Permission, Hook::Chat] {
        assert_eq!(table.subscriber_count(hook), 0);
    }
}

#[tokio::test]
async fn host_events_drive_the_overlay_through_its_hooks() {
    let overlay = Arc::new(setup().await);
    let admin = overlay.admin();
    admin.set_prefix(Identity(7), Some("[VIP] ".into())).await.unwrap();
    admin.deny(Identity(7), "tshock.warp").await.unwrap();

    let table = HookTable::new();
    let registration = overlay.register(&table);
    let group = member();

    table.fire_post_login(S1, Identity(7)).await;
    assert_eq!(overlay.cache().get(S1).unwrap().identity(), Identity(7));

    let mut check = PermissionCheck::new(Some(S1), "tshock.warp");
    assert!(!table.fire_permission(&mut check, &group));
    assert!(check.handled);

    let mut envelope = Envelope::for_group(&group);
    let outcomes = table.fire_chat(&chat(Some(S1), "hello"), &mut envelope, &group, &Screen::default());
    assert_eq!(outcomes, vec![ChatOutcome::Inline]);
    assert_eq!(envelope.prefixes, vec!["[VIP] "]);

    table.fire_logout(S1);
    assert!(overlay.cache().get(S1).is_none());

    drop(registration);
    table.fire_post_login(S2, Identity(7)).await;
    assert!(overlay.cache().get(S2).is_none());
}
