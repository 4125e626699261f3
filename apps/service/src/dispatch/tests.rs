use std::sync::Arc;
use std::time::Duration;

use hostwatch_proto::{ObjectKind, Request};
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

use super::*;
use crate::database::models::{Folder, Host, HostState, PhoneNumber, PingerConfig, SmsConfig, User};
use crate::database::testing::create_test_database;
use crate::database::{DatabaseImpl, StoreError};
use crate::events::Event;
use crate::monitoring::testing::{RecordingNotifier, ScriptedProber};
use crate::server::sessions::SessionInfo;

struct Fixture {
    dispatcher: Dispatcher,
    database: Arc<DatabaseImpl>,
    events: Arc<EventLog>,
    pinger: Arc<Pinger>,
    sessions: Arc<SessionRegistry>,
    shutdown: Arc<Notify>,
    _dir: tempfile::TempDir,
}

async fn fixture() -> Fixture {
    fixture_with_events(EventLog::in_memory()).await
}

async fn fixture_with_events(events: EventLog) -> Fixture {
    let (database, dir) = create_test_database().await.unwrap();
    let events = Arc::new(events);
    let pinger = Pinger::new(
        database.clone(),
        events.clone(),
        Arc::new(ScriptedProber::new(true)),
        Arc::new(RecordingNotifier::default()),
        PingerConfig::default(),
    );
    let sessions = Arc::new(SessionRegistry::new());
    let shutdown = Arc::new(Notify::new());
    let dispatcher = Dispatcher::new(
        database.clone(),
        events.clone(),
        pinger.clone(),
        sessions.clone(),
        shutdown.clone(),
    );
    Fixture { dispatcher, database, events, pinger, sessions, shutdown, _dir: dir }
}

fn admin() -> Caller {
    Caller { login: "admin".into(), access: Access::Admin, peer: "127.0.0.1:5000".parse().unwrap() }
}

fn guest() -> Caller {
    Caller {
        login: "viewer".into(),
        access: Access::Guest,
        peer: "127.0.0.1:5001".parse().unwrap(),
    }
}

impl Fixture {
    async fn send(&self, request: Request, caller: &Caller) -> (u16, Value) {
        self.send_raw(&serde_json::to_vec(&request).unwrap(), caller).await
    }

    async fn send_raw(&self, raw: &[u8], caller: &Caller) -> (u16, Value) {
        let response = self.dispatcher.handle(raw, caller).await;
        (response.response.as_u16(), response.data)
    }

    async fn seed_hosts(&self) {
        self.database.insert_folder(&Folder { id: 1, name: "core".into() }).await.unwrap();
        self.database.insert_folder(&Folder { id: 2, name: "edge".into() }).await.unwrap();
        for (ip, folder, state) in [
            ("10.0.0.1", 1, HostState::Online),
            ("10.0.0.2", 1, HostState::Offline),
            ("10.0.0.3", 2, HostState::ClockOffline),
            ("10.0.0.4", 2, HostState::Pause),
            ("10.0.0.5", 2, HostState::ClockOnline),
        ] {
            self.database
                .insert_host(&Host::new(ip, format!("host {ip}"), folder).with_state(state))
                .await
                .unwrap();
        }
    }
}

fn ips(data: &Value) -> Vec<&str> {
    data.as_array().unwrap().iter().map(|host| host["ip"].as_str().unwrap()).collect()
}

#[tokio::test]
async fn test_get_all_hosts_mirrors_storage() {
    let f = fixture().await;

    let (code, data) = f.send(Request::get(ObjectKind::Host, "all"), &guest()).await;
    assert_eq!((code, data), (200, json!([])));

    f.seed_hosts().await;
    let (code, data) = f.send(Request::get(ObjectKind::Host, "all"), &guest()).await;
    assert_eq!(code, 200);
    assert_eq!(data, serde_json::to_value(f.database.list_hosts().await.unwrap()).unwrap());
}

#[tokio::test]
async fn test_get_host_groups() {
    let f = fixture().await;
    f.seed_hosts().await;

    let (_, dead) = f.send(Request::get(ObjectKind::Host, "dead"), &guest()).await;
    assert_eq!(ips(&dead), ["10.0.0.2", "10.0.0.3"]);
    let (_, live) = f.send(Request::get(ObjectKind::Host, "live"), &guest()).await;
    assert_eq!(ips(&live), ["10.0.0.1", "10.0.0.5"]);
    let (_, paused) = f.send(Request::get(ObjectKind::Host, "pause"), &guest()).await;
    assert_eq!(ips(&paused), ["10.0.0.4"]);

    let (code, host) =
        f.send(Request::get(ObjectKind::Host, json!({"ip": "10.0.0.3"})), &guest()).await;
    assert_eq!(code, 200);
    assert_eq!(host["state"], "clock.offline");

    let missing = f.send(Request::get(ObjectKind::Host, json!({"ip": "10.9.9.9"})), &guest()).await;
    assert_eq!(missing, (300, json!("not exists")));
}

#[tokio::test]
async fn test_get_folder_contents() {
    let f = fixture().await;
    f.seed_hosts().await;

    let (code, folders) = f.send(Request::get(ObjectKind::Folder, "all"), &guest()).await;
    assert_eq!(code, 200);
    assert_eq!(folders, json!([{"id": 1, "name": "core"}, {"id": 2, "name": "edge"}]));

    let (_, hosts) =
        f.send(Request::get(ObjectKind::Folder, json!({"folder_id": 1})), &guest()).await;
    assert_eq!(ips(&hosts), ["10.0.0.1", "10.0.0.2"]);

    let missing = f.send(Request::get(ObjectKind::Folder, json!({"folder_id": 9})), &guest()).await;
    assert_eq!(missing, (300, json!("not exists")));
}

#[tokio::test]
async fn test_get_users_hides_passwords() {
    let f = fixture().await;
    let user = User {
        login: "ops".into(),
        password: "secret".into(),
        access: Access::Guest,
        last_online: None,
    };
    f.database.insert_user(&user).await.unwrap();

    let (code, users) = f.send(Request::get(ObjectKind::User, "registered"), &guest()).await;
    assert_eq!(code, 200);
    assert_eq!(users, json!([{"login": "ops", "access": "guest", "last_online": null}]));
}

#[tokio::test]
async fn test_get_online_sessions() {
    let f = fixture().await;
    let (tx, _rx) = mpsc::channel(1);
    let info = SessionInfo {
        id: Uuid::new_v4(),
        peer_address: "10.1.1.1:40000".parse().unwrap(),
        access: Access::Admin,
        login: "admin".into(),
        connected_at: 100,
    };
    f.sessions.register(info, tx, Arc::new(Notify::new())).await;

    let (code, online) = f.send(Request::get(ObjectKind::User, "online"), &guest()).await;
    assert_eq!(code, 200);
    assert_eq!(
        online,
        json!([{
            "peer_address": "10.1.1.1:40000",
            "access": "admin",
            "login": "admin",
            "connected_at": 100
        }])
    );
}

#[tokio::test]
async fn test_get_pinger_phone_and_sms_roster() {
    let f = fixture().await;
    f.database
        .insert_phone(&PhoneNumber { number: "+100".into(), info: "on call".into() })
        .await
        .unwrap();
    f.database.insert_host(&Host::new("10.0.0.1", "plain", 1)).await.unwrap();
    let sms = SmsConfig { offline: true, offline_url: "http://sms".into(), ..Default::default() };
    f.database.insert_host(&Host::new("10.0.0.2", "watched", 1).with_sms(sms)).await.unwrap();

    let (code, pinger) = f.send(Request::get(ObjectKind::Pinger, Value::Null), &guest()).await;
    assert_eq!(code, 200);
    assert_eq!(pinger["hosts_per_second"], 10);

    let (_, phones) = f.send(Request::get(ObjectKind::Phone, Value::Null), &guest()).await;
    assert_eq!(phones, json!([{"number": "+100", "info": "on call"}]));

    let (code, roster) = f.send(Request::get(ObjectKind::SmsApi, Value::Null), &guest()).await;
    assert_eq!(code, 200);
    assert_eq!(roster["phones"][0]["number"], "+100");
    assert_eq!(ips(&roster["hosts"]), ["10.0.0.2"]);
}

#[tokio::test]
async fn test_get_log_file() {
    let f = fixture().await;
    let missing = f.send(Request::get(ObjectKind::LogFile, Value::Null), &guest()).await;
    assert_eq!(missing, (300, json!("not exists")));

    let dir = tempfile::tempdir().unwrap();
    let events = EventLog::open(Some(dir.path().join("events.txt"))).await.unwrap();
    let f = fixture_with_events(events).await;
    for i in 0..3 {
        f.events.alarm(format!("alarm {i}")).await;
    }

    let (code, lines) = f.send(Request::get(ObjectKind::LogFile, 2), &guest()).await;
    assert_eq!(code, 200);
    let lines = lines.as_array().unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].as_str().unwrap().ends_with("alarm 2"));

    let (_, all) = f.send(Request::get(ObjectKind::LogFile, Value::Null), &guest()).await;
    assert_eq!(all.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_guest_mutations_are_refused_and_audited() {
    let f = fixture().await;
    let mut rx = f.events.subscribe();

    let requests = [
        Request::post(ObjectKind::Host, json!({"ip": "10.0.0.1", "name": "gw", "folder_id": 1})),
        Request::put(ObjectKind::Host, json!({"ip": "10.0.0.1", "new": {"name": "x"}})),
        Request::delete(ObjectKind::Folder, 1),
        Request::service(40, 5),
        Request::service(30, Value::Null),
        // The item is never looked at.
        Request::post(ObjectKind::Folder, "garbage"),
    ];

    for request in requests {
        assert_eq!(f.send(request, &guest()).await, (600, json!("no permissions")));
        assert!(matches!(rx.recv().await.unwrap(), Event::User { login, .. } if login == "viewer"));
    }

    assert!(f.database.list_hosts().await.unwrap().is_empty());
    assert_eq!(f.pinger.config().await, PingerConfig::default());
}

#[tokio::test]
async fn test_malformed_requests() {
    let f = fixture().await;

    assert_eq!(f.send_raw(b"not json", &admin()).await, (400, json!("bad request")));
    assert_eq!(
        f.send_raw(br#"{"request":"PATCH","object":"HOST","item":"all"}"#, &admin()).await.0,
        400,
    );
    assert_eq!(
        f.send_raw(br#"{"request":"GET","object":"ROUTER","item":"all"}"#, &admin()).await.0,
        400,
    );
    assert_eq!(f.send(Request::get(ObjectKind::Host, "everything"), &admin()).await.0, 400);
    assert_eq!(
        f.send(Request::post(ObjectKind::Host, json!({"ip": "10.0.0.1"})), &admin()).await.0,
        400,
    );
    assert_eq!(f.send(Request::post(ObjectKind::Pinger, json!({})), &admin()).await.0, 400);
    assert_eq!(f.send(Request::delete(ObjectKind::Folder, "one"), &admin()).await.0, 400);
}

#[tokio::test]
async fn test_post_entities() {
    let f = fixture().await;
    let mut rx = f.events.subscribe();

    let host = json!({"ip": "10.0.0.1", "name": "gw", "folder_id": 1, "info": "rack 4"});
    assert_eq!(
        f.send(Request::post(ObjectKind::Host, host.clone()), &admin()).await,
        (200, json!("DB.success")),
    );
    assert!(matches!(rx.recv().await.unwrap(), Event::User { .. }));
    assert_eq!(
        f.send(Request::post(ObjectKind::Host, host), &admin()).await,
        (700, json!("DB.host exists")),
    );

    let stored = f.database.get_host("10.0.0.1").await.unwrap().unwrap();
    assert_eq!(stored.state, HostState::Offline);
    assert_eq!(stored.info, "rack 4");
    assert!(stored.sms_config.is_none());

    for name in ["core", "edge"] {
        assert_eq!(
            f.send(Request::post(ObjectKind::Folder, json!({"name": name})), &admin()).await.0,
            200,
        );
    }
    let ids: Vec<i64> =
        f.database.list_folders().await.unwrap().iter().map(|folder| folder.id).collect();
    assert_eq!(ids, [1, 2]);

    let user = json!({"login": "ops", "passw": "pw", "access": "admin"});
    assert_eq!(f.send(Request::post(ObjectKind::User, user.clone()), &admin()).await.0, 200);
    assert_eq!(
        f.send(Request::post(ObjectKind::User, user), &admin()).await,
        (700, json!("DB.user exists")),
    );

    let phone = json!({"number": "+100"});
    assert_eq!(f.send(Request::post(ObjectKind::Phone, phone.clone()), &admin()).await.0, 200);
    assert_eq!(
        f.send(Request::post(ObjectKind::Phone, phone), &admin()).await,
        (700, json!("DB.phone exists")),
    );
}

#[tokio::test]
async fn test_put_host_applies_every_field() {
    let f = fixture().await;
    f.seed_hosts().await;

    let edit = json!({
        "ip": "10.0.0.1",
        "new": {
            "name": "router",
            "folder_id": 2,
            "state": "pause",
            "info": "moved",
            "sms": {"online": true, "online_url": "u"},
            "ip": "10.0.0.10"
        }
    });
    assert_eq!(
        f.send(Request::put(ObjectKind::Host, edit), &admin()).await,
        (200, json!("success")),
    );

    assert!(f.database.get_host("10.0.0.1").await.unwrap().is_none());
    let host = f.database.get_host("10.0.0.10").await.unwrap().unwrap();
    assert_eq!(host.name, "router");
    assert_eq!(host.folder_id, 2);
    assert_eq!(host.state, HostState::Pause);
    assert_eq!(host.info, "moved");
    assert!(host.sms_config.unwrap().online);

    let clear = json!({"ip": "10.0.0.10", "new": {"sms": ""}});
    assert_eq!(f.send(Request::put(ObjectKind::Host, clear), &admin()).await.0, 200);
    assert!(f.database.get_host("10.0.0.10").await.unwrap().unwrap().sms_config.is_none());
}

#[tokio::test]
async fn test_put_host_validates_before_writing() {
    let f = fixture().await;
    f.seed_hosts().await;

    let taken = json!({"ip": "10.0.0.1", "new": {"name": "renamed", "ip": "10.0.0.2"}});
    assert_eq!(
        f.send(Request::put(ObjectKind::Host, taken), &admin()).await,
        (700, json!("new ip already exists")),
    );
    assert_eq!(f.database.get_host("10.0.0.1").await.unwrap().unwrap().name, "host 10.0.0.1");

    let missing = json!({"ip": "10.9.9.9", "new": {"name": "ghost"}});
    assert_eq!(
        f.send(Request::put(ObjectKind::Host, missing), &admin()).await,
        (300, json!("ip not exists")),
    );

    let bad_state = json!({"ip": "10.0.0.1", "new": {"name": "renamed", "state": "asleep"}});
    assert_eq!(f.send(Request::put(ObjectKind::Host, bad_state), &admin()).await.0, 400);
    assert_eq!(f.database.get_host("10.0.0.1").await.unwrap().unwrap().name, "host 10.0.0.1");
}

#[tokio::test]
async fn test_put_folder() {
    let f = fixture().await;
    f.seed_hosts().await;
    f.database.insert_folder(&Folder { id: 3, name: "spare".into() }).await.unwrap();

    let taken = json!({"folder_id": 1, "new": {"folder_id": 2}});
    assert_eq!(
        f.send(Request::put(ObjectKind::Folder, taken), &admin()).await,
        (700, json!("id folder already exists")),
    );

    let missing = json!({"folder_id": 9, "new": {"name": "x"}});
    assert_eq!(
        f.send(Request::put(ObjectKind::Folder, missing), &admin()).await,
        (300, json!("folder not exists")),
    );

    let bad_target = json!({"folder_id": 1, "new": {"move_hosts_to": 9}});
    assert_eq!(f.send(Request::put(ObjectKind::Folder, bad_target), &admin()).await.0, 300);

    let nothing = json!({"folder_id": 1, "new": {}});
    assert_eq!(
        f.send(Request::put(ObjectKind::Folder, nothing), &admin()).await,
        (200, json!("no changes")),
    );

    let renumber = json!({"folder_id": 1, "new": {"name": "backbone", "folder_id": 10}});
    assert_eq!(f.send(Request::put(ObjectKind::Folder, renumber), &admin()).await.0, 200);
    assert_eq!(f.database.get_folder(10).await.unwrap().unwrap().name, "backbone");
    assert_eq!(f.database.get_host("10.0.0.1").await.unwrap().unwrap().folder_id, 10);

    let empty_out = json!({"folder_id": 2, "new": {"move_hosts_to": 3}});
    assert_eq!(f.send(Request::put(ObjectKind::Folder, empty_out), &admin()).await.0, 200);
    assert_eq!(f.database.count_hosts_in_folder(2).await.unwrap(), 0);
    assert_eq!(f.database.count_hosts_in_folder(3).await.unwrap(), 3);
}

#[tokio::test]
async fn test_put_user_and_phone() {
    let f = fixture().await;
    let user = User {
        login: "ops".into(),
        password: "pw".into(),
        access: Access::Guest,
        last_online: None,
    };
    f.database.insert_user(&user).await.unwrap();
    f.database
        .insert_phone(&PhoneNumber { number: "+100".into(), info: String::new() })
        .await
        .unwrap();

    let promote = json!({"login": "ops", "new": {"access": "admin"}});
    assert_eq!(
        f.send(Request::put(ObjectKind::User, promote), &admin()).await,
        (200, json!("success")),
    );
    assert_eq!(f.database.list_users().await.unwrap()[0].access, Access::Admin);

    let ghost = json!({"login": "ghost", "new": {"password": "x"}});
    assert_eq!(
        f.send(Request::put(ObjectKind::User, ghost), &admin()).await,
        (300, json!("user not exists")),
    );

    let info = json!({"number": "+100", "new": {"info": "night shift"}});
    assert_eq!(f.send(Request::put(ObjectKind::Phone, info), &admin()).await.0, 200);
    assert_eq!(f.database.list_phones().await.unwrap()[0].info, "night shift");

    let ghost = json!({"number": "+999", "new": {"info": "x"}});
    assert_eq!(
        f.send(Request::put(ObjectKind::Phone, ghost), &admin()).await,
        (300, json!("phone not exists")),
    );
}

#[tokio::test]
async fn test_delete() {
    let f = fixture().await;
    f.seed_hosts().await;
    f.database.insert_folder(&Folder { id: 3, name: "spare".into() }).await.unwrap();

    assert_eq!(
        f.send(Request::delete(ObjectKind::Folder, 42), &admin()).await,
        (300, json!("folder not exists")),
    );
    assert_eq!(
        f.send(Request::delete(ObjectKind::Folder, 1), &admin()).await,
        (700, json!("folder not empty")),
    );
    assert_eq!(
        f.send(Request::delete(ObjectKind::Folder, "3"), &admin()).await,
        (200, json!("DB.delete.success")),
    );

    assert_eq!(f.send(Request::delete(ObjectKind::Host, "10.0.0.1"), &admin()).await.0, 200);
    assert_eq!(
        f.send(Request::delete(ObjectKind::Host, "10.0.0.1"), &admin()).await,
        (300, json!("ip not exists")),
    );
    assert_eq!(
        f.send(Request::delete(ObjectKind::User, "ghost"), &admin()).await,
        (300, json!("user not exists")),
    );
    assert_eq!(
        f.send(Request::delete(ObjectKind::Phone, "+1"), &admin()).await,
        (300, json!("phone not exists")),
    );
    assert!(matches!(f.database.delete_host("10.0.0.1").await, Err(StoreError::NotFound)));
}

#[tokio::test]
async fn test_uptime_is_open_to_guests() {
    let f = fixture().await;
    let (code, data) = f.send(Request::service(82, Value::Null), &guest()).await;
    assert_eq!(code, 200);
    assert_eq!(data, json!("0:00:00"));
}

#[test]
fn test_format_uptime() {
    assert_eq!(format_uptime(Duration::from_secs(0)), "0:00:00");
    assert_eq!(format_uptime(Duration::from_secs(3_725)), "1:02:05");
    assert_eq!(format_uptime(Duration::from_secs(86_400 + 61)), "1 day, 0:01:01");
    assert_eq!(format_uptime(Duration::from_secs(3 * 86_400 + 23 * 3_600)), "3 days, 23:00:00");
}

#[tokio::test]
async fn test_tuning_persists_then_applies() {
    let f = fixture().await;

    assert_eq!(f.send(Request::service(40, "25"), &admin()).await, (200, json!("")));
    assert_eq!(f.send(Request::service(80, 0.5), &admin()).await.0, 200);
    assert_eq!(f.send(Request::service(70, 60), &admin()).await.0, 200);

    let live = f.pinger.config().await;
    assert_eq!(live.hosts_per_second, 25);
    assert_eq!(live.icmp_timeout_s, 0.5);
    assert_eq!(live.auto_ping_interval_s, 60);
    assert_eq!(f.database.pinger_config().await.unwrap(), live);

    assert_eq!(f.send(Request::service(50, "abc"), &admin()).await.0, 400);
    assert_eq!(f.send(Request::service(50, 2.5), &admin()).await.0, 400);
    assert_eq!(f.send(Request::service(60, Value::Null), &admin()).await.0, 400);
    assert_eq!(f.pinger.config().await, live);
}

#[tokio::test]
async fn test_tuning_from_two_sessions_keeps_both_values() {
    let f = fixture().await;
    let other = Caller {
        login: "root".into(),
        access: Access::Admin,
        peer: "127.0.0.1:5002".parse().unwrap(),
    };

    let first_caller = admin();
    let (first, second) = tokio::join!(
        f.send(Request::service(50, 9), &first_caller),
        f.send(Request::service(40, 3), &other),
    );
    assert_eq!((first.0, second.0), (200, 200));

    let live = f.pinger.config().await;
    assert_eq!((live.icmp_count, live.hosts_per_second), (9, 3));
    assert_eq!(f.database.pinger_config().await.unwrap(), live);
}

#[tokio::test]
async fn test_unknown_service_and_missing_item() {
    let f = fixture().await;
    let mut rx = f.events.subscribe();

    assert_eq!(
        f.send(Request::service(999, Value::Null), &admin()).await,
        (400, json!("bad request")),
    );
    assert!(matches!(
        rx.recv().await.unwrap(),
        Event::User { message, .. } if message.contains("bad request")
    ));

    assert_eq!(f.send(Request::service(20, Value::Null), &guest()).await.0, 400);
}

#[tokio::test]
async fn test_force_disconnect() {
    let f = fixture().await;
    let (tx, _rx) = mpsc::channel(1);
    let evict = Arc::new(Notify::new());
    let info = SessionInfo {
        id: Uuid::new_v4(),
        peer_address: "10.1.1.1:40000".parse().unwrap(),
        access: Access::Guest,
        login: "ops".into(),
        connected_at: 1,
    };
    f.sessions.register(info, tx, evict.clone()).await;

    assert_eq!(
        f.send(Request::service(81, json!(["10.1.1.1", 40000])), &admin()).await,
        (200, json!("")),
    );
    tokio::time::timeout(Duration::from_secs(1), evict.notified()).await.unwrap();

    assert_eq!(f.send(Request::service(81, "10.1.1.1:40001"), &admin()).await.0, 300);
    assert_eq!(f.send(Request::service(81, "nowhere"), &admin()).await.0, 400);
}

#[tokio::test]
async fn test_shutdown_command() {
    let f = fixture().await;
    assert_eq!(f.send(Request::service(30, Value::Null), &admin()).await.0, 200);
    tokio::time::timeout(Duration::from_secs(1), f.shutdown.notified()).await.unwrap();
}

#[tokio::test]
async fn test_ping_one_runs_in_background() {
    let f = fixture().await;
    f.database.insert_host(&Host::new("10.0.0.1", "gw", 1)).await.unwrap();
    let mut rx = f.events.subscribe();

    assert_eq!(f.send(Request::service(20, "10.0.0.1"), &guest()).await, (200, json!("")));

    // Audit entry, then the probe result from the spawned task.
    assert!(matches!(rx.recv().await.unwrap(), Event::User { .. }));
    assert_eq!(
        rx.recv().await.unwrap(),
        Event::Icmp { ip: "10.0.0.1".into(), name: "gw".into(), state: true },
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(f.database.get_host("10.0.0.1").await.unwrap().unwrap().state, HostState::Online);
}
