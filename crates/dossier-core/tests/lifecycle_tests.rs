mod common;

use common::{FakeEnv, FAKE_PROVIDER};
use dossier_core::{DbMeta, DossierError, ExitOutcome, Password, Preferences};
use jiff::civil::date;

fn root_password() -> Password {
    Password::new("root")
}

#[test]
fn test_archive_creates_next_database_and_rewrites_grants() {
    let env = FakeEnv::new(|dir| {
        let root = dir.join("server");
        Preferences::default().with_archive_command(format!(
            "mkdir -p {0}/%N && cp {0}/%B/* {0}/%N/",
            root.display()
        ))
    });
    let meta = env.define_acme(&["acme_1", "acme_2"]);
    env.server
        .add_grant("bob", "GRANT ALL PRIVILEGES ON `acme_2`.* TO 'bob'@'localhost'");

    let mut cnx = env.context.connect_for(&meta).unwrap();
    cnx.open_with_meta("bob", &Password::new("bob"), &meta, meta.current_period())
        .unwrap();
    let period = cnx
        .archive_and_new(
            "root",
            &root_password(),
            Some(date(2025, 1, 1)),
            Some(date(2025, 12, 31)),
        )
        .unwrap();

    assert_eq!(period.storage, "acme_3");
    assert!(period.current);
    assert_eq!(
        std::fs::read_to_string(env.server.database_dir("acme_3").join("data")).unwrap(),
        "acme_2"
    );

    // the new period is persisted and is the only current one
    let reloaded = DbMeta::load_from_settings(env.context.settings().clone(), "acme").unwrap();
    let current = reloaded.current_period().unwrap();
    assert_eq!(current.storage, "acme_3");
    assert_eq!(current.begin, Some(date(2025, 1, 1)));
    assert_eq!(current.end, Some(date(2025, 12, 31)));
    assert!(!reloaded.period("acme_2").unwrap().current);
    assert_eq!(reloaded.periods().len(), 3);

    assert!(env
        .server
        .grants("bob")
        .contains(&"GRANT ALL PRIVILEGES ON `acme_3`.* TO 'bob'@'localhost'".to_string()));
    // grants are issued by the privileged account
    assert!(env
        .server
        .executed()
        .iter()
        .any(|e| e.account == "root" && e.sql.contains("`acme_3`.*")));
}

#[test]
fn test_archive_retries_once_after_failure() {
    let env = FakeEnv::new(|dir| {
        let marker = dir.join("attempted");
        let root = dir.join("server");
        Preferences::default().with_archive_command(format!(
            "if [ -f {marker} ]; then mkdir -p {root}/%N && cp {root}/%B/* {root}/%N/; \
             else touch {marker}; exit 1; fi",
            marker = marker.display(),
            root = root.display()
        ))
    });
    let meta = env.define_acme(&["acme_1", "acme_2"]);

    let mut cnx = env.context.connect_for(&meta).unwrap();
    cnx.open_with_meta("bob", &Password::new("bob"), &meta, meta.current_period())
        .unwrap();
    let period = cnx
        .archive_and_new("root", &root_password(), None, None)
        .unwrap();

    assert_eq!(period.storage, "acme_3");
    assert!(env.path("attempted").exists());
    assert_eq!(
        std::fs::read_to_string(env.server.database_dir("acme_3").join("data")).unwrap(),
        "acme_2"
    );
    let reloaded = DbMeta::load_from_settings(env.context.settings().clone(), "acme").unwrap();
    assert_eq!(reloaded.current_period().unwrap().storage, "acme_3");
}

#[test]
fn test_archive_failure_keeps_settings() {
    let env = FakeEnv::new(|dir| {
        Preferences::default()
            .with_archive_command(format!("echo x >> {}; exit 1", dir.join("attempts").display()))
    });
    let meta = env.define_acme(&["acme_1"]);

    let mut cnx = env.context.connect_for(&meta).unwrap();
    cnx.open_with_meta("bob", &Password::new("bob"), &meta, meta.current_period())
        .unwrap();
    let err = cnx
        .archive_and_new("root", &root_password(), None, None)
        .unwrap_err();

    assert!(matches!(
        err,
        DossierError::Process {
            outcome: ExitOutcome::Exited(1),
            ..
        }
    ));
    let attempts = std::fs::read_to_string(env.path("attempts")).unwrap();
    assert_eq!(attempts.lines().count(), 2);

    let reloaded = DbMeta::load_from_settings(env.context.settings().clone(), "acme").unwrap();
    assert_eq!(reloaded.periods().len(), 1);
    assert_eq!(reloaded.current_period().unwrap().storage, "acme_1");
    assert!(reloaded.period("acme_2").is_none());
}

#[test]
fn test_restore_retries_once_after_failure() {
    let env = FakeEnv::new(|dir| {
        let marker = dir.join("attempted");
        let root = dir.join("server");
        Preferences::default().with_restore_command(format!(
            "if [ -f {marker} ]; then cp %F {root}/%B/data; else touch {marker}; exit 1; fi",
            marker = marker.display(),
            root = root.display()
        ))
    });
    let meta = env.define_acme(&["acme_1"]);
    let dump = env.path("acme.dump");
    std::fs::write(&dump, "restored").unwrap();

    let mut root = env.context.connect_for(&meta).unwrap();
    root.open_with_meta("root", &root_password(), &meta, None)
        .unwrap();
    root.restore(None, &format!("file://{}", dump.display()), "bob", &Password::new("bob"))
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(env.server.database_dir("acme_1").join("data")).unwrap(),
        "restored"
    );
    // the administrator is granted on the restored database
    let statements = env.server.statements();
    assert!(statements
        .iter()
        .any(|s| s.starts_with("GRANT ALL ON `acme_1`.* TO 'bob'")));
    assert!(statements
        .iter()
        .any(|s| s == "UPDATE T_ROLES SET ROL_IS_ADMIN=1 WHERE ROL_USER='bob'"));
}

#[test]
fn test_restore_gives_up_after_second_failure() {
    let env = FakeEnv::new(|dir| {
        Preferences::default()
            .with_restore_command(format!("echo x >> {}; exit 3", dir.join("attempts").display()))
    });
    let meta = env.define_acme(&["acme_1"]);

    let mut root = env.context.connect_for(&meta).unwrap();
    root.open_with_meta("root", &root_password(), &meta, None)
        .unwrap();
    let err = root
        .restore(None, "/tmp/missing.dump", "bob", &Password::new("bob"))
        .unwrap_err();

    assert!(matches!(
        err,
        DossierError::Process {
            outcome: ExitOutcome::Exited(3),
            ..
        }
    ));
    let attempts = std::fs::read_to_string(env.path("attempts")).unwrap();
    assert_eq!(attempts.lines().count(), 2);
    // no grant after a failed restore
    assert!(!env
        .server
        .statements()
        .iter()
        .any(|s| s.starts_with("GRANT ")));
}

#[test]
fn test_restore_creates_missing_database_first() {
    let env = FakeEnv::new(|_| Preferences::default().with_restore_command("true"));
    let meta = env.define_acme(&["acme_1"]);
    std::fs::remove_dir_all(env.server.database_dir("acme_1")).unwrap();

    let mut root = env.context.connect_for(&meta).unwrap();
    root.open_with_meta("root", &root_password(), &meta, None)
        .unwrap();
    root.restore(None, "/tmp/acme.dump", "bob", &Password::new("bob"))
        .unwrap();

    assert!(env
        .server
        .statements()
        .contains(&"CREATE DATABASE IF NOT EXISTS `acme_1`".to_string()));
    assert!(env.server.database_dir("acme_1").is_dir());
}

#[test]
fn test_backup_releases_lock_on_success_and_failure() {
    for (template, succeeds) in [("cp %F.src %F", false), ("true", true)] {
        let env = FakeEnv::new(|_| Preferences::default().with_backup_command(template));
        let meta = env.define_acme(&["acme_1"]);

        let mut cnx = env.context.connect_for(&meta).unwrap();
        cnx.open_with_meta("bob", &Password::new("bob"), &meta, meta.current_period())
            .unwrap();
        let result = cnx.backup(&env.path("acme.gz").to_string_lossy());
        assert_eq!(result.is_ok(), succeeds, "template {template}");

        let statements = env.server.statements();
        let lock = statements
            .iter()
            .position(|s| s == "FLUSH TABLES WITH READ LOCK")
            .unwrap();
        let unlock = statements.iter().position(|s| s == "UNLOCK TABLES").unwrap();
        assert!(lock < unlock);
        // locks are not audited
        assert!(env.server.audited("acme_1").is_empty());
    }
}

#[test]
fn test_backup_writes_file() {
    let env = FakeEnv::new(|dir| {
        Preferences::default()
            .with_backup_command(format!("cp {}/%B/data %F", dir.join("server").display()))
    });
    let meta = env.define_acme(&["acme_1"]);

    let mut cnx = env.context.connect_for(&meta).unwrap();
    cnx.open_with_meta("bob", &Password::new("bob"), &meta, meta.current_period())
        .unwrap();
    let file = env.path("acme backup.gz");
    cnx.backup(&file.to_string_lossy()).unwrap();

    assert_eq!(std::fs::read_to_string(&file).unwrap(), "acme_1");
}

#[test]
fn test_lifecycle_needs_open_connection() {
    let env = FakeEnv::new(|_| Preferences::default());
    let meta = env.define_acme(&["acme_1"]);
    assert_eq!(meta.provider_name(), FAKE_PROVIDER);

    let mut cnx = env.context.connect_for(&meta).unwrap();
    assert!(matches!(
        cnx.backup("/tmp/acme.gz"),
        Err(DossierError::NotConnected)
    ));
}
