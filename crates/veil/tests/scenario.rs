//! End-to-end scenarios on a simulated host.

use proptest::prelude::*;

use veil::core::{Command, Identity, UserAddr};
use veil::{Errno, OperationPoint, VeilConfig};
use veil_testkit::generators::{absolute_path, directory};
use veil_testkit::{init_tracing, verify_all_vectors, SimTree, TestFixture, USER};

const ENOENT: Errno = Errno(-2);

#[test]
fn hidden_file_vanishes_for_ordinary_callers() {
    init_tracing();
    let fx = TestFixture::new();

    assert_eq!(fx.enable(), 0);
    assert_eq!(fx.hide("/usr/bin/su"), 0);

    assert_eq!(fx.host.open(USER, "/usr/bin/su").err(), Some(ENOENT));
    assert_eq!(fx.host.stat(USER, "/usr/bin/su"), Err(ENOENT));
    assert_eq!(fx.host.access(USER, "/usr/bin/su"), Err(ENOENT));
    assert_eq!(
        fx.host.list(USER, "/usr/bin").unwrap(),
        vec!["bash", "sudo", "zsh"]
    );

    // Siblings and the parent are untouched.
    assert!(fx.host.open(USER, "/usr/bin/sudo").is_ok());
    assert_eq!(fx.host.stat(USER, "/usr/bin"), Ok(()));
    assert_eq!(fx.host.list(USER, "/usr").unwrap(), vec!["bin"]);
}

#[test]
fn exempt_identity_sees_everything() {
    let fx = TestFixture::new();
    fx.enable();
    fx.hide("/usr/bin/su");

    assert_eq!(fx.host.stat(Identity::ROOT, "/usr/bin/su"), Err(ENOENT));
    assert_eq!(fx.exempt(Identity::ROOT), 0);

    assert!(fx.host.open(Identity::ROOT, "/usr/bin/su").is_ok());
    assert_eq!(fx.host.stat(Identity::ROOT, "/usr/bin/su"), Ok(()));
    assert_eq!(
        fx.host.list(Identity::ROOT, "/usr/bin").unwrap(),
        vec!["bash", "su", "sudo", "zsh"]
    );
    assert_eq!(fx.veil.hooks().filter().wrapped_count(), 0);

    // Other callers are still filtered.
    assert_eq!(fx.host.stat(USER, "/usr/bin/su"), Err(ENOENT));

    assert_eq!(fx.unexempt(Identity::ROOT), 0);
    assert_eq!(fx.host.stat(Identity::ROOT, "/usr/bin/su"), Err(ENOENT));
}

#[test]
fn wrapped_handle_lifecycle() {
    let fx = TestFixture::new();
    fx.enable();
    fx.hide("/usr/bin/su");
    let filter = fx.veil.hooks().filter().clone();

    let dir = fx.host.open(USER, "/usr/bin").unwrap();
    assert!(filter.is_wrapped(dir.id()));
    assert_eq!(filter.wrapped_count(), 1);

    // Reading twice restarts cleanly and filters both times.
    assert_eq!(fx.host.read_dir(&dir).unwrap(), vec!["bash", "sudo", "zsh"]);
    assert_eq!(fx.host.read_dir(&dir).unwrap(), vec!["bash", "sudo", "zsh"]);

    // A directory with nothing hidden beneath it is not wrapped.
    let etc = fx.host.open(USER, "/etc").unwrap();
    assert!(!filter.is_wrapped(etc.id()));

    fx.host.close(&dir).unwrap();
    fx.host.close(&etc).unwrap();
    assert!(!filter.is_wrapped(dir.id()));
    assert_eq!(filter.wrapped_count(), 0);
}

#[test]
fn handle_opened_before_unhide_keeps_filtering() {
    let fx = TestFixture::new();
    fx.enable();
    fx.hide("/usr/bin/su");

    let dir = fx.host.open(USER, "/usr/bin").unwrap();
    fx.unhide("/usr/bin/su");

    // The filter consults the live table on every read.
    assert_eq!(
        fx.host.read_dir(&dir).unwrap(),
        vec!["bash", "su", "sudo", "zsh"]
    );
    fx.host.close(&dir).unwrap();

    let dir = fx.host.open(USER, "/usr/bin").unwrap();
    assert!(!fx.veil.hooks().filter().is_wrapped(dir.id()));
    fx.host.close(&dir).unwrap();
}

#[test]
fn disable_restores_visibility_without_forgetting() {
    let fx = TestFixture::new();
    fx.enable();
    fx.hide("/usr/bin/su");

    assert_eq!(fx.disable(), 0);
    assert_eq!(fx.host.stat(USER, "/usr/bin/su"), Ok(()));
    assert_eq!(fx.host.list(USER, "/usr/bin").unwrap().len(), 4);

    assert_eq!(fx.enable(), 0);
    assert_eq!(fx.host.stat(USER, "/usr/bin/su"), Err(ENOENT));
}

#[test]
fn exact_match_not_substring() {
    let fx = TestFixture::new();
    fx.enable();
    fx.hide("/usr/bin/su");

    // "sudo" starts with "su" but is a different entry.
    assert_eq!(fx.host.stat(USER, "/usr/bin/sudo"), Ok(()));

    // Hiding a directory hides the directory itself, not its contents.
    fx.hide("/data/secret");
    assert_eq!(fx.host.stat(USER, "/data/secret"), Err(ENOENT));
    assert_eq!(fx.host.stat(USER, "/data/secret/key"), Ok(()));
    assert_eq!(fx.host.list(USER, "/data").unwrap(), vec!["notes"]);
}

#[test]
fn builtin_status_path_is_hidden_and_survives_flush() {
    let fx = TestFixture::new();
    assert_eq!(fx.veil.status_path(), Some("/proc/veil"));

    fx.enable();
    assert_eq!(fx.host.stat(USER, "/proc/veil"), Err(ENOENT));
    assert_eq!(fx.host.list(USER, "/proc").unwrap(), vec!["version"]);

    fx.hide("/etc/passwd");
    fx.exempt(USER);
    assert_eq!(fx.send(Command::Flush), 0);

    let status = fx.veil.status();
    assert!(status.hidden_paths.is_empty());
    assert!(status.identities.is_empty());
    assert_eq!(status.builtin_hidden, vec!["/proc/veil"]);

    assert_eq!(fx.host.stat(USER, "/etc/passwd"), Ok(()));
    assert_eq!(fx.host.stat(USER, "/proc/veil"), Err(ENOENT));
}

#[test]
fn control_results_reach_the_caller() {
    let fx = TestFixture::new();

    assert_eq!(fx.hide("/usr/bin/su"), 0);
    assert_eq!(fx.hide("/usr/bin/su"), -114);
    assert_eq!(fx.unhide("/usr/bin/zsh"), -2);
    assert_eq!(fx.hide("relative/path"), -22);
    assert_eq!(
        fx.send(Command::HiddenAdd {
            path: UserAddr::NULL
        }),
        -14
    );
    assert_eq!(fx.exempt(USER), 0);
    assert_eq!(fx.exempt(USER), -114);
    assert_eq!(fx.unexempt(Identity(4242)), -2);

    // Unrelated option values are left for the host.
    assert_eq!(fx.host.control(0x1234, UserAddr(0x1000)), -22);
}

#[test]
fn tokens_gate_the_control_channel() {
    let fx = TestFixture::new();
    let other = *b"7c9e6679-7425-40de-944b-e07fc1f90ae7";

    // Open until a token is registered.
    assert_eq!(fx.host.send(other, Command::Enable), 0);
    assert_eq!(fx.lock(), 0);

    assert_eq!(fx.host.send(other, Command::Disable), -13);
    assert!(fx.veil.enablement().is_enabled());
    assert_eq!(fx.host.send(*b"not-a-token-at-all-not-a-token-at-al", Command::Disable), -13);

    assert_eq!(fx.send(Command::TokenAdd(other)), 0);
    assert_eq!(fx.host.send(other, Command::Disable), 0);
    assert!(!fx.veil.enablement().is_enabled());

    assert_eq!(fx.host.send(other, Command::TokenRemove(fx.token)), 0);
    assert_eq!(fx.enable(), -13);
    assert_eq!(fx.veil.status().tokens, 1);
}

#[test]
fn config_controls_startup_state() {
    let config = VeilConfig::from_json(
        r#"{ "enabled": true, "builtin_hidden": ["/etc/passwd"] }"#,
    )
    .unwrap();
    let fx = TestFixture::with_config(config);

    assert_eq!(fx.host.stat(USER, "/etc/passwd"), Err(ENOENT));
    assert_eq!(fx.host.stat(USER, "/proc/veil"), Ok(()));
    assert_eq!(fx.veil.status_path(), Some("/etc/passwd"));
}

#[test]
fn table_limits_surface_as_out_of_memory() {
    let mut config = VeilConfig::default();
    config.limits.max_hidden_paths = 2;
    let fx = TestFixture::with_config(config);

    assert_eq!(fx.hide("/a"), 0);
    assert_eq!(fx.hide("/b"), 0);
    assert_eq!(fx.hide("/c"), -12);
    assert_eq!(fx.unhide("/a"), 0);
    assert_eq!(fx.hide("/c"), 0);
}

#[test]
fn unload_removes_every_hook() {
    let fx = TestFixture::new();
    fx.enable();
    fx.hide("/usr/bin/su");
    let dir = fx.host.open(USER, "/usr/bin").unwrap();

    let TestFixture { host, veil, .. } = fx;
    assert_eq!(host.backend.registered().len(), OperationPoint::ALL.len());
    veil.unload().unwrap();
    assert!(host.backend.registered().is_empty());

    assert_eq!(host.stat(USER, "/usr/bin/su"), Ok(()));
    assert_eq!(host.send(*b"0f8fad5b-d9cb-469f-a165-70867728950e", Command::Enable), -22);

    // A handle wrapped before unload still releases through its original ops.
    host.close(&dir).unwrap();
}

#[test]
fn concurrent_readers_and_writers() {
    let fx = TestFixture::new();
    fx.enable();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..200 {
                    let names = fx.host.list(USER, "/usr/bin").unwrap();
                    assert!(names.iter().any(|n| n == "bash"));
                    let _ = fx.host.stat(USER, "/usr/bin/su");
                }
            });
        }
        s.spawn(|| {
            for _ in 0..100 {
                fx.hide("/usr/bin/su");
                fx.unhide("/usr/bin/su");
            }
        });
    });

    assert_eq!(fx.veil.hooks().filter().wrapped_count(), 0);
    assert_eq!(fx.host.stat(USER, "/usr/bin/su"), Ok(()));
}

#[test]
fn wire_vectors_decode_and_encode() {
    if let Err(failures) = verify_all_vectors() {
        panic!("golden vectors failed:\n{}", failures.join("\n"));
    }
}

fn tree_for(dir: &str, names: &[String]) -> SimTree {
    names
        .iter()
        .fold(SimTree::new().dir(dir), |tree, name| {
            tree.file(&format!("{}/{}", dir, name))
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn hide_then_unhide_round_trips(path in absolute_path(4)) {
        prop_assume!(path != "/proc/veil");
        let fx = TestFixture::new();

        prop_assert_eq!(fx.hide(&path), 0);
        prop_assert!(fx.veil.tables().check_exact(&path));
        prop_assert_eq!(fx.unhide(&path), 0);
        prop_assert!(!fx.veil.tables().check_exact(&path));
    }

    #[test]
    fn listing_omits_exactly_the_hidden_children(
        (dir, names) in directory(8),
        mask in prop::collection::vec(any::<bool>(), 8),
    ) {
        prop_assume!(!dir.starts_with("/proc"));
        let fx = TestFixture::with_tree(tree_for(&dir, &names), VeilConfig::default());
        fx.enable();

        let mut expected = Vec::new();
        for (name, hide) in names.iter().zip(mask.iter().cycle()) {
            if *hide {
                prop_assert_eq!(fx.hide(&format!("{}/{}", dir, name)), 0);
            } else {
                expected.push(name.clone());
            }
        }

        prop_assert_eq!(fx.host.list(USER, &dir).unwrap(), expected);
        prop_assert_eq!(fx.veil.hooks().filter().wrapped_count(), 0);
    }
}
