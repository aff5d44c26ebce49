//! End-to-end plugin lifecycle tests against the echo guest.

use std::collections::BTreeMap;

use wasmbind::{BindingError, Manifest, ModuleSource, Plugin, PluginContext};
use wasmbind_test::{echo_module, echo_wat, sha256_hex, temp_dir, write_file};

fn echo_plugin() -> Plugin {
    Plugin::new(echo_module(), &[], false).expect("instantiate echo module")
}

#[test]
fn echo_returns_input() {
    let mut plugin = echo_plugin();
    assert_eq!(plugin.call("echo", b"hello").unwrap(), b"hello");
    assert_eq!(plugin.call_str("echo", "second call").unwrap(), "second call");
}

#[test]
fn empty_output_is_empty_vec() {
    let mut plugin = echo_plugin();
    assert!(plugin.call("nothing", b"ignored").unwrap().is_empty());
    assert!(plugin.call("echo", b"").unwrap().is_empty());
}

#[test]
fn count_vowels() {
    let mut plugin = echo_plugin();
    let output = plugin.call("count_vowels", "Hello World").unwrap();
    let count = u64::from_le_bytes(output.try_into().expect("8-byte output"));
    assert_eq!(count, 3);
}

#[test]
fn function_exists_matches_exports() {
    let mut plugin = echo_plugin();
    for name in ["echo", "nothing", "count_vowels", "get_config", "fail", "spin"] {
        assert!(plugin.function_exists(name), "missing export {name}");
    }
    assert!(!plugin.function_exists("does_not_exist"));

    plugin.dispose();
    assert!(!plugin.function_exists("echo"));
}

#[test]
fn disposed_plugin_refuses_every_call() {
    let mut plugin = echo_plugin();
    plugin.dispose();
    assert!(plugin.is_disposed());
    for name in ["echo", "count_vowels", "does_not_exist"] {
        assert!(matches!(plugin.call(name, b"x"), Err(BindingError::PluginFreed)));
    }
    assert!(matches!(
        plugin.set_config([("k", "v")]),
        Err(BindingError::PluginFreed)
    ));
}

#[test]
fn double_dispose_is_noop() {
    let mut plugin = echo_plugin();
    plugin.dispose();
    plugin.dispose();
    assert!(plugin.is_disposed());
}

#[test]
fn set_config_is_visible_to_guest() {
    let mut plugin = echo_plugin();
    assert!(plugin.call("get_config", "greeting").unwrap().is_empty());

    plugin.set_config([("greeting", "hello")]).unwrap();
    assert_eq!(plugin.call_str("get_config", "greeting").unwrap(), "hello");
    assert_eq!(plugin.config()["greeting"], "hello");

    plugin
        .set_config(BTreeMap::from([("other".to_string(), "x".to_string())]))
        .unwrap();
    assert!(plugin.call("get_config", "greeting").unwrap().is_empty());
    assert_eq!(plugin.call_str("get_config", "other").unwrap(), "x");
}

#[test]
fn manifest_config_reaches_guest() {
    let manifest = Manifest::from(echo_module()).with_config_key("mode", "fast");
    let mut plugin = Plugin::from_manifest(manifest, &[], false).unwrap();
    assert_eq!(plugin.call_str("get_config", "mode").unwrap(), "fast");
}

#[test]
fn set_config_replaces_manifest_config() {
    let manifest = Manifest::from(echo_module()).with_config_key("a", "1");
    let mut plugin = Plugin::from_manifest(manifest, &[], false).unwrap();
    plugin.set_config([("b", "2")]).unwrap();

    assert!(plugin.call("get_config", "a").unwrap().is_empty());
    assert_eq!(plugin.call_str("get_config", "b").unwrap(), "2");
    assert!(!plugin.config().contains_key("a"));
}

#[test]
fn hash_mismatch_fails_construction() {
    let manifest = Manifest::new([ModuleSource::data(echo_module())
        .with_name("main")
        .with_hash(sha256_hex(b"something else"))]);
    let err = Plugin::from_manifest(manifest, &[], false).unwrap_err();
    assert!(matches!(err, BindingError::IntegrityMismatch { .. }), "got {err}");
}

#[test]
fn matching_hash_loads() {
    let module = echo_module();
    let manifest = Manifest::new([ModuleSource::data(module.clone()).with_hash(sha256_hex(&module))]);
    let mut plugin = Plugin::from_manifest(manifest, &[], false).unwrap();
    assert_eq!(plugin.call("echo", b"ok").unwrap(), b"ok");
}

#[test]
fn invalid_module_fails_construction() {
    let err = Plugin::new(b"not wasm".to_vec(), &[], false).unwrap_err();
    assert!(matches!(err, BindingError::Instantiate(_)), "got {err}");

    let err = Plugin::from_manifest(Manifest::default(), &[], false).unwrap_err();
    assert!(matches!(err, BindingError::EmptyManifest));
}

#[test]
fn guest_error_is_reported_with_code() {
    let mut plugin = echo_plugin();
    match plugin.call("fail", "boom").unwrap_err() {
        BindingError::CallFailed { message, code } => {
            assert_ne!(code, 0);
            assert!(message.contains("boom"), "message: {message}");
        },
        other => panic!("unexpected error: {other}"),
    }

    match plugin.call("fail_silently", b"").unwrap_err() {
        BindingError::CallFailed { message, code } => {
            assert_eq!(code, 7);
            assert_eq!(message, "<unset by plugin>");
        },
        other => panic!("unexpected error: {other}"),
    }

    // The instance stays usable after a failed call.
    assert_eq!(plugin.call("echo", b"still here").unwrap(), b"still here");
}

#[test]
fn missing_export_is_a_call_error() {
    let mut plugin = echo_plugin();
    assert!(matches!(
        plugin.call("does_not_exist", b""),
        Err(BindingError::CallFailed { .. })
    ));
}

#[test]
fn wasi_plugin_loads() {
    let mut plugin = Plugin::new(echo_module(), &[], true).unwrap();
    assert_eq!(plugin.call("echo", b"wasi").unwrap(), b"wasi");
}

#[test]
fn manifest_file_with_relative_module() {
    let dir = temp_dir();
    let module = echo_module();
    write_file(dir.path(), "echo.wasm", &module);
    let manifest_path = write_file(
        dir.path(),
        "plugin.toml",
        format!(
            "[[wasm]]\npath = \"echo.wasm\"\nhash = \"{}\"\n\n[config]\nmode = \"file\"\n",
            sha256_hex(&module)
        ),
    );

    let manifest = Manifest::load(&manifest_path).unwrap();
    let mut plugin = Plugin::from_manifest(manifest, &[], false).unwrap();
    assert_eq!(plugin.call_str("get_config", "mode").unwrap(), "file");
}

#[test]
fn wat_module_from_disk() {
    let dir = temp_dir();
    let path = write_file(dir.path(), "echo.wat", echo_wat());
    let manifest = Manifest::new([ModuleSource::from_path(&path).unwrap()]);
    let mut plugin = Plugin::from_manifest(manifest, &[], false).unwrap();
    assert_eq!(plugin.call("echo", b"text").unwrap(), b"text");
}

#[test]
fn json_manifest_round_trip_instantiates() {
    let manifest = Manifest::from(echo_module()).with_config_key("k", "v");
    let json = String::from_utf8(manifest.to_json().unwrap()).unwrap();
    let parsed = Manifest::from_json_str(&json).unwrap();
    assert_eq!(parsed, manifest);

    let mut plugin = Plugin::from_manifest(parsed, &[], false).unwrap();
    assert_eq!(plugin.call_str("get_config", "k").unwrap(), "v");
}

#[test]
fn plugin_ids_are_unique() {
    let a = echo_plugin();
    let b = echo_plugin();
    assert_ne!(a.id(), b.id());
}

#[test]
fn context_owns_plugins() {
    let mut ctx = PluginContext::new();
    let first = ctx.new_plugin(Manifest::from(echo_module()), &[], false).unwrap();
    let second = ctx
        .new_plugin(Manifest::from(echo_module()).with_config_key("n", "2"), &[], false)
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(ctx.len(), 2);

    assert_eq!(ctx.call(first, "echo", b"one").unwrap(), b"one");
    assert_eq!(ctx.call(second, "get_config", b"n").unwrap(), b"2");
    assert!(ctx.get(first).is_some_and(|p| p.function_exists("echo")));

    ctx.get_mut(first).unwrap().set_config([("n", "1")]).unwrap();
    assert_eq!(ctx.call(first, "get_config", b"n").unwrap(), b"1");

    assert!(ctx.remove(first));
    assert!(matches!(ctx.call(first, "echo", b""), Err(BindingError::PluginFreed)));
    assert_eq!(ctx.len(), 1);

    ctx.reset();
    assert!(ctx.is_empty());
    let third = ctx.new_plugin(Manifest::from(echo_module()), &[], false).unwrap();
    assert_ne!(third, second);
    assert_eq!(ctx.call(third, "echo", b"again").unwrap(), b"again");
}
