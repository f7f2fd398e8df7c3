// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Integration tests for loading guests and servicing their imports

use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use vdbridge_core::{BridgeError, Document, DomMutation, Handle};
use vdbridge_runtime::{ErrorPolicy, ModuleLoader, RuntimeConfig, RuntimeError};

/// Guest that builds DOM trees through the bridge imports
const GUEST_WAT: &str = r#"
(module
  (import "env" "vdbridge_create_element" (func $create_element (param i32) (result i32)))
  (import "env" "vdbridge_create_text_node" (func $create_text (param i32) (result i32)))
  (import "env" "vdbridge_append_child" (func $append (param i32 i32)))
  (import "env" "vdbridge_remove_child" (func $remove (param i32 i32)))
  (import "env" "vdbridge_replace_child" (func $replace (param i32 i32 i32)))
  (import "env" "vdbridge_set_property" (func $set_property (param i32 i32 i32)))
  (import "env" "vdbridge_set_style" (func $set_style (param i32 i32 i32)))
  (import "env" "vdbridge_release_node" (func $release (param i32)))

  (memory (export "memory") 1)
  (data (i32.const 16) "div\00")
  (data (i32.const 32) "p\00")
  (data (i32.const 48) "Hello world\00")
  (data (i32.const 64) "id\00")
  (data (i32.const 80) "abc\00")
  (data (i32.const 96) "backgroundColor\00")
  (data (i32.const 128) "red\00")
  (data (i32.const 144) "onclick\00")

  (func (export "vdcore_hello_world") (result i32)
    (local $root i32) (local $p i32) (local $text i32)
    (local.set $root (call $create_element (i32.const 16)))
    (call $set_property (local.get $root) (i32.const 64) (i32.const 80))
    (local.set $p (call $create_element (i32.const 32)))
    (local.set $text (call $create_text (i32.const 48)))
    (call $append (local.get $p) (local.get $text))
    (call $append (local.get $root) (local.get $p))
    (call $release (local.get $text))
    (call $release (local.get $p))
    (local.get $root))

  (func (export "styled") (result i32)
    (local $div i32)
    (local.set $div (call $create_element (i32.const 16)))
    (call $set_style (local.get $div) (i32.const 96) (i32.const 128))
    (local.get $div))

  (func (export "swap_and_remove") (result i32)
    (local $parent i32) (local $a i32) (local $b i32)
    (local.set $parent (call $create_element (i32.const 16)))
    (local.set $a (call $create_text (i32.const 48)))
    (local.set $b (call $create_element (i32.const 32)))
    (call $append (local.get $parent) (local.get $a))
    (call $replace (local.get $parent) (local.get $b) (local.get $a))
    (call $remove (local.get $parent) (local.get $b))
    (call $append (local.get $parent) (local.get $a))
    (local.get $parent))

  (func (export "bad_append")
    (call $append (i32.const 1) (i32.const 99)))

  (func (export "bad_property") (result i32)
    (local $div i32)
    (local.set $div (call $create_element (i32.const 16)))
    (call $set_property (local.get $div) (i32.const 144) (i32.const 80))
    (local.get $div))

  (func (export "oob_tag") (result i32)
    (call $create_element (i32.const 0x7fffffff)))

  (func (export "double_release")
    (local $t i32)
    (local.set $t (call $create_text (i32.const 48)))
    (call $release (local.get $t))
    (call $release (local.get $t)))

  (func (export "spin")
    (loop $forever (br $forever)))

  (func (export "churn")
    (local $n i32)
    (local.set $n (i32.const 5000))
    (block $done
      (loop $next
        (br_if $done (i32.eqz (local.get $n)))
        (call $release (call $create_text (i32.const 48)))
        (local.set $n (i32.sub (local.get $n) (i32.const 1)))
        (br $next))))
)
"#;

/// Guest whose start function creates a node before the loader has
/// captured its memory
const START_WAT: &str = r#"
(module
  (import "env" "vdbridge_create_element" (func $create_element (param i32) (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 16) "div\00")
  (global $root (mut i32) (i32.const 0))
  (func $init
    (global.set $root (call $create_element (i32.const 16))))
  (start $init)
  (func (export "root") (result i32)
    (global.get $root))
)
"#;

/// Same start function, but the memory is never exported
const START_NO_MEMORY_WAT: &str = r#"
(module
  (import "env" "vdbridge_create_element" (func $create_element (param i32) (result i32)))
  (memory 1)
  (data (i32.const 16) "div\00")
  (func $init
    (drop (call $create_element (i32.const 16))))
  (start $init)
)
"#;

fn guest_bytes() -> Vec<u8> {
    wat::parse_str(GUEST_WAT).expect("guest WAT should parse")
}

fn loader() -> ModuleLoader {
    ModuleLoader::new(RuntimeConfig::default()).unwrap()
}

fn loader_with(policy: ErrorPolicy) -> ModuleLoader {
    ModuleLoader::new(RuntimeConfig {
        error_policy: policy,
        ..Default::default()
    })
    .unwrap()
}

/// Serve a single HTTP response on a local port
async fn serve_once(status: &'static str, body: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/wasm\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        socket.shutdown().await.ok();
    });

    addr
}

#[tokio::test]
async fn test_hello_world_builds_tree() {
    let mut module = loader()
        .load_from_bytes(&guest_bytes(), Document::new())
        .await
        .unwrap();

    let root = module.call_handle_export("vdcore_hello_world").await.unwrap();
    assert_eq!(root, Handle::from_raw(1));
    assert_eq!(
        module.render_html(root).unwrap(),
        r#"<div id="abc"><p>Hello world</p></div>"#
    );

    // The child handles were released, the root is still live.
    let table = module.bridge().table();
    assert_eq!(table.live_count(), 1);
    assert!(!table.is_live(Handle::from_raw(2)));
    assert!(!table.is_live(Handle::from_raw(3)));
    assert_eq!(module.metrics().handles_released, 2);
}

#[tokio::test]
async fn test_released_handles_are_recycled_fifo() {
    let mut module = loader()
        .load_from_bytes(&guest_bytes(), Document::new())
        .await
        .unwrap();

    module.call_handle_export("vdcore_hello_world").await.unwrap();
    // Text (3) was released before p (2), so 3 is reissued first.
    let styled = module.call_handle_export("styled").await.unwrap();
    assert_eq!(styled, Handle::from_raw(3));
    assert_eq!(
        module.render_html(styled).unwrap(),
        r#"<div style="background-color: red"></div>"#
    );
}

#[tokio::test]
async fn test_replace_and_remove_child() {
    let mut module = loader()
        .load_from_bytes(&guest_bytes(), Document::with_journal(true))
        .await
        .unwrap();

    let parent = module.call_handle_export("swap_and_remove").await.unwrap();
    assert_eq!(module.render_html(parent).unwrap(), "<div>Hello world</div>");

    let ops: Vec<_> = module
        .bridge()
        .dom()
        .journal()
        .iter()
        .filter(|m| matches!(m, DomMutation::ReplaceChild { .. } | DomMutation::RemoveChild { .. }))
        .cloned()
        .collect();
    assert_eq!(ops.len(), 2);
}

#[tokio::test]
async fn test_invalid_handle_traps_only_that_call() {
    let mut module = loader()
        .load_from_bytes(&guest_bytes(), Document::with_journal(true))
        .await
        .unwrap();
    let root = module.call_handle_export("vdcore_hello_world").await.unwrap();
    let journal_len = module.bridge().dom().journal().len();

    let err = module.call_void_export("bad_append").await.unwrap_err();
    assert!(matches!(err, RuntimeError::Bridge(BridgeError::InvalidHandle(99))));
    assert_eq!(module.bridge().dom().journal().len(), journal_len);

    // The instance keeps working after the trap.
    let styled = module.call_handle_export("styled").await.unwrap();
    assert!(module.render_html(styled).is_ok());
    assert!(module.render_html(root).is_ok());
}

#[tokio::test]
async fn test_double_release_traps() {
    let mut module = loader()
        .load_from_bytes(&guest_bytes(), Document::new())
        .await
        .unwrap();

    let err = module.call_void_export("double_release").await.unwrap_err();
    assert!(matches!(err, RuntimeError::Bridge(BridgeError::DoubleRelease(1))));
    assert_eq!(module.bridge().table().free_count(), 1);
}

#[tokio::test]
async fn test_report_policy_returns_null_handle() {
    let mut module = loader_with(ErrorPolicy::Report)
        .load_from_bytes(&guest_bytes(), Document::new())
        .await
        .unwrap();

    let handle = module.call_handle_export("oob_tag").await.unwrap();
    assert!(handle.is_null());
    assert_eq!(
        module.take_last_error(),
        Some(BridgeError::OutOfBoundsRead {
            ptr: 0x7fff_ffff,
            len: 65536
        })
    );

    let div = module.call_handle_export("bad_property").await.unwrap();
    assert_eq!(module.render_html(div).unwrap(), "<div></div>");
    assert_eq!(
        module.last_error(),
        Some(&BridgeError::UnknownProperty("onclick".to_string()))
    );
    assert_eq!(module.metrics().error_count, 2);
}

#[tokio::test]
async fn test_unknown_property_traps_under_default_policy() {
    let mut module = loader()
        .load_from_bytes(&guest_bytes(), Document::new())
        .await
        .unwrap();

    let err = module.call_handle_export("bad_property").await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Bridge(BridgeError::UnknownProperty(ref name)) if name == "onclick"
    ));
}

#[tokio::test]
async fn test_instances_have_independent_bridges() {
    let loader = loader();
    let mut first = loader.load_from_bytes(&guest_bytes(), Document::new()).await.unwrap();
    let mut second = loader.load_from_bytes(&guest_bytes(), Document::new()).await.unwrap();

    let a = first.call_handle_export("vdcore_hello_world").await.unwrap();
    let b = second.call_handle_export("styled").await.unwrap();
    assert_eq!(a, Handle::from_raw(1));
    assert_eq!(b, Handle::from_raw(1));
    assert_eq!(first.bridge().dom().len(), 3);
    assert_eq!(second.bridge().dom().len(), 1);
}

#[tokio::test]
async fn test_read_string_from_context() {
    let module = loader()
        .load_from_bytes(&guest_bytes(), Document::new())
        .await
        .unwrap();

    assert_eq!(module.read_string(48).unwrap(), "Hello world");
    assert_eq!(module.memory_size(), 65536);
    assert!(matches!(
        module.read_string(70_000),
        Err(RuntimeError::Bridge(BridgeError::OutOfBoundsRead { .. }))
    ));
}

#[tokio::test]
async fn test_compile_error() {
    let result = loader()
        .load_from_bytes(b"definitely not wasm", Document::new())
        .await;
    assert!(matches!(result, Err(RuntimeError::Compile(_))));
}

#[tokio::test]
async fn test_missing_memory_export() {
    let bytes = wat::parse_str(r#"(module (func (export "f")))"#).unwrap();
    let result = loader().load_from_bytes(&bytes, Document::new()).await;
    assert!(matches!(result, Err(RuntimeError::MissingMemory(ref name)) if name == "memory"));
}

#[tokio::test]
async fn test_unknown_import_fails_instantiation() {
    let bytes = wat::parse_str(
        r#"(module
             (import "env" "vdbridge_teleport" (func (param i32)))
             (memory (export "memory") 1))"#,
    )
    .unwrap();
    let result = loader().load_from_bytes(&bytes, Document::new()).await;
    assert!(matches!(result, Err(RuntimeError::Instantiate(_))));
}

#[tokio::test]
async fn test_missing_export() {
    let mut module = loader()
        .load_from_bytes(&guest_bytes(), Document::new())
        .await
        .unwrap();
    let err = module.call_handle_export("nope").await.unwrap_err();
    assert!(matches!(err, RuntimeError::MissingExport(_)));
}

#[tokio::test]
async fn test_fuel_limit_traps_runaway_guest() {
    let loader = ModuleLoader::new(RuntimeConfig {
        max_fuel: Some(10_000),
        ..Default::default()
    })
    .unwrap();
    let mut module = loader.load_from_bytes(&guest_bytes(), Document::new()).await.unwrap();

    let err = module.call_void_export("spin").await.unwrap_err();
    assert!(matches!(err, RuntimeError::Trap(_)));
    assert_eq!(module.remaining_fuel(), Some(0));
}

#[tokio::test]
async fn test_cancelled_load() {
    let token = CancellationToken::new();
    token.cancel();

    let result = loader()
        .load_from_bytes_cancellable(&guest_bytes(), Document::new(), &token)
        .await;
    assert!(matches!(result, Err(RuntimeError::Cancelled)));

    let result = loader()
        .load_from_url_cancellable("http://127.0.0.1:9/app.wasm", Document::new(), &token)
        .await;
    assert!(matches!(result, Err(RuntimeError::Cancelled)));
}

#[tokio::test]
async fn test_load_from_url() {
    let addr = serve_once("200 OK", guest_bytes()).await;
    let url = format!("http://{}/app.wasm", addr);

    let mut module = loader().load_from_url(&url, Document::new()).await.unwrap();
    let root = module.call_handle_export("vdcore_hello_world").await.unwrap();
    assert_eq!(
        module.render_html(root).unwrap(),
        r#"<div id="abc"><p>Hello world</p></div>"#
    );
}

#[tokio::test]
async fn test_load_from_url_error_status() {
    let addr = serve_once("404 Not Found", Vec::new()).await;
    let url = format!("http://{}/missing.wasm", addr);

    let result = loader().load_from_url(&url, Document::new()).await;
    assert!(matches!(result, Err(RuntimeError::Fetch(_))));
}

#[tokio::test]
async fn test_load_from_invalid_url() {
    let result = loader().load_from_url("not a url", Document::new()).await;
    assert!(matches!(result, Err(RuntimeError::Fetch(_))));
}

#[tokio::test]
async fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("guest.wasm");
    std::fs::write(&path, guest_bytes()).unwrap();

    let mut module = loader().load_from_file(&path, Document::new()).await.unwrap();
    let root = module.call_handle_export("vdcore_hello_world").await.unwrap();
    assert!(!root.is_null());

    let missing = loader()
        .load_from_file(&dir.path().join("absent.wasm"), Document::new())
        .await;
    assert!(matches!(missing, Err(RuntimeError::Io(_))));
}

#[tokio::test]
async fn test_create_release_loop_keeps_document_bounded() {
    let mut module = loader()
        .load_from_bytes(&guest_bytes(), Document::new())
        .await
        .unwrap();

    module.call_void_export("churn").await.unwrap();
    let bridge = module.bridge();
    assert_eq!(bridge.table().len(), 2);
    assert_eq!(bridge.table().live_count(), 0);
    assert!(bridge.dom().is_empty());
    assert!(bridge.dom().journal().is_empty());
    assert_eq!(bridge.metrics().handles_released, 5000);
}

#[tokio::test]
async fn test_start_function_uses_exported_memory() {
    let bytes = wat::parse_str(START_WAT).unwrap();
    let mut module = loader().load_from_bytes(&bytes, Document::new()).await.unwrap();

    let root = module.call_handle_export("root").await.unwrap();
    assert_eq!(root, Handle::from_raw(1));
    assert_eq!(module.render_html(root).unwrap(), "<div></div>");
}

#[tokio::test]
async fn test_start_function_without_memory_export_fails() {
    let bytes = wat::parse_str(START_NO_MEMORY_WAT).unwrap();
    let result = loader().load_from_bytes(&bytes, Document::new()).await;
    match result {
        Err(RuntimeError::Instantiate(message)) => {
            assert!(message.contains("has not been captured"), "{}", message)
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("load should fail"),
    }
}
